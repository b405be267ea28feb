//! UI utilities for the client.

use std::io::Write;

/// Prompt shown by the command interpreter
pub fn prompt(nickname: &str) -> String {
    format!("{}> ", nickname)
}

/// Redisplay the prompt after printing an incoming line
pub fn redisplay_prompt(nickname: &str) {
    print!("{}", prompt(nickname));
    std::io::stdout().flush().ok();
}

/// Print one line received from the server, then restore the prompt
pub fn print_incoming(nickname: &str, line: &str) {
    println!("\r{}", line);
    redisplay_prompt(nickname);
}
