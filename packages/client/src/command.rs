//! Command interpreter for the interactive prompt.

use std::str::FromStr;

use thiserror::Error;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `connect <host> <port>`
    Connect { host: String, port: u16 },
    /// `send <text>`
    Send(String),
    /// `disconnect`
    Disconnect,
    /// `exit`
    Exit,
}

/// Reasons a prompt line is not a valid command
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid port: {0}")]
    InvalidPort(String),
}

const CONNECT_USAGE: &str = "connect <host> <port>";
const SEND_USAGE: &str = "send <message>";

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim_start();
        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (input.trim_end(), ""),
        };

        match name {
            "send" => {
                if rest.trim().is_empty() {
                    return Err(CommandError::Usage(SEND_USAGE));
                }
                Ok(Command::Send(rest.trim_end().to_string()))
            }
            "connect" => {
                let mut args = rest.split_whitespace();
                let (Some(host), Some(port), None) = (args.next(), args.next(), args.next())
                else {
                    return Err(CommandError::Usage(CONNECT_USAGE));
                };
                let port = port
                    .parse::<u16>()
                    .map_err(|_| CommandError::InvalidPort(port.to_string()))?;
                Ok(Command::Connect {
                    host: host.to_string(),
                    port,
                })
            }
            "disconnect" if rest.is_empty() => Ok(Command::Disconnect),
            "exit" if rest.is_empty() => Ok(Command::Exit),
            _ => Err(CommandError::Unknown(input.trim_end().to_string())),
        }
    }
}
