//! Interactive client session.
//!
//! A blocking thread runs `rustyline` and forwards typed lines over a channel;
//! the async side interleaves those commands with lines arriving from the
//! server.

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    agent::ClientAgent,
    command::Command,
    error::ClientError,
    ui::{print_incoming, prompt, redisplay_prompt},
};

/// What the prompt loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Client state behind the prompt: at most one open connection
pub struct Session {
    nickname: String,
    agent: Option<ClientAgent>,
    incoming: Option<mpsc::UnboundedReceiver<String>>,
}

impl Session {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            agent: None,
            incoming: None,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn is_connected(&self) -> bool {
        self.agent.as_ref().is_some_and(ClientAgent::is_connected)
    }

    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        if let Some(agent) = &self.agent
            && agent.is_connected()
        {
            return Err(ClientError::AlreadyConnected(agent.server_addr()));
        }
        let (agent, incoming) = ClientAgent::connect(host, port, &self.nickname).await?;
        self.agent = Some(agent);
        self.incoming = Some(incoming);
        Ok(())
    }

    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        let agent = self.agent.as_mut().ok_or(ClientError::NotConnected)?;
        agent.send_line(text).await
    }

    /// Close the current connection, if any.
    pub async fn disconnect(&mut self) {
        self.incoming = None;
        if let Some(agent) = self.agent.take() {
            agent.disconnect().await;
        }
    }

    /// Run one parsed command.
    pub async fn execute(&mut self, command: Command) -> Result<Flow, ClientError> {
        match command {
            Command::Connect { host, port } => {
                self.connect(&host, port).await?;
                println!("Connected to {}:{}", host, port);
            }
            Command::Send(text) => self.send(&text).await?,
            Command::Disconnect => {
                if self.agent.is_none() {
                    return Err(ClientError::NotConnected);
                }
                self.disconnect().await;
                println!("Disconnected.");
            }
            Command::Exit => {
                self.disconnect().await;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Next line from the server.
    ///
    /// Returns `None` once when the connection goes away; pends forever while
    /// not connected.
    pub async fn next_incoming(&mut self) -> Option<String> {
        let Some(incoming) = self.incoming.as_mut() else {
            return std::future::pending().await;
        };
        match incoming.recv().await {
            Some(line) => Some(line),
            None => {
                self.incoming = None;
                self.agent = None;
                None
            }
        }
    }
}

/// Spawn the blocking readline thread.
///
/// The channel closes on Ctrl+C, Ctrl+D or a readline failure.
fn spawn_input_thread(nickname: &str) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    let prompt = prompt(nickname);

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line).ok();
                    if input_tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

/// Run the interactive client.
///
/// When `server` is given the session connects before showing the prompt.
/// Returns when the user types `exit` or closes stdin.
pub async fn run_client(
    nickname: String,
    server: Option<(String, u16)>,
) -> Result<(), ClientError> {
    let mut session = Session::new(nickname);

    if let Some((host, port)) = server {
        session.connect(&host, port).await?;
        println!("Connected to {}:{}", host, port);
    }
    println!(
        "\nYou are '{}'. Commands: connect <host> <port>, send <message>, disconnect, exit\n",
        session.nickname()
    );

    let mut input_rx = spawn_input_thread(session.nickname());

    loop {
        tokio::select! {
            input = input_rx.recv() => {
                let Some(input) = input else {
                    break;
                };
                let flow = match input.parse::<Command>() {
                    Ok(command) => session.execute(command).await,
                    Err(e) => {
                        println!("{}", e);
                        Ok(Flow::Continue)
                    }
                };
                match flow {
                    Ok(Flow::Exit) => {
                        println!("Exiting the client.");
                        break;
                    }
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("{}", e),
                }
            }
            incoming = session.next_incoming() => match incoming {
                Some(line) => print_incoming(session.nickname(), &line),
                None => {
                    println!("\nDisconnected.");
                    redisplay_prompt(session.nickname());
                }
            },
        }
    }

    session.disconnect().await;
    Ok(())
}
