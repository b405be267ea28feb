//! Newline-delimited text protocol shared by server and client.
//!
//! After connecting, a client sends exactly one line carrying its nickname.
//! Every following line is chat text. The server relays chat text to the other
//! participants as `"<nickname>: <line>"` and announces membership changes with
//! `"<nickname> joined the chat!"` and `"<nickname> left the chat."`.

use std::fmt;

/// Terminator appended to every line on the wire.
pub const LINE_TERMINATOR: char = '\n';

/// Upper bound of bytes read for a single line.
///
/// Longer lines are delivered in several fragments.
pub const MAX_LINE_BYTES: usize = 1024;

/// Strip every trailing `\r` and `\n` from `text`.
pub fn strip_terminators(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

/// Frame `text` for the wire: trailing terminators collapse to exactly one `\n`.
pub fn frame_line(text: &str) -> String {
    let body = strip_terminators(text);
    let mut line = String::with_capacity(body.len() + 1);
    line.push_str(body);
    line.push(LINE_TERMINATOR);
    line
}

/// Messages the server relays to participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// A participant completed the handshake
    Joined { nickname: String },
    /// A participant was removed from the chat
    Left { nickname: String },
    /// A line of chat text sent by a participant
    Chat { nickname: String, text: String },
}

impl ChatMessage {
    pub fn joined(nickname: impl Into<String>) -> Self {
        Self::Joined {
            nickname: nickname.into(),
        }
    }

    pub fn left(nickname: impl Into<String>) -> Self {
        Self::Left {
            nickname: nickname.into(),
        }
    }

    pub fn chat(nickname: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            nickname: nickname.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined { nickname } => write!(f, "{} joined the chat!", nickname),
            Self::Left { nickname } => write!(f, "{} left the chat.", nickname),
            Self::Chat { nickname, text } => {
                write!(f, "{}: {}", nickname, strip_terminators(text))
            }
        }
    }
}
