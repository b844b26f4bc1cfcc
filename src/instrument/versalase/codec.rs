//! Line framing for the VersaLase ASCII dialect.
//!
//! A transaction on the wire looks like:
//!
//! ```text
//! host   -> 2.?LW\r
//! device <- \r\n                 blank acknowledgement, discarded
//! device <- 2.?LW=488\r\n        echo + '=' + payload, CRLF terminated
//! ```
//!
//! Depending on the command, firmware ends the content line with `\r\n` or `\r\r\n`,
//! and may or may not prefix it with the echoed command. The terminator shape is
//! recognised only by its trailing bytes.

use crate::error::{AppResult, DaqError};
use crate::hardware::SharedSerialPort;
use bytes::Bytes;
use tracing::trace;

/// Written after every command.
pub const COMMAND_TERMINATOR: &[u8] = b"\r";

/// Delimiter of the content line.
pub const REPLY_DELIMITER: &[u8] = b"\r\n";

/// Trailing bytes closing a reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `\r\r\n`
    CrCrLf,
    /// `\r\n`
    CrLf,
}

impl Terminator {
    /// The terminator bytes.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Terminator::CrCrLf => b"\r\r\n",
            Terminator::CrLf => b"\r\n",
        }
    }

    /// Classify by trailing bytes; `\r\r\n` wins over `\r\n`.
    pub fn detect(answer: &[u8]) -> Option<Self> {
        if answer.ends_with(b"\r\r\n") {
            Some(Terminator::CrCrLf)
        } else if answer.ends_with(b"\r\n") {
            Some(Terminator::CrLf)
        } else {
            None
        }
    }
}

/// Bytes written for `command`.
pub fn encode_command(command: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command.len() + COMMAND_TERMINATOR.len());
    frame.extend_from_slice(command);
    frame.extend_from_slice(COMMAND_TERMINATOR);
    frame
}

/// Decode the content line `answer` received for `command`.
///
/// Strips the terminator and, when the line starts with the echoed command followed
/// by one separator byte, the echo. When nothing is left the echoed command itself
/// is returned: some commands are acknowledged with a bare echo.
pub fn decode_reply(command: &[u8], answer: &[u8]) -> AppResult<Bytes> {
    if answer.is_empty() || answer == REPLY_DELIMITER {
        return Err(rejected(command));
    }

    let terminator = Terminator::detect(answer).ok_or_else(|| {
        DaqError::Protocol(format!(
            "unterminated reply to '{}': {:?}",
            String::from_utf8_lossy(command),
            String::from_utf8_lossy(answer)
        ))
    })?;
    let body = &answer[..answer.len() - terminator.as_bytes().len()];

    let echoed = body.len() > command.len() && body.starts_with(command);
    let payload = if echoed {
        &body[command.len() + 1..]
    } else {
        body
    };

    if payload.is_empty() {
        let echo_len = command.len().min(answer.len());
        return Ok(Bytes::copy_from_slice(&answer[..echo_len]));
    }
    Ok(Bytes::copy_from_slice(payload))
}

/// Run one command/reply transaction on `port`.
///
/// The lock is held from the write until the content line has been read.
pub fn send_and_receive(port: &SharedSerialPort, command: &[u8]) -> AppResult<Bytes> {
    let answer = port.with_lock(|guard| {
        guard.write(&encode_command(command))?;
        let _ack = guard.readline()?;
        let answer = guard.read_until(REPLY_DELIMITER)?;
        trace!(
            port = guard.port_name(),
            command = %String::from_utf8_lossy(command),
            answer = ?String::from_utf8_lossy(&answer),
            "VersaLase transaction"
        );
        Ok(answer)
    })?;
    decode_reply(command, &answer)
}

fn rejected(command: &[u8]) -> DaqError {
    DaqError::RejectedCommand {
        command: String::from_utf8_lossy(command).into_owned(),
    }
}
