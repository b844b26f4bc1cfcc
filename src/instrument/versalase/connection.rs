//! Handshake-verified session with a Stradus VersaLase controller.

use super::codec;
use super::parse::{parse_bool, parse_number};
use crate::error::{AppResult, DaqError};
use crate::hardware::capabilities::ParameterProtocol;
use crate::hardware::SharedSerialPort;
use bytes::Bytes;
use tracing::{debug, info};

/// Version query sent during the handshake.
const PROBE_COMMAND: &[u8] = b"?SPV";

/// The second handshake line must start with this.
const PROBE_REPLY_TAG: &[u8] = b"?SPV=";

/// Echo and prompt are switched off right after the handshake.
const SUPPRESSION_COMMANDS: [&[u8]; 2] = [b"ECHO=0", b"PROMPT=0"];

/// One open session over a [`SharedSerialPort`].
///
/// Every command runs as an atomic transaction on the shared port; sub-devices reach
/// the wire only through [`VersaLaseConnection::command`].
#[derive(Debug)]
pub struct VersaLaseConnection {
    port: SharedSerialPort,
    protocol_version: String,
    firmware_version: String,
}

impl VersaLaseConnection {
    /// Verify the device on `port` and prepare it for parameter commands.
    ///
    /// Stale input is discarded first. The device must answer `?SPV` with a blank line
    /// followed by a `?SPV=` line; otherwise [`DaqError::Handshake`] is returned and
    /// nothing besides the version query is written. Handshake failures are final for
    /// this port.
    pub fn open(port: SharedSerialPort) -> AppResult<Self> {
        port.with_lock(|guard| {
            guard.drain()?;

            guard.write(&codec::encode_command(PROBE_COMMAND))?;
            let empty_line = guard.readline()?;
            if empty_line != codec::REPLY_DELIMITER {
                return Err(DaqError::Handshake("not recognized device".to_string()));
            }
            let answer = guard.readline()?;
            if !answer.starts_with(PROBE_REPLY_TAG) {
                return Err(DaqError::Handshake("not recognized protocol".to_string()));
            }

            for command in SUPPRESSION_COMMANDS {
                // Best effort: the reply format is not yet settled at this point.
                if let Err(err) = codec::send_and_receive(&port, command) {
                    debug!(
                        command = %String::from_utf8_lossy(command),
                        error = %err,
                        "Ignoring echo/prompt suppression reply"
                    );
                }
            }
            guard.drain()?;
            Ok(())
        })?;

        let mut connection = Self {
            port,
            protocol_version: String::new(),
            firmware_version: String::new(),
        };
        connection.protocol_version = connection.query_string("SPV")?;
        connection.firmware_version = connection.query_string("SFV")?;

        info!(
            port = connection.port.name(),
            protocol_version = %connection.protocol_version,
            firmware_version = %connection.firmware_version,
            "Connected to VersaLase"
        );
        Ok(connection)
    }

    /// Run one raw command and return its decoded payload.
    pub fn command(&self, command: &[u8]) -> AppResult<Bytes> {
        codec::send_and_receive(&self.port, command)
    }

    /// Run `body` with the port locked, so no other thread's commands interleave.
    pub fn transaction<T, F>(&self, body: F) -> AppResult<T>
    where
        F: FnOnce() -> AppResult<T>,
    {
        self.port.with_lock(|_| body())
    }

    /// Discard any unread lines.
    pub fn flush(&self) -> AppResult<()> {
        let lines = self.port.with_lock(|guard| guard.drain())?;
        if !lines.is_empty() {
            debug!(lines = lines.len(), "Flushed pending VersaLase lines");
        }
        Ok(())
    }

    /// The shared port.
    pub fn port(&self) -> &SharedSerialPort {
        &self.port
    }

    /// Protocol version captured at handshake.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Firmware version captured at handshake.
    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    /// Base plate temperature in °C (0–55).
    pub fn base_plate_temperature(&self) -> AppResult<i64> {
        parse_number("BPT", &self.query("BPT")?)
    }

    /// Interlock status; `true` when closed.
    pub fn interlock_status(&self) -> AppResult<bool> {
        parse_bool("IL", &self.query("IL")?)
    }

    /// Live firmware version query.
    pub fn show_firmware_version(&self) -> AppResult<String> {
        self.query_string("SFV")
    }

    /// Live protocol version query.
    pub fn show_protocol_version(&self) -> AppResult<String> {
        self.query_string("SPV")
    }
}

impl ParameterProtocol for VersaLaseConnection {
    fn query(&self, name: &str) -> AppResult<Bytes> {
        self.command(format!("?{name}").as_bytes())
    }

    fn set(&self, name: &str, value: &str) -> AppResult<()> {
        self.command(format!("{name}={value}").as_bytes())?;
        Ok(())
    }
}

impl Drop for VersaLaseConnection {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            debug!(error = %err, "Could not flush VersaLase port on close");
        }
    }
}
