//! Custom error types for the library.
//!
//! This module defines the primary error type, `DaqError`, shared by the transport,
//! protocol and device layers. Using the `thiserror` crate, it gives every layer a
//! single, consistent failure vocabulary that propagates with the `?` operator.
//!
//! ## Error Hierarchy
//!
//! - **`Transport`** / **`SerialPort`** / **`PortClosed`**: byte-stream failures. Fatal for
//!   the current transaction; the caller may retry the whole transaction.
//! - **`Handshake`**: the connection probe did not see the expected blank-line/tag
//!   pattern. Fatal for the connection.
//! - **`Protocol`**: a reply matched neither framing shape, or a numeric field did not
//!   parse.
//! - **`RejectedCommand`**: the device answered with an empty line. Carries the command.
//! - **`DeferredWrite`**: a gated write was withheld and saved for later. This is a
//!   partial success, not a device failure.
//! - **`InvariantViolation`**: a reply broke an assumption that the device guarantees,
//!   such as a boolean that is neither `0` nor `1`.
//! - **`Config`** / **`Configuration`**: loading or validating configuration.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// The error type for every fallible operation in this crate.
#[derive(Error, Debug)]
pub enum DaqError {
    /// I/O failure at the byte-stream level.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Failure opening or configuring a serial port.
    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// The transport was used after being closed.
    #[error("Serial port '{0}' is closed")]
    PortClosed(String),

    /// The connection probe failed; the device is absent or speaks another dialect.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Reply bytes did not match a recognised framing, or a field failed to parse.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device acknowledged the command but returned no content.
    #[error("Command rejected by device: {command}")]
    RejectedCommand {
        /// The command as sent, without the line terminator.
        command: String,
    },

    /// A write was withheld because emission is off; the value has been saved.
    #[error("Write of {parameter} deferred until emission is enabled (saved value {value})")]
    DeferredWrite {
        /// Parameter mnemonic, e.g. `LP`.
        parameter: &'static str,
        /// The value that will be applied on the next enable.
        value: String,
    },

    /// The device returned something its protocol rules out.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The device refused to reach the requested state.
    #[error("Device error: {0}")]
    Device(String),

    /// No device is registered under the given name.
    #[error("No device named '{0}'")]
    DeviceNotFound(String),

    /// The operation is not supported by this device.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// The operation makes no sense in the current device mode.
    #[error("Incompatible state: {0}")]
    IncompatibleState(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration loaded but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}

impl DaqError {
    /// True for a write that was saved instead of sent.
    pub fn is_deferred(&self) -> bool {
        matches!(self, DaqError::DeferredWrite { .. })
    }

    /// True for failures raised by the device dialect rather than the byte stream.
    ///
    /// Slot discovery treats these as "no sub-device here".
    pub fn is_device_reply(&self) -> bool {
        matches!(
            self,
            DaqError::RejectedCommand { .. }
                | DaqError::Protocol(_)
                | DaqError::InvariantViolation(_)
        )
    }
}
