//! Hardware adapter implementations
//!
//! This module defines the [`ByteTransport`] trait, the blocking byte-stream
//! abstraction every driver talks through, and its implementations:
//!
//! - [`SerialAdapter`]: RS-232 via the `serialport` crate (feature `instrument_serial`)
//! - [`MockAdapter`]: in-memory transport driven by a responder closure, for tests
//!
//! Read semantics follow the classic line-oriented serial convention: a read that
//! times out is not an error, it returns whatever bytes arrived before the deadline
//! (possibly none). Protocol layers decide what an empty or partial line means.

pub mod mock_adapter;
#[cfg(feature = "instrument_serial")]
pub mod serial_adapter;

pub use mock_adapter::{MockAdapter, MockEvent, MockHandle};
#[cfg(feature = "instrument_serial")]
pub use serial_adapter::SerialAdapter;

use crate::error::AppResult;

/// Blocking byte-stream transport.
///
/// Implementations are not required to be thread-safe; exclusive access is provided
/// by [`SharedSerialPort`](crate::hardware::SharedSerialPort).
pub trait ByteTransport: Send {
    /// Human-readable name of the link, e.g. the port path.
    fn name(&self) -> &str;

    /// Whether the link is currently open.
    fn is_open(&self) -> bool {
        true
    }

    /// Write all bytes to the link.
    fn write(&mut self, data: &[u8]) -> AppResult<()>;

    /// Read until `delimiter` has been received (inclusive) or the read timeout expires.
    ///
    /// On timeout the bytes received so far are returned without error.
    fn read_until(&mut self, delimiter: &[u8]) -> AppResult<Vec<u8>>;

    /// Read one `\n`-terminated line.
    fn readline(&mut self) -> AppResult<Vec<u8>> {
        self.read_until(b"\n")
    }

    /// Drain everything currently buffered on the link, split into lines.
    fn read_all_available(&mut self) -> AppResult<Vec<Vec<u8>>>;
}

/// Split drained bytes into `\n`-terminated lines, keeping terminators.
///
/// A trailing fragment without `\n` is returned as its own element.
pub(crate) fn split_lines(data: &[u8]) -> Vec<Vec<u8>> {
    data.split_inclusive(|b| *b == b'\n')
        .map(<[u8]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_keeps_terminators() {
        let lines = split_lines(b"\r\n?SPV=3.0\r\npartial");
        assert_eq!(
            lines,
            vec![b"\r\n".to_vec(), b"?SPV=3.0\r\n".to_vec(), b"partial".to_vec()]
        );
    }

    #[test]
    fn test_split_lines_empty() {
        assert!(split_lines(b"").is_empty());
    }
}
