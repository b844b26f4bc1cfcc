//! Shared Serial Port with per-transaction exclusive access
//!
//! Provides thread-safe, exclusive access to one byte-stream transport shared by many
//! logical devices. A transaction (write, read acknowledgement, read reply) runs inside
//! a single [`SharedSerialPort::with_lock`] scope, so no other thread can put bytes on
//! the wire until it completes.
//!
//! The lock is reentrant: a driver may hold it across a multi-transaction sequence
//! (handshake, enable-then-reconcile) and still call helpers that take it again.

use crate::adapters::ByteTransport;
use crate::error::AppResult;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Configuration for a serial port connection
#[derive(Clone, Debug, PartialEq)]
pub struct SerialPortConfig {
    /// Path to the serial device (e.g., "/dev/ttyUSB0", "COM3")
    pub path: String,
    /// Baud rate (9600, 115200, etc.)
    pub baud_rate: u32,
    /// Data bits (7 or 8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity setting
    pub parity: SerialParity,
    /// Per-line read timeout
    pub timeout: Duration,
}

/// Parity modes for serial communication
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum SerialParity {
    /// No parity bit
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            timeout: Duration::from_secs(1),
        }
    }
}

impl SerialPortConfig {
    /// Line settings from the VersaLase 8 manual: 19200 8N1.
    ///
    /// The long timeout is needed; shorter ones give unreliable replies.
    pub fn versalase() -> Self {
        Self {
            baud_rate: 19200,
            timeout: Duration::from_secs(6),
            ..Default::default()
        }
    }

    /// Cobolt lasers: 115200 8N1, short per-line timeout.
    pub fn cobolt() -> Self {
        Self {
            baud_rate: 115200,
            timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }
}

type Inner = ReentrantMutex<RefCell<Box<dyn ByteTransport>>>;

/// Shared transport wrapper with exclusive access control
///
/// Cloning is cheap and every clone refers to the same physical link.
#[derive(Clone)]
pub struct SharedSerialPort {
    inner: Arc<Inner>,
    name: Arc<str>,
}

impl SharedSerialPort {
    /// Take ownership of a transport.
    ///
    /// # Example
    /// ```
    /// use laser_daq::adapters::MockAdapter;
    /// use laser_daq::hardware::SharedSerialPort;
    ///
    /// let port = SharedSerialPort::new(MockAdapter::silent("/dev/ttyUSB0"));
    /// assert_eq!(port.name(), "/dev/ttyUSB0");
    /// assert!(!port.is_locked());
    /// ```
    pub fn new<T: ByteTransport + 'static>(transport: T) -> Self {
        let name: Arc<str> = Arc::from(transport.name());
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(Box::new(transport)))),
            name,
        }
    }

    /// Run `body` while holding exclusive access to the transport.
    ///
    /// The guard is released on every exit path, including errors and panics. Calls
    /// from the thread already holding the lock nest without blocking.
    pub fn with_lock<T, F>(&self, body: F) -> AppResult<T>
    where
        F: FnOnce(&SerialGuard<'_>) -> AppResult<T>,
    {
        let guard = SerialGuard {
            inner: self.inner.lock(),
            name: &*self.name,
        };
        body(&guard)
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Whether the underlying link is open.
    pub fn is_open(&self) -> bool {
        self.with_lock(|guard| Ok(guard.is_open())).unwrap_or(false)
    }

    /// Name of the link (port path).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SharedSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSerialPort")
            .field("name", &self.name)
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// RAII guard for exclusive transport access
///
/// Only obtainable inside [`SharedSerialPort::with_lock`]. Each I/O call borrows the
/// transport for its own duration, so nested lock scopes on the same thread are safe.
pub struct SerialGuard<'a> {
    inner: ReentrantMutexGuard<'a, RefCell<Box<dyn ByteTransport>>>,
    name: &'a str,
}

impl SerialGuard<'_> {
    /// Write bytes to the link.
    pub fn write(&self, data: &[u8]) -> AppResult<()> {
        trace!(port = %self.name, bytes = data.len(), "Writing to serial port");
        self.inner.borrow_mut().write(data)
    }

    /// Read one `\n`-terminated line (possibly partial on timeout).
    pub fn readline(&self) -> AppResult<Vec<u8>> {
        self.inner.borrow_mut().readline()
    }

    /// Read until `delimiter` (possibly partial on timeout).
    pub fn read_until(&self, delimiter: &[u8]) -> AppResult<Vec<u8>> {
        self.inner.borrow_mut().read_until(delimiter)
    }

    /// Discard everything buffered on the link, returning it as lines.
    pub fn drain(&self) -> AppResult<Vec<Vec<u8>>> {
        self.inner.borrow_mut().read_all_available()
    }

    /// Whether the link is open.
    pub fn is_open(&self) -> bool {
        self.inner.borrow().is_open()
    }

    /// Name of the link.
    pub fn port_name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;
    use crate::error::DaqError;

    #[test]
    fn test_port_properties() {
        let config = SerialPortConfig::versalase();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, SerialParity::None);
        assert_eq!(config.timeout, Duration::from_secs(6));
        assert_eq!(SerialPortConfig::cobolt().baud_rate, 115200);
    }

    #[test]
    fn test_lock_released_after_body() {
        let port = SharedSerialPort::new(MockAdapter::silent("mock"));
        port.with_lock(|guard| {
            guard.write(b"X\r")?;
            Ok(())
        })
        .unwrap();
        assert!(!port.is_locked());
    }

    #[test]
    fn test_lock_released_on_error() {
        let port = SharedSerialPort::new(MockAdapter::silent("mock"));
        let result: AppResult<()> =
            port.with_lock(|_| Err(DaqError::Protocol("boom".to_string())));
        assert!(result.is_err());
        assert!(!port.is_locked());
    }

    #[test]
    fn test_nested_lock_same_thread() {
        let adapter = MockAdapter::new("mock", |cmd: &[u8]| cmd.to_vec());
        let port = SharedSerialPort::new(adapter);
        let reply = port
            .with_lock(|outer| {
                outer.write(b"A\n")?;
                port.with_lock(|inner| {
                    inner.write(b"B\n")?;
                    inner.readline()
                })
            })
            .unwrap();
        assert_eq!(reply, b"A\n");
        assert!(!port.is_locked());
    }

    #[test]
    fn test_closed_port_reports_closed() {
        let adapter = MockAdapter::silent("mock");
        let handle = adapter.handle();
        let port = SharedSerialPort::new(adapter);
        assert!(port.is_open());
        handle.close();
        assert!(!port.is_open());
    }
}
