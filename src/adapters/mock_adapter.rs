//! Mock byte transport for testing
//!
//! This adapter provides an in-memory link for exercising protocol code without
//! physical hardware. It provides:
//! - A responder closure that turns every write into the bytes the "device" sends back
//! - Simulated write latency (to widen race windows in concurrency tests)
//! - Controllable failure injection
//! - An event log of writes and reads, tagged with the calling thread

use super::{split_lines, ByteTransport};
use crate::error::AppResult;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// Produces the device reply for one written chunk.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// One observed operation on the mock link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bytes written by the host.
    Write {
        /// Thread that issued the write.
        thread: ThreadId,
        /// Raw bytes, terminator included.
        data: Vec<u8>,
    },
    /// Bytes handed back to the host by a read call.
    Read {
        /// Thread that issued the read.
        thread: ThreadId,
        /// Raw bytes returned.
        data: Vec<u8>,
    },
}

impl MockEvent {
    /// Thread that produced this event.
    pub fn thread(&self) -> ThreadId {
        match self {
            MockEvent::Write { thread, .. } | MockEvent::Read { thread, .. } => *thread,
        }
    }
}

/// Inspection handle that stays valid after the adapter moves into a port.
#[derive(Clone)]
pub struct MockHandle {
    events: Arc<Mutex<Vec<MockEvent>>>,
    rx: Arc<Mutex<BytesMut>>,
    open: Arc<AtomicBool>,
    fail_next_write: Arc<AtomicBool>,
}

impl MockHandle {
    /// All events in the order they happened.
    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    /// Every chunk written by the host.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write { data, .. } => Some(data.clone()),
                MockEvent::Read { .. } => None,
            })
            .collect()
    }

    /// Written chunks decoded lossily, carriage returns removed.
    pub fn written_commands(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end_matches(['\r', '\n']).to_string())
            .collect()
    }

    /// Forget every recorded event.
    pub fn clear_log(&self) {
        self.events.lock().clear();
    }

    /// Queue bytes as if the device had sent them unprompted.
    pub fn inject_stale(&self, data: &[u8]) {
        self.rx.lock().extend_from_slice(data);
    }

    /// Bytes sitting in the receive buffer.
    pub fn pending_rx(&self) -> usize {
        self.rx.lock().len()
    }

    /// Make the next write fail with an I/O error.
    pub fn inject_next_failure(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Simulate the link going away.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// In-memory transport whose replies come from a responder closure.
///
/// # Example
///
/// ```
/// use laser_daq::adapters::{ByteTransport, MockAdapter};
///
/// let mut adapter = MockAdapter::new("mock", |cmd: &[u8]| {
///     let mut reply = b"\r\n".to_vec();
///     reply.extend_from_slice(&cmd[..cmd.len() - 1]);
///     reply.extend_from_slice(b"\r\n");
///     reply
/// });
/// adapter.write(b"PING\r").unwrap();
/// assert_eq!(adapter.readline().unwrap(), b"\r\n");
/// assert_eq!(adapter.read_until(b"\r\n").unwrap(), b"PING\r\n");
/// ```
pub struct MockAdapter {
    name: String,
    responder: Responder,
    latency: Duration,
    handle: MockHandle,
}

impl MockAdapter {
    /// Create a mock link answering through `responder`.
    pub fn new<F>(name: &str, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            responder: Box::new(responder),
            latency: Duration::ZERO,
            handle: MockHandle {
                events: Arc::new(Mutex::new(Vec::new())),
                rx: Arc::new(Mutex::new(BytesMut::new())),
                open: Arc::new(AtomicBool::new(true)),
                fail_next_write: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// A link that never answers, like a port with nothing attached.
    pub fn silent(name: &str) -> Self {
        Self::new(name, |_| Vec::new())
    }

    /// Sleep this long inside every write, after logging it and before replying.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Handle for inspecting the link from the test.
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    fn log(&self, event: MockEvent) {
        self.handle.events.lock().push(event);
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.handle.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(crate::error::DaqError::PortClosed(self.name.clone()))
        }
    }
}

impl ByteTransport for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.handle.open.load(Ordering::SeqCst)
    }

    fn write(&mut self, data: &[u8]) -> AppResult<()> {
        self.ensure_open()?;
        if self.handle.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Injected failure").into());
        }
        self.log(MockEvent::Write {
            thread: std::thread::current().id(),
            data: data.to_vec(),
        });
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let reply = (self.responder)(data);
        self.handle.rx.lock().extend_from_slice(&reply);
        Ok(())
    }

    fn read_until(&mut self, delimiter: &[u8]) -> AppResult<Vec<u8>> {
        self.ensure_open()?;
        let data = {
            let mut rx = self.handle.rx.lock();
            let end = rx
                .windows(delimiter.len().max(1))
                .position(|w| w == delimiter)
                .map(|idx| idx + delimiter.len())
                // nothing terminated: behave like a read timeout
                .unwrap_or(rx.len());
            rx.split_to(end).to_vec()
        };
        self.log(MockEvent::Read {
            thread: std::thread::current().id(),
            data: data.clone(),
        });
        Ok(data)
    }

    fn read_all_available(&mut self) -> AppResult<Vec<Vec<u8>>> {
        self.ensure_open()?;
        let data = self.handle.rx.lock().split().to_vec();
        if !data.is_empty() {
            self.log(MockEvent::Read {
                thread: std::thread::current().id(),
                data: data.clone(),
            });
        }
        Ok(split_lines(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_adapter() -> MockAdapter {
        MockAdapter::new("echo", |cmd: &[u8]| {
            let mut reply = cmd.to_vec();
            reply.extend_from_slice(b"\n");
            reply
        })
    }

    #[test]
    fn test_read_until_splits_at_delimiter() {
        let mut adapter = MockAdapter::silent("mock");
        adapter.handle().inject_stale(b"\r\nA=1\r\r\nrest");
        assert_eq!(adapter.readline().unwrap(), b"\r\n");
        assert_eq!(adapter.read_until(b"\r\n").unwrap(), b"A=1\r\r\n");
        assert_eq!(adapter.handle().pending_rx(), 4);
    }

    #[test]
    fn test_read_without_delimiter_returns_partial() {
        let mut adapter = MockAdapter::silent("mock");
        adapter.handle().inject_stale(b"abc");
        assert_eq!(adapter.read_until(b"\r\n").unwrap(), b"abc");
        assert!(adapter.read_until(b"\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_responder_and_call_logging() {
        let mut adapter = echo_adapter();
        let handle = adapter.handle();
        adapter.write(b"CMD\r").unwrap();
        adapter.readline().unwrap();

        let events = handle.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MockEvent::Write { .. }));
        assert!(matches!(events[1], MockEvent::Read { .. }));
        assert_eq!(handle.written_commands(), vec!["CMD".to_string()]);

        handle.clear_log();
        assert!(handle.events().is_empty());
    }

    #[test]
    fn test_failure_injection() {
        let mut adapter = echo_adapter();
        adapter.handle().inject_next_failure();
        assert!(adapter.write(b"X\r").is_err());
        // Failure should be consumed
        assert!(adapter.write(b"X\r").is_ok());
    }

    #[test]
    fn test_closed_link_errors() {
        let mut adapter = echo_adapter();
        adapter.handle().close();
        assert!(!adapter.is_open());
        assert!(adapter.write(b"X\r").is_err());
    }

    #[test]
    fn test_drain_returns_lines() {
        let mut adapter = MockAdapter::silent("mock");
        adapter.handle().inject_stale(b"junk\r\nmore\r\n");
        let lines = adapter.read_all_available().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(adapter.handle().pending_rx(), 0);
    }
}
