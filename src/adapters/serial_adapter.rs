//! Serial port adapter for RS-232 instruments.

use super::{split_lines, ByteTransport};
use crate::error::{AppResult, DaqError};
use crate::hardware::shared_serial_port::{SerialParity, SerialPortConfig};
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Quiet period that ends a drain of stale input.
const DRAIN_SETTLE: Duration = Duration::from_millis(50);

/// Serial adapter for RS-232 communication
///
/// Wraps the `serialport` crate with blocking, deadline-bounded reads. A read that hits
/// the configured timeout returns the bytes received so far, the same convention the
/// devices' vendor tooling relies on.
pub struct SerialAdapter {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Per-line read timeout
    timeout: Duration,

    port: Option<Box<dyn SerialPort>>,
}

impl SerialAdapter {
    /// Open a serial port with the given line settings.
    pub fn open(config: &SerialPortConfig) -> AppResult<Self> {
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(match config.data_bits {
                5 => serialport::DataBits::Five,
                6 => serialport::DataBits::Six,
                7 => serialport::DataBits::Seven,
                _ => serialport::DataBits::Eight,
            })
            .stop_bits(if config.stop_bits == 2 {
                serialport::StopBits::Two
            } else {
                serialport::StopBits::One
            })
            .parity(match config.parity {
                SerialParity::None => serialport::Parity::None,
                SerialParity::Even => serialport::Parity::Even,
                SerialParity::Odd => serialport::Parity::Odd,
            })
            .flow_control(serialport::FlowControl::None)
            // Internal poll timeout; the line deadline is enforced in read_until
            .timeout(Duration::from_millis(100))
            .open()?;

        debug!(
            port = %config.path,
            baud_rate = config.baud_rate,
            "Serial port opened"
        );

        Ok(Self {
            port_name: config.path.clone(),
            timeout: config.timeout,
            port: Some(port),
        })
    }

    /// Close the port. Further I/O fails with [`DaqError::PortClosed`].
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.port_name, "Serial port closed");
        }
    }

    fn port_mut(&mut self) -> AppResult<&mut Box<dyn SerialPort>> {
        let name = &self.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| DaqError::PortClosed(name.clone()))
    }
}

impl ByteTransport for SerialAdapter {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, data: &[u8]) -> AppResult<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()?;
        trace!(bytes = ?String::from_utf8_lossy(data), "Serial write");
        Ok(())
    }

    fn read_until(&mut self, delimiter: &[u8]) -> AppResult<Vec<u8>> {
        let timeout = self.timeout;
        let port = self.port_mut()?;

        let mut response = Vec::new();
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        while start.elapsed() < timeout {
            match port.read(&mut buffer) {
                Ok(1) => {
                    response.push(buffer[0]);
                    if response.ends_with(delimiter) {
                        break;
                    }
                }
                Ok(_) => {}
                // Port timeout is shorter than our line deadline
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!(bytes = ?String::from_utf8_lossy(&response), "Serial read");
        Ok(response)
    }

    fn read_all_available(&mut self) -> AppResult<Vec<Vec<u8>>> {
        let port = self.port_mut()?;
        let mut drained = Vec::new();

        loop {
            let waiting = port.bytes_to_read()? as usize;
            if waiting == 0 {
                std::thread::sleep(DRAIN_SETTLE);
                if port.bytes_to_read()? == 0 {
                    break;
                }
                continue;
            }
            let mut chunk = vec![0u8; waiting];
            let n = match port.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
                Err(e) => return Err(e.into()),
            };
            drained.extend_from_slice(&chunk[..n]);
        }
        port.clear(ClearBuffer::Input)?;

        if !drained.is_empty() {
            debug!(bytes = drained.len(), "Discarded stale serial input");
        }
        Ok(split_lines(&drained))
    }
}

impl Drop for SerialAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let config = SerialPortConfig {
            path: "/dev/does-not-exist-laser-daq".to_string(),
            ..SerialPortConfig::versalase()
        };
        let result = SerialAdapter::open(&config);
        assert!(matches!(result, Err(DaqError::SerialPort(_))));
    }
}
