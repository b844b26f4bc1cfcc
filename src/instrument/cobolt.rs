//! Cobolt Laser Driver
//!
//! Protocol Overview:
//! - Format: `<command>[ <argument>]\r\n` (ASCII)
//! - Reply: exactly one line, surrounding whitespace ignored
//! - Queries end in `?` (`l?`, `pa?`); settings take a space-separated argument
//! - Power is exchanged in W on the wire and in mW in this API
//! - Line settings: 115200 8N1
//!
//! # Example Usage
//!
//! ```no_run
//! use laser_daq::hardware::{LightSource, SerialPortConfig};
//! use laser_daq::instrument::cobolt::CoboltLaser;
//!
//! # fn main() -> laser_daq::error::AppResult<()> {
//! let mut config = SerialPortConfig::cobolt();
//! config.path = "/dev/ttyUSB1".to_string();
//! let laser = CoboltLaser::open_serial(&config)?;
//! laser.initialize()?;
//! laser.set_power_mw(25.0)?;
//! laser.enable()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, DaqError};
use crate::hardware::capabilities::{clamp_fraction, LightSource, ParameterProtocol};
use crate::hardware::SharedSerialPort;
use bytes::Bytes;
use tracing::{debug, error, info};

const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Queries reported by [`CoboltLaser::status`], with their labels.
const STATUS_QUERIES: [(&str, &str); 5] = [
    ("l?", "Emission on?"),
    ("p?", "Target power:"),
    ("pa?", "Measured power:"),
    ("f?", "Fault?"),
    ("hrs?", "Head operating hours:"),
];

/// Driver for Cobolt diode and DPSS lasers
///
/// All multi-command operations hold the port lock for their whole sequence.
#[derive(Debug)]
pub struct CoboltLaser {
    port: SharedSerialPort,
    serial_number: String,
}

impl CoboltLaser {
    /// Identify the laser on `port` and disable autostart so emission can be
    /// switched remotely.
    pub fn open(port: SharedSerialPort) -> AppResult<Self> {
        let mut laser = Self {
            port,
            serial_number: String::new(),
        };
        laser.serial_number = laser.send("sn?")?;
        info!(
            port = laser.port.name(),
            serial_number = %laser.serial_number,
            "Cobolt laser serial number"
        );

        let response = laser.send("@cobas 0")?;
        info!(response = %response, "Autostart disabled");
        Ok(laser)
    }

    /// Open a real serial port.
    #[cfg(feature = "instrument_serial")]
    pub fn open_serial(config: &crate::hardware::SerialPortConfig) -> AppResult<Self> {
        let adapter = crate::adapters::SerialAdapter::open(config)?;
        Self::open(SharedSerialPort::new(adapter))
    }

    /// Serial number read at open.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Send one command and return its trimmed reply line.
    pub fn send(&self, command: &str) -> AppResult<String> {
        let reply = self.port.with_lock(|guard| {
            guard.write(&[command.as_bytes(), LINE_TERMINATOR].concat())?;
            guard.readline()
        })?;
        let reply = String::from_utf8_lossy(&reply).trim().to_string();
        debug!(command, reply = %reply, "Cobolt transaction");
        Ok(reply)
    }

    /// Discard unread lines.
    pub fn flush(&self) -> AppResult<()> {
        self.port.with_lock(|guard| guard.drain())?;
        Ok(())
    }

    /// Prepare the laser for remote control.
    ///
    /// Leaves direct-control mode and forces autostart mode.
    pub fn initialize(&self) -> AppResult<()> {
        self.port.with_lock(|_| {
            self.flush()?;
            self.send("@cobasdr 0")?;
            self.send("@cob1")?;
            Ok(())
        })
    }

    /// Clear a latched fault and return the resulting status.
    pub fn clear_fault(&self) -> AppResult<Vec<String>> {
        self.port.with_lock(|_| {
            self.send("cf")?;
            self.status()
        })
    }

    /// Whether the laser answers an emission query sensibly.
    pub fn is_alive(&self) -> AppResult<bool> {
        let response = self.send("l?")?;
        Ok(response == "0" || response == "1")
    }

    /// Maximum output power in mW.
    pub fn max_power_mw(&self) -> AppResult<f64> {
        self.query_mw("gmlp?", 1.0)
    }

    /// Measured output power in mW; zero while emission is off.
    pub fn power_mw(&self) -> AppResult<f64> {
        self.port.with_lock(|_| {
            if !self.is_on()? {
                return Ok(0.0);
            }
            self.query_mw("pa?", 1000.0)
        })
    }

    /// Requested power in mW.
    pub fn power_setting_mw(&self) -> AppResult<f64> {
        self.query_mw("p?", 1000.0)
    }

    /// Request `mw` milliwatts, limited to the laser's maximum.
    pub fn set_power_mw(&self, mw: f64) -> AppResult<()> {
        self.port.with_lock(|_| {
            let mw = mw.min(self.max_power_mw()?).max(0.0);
            let watts = format!("{:.4}", mw / 1000.0);
            info!(watts = %watts, "Setting Cobolt laser power");
            self.send(&format!("@cobasp {watts}"))?;
            Ok(())
        })
    }

    fn query_mw(&self, command: &str, scale: f64) -> AppResult<f64> {
        let response = self.send(command)?;
        let value: f64 = response.parse().map_err(|_| {
            DaqError::Protocol(format!(
                "'{}' is not a number (reply to '{}')",
                response, command
            ))
        })?;
        Ok(value * scale)
    }
}

impl ParameterProtocol for CoboltLaser {
    fn query(&self, name: &str) -> AppResult<Bytes> {
        Ok(Bytes::from(self.send(&format!("{name}?"))?))
    }

    fn set(&self, name: &str, value: &str) -> AppResult<()> {
        self.send(&format!("{name} {value}"))?;
        Ok(())
    }
}

impl LightSource for CoboltLaser {
    fn enable(&self) -> AppResult<()> {
        self.port.with_lock(|_| {
            info!("Turning Cobolt laser ON");
            let response = self.send("l1")?;
            debug!(response = %response, "l1");

            if !self.is_on()? {
                let status = self.status()?.join("; ");
                error!(status = %status, "Cobolt laser failed to turn on");
                return Err(DaqError::Device(format!(
                    "laser failed to turn on ({status})"
                )));
            }
            Ok(())
        })
    }

    fn disable(&self) -> AppResult<()> {
        info!("Turning Cobolt laser OFF");
        self.send("l0")?;
        Ok(())
    }

    fn is_on(&self) -> AppResult<bool> {
        Ok(self.send("l?")? == "1")
    }

    fn power(&self) -> AppResult<f64> {
        self.port
            .with_lock(|_| Ok(self.power_mw()? / self.max_power_mw()?))
    }

    fn set_power(&self, fraction: f64) -> AppResult<()> {
        self.port.with_lock(|_| {
            let max = self.max_power_mw()?;
            self.set_power_mw(clamp_fraction(fraction) * max)
        })
    }

    fn status(&self) -> AppResult<Vec<String>> {
        self.port.with_lock(|_| {
            STATUS_QUERIES
                .iter()
                .map(|(command, label)| Ok(format!("{} {}", label, self.send(command)?)))
                .collect()
        })
    }

    fn shutdown(&self) -> AppResult<()> {
        self.port.with_lock(|_| {
            self.disable()?;
            self.send("@cob0")?;
            self.flush()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockAdapter, MockHandle};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Minimal Cobolt: remembers emission and power, answers `OK` to settings.
    fn scripted(emission_sticks: bool) -> (SharedSerialPort, MockHandle) {
        let state = Arc::new(Mutex::new((false, 0.0_f64)));
        let adapter = MockAdapter::new("cobolt", move |data: &[u8]| {
            let command = String::from_utf8_lossy(data).trim().to_string();
            let mut state = state.lock();
            let reply = match command.as_str() {
                "sn?" => "12345".to_string(),
                "l?" => if state.0 { "1" } else { "0" }.to_string(),
                "l1" => {
                    state.0 = emission_sticks;
                    "OK".to_string()
                }
                "l0" => {
                    state.0 = false;
                    "OK".to_string()
                }
                "gmlp?" => "100.0".to_string(),
                "p?" => format!("{:.4}", state.1),
                "pa?" => format!("{:.4}", state.1 * 0.98),
                "f?" => "0".to_string(),
                "hrs?" => "321.5".to_string(),
                cmd if cmd.starts_with("@cobasp ") => {
                    state.1 = cmd[8..].parse().unwrap_or(0.0);
                    "OK".to_string()
                }
                _ => "OK".to_string(),
            };
            format!("{reply}\r\n").into_bytes()
        });
        let handle = adapter.handle();
        (SharedSerialPort::new(adapter), handle)
    }

    #[test]
    fn test_open_reads_serial_and_disables_autostart() {
        let (port, handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        assert_eq!(laser.serial_number(), "12345");
        assert_eq!(handle.written_commands(), vec!["sn?", "@cobas 0"]);
        assert_eq!(handle.writes()[0], b"sn?\r\n".to_vec());
    }

    #[test]
    fn test_initialize_sequence() {
        let (port, handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        handle.clear_log();
        laser.initialize().unwrap();
        assert_eq!(handle.written_commands(), vec!["@cobasdr 0", "@cob1"]);
    }

    #[test]
    fn test_set_power_clamps_to_max() {
        let (port, handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        handle.clear_log();

        laser.set_power_mw(250.0).unwrap();
        assert_eq!(handle.written_commands(), vec!["gmlp?", "@cobasp 0.1000"]);
        assert!((laser.power_setting_mw().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_is_zero_while_off() {
        let (port, _handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        laser.set_power_mw(40.0).unwrap();
        assert_eq!(laser.power_mw().unwrap(), 0.0);

        laser.enable().unwrap();
        assert!((laser.power_mw().unwrap() - 39.2).abs() < 1e-9);
        assert!((laser.power().unwrap() - 0.392).abs() < 1e-9);
    }

    #[test]
    fn test_enable_failure_reports_status() {
        let (port, _handle) = scripted(false);
        let laser = CoboltLaser::open(port).unwrap();
        match laser.enable() {
            Err(DaqError::Device(msg)) => {
                assert!(msg.contains("Emission on? 0"));
                assert!(msg.contains("Head operating hours: 321.5"));
            }
            other => panic!("expected device error, got {:?}", other),
        }
    }

    #[test]
    fn test_parameter_protocol_dialect() {
        let (port, handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        handle.clear_log();

        assert_eq!(laser.query_string("hrs").unwrap(), "321.5");
        laser.set("@cobasdr", "0").unwrap();
        assert_eq!(handle.written_commands(), vec!["hrs?", "@cobasdr 0"]);
    }

    #[test]
    fn test_shutdown_sequence() {
        let (port, handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        handle.clear_log();
        laser.shutdown().unwrap();
        assert_eq!(handle.written_commands(), vec!["l0", "@cob0"]);
    }

    #[test]
    fn test_is_alive() {
        let (port, _handle) = scripted(true);
        let laser = CoboltLaser::open(port).unwrap();
        assert!(laser.is_alive().unwrap());
    }
}
