//! Slot-addressed access to one laser head of a VersaLase.
//!
//! Commands for a head are the controller's commands with a `"<slot>."` prefix:
//! `2.?LE` reads emission of slot 2, `2.LE=1` switches it on.

use super::connection::VersaLaseConnection;
use super::parse::{format_bool, format_power, parse_bool, parse_number};
use crate::error::AppResult;
use crate::hardware::capabilities::ParameterProtocol;
use bytes::Bytes;
use std::sync::Arc;

/// One laser head sharing the controller's connection.
#[derive(Debug, Clone)]
pub struct LaserChannel {
    conn: Arc<VersaLaseConnection>,
    slot: u8,
    prefix: String,
}

impl LaserChannel {
    /// Address slot `slot` without talking to the device.
    ///
    /// Use [`probe_slot`](super::discovery::probe_slot) to confirm a head is installed.
    pub fn new(conn: Arc<VersaLaseConnection>, slot: u8) -> Self {
        Self {
            conn,
            slot,
            prefix: format!("{slot}."),
        }
    }

    /// Slot number.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// The command prefix, e.g. `"2."`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Owning connection.
    pub fn connection(&self) -> &Arc<VersaLaseConnection> {
        &self.conn
    }

    fn query_bool(&self, name: &str) -> AppResult<bool> {
        parse_bool(name, &self.query(name)?)
    }

    fn set_bool(&self, name: &str, state: bool) -> AppResult<()> {
        self.set(name, format_bool(state))
    }

    /// `C=1` selects current control, `C=0` power control.
    pub fn set_drive_control_mode(&self, state: bool) -> AppResult<()> {
        self.set_bool("C", state)
    }

    /// Emission start delay.
    pub fn set_delay(&self, state: bool) -> AppResult<()> {
        self.set_bool("DELAY", state)
    }

    /// `EPC=1` hands power control to the analog input.
    pub fn set_external_power_control(&self, state: bool) -> AppResult<()> {
        self.set_bool("EPC", state)
    }

    /// Laser emission on or off.
    pub fn set_emission(&self, state: bool) -> AppResult<()> {
        self.set_bool("LE", state)
    }

    /// Output power in mW, from 0 to the calibrated maximum.
    pub fn set_power(&self, power: f64) -> AppResult<()> {
        self.set("LP", &format_power(power))
    }

    /// Pulse power in mW; only honoured in power control mode (`C=0`).
    pub fn set_pulse_power(&self, power: f64) -> AppResult<()> {
        self.set("PP", &format_power(power))
    }

    /// Digital modulation (`PUL=1`).
    pub fn set_pulse_mode(&self, state: bool) -> AppResult<()> {
        self.set_bool("PUL", state)
    }

    /// Current control mode.
    pub fn get_drive_control_mode(&self) -> AppResult<bool> {
        self.query_bool("C")
    }

    /// `true` for autostart, `false` for manual start.
    pub fn get_computer_control(&self) -> AppResult<bool> {
        self.query_bool("CC")
    }

    /// Emission start delay.
    pub fn get_delay(&self) -> AppResult<bool> {
        self.query_bool("DELAY")
    }

    /// Whether emission is on.
    pub fn get_emission_status(&self) -> AppResult<bool> {
        self.query_bool("LE")
    }

    /// Operating hours of the head.
    pub fn get_operating_hours(&self) -> AppResult<i64> {
        parse_number("LH", &self.query("LH")?)
    }

    /// Serial number, part number, nominal wavelength, nominal power and beam shape.
    pub fn get_identification(&self) -> AppResult<String> {
        self.query_string("LI")
    }

    /// Measured output power in mW.
    pub fn get_power(&self) -> AppResult<f64> {
        parse_number("LP", &self.query("LP")?)
    }

    /// Commanded output power in mW.
    pub fn get_power_setting(&self) -> AppResult<f64> {
        parse_number("LPS", &self.query("LPS")?)
    }

    /// Wavelength in nm.
    pub fn get_wavelength(&self) -> AppResult<i64> {
        parse_number("LW", &self.query("LW")?)
    }

    /// Calibrated maximum power in mW.
    pub fn get_max_power(&self) -> AppResult<f64> {
        parse_number("MAXP", &self.query("MAXP")?)
    }

    /// Pulse power in mW.
    pub fn get_pulse_power(&self) -> AppResult<i64> {
        parse_number("PP", &self.query("PP")?)
    }

    /// Digital modulation state.
    pub fn get_pulse_mode(&self) -> AppResult<bool> {
        self.query_bool("PUL")
    }

    /// External power control state.
    pub fn get_external_power_control_mode(&self) -> AppResult<bool> {
        self.query_bool("EPC")
    }
}

impl ParameterProtocol for LaserChannel {
    fn query(&self, name: &str) -> AppResult<Bytes> {
        // the prefix goes before the query operator: "2.?LE"
        self.conn
            .command(format!("{}?{}", self.prefix, name).as_bytes())
    }

    fn set(&self, name: &str, value: &str) -> AppResult<()> {
        self.conn.set(&format!("{}{}", self.prefix, name), value)
    }
}
