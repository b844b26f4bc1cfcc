//! Mock Hardware Implementations
//!
//! Provides simulated devices for testing without physical hardware. Each simulator
//! speaks the device's wire dialect and plugs into a
//! [`MockAdapter`](crate::adapters::MockAdapter).
//!
//! # Available Mocks
//!
//! - `VersaLaseSimulator` - Stradus VersaLase 8 with configurable populated slots

use crate::adapters::MockAdapter;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// =============================================================================
// VersaLaseSimulator - Simulated Stradus VersaLase 8
// =============================================================================

const ACK: &[u8] = b"\r\n";
const CRLF: &[u8] = b"\r\n";
const CRCRLF: &[u8] = b"\r\r\n";

/// State of one simulated laser head.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedHead {
    /// Nominal wavelength (nm)
    pub wavelength: i64,
    /// Calibrated maximum power (mW)
    pub max_power: f64,
    /// Commanded power (mW)
    pub power_setting: f64,
    /// Pulse power (mW)
    pub pulse_power: f64,
    /// Emission state
    pub emission: bool,
    /// Digital modulation
    pub pulse_mode: bool,
    /// Emission delay
    pub delay: bool,
    /// Current control mode
    pub drive_control: bool,
    /// External power control
    pub external_power_control: bool,
    /// Autostart
    pub computer_control: bool,
    /// Head operating hours
    pub operating_hours: i64,
    /// Identification string
    pub identification: String,
}

impl SimulatedHead {
    /// A head at `wavelength` nm with `max_power` mW.
    pub fn new(wavelength: i64, max_power: f64) -> Self {
        Self {
            wavelength,
            max_power,
            power_setting: 0.0,
            pulse_power: 0.0,
            emission: false,
            pulse_mode: false,
            delay: true,
            drive_control: false,
            external_power_control: false,
            computer_control: true,
            operating_hours: 1200,
            identification: format!("SN{wavelength}01 PN1000-{wavelength} {wavelength} {max_power:.0} C"),
        }
    }
}

#[derive(Debug)]
struct SimState {
    heads: BTreeMap<u8, SimulatedHead>,
    echo: bool,
    prompt: bool,
    protocol_version: String,
    firmware_version: String,
    base_plate_temperature: i64,
    interlock_closed: bool,
    overrides: HashMap<String, Vec<u8>>,
}

/// Simulated Stradus VersaLase 8
///
/// Replies follow the controller's quirks: a blank acknowledgement line, then the
/// echoed command with its value, terminated by `\r\n` or, for some parameters and all
/// set commands, `\r\r\n`. Commands for empty slots, unknown parameters and power or
/// modulation changes while emission is off are rejected with an empty line.
///
/// # Example
///
/// ```
/// use laser_daq::hardware::mock::VersaLaseSimulator;
///
/// let sim = VersaLaseSimulator::with_slots(&[2, 5, 7]);
/// assert!(sim.head(5).is_some());
/// assert!(sim.head(1).is_none());
/// ```
#[derive(Clone)]
pub struct VersaLaseSimulator {
    state: Arc<Mutex<SimState>>,
}

impl Default for VersaLaseSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersaLaseSimulator {
    /// A controller with no heads installed.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                heads: BTreeMap::new(),
                echo: true,
                prompt: true,
                protocol_version: "3.0".to_string(),
                firmware_version: "2.1.4".to_string(),
                base_plate_temperature: 27,
                interlock_closed: true,
                overrides: HashMap::new(),
            })),
        }
    }

    /// A controller with default heads in `slots`.
    pub fn with_slots(slots: &[u8]) -> Self {
        const WAVELENGTHS: [i64; 8] = [405, 445, 488, 515, 561, 594, 638, 730];
        let sim = Self::new();
        for &slot in slots {
            let idx = usize::from(slot.saturating_sub(1)) % WAVELENGTHS.len();
            sim.add_head(slot, SimulatedHead::new(WAVELENGTHS[idx], 100.0));
        }
        sim
    }

    /// Install or replace the head in `slot`.
    pub fn add_head(&self, slot: u8, head: SimulatedHead) {
        self.state.lock().heads.insert(slot, head);
    }

    /// Snapshot of the head in `slot`.
    pub fn head(&self, slot: u8) -> Option<SimulatedHead> {
        self.state.lock().heads.get(&slot).cloned()
    }

    /// Change the head in `slot` behind the driver's back.
    pub fn update_head<F: FnOnce(&mut SimulatedHead)>(&self, slot: u8, update: F) {
        if let Some(head) = self.state.lock().heads.get_mut(&slot) {
            update(head);
        }
    }

    /// Answer `command` with `content_line` instead of the simulated reply.
    ///
    /// The blank acknowledgement line is still sent first.
    pub fn set_raw_reply(&self, command: &str, content_line: &[u8]) {
        self.state
            .lock()
            .overrides
            .insert(command.to_string(), content_line.to_vec());
    }

    /// Whether command echo is still on.
    pub fn echo_enabled(&self) -> bool {
        self.state.lock().echo
    }

    /// Whether the prompt is still on.
    pub fn prompt_enabled(&self) -> bool {
        self.state.lock().prompt
    }

    /// A mock link wired to this simulator.
    pub fn adapter(&self) -> MockAdapter {
        let sim = self.clone();
        MockAdapter::new("versalase-sim", move |data: &[u8]| sim.respond(data))
    }

    /// Produce the bytes the controller sends in answer to `data`.
    pub fn respond(&self, data: &[u8]) -> Vec<u8> {
        let command = String::from_utf8_lossy(data)
            .trim_end_matches('\r')
            .to_string();
        let mut state = self.state.lock();

        if let Some(line) = state.overrides.get(&command) {
            return [ACK, line.as_slice()].concat();
        }

        let (slot, body) = split_prefix(&command);
        let content = match slot {
            Some(slot) => match state.heads.get_mut(&slot) {
                Some(head) => head_reply(head, body),
                None => None,
            },
            None => controller_reply(&mut state, body),
        };

        match content {
            Some((value, terminator)) => {
                let line = match value {
                    Some(value) => format!("{command}={value}"),
                    None => command.clone(),
                };
                [ACK, line.as_bytes(), terminator].concat()
            }
            None => [ACK, CRLF].concat(),
        }
    }
}

/// Reply content: `Some(value)` for queries, `None` to echo a set command.
type Content = Option<(Option<String>, &'static [u8])>;

fn split_prefix(command: &str) -> (Option<u8>, &str) {
    if let Some((prefix, rest)) = command.split_once('.') {
        if let Ok(slot) = prefix.parse::<u8>() {
            return (Some(slot), rest);
        }
    }
    (None, command)
}

fn bit(state: bool) -> String {
    String::from(if state { "1" } else { "0" })
}

fn parse_bit(value: &str) -> Option<bool> {
    match value {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn controller_reply(state: &mut SimState, body: &str) -> Content {
    if let Some(name) = body.strip_prefix('?') {
        let value = match name {
            "SPV" => state.protocol_version.clone(),
            "SFV" => state.firmware_version.clone(),
            "BPT" => state.base_plate_temperature.to_string(),
            "IL" => return Some((Some(bit(state.interlock_closed)), CRCRLF)),
            _ => return None,
        };
        return Some((Some(value), CRLF));
    }

    let (name, value) = body.split_once('=')?;
    let flag = parse_bit(value)?;
    match name {
        "ECHO" => state.echo = flag,
        "PROMPT" => state.prompt = flag,
        _ => return None,
    }
    Some((None, CRCRLF))
}

fn head_reply(head: &mut SimulatedHead, body: &str) -> Content {
    if let Some(name) = body.strip_prefix('?') {
        let (value, terminator) = match name {
            "C" => (bit(head.drive_control), CRLF),
            "CC" => (bit(head.computer_control), CRLF),
            "DELAY" => (bit(head.delay), CRCRLF),
            "EPC" => (bit(head.external_power_control), CRLF),
            "LE" => (bit(head.emission), CRCRLF),
            "LH" => (head.operating_hours.to_string(), CRLF),
            "LI" => (head.identification.clone(), CRLF),
            "LP" => {
                let measured = if head.emission { head.power_setting } else { 0.0 };
                (format!("{measured:.1}"), CRLF)
            }
            "LPS" => (format!("{:.1}", head.power_setting), CRLF),
            "LW" => (head.wavelength.to_string(), CRLF),
            "MAXP" => (format!("{:.1}", head.max_power), CRLF),
            "PP" => (format!("{:.0}", head.pulse_power), CRLF),
            "PUL" => (bit(head.pulse_mode), CRCRLF),
            _ => return None,
        };
        return Some((Some(value), terminator));
    }

    let (name, value) = body.split_once('=')?;
    match name {
        "C" => head.drive_control = parse_bit(value)?,
        "DELAY" => head.delay = parse_bit(value)?,
        "EPC" => head.external_power_control = parse_bit(value)?,
        "LE" => head.emission = parse_bit(value)?,
        "LP" | "PP" => {
            let power: f64 = value.parse().ok()?;
            if !(0.0..=head.max_power).contains(&power) {
                return None;
            }
            if name == "PP" {
                head.pulse_power = power;
            } else if head.emission {
                head.power_setting = power;
            } else {
                return None;
            }
        }
        "PUL" if head.emission => head.pulse_mode = parse_bit(value)?,
        _ => return None,
    }
    Some((None, CRCRLF))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_reply() {
        let sim = VersaLaseSimulator::new();
        assert_eq!(sim.respond(b"?SPV\r"), b"\r\n?SPV=3.0\r\n");
    }

    #[test]
    fn test_query_populated_slot() {
        let sim = VersaLaseSimulator::with_slots(&[3]);
        assert_eq!(sim.respond(b"3.?LW\r"), b"\r\n3.?LW=488\r\n");
        assert_eq!(sim.respond(b"3.?LE\r"), b"\r\n3.?LE=0\r\r\n");
    }

    #[test]
    fn test_empty_slot_rejected() {
        let sim = VersaLaseSimulator::with_slots(&[3]);
        assert_eq!(sim.respond(b"4.?LW\r"), b"\r\n\r\n");
    }

    #[test]
    fn test_power_gated_on_emission() {
        let sim = VersaLaseSimulator::with_slots(&[1]);
        assert_eq!(sim.respond(b"1.LP=20.0\r"), b"\r\n\r\n");

        assert_eq!(sim.respond(b"1.LE=1\r"), b"\r\n1.LE=1\r\r\n");
        assert_eq!(sim.respond(b"1.LP=20.0\r"), b"\r\n1.LP=20.0\r\r\n");
        assert_eq!(sim.head(1).unwrap().power_setting, 20.0);
    }

    #[test]
    fn test_suppression_commands() {
        let sim = VersaLaseSimulator::new();
        sim.respond(b"ECHO=0\r");
        sim.respond(b"PROMPT=0\r");
        assert!(!sim.echo_enabled());
        assert!(!sim.prompt_enabled());
    }

    #[test]
    fn test_raw_reply_override() {
        let sim = VersaLaseSimulator::with_slots(&[2]);
        sim.set_raw_reply("2.?LE", b"2.?LE=2\r\n");
        assert_eq!(sim.respond(b"2.?LE\r"), b"\r\n2.?LE=2\r\n");
    }
}
