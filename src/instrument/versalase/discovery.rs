//! Slot discovery by speculative probing.
//!
//! The protocol has no command that lists installed heads. A slot is considered
//! populated when it answers a wavelength read, accepts `DELAY=0` and returns its
//! calibration (`MAXP`, `LPS`, `PUL`); any failure means the slot is empty.

use super::channel::LaserChannel;
use super::connection::VersaLaseConnection;
use super::laser::VersaLaseLaser;
use crate::error::{AppResult, DaqError};
use std::sync::Arc;
use tracing::{info, warn};

/// Slots of a VersaLase 8.
pub const VERSALASE_SLOTS: std::ops::RangeInclusive<u8> = 1..=8;

/// Outcome of probing one slot.
#[derive(Debug)]
pub enum ProbeResult {
    /// A head answered and its calibration was cached.
    Found(VersaLaseLaser),
    /// Nothing usable at this slot.
    Absent {
        /// Slot that was probed.
        slot: u8,
        /// The failure that ruled the slot out.
        reason: DaqError,
    },
}

/// Device name of a slot.
pub fn laser_name(slot: u8) -> String {
    format!("laser{slot}")
}

/// Probe a single slot.
pub fn probe_slot(conn: &Arc<VersaLaseConnection>, slot: u8) -> ProbeResult {
    match materialize(LaserChannel::new(conn.clone(), slot)) {
        Ok(laser) => ProbeResult::Found(laser),
        Err(reason) => ProbeResult::Absent { slot, reason },
    }
}

fn materialize(channel: LaserChannel) -> AppResult<VersaLaseLaser> {
    channel.get_wavelength()?;
    channel.set_delay(false)?;
    VersaLaseLaser::new(channel)
}

/// Probe every slot in `slots`, in order, and return the populated ones by name.
///
/// Failures never stop the scan; each is logged and the slot skipped.
pub fn discover<I>(conn: &Arc<VersaLaseConnection>, slots: I) -> Vec<(String, VersaLaseLaser)>
where
    I: IntoIterator<Item = u8>,
{
    let mut found = Vec::new();
    for slot in slots {
        let name = laser_name(slot);
        match probe_slot(conn, slot) {
            ProbeResult::Found(laser) => {
                info!(laser = %name, "Found {} on VersaLase", name);
                found.push((name, laser));
            }
            ProbeResult::Absent { reason, .. } if reason.is_device_reply() => {
                info!(laser = %name, reason = %reason, "No {} available", name);
            }
            ProbeResult::Absent { reason, .. } => {
                warn!(laser = %name, error = %reason, "Probe of {} failed", name);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::VersaLaseSimulator;
    use crate::hardware::SharedSerialPort;
    use tracing_test::traced_test;

    fn connect(sim: &VersaLaseSimulator) -> Arc<VersaLaseConnection> {
        let port = SharedSerialPort::new(sim.adapter());
        Arc::new(VersaLaseConnection::open(port).unwrap())
    }

    #[test]
    fn test_probe_empty_slot_is_absent() {
        let sim = VersaLaseSimulator::with_slots(&[4]);
        let conn = connect(&sim);
        match probe_slot(&conn, 3) {
            ProbeResult::Absent { slot, reason } => {
                assert_eq!(slot, 3);
                assert!(matches!(reason, DaqError::RejectedCommand { .. }));
            }
            ProbeResult::Found(_) => panic!("slot 3 is empty"),
        }
    }

    #[test]
    fn test_probe_clears_delay() {
        let sim = VersaLaseSimulator::with_slots(&[4]);
        let conn = connect(&sim);
        match probe_slot(&conn, 4) {
            ProbeResult::Found(laser) => assert_eq!(laser.channel().prefix(), "4."),
            ProbeResult::Absent { reason, .. } => panic!("slot 4 is populated: {reason}"),
        }
        assert!(!sim.head(4).unwrap().delay);
    }

    #[test]
    #[traced_test]
    fn test_slot_rejecting_delay_is_skipped() {
        let sim = VersaLaseSimulator::with_slots(&[1, 2, 3]);
        sim.set_raw_reply("2.DELAY=0", b"\r\n");
        let conn = connect(&sim);

        let names: Vec<_> = discover(&conn, 1..=3).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["laser1", "laser3"]);
        assert!(logs_contain("No laser2 available"));
        assert!(sim.head(2).unwrap().delay);
        assert!(!sim.head(3).unwrap().delay);
    }

    #[test]
    fn test_slot_failing_calibration_read_is_skipped() {
        let sim = VersaLaseSimulator::with_slots(&[4, 6]);
        sim.set_raw_reply("4.?PUL", b"\r\n");
        let conn = connect(&sim);

        let names: Vec<_> = discover(&conn, 1..=8).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["laser6"]);
    }

    #[test]
    #[traced_test]
    fn test_discover_logs_skipped_slots() {
        let sim = VersaLaseSimulator::with_slots(&[2]);
        let conn = connect(&sim);
        let found = discover(&conn, 1..=3);

        let names: Vec<_> = found.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["laser2"]);
        assert!(logs_contain("No laser1 available"));
        assert!(logs_contain("Found laser2 on VersaLase"));
        assert!(logs_contain("No laser3 available"));
    }

    #[test]
    #[traced_test]
    fn test_closed_port_is_warned_not_fatal() {
        let sim = VersaLaseSimulator::with_slots(&[1]);
        let adapter = sim.adapter();
        let handle = adapter.handle();
        let conn = Arc::new(VersaLaseConnection::open(SharedSerialPort::new(adapter)).unwrap());

        handle.close();
        assert!(discover(&conn, 1..=2).is_empty());
        assert!(logs_contain("Probe of laser1 failed"));
    }
}
