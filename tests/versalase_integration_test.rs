//! VersaLase driver tests against the in-memory controller simulator.
//!
//! Run with: cargo test --test versalase_integration_test

use laser_daq::adapters::MockAdapter;
use laser_daq::hardware::mock::{SimulatedHead, VersaLaseSimulator};
use laser_daq::hardware::{LightSource, SharedSerialPort, TriggerMode, TriggerType};
use laser_daq::instrument::versalase::{StradusVersaLase, VERSALASE_SLOTS};
use laser_daq::DaqError;

fn open(sim: &VersaLaseSimulator) -> (StradusVersaLase, laser_daq::adapters::MockHandle) {
    let adapter = sim.adapter();
    let handle = adapter.handle();
    let versalase = StradusVersaLase::open(SharedSerialPort::new(adapter), VERSALASE_SLOTS).unwrap();
    (versalase, handle)
}

#[test]
fn test_discovery_finds_exactly_populated_slots_in_order() {
    let sim = VersaLaseSimulator::with_slots(&[7, 2, 5]);
    let (versalase, _) = open(&sim);

    assert_eq!(versalase.names(), vec!["laser2", "laser5", "laser7"]);
    assert_eq!(versalase.device("laser5").unwrap().channel().slot(), 5);
    assert!(matches!(
        versalase.device("laser1"),
        Err(DaqError::DeviceNotFound(_))
    ));
}

#[test]
fn test_head_failing_calibration_does_not_abort_open() {
    let sim = VersaLaseSimulator::with_slots(&[2, 5, 7]);
    sim.set_raw_reply("2.?MAXP", b"\r\n");
    let (versalase, _) = open(&sim);

    assert_eq!(versalase.names(), vec!["laser5", "laser7"]);
    assert!(matches!(
        versalase.device("laser2"),
        Err(DaqError::DeviceNotFound(_))
    ));
}

#[test]
fn test_discovery_with_no_heads() {
    let sim = VersaLaseSimulator::new();
    let (versalase, _) = open(&sim);
    assert!(versalase.names().is_empty());
}

#[test]
fn test_handshake_switches_off_echo_and_prompt() {
    let sim = VersaLaseSimulator::new();
    let (versalase, handle) = open(&sim);

    let commands = handle.written_commands();
    assert_eq!(&commands[..3], &["?SPV", "ECHO=0", "PROMPT=0"]);
    assert!(!sim.echo_enabled());
    assert!(!sim.prompt_enabled());
    assert_eq!(versalase.connection().protocol_version(), "3.0");
    assert_eq!(versalase.connection().firmware_version(), "2.1.4");
}

#[test]
fn test_handshake_discards_stale_input() {
    let sim = VersaLaseSimulator::with_slots(&[1]);
    let adapter = sim.adapter();
    adapter.handle().inject_stale(b"garbage from a previous session\r\n");

    let versalase = StradusVersaLase::open(SharedSerialPort::new(adapter), VERSALASE_SLOTS).unwrap();
    assert_eq!(versalase.names(), vec!["laser1"]);
}

#[test]
fn test_handshake_rejection_writes_only_the_probe() {
    let adapter = MockAdapter::new("not-a-versalase", |_cmd: &[u8]| b"OK\r\n".to_vec());
    let handle = adapter.handle();

    let err = StradusVersaLase::open(SharedSerialPort::new(adapter), VERSALASE_SLOTS).unwrap_err();
    assert!(matches!(err, DaqError::Handshake(_)));
    assert_eq!(handle.written_commands(), vec!["?SPV"]);
}

#[test]
fn test_controller_parameters() {
    let sim = VersaLaseSimulator::new();
    let (versalase, _) = open(&sim);
    let conn = versalase.connection();
    assert_eq!(conn.base_plate_temperature().unwrap(), 27);
    assert!(conn.interlock_status().unwrap());
    assert_eq!(conn.show_firmware_version().unwrap(), "2.1.4");
}

#[test]
fn test_power_write_deferred_while_off_then_applied_on_enable() {
    let sim = VersaLaseSimulator::with_slots(&[2]);
    let (versalase, handle) = open(&sim);
    let laser = versalase.device("laser2").unwrap();
    handle.clear_log();

    match laser.set_power(0.5) {
        Err(DaqError::DeferredWrite { parameter, value }) => {
            assert_eq!(parameter, "LP");
            assert_eq!(value, "50.0");
        }
        other => panic!("expected deferred write, got {:?}", other),
    }
    assert_eq!(laser.pending_power(), Some(50.0));
    assert!(!handle.written_commands().iter().any(|c| c.starts_with("2.LP=")));

    laser.enable().unwrap();
    let commands = handle.written_commands();
    let le = commands.iter().position(|c| c == "2.LE=1").unwrap();
    let lp = commands.iter().position(|c| c == "2.LP=50.0").unwrap();
    assert!(le < lp);
    assert_eq!(laser.pending_power(), None);
    assert_eq!(sim.head(2).unwrap().power_setting, 50.0);
    assert!((laser.power().unwrap() - 0.5).abs() < 1e-9);
}

#[test]
fn test_power_written_directly_while_on() {
    let sim = VersaLaseSimulator::with_slots(&[3]);
    let (versalase, handle) = open(&sim);
    let laser = versalase.device("laser3").unwrap();

    laser.enable().unwrap();
    handle.clear_log();
    laser.set_power(0.25).unwrap();
    assert!(handle.written_commands().contains(&"3.LP=25.0".to_string()));
}

#[test]
fn test_power_fraction_is_clamped() {
    let sim = VersaLaseSimulator::with_slots(&[3]);
    let (versalase, _) = open(&sim);
    let laser = versalase.device("laser3").unwrap();
    laser.enable().unwrap();

    laser.set_power(1.7).unwrap();
    assert_eq!(sim.head(3).unwrap().power_setting, 100.0);
    laser.set_power(-0.3).unwrap();
    assert_eq!(sim.head(3).unwrap().power_setting, 0.0);
}

#[test]
fn test_enable_reconciles_only_first_differing_setting() {
    let sim = VersaLaseSimulator::with_slots(&[5]);
    let (versalase, handle) = open(&sim);
    let laser = versalase.device("laser5").unwrap();

    assert!(laser.set_power(0.4).unwrap_err().is_deferred());
    assert!(laser
        .set_trigger(TriggerType::High, TriggerMode::Bulb)
        .unwrap_err()
        .is_deferred());
    handle.clear_log();

    laser.enable().unwrap();
    assert_eq!(laser.pending_power(), None);
    assert_eq!(laser.pending_pulse_mode(), Some(true));
    assert!(!sim.head(5).unwrap().pulse_mode);
    assert!(!handle.written_commands().iter().any(|c| c.starts_with("5.PUL=")));

    laser.enable().unwrap();
    assert_eq!(laser.pending_pulse_mode(), None);
    assert!(sim.head(5).unwrap().pulse_mode);
    assert_eq!(laser.trigger_type().unwrap(), TriggerType::High);
}

#[test]
fn test_matching_saved_power_is_not_rewritten() {
    let sim = VersaLaseSimulator::with_slots(&[5]);
    let mut head = SimulatedHead::new(561, 100.0);
    head.power_setting = 40.0;
    sim.add_head(5, head);
    let (versalase, handle) = open(&sim);
    let laser = versalase.device("laser5").unwrap();

    assert!(laser.set_power(0.4).unwrap_err().is_deferred());
    handle.clear_log();
    laser.enable().unwrap();

    assert!(!handle.written_commands().iter().any(|c| c.starts_with("5.LP=")));
    assert_eq!(laser.pending_power(), None);
}

#[test]
fn test_boolean_reply_outside_zero_one_is_invariant_violation() {
    let sim = VersaLaseSimulator::with_slots(&[2]);
    let (versalase, _) = open(&sim);
    let laser = versalase.device("laser2").unwrap();

    sim.set_raw_reply("2.?LE", b"2.?LE=2\r\r\n");
    assert!(matches!(
        laser.is_on(),
        Err(DaqError::InvariantViolation(_))
    ));
}

#[test]
fn test_trigger_support() {
    let sim = VersaLaseSimulator::with_slots(&[1]);
    let (versalase, _) = open(&sim);
    let laser = versalase.device("laser1").unwrap();

    assert_eq!(laser.trigger_mode(), TriggerMode::Bulb);
    assert!(matches!(
        laser.set_trigger(TriggerType::RisingEdge, TriggerMode::Bulb),
        Err(DaqError::Unsupported(_))
    ));
    assert!(matches!(
        laser.set_trigger(TriggerType::High, TriggerMode::OneShot),
        Err(DaqError::Unsupported(_))
    ));
    assert!(matches!(laser.trigger(), Err(DaqError::IncompatibleState(_))));
}

#[test]
fn test_status_and_head_readouts() {
    let sim = VersaLaseSimulator::with_slots(&[3]);
    let (versalase, _) = open(&sim);
    let laser = versalase.device("laser3").unwrap();

    assert_eq!(laser.wavelength().unwrap(), 488);
    assert_eq!(laser.max_power(), 100.0);
    assert!(!laser.delay().unwrap());
    assert_eq!(
        laser.status().unwrap(),
        vec!["SN48801", "PN1000-488", "488", "100", "C"]
    );
    assert_eq!(laser.channel().get_operating_hours().unwrap(), 1200);

    laser.enable().unwrap();
    assert!(laser.is_on().unwrap());
    laser.disable().unwrap();
    assert!(!laser.is_on().unwrap());
    assert_eq!(laser.power().unwrap(), 0.0);
}
