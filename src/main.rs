//! CLI Entry Point for laser_daq
//!
//! Command-line control of the light sources on a bench:
//! - Discover VersaLase heads
//! - Switch emission and set power
//! - Print device status
//!
//! # Usage
//!
//! ```bash
//! laser_daq --port /dev/ttyUSB0 discover
//! laser_daq power laser3 0.25
//! laser_daq --device cobolt --port /dev/ttyUSB1 enable
//! laser_daq --simulate status
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use laser_daq::config::{CoboltConfig, LaserDaqConfig, VersaLaseConfig};
use laser_daq::hardware::mock::VersaLaseSimulator;
use laser_daq::hardware::{LightSource, SharedSerialPort, TriggerMode, TriggerType};
use laser_daq::instrument::{CoboltLaser, StradusVersaLase};
use laser_daq::logging;
use std::path::PathBuf;
use tracing::{info, warn};

/// Slots populated in the simulated VersaLase.
const SIMULATED_SLOTS: [u8; 3] = [1, 3, 6];

#[derive(Parser)]
#[command(name = "laser_daq")]
#[command(about = "Control serial laboratory light sources", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults to ./laser_daq.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port, overriding the configuration
    #[arg(long, global = true)]
    port: Option<String>,

    /// Device family to talk to
    #[arg(long, value_enum, default_value_t = DeviceKind::Versalase, global = true)]
    device: DeviceKind,

    /// Use a simulated VersaLase instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeviceKind {
    Versalase,
    Cobolt,
}

#[derive(Subcommand)]
enum Commands {
    /// List the light sources found on the link
    Discover,

    /// Print status of one or all light sources
    Status {
        /// Light source name (e.g. laser3); all when omitted
        name: Option<String>,
    },

    /// Turn emission on
    Enable {
        /// Light source name; may be omitted for a Cobolt
        name: Option<String>,
    },

    /// Turn emission off
    Disable {
        /// Light source name; may be omitted for a Cobolt
        name: Option<String>,
    },

    /// Read, or set, power as a fraction of maximum
    Power {
        /// Light source name
        name: String,
        /// New power in [0, 1]
        fraction: Option<f64>,
    },

    /// Select VersaLase digital modulation
    Trigger {
        /// Light source name
        name: String,
        /// Trigger type
        #[arg(value_enum)]
        kind: TriggerKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TriggerKind {
    /// Emission follows the modulation input
    High,
    /// Software control only
    Software,
}

/// The opened devices.
enum Bench {
    VersaLase(StradusVersaLase),
    Cobolt(CoboltLaser),
}

impl Bench {
    fn sources(&self) -> Vec<(&str, &dyn LightSource)> {
        match self {
            Bench::VersaLase(versalase) => versalase
                .devices()
                .map(|(name, laser)| (name, laser as &dyn LightSource))
                .collect(),
            Bench::Cobolt(cobolt) => vec![("cobolt", cobolt as &dyn LightSource)],
        }
    }

    fn source(&self, name: Option<&str>) -> Result<&dyn LightSource> {
        match (self, name) {
            (Bench::VersaLase(versalase), Some(name)) => Ok(versalase.device(name)?),
            (Bench::VersaLase(_), None) => bail!("a VersaLase laser name is required"),
            (Bench::Cobolt(cobolt), _) => Ok(cobolt),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LaserDaqConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => LaserDaqConfig::load().context("Failed to load configuration")?,
    };
    logging::init_from_config(&config)?;

    let bench = open_bench(&cli, &config)?;
    run(&cli.command, &bench)
}

fn open_bench(cli: &Cli, config: &LaserDaqConfig) -> Result<Bench> {
    match cli.device {
        DeviceKind::Versalase if cli.simulate => {
            info!(slots = ?SIMULATED_SLOTS, "Using simulated VersaLase");
            let sim = VersaLaseSimulator::with_slots(&SIMULATED_SLOTS);
            let port = SharedSerialPort::new(sim.adapter());
            Ok(Bench::VersaLase(StradusVersaLase::open(
                port,
                laser_daq::instrument::versalase::VERSALASE_SLOTS,
            )?))
        }
        DeviceKind::Versalase => {
            let mut versalase: VersaLaseConfig = config
                .versalase
                .clone()
                .or_else(|| cli.port.as_ref().map(|port| default_versalase(port)))
                .ok_or_else(|| anyhow!("no [versalase] section in config and no --port given"))?;
            if let Some(port) = &cli.port {
                versalase.port = port.clone();
            }
            open_versalase(&versalase)
        }
        DeviceKind::Cobolt if cli.simulate => bail!("--simulate is only available for the VersaLase"),
        DeviceKind::Cobolt => {
            let mut cobolt: CoboltConfig = config
                .cobolt
                .clone()
                .or_else(|| cli.port.as_ref().map(|port| default_cobolt(port)))
                .ok_or_else(|| anyhow!("no [cobolt] section in config and no --port given"))?;
            if let Some(port) = &cli.port {
                cobolt.port = port.clone();
            }
            open_cobolt(&cobolt)
        }
    }
}

fn default_versalase(port: &str) -> VersaLaseConfig {
    VersaLaseConfig {
        port: port.to_string(),
        baud_rate: 19200,
        timeout_ms: 6000,
        slots: (1..=8).collect(),
    }
}

fn default_cobolt(port: &str) -> CoboltConfig {
    CoboltConfig {
        port: port.to_string(),
        baud_rate: 115200,
        timeout_ms: 100,
    }
}

#[cfg(feature = "instrument_serial")]
fn open_versalase(config: &VersaLaseConfig) -> Result<Bench> {
    let versalase =
        StradusVersaLase::open_serial(&config.serial_config(), config.slots.iter().copied())
            .with_context(|| format!("Failed to open VersaLase on {}", config.port))?;
    Ok(Bench::VersaLase(versalase))
}

#[cfg(feature = "instrument_serial")]
fn open_cobolt(config: &CoboltConfig) -> Result<Bench> {
    let cobolt = CoboltLaser::open_serial(&config.serial_config())
        .with_context(|| format!("Failed to open Cobolt laser on {}", config.port))?;
    Ok(Bench::Cobolt(cobolt))
}

#[cfg(not(feature = "instrument_serial"))]
fn open_versalase(_config: &VersaLaseConfig) -> Result<Bench> {
    bail!("serial support not compiled in; rebuild with --features instrument_serial")
}

#[cfg(not(feature = "instrument_serial"))]
fn open_cobolt(_config: &CoboltConfig) -> Result<Bench> {
    bail!("serial support not compiled in; rebuild with --features instrument_serial")
}

fn run(command: &Commands, bench: &Bench) -> Result<()> {
    match command {
        Commands::Discover => {
            if let Bench::VersaLase(versalase) = bench {
                let conn = versalase.connection();
                println!(
                    "VersaLase protocol {} firmware {}",
                    conn.protocol_version(),
                    conn.firmware_version()
                );
                for (name, laser) in versalase.devices() {
                    println!(
                        "{name}: {} nm, max {:.1} mW",
                        laser.wavelength()?,
                        laser.max_power()
                    );
                }
            } else {
                for (name, _) in bench.sources() {
                    println!("{name}");
                }
            }
        }
        Commands::Status { name } => {
            let sources = match name {
                Some(name) => vec![(name.as_str(), bench.source(Some(name))?)],
                None => bench.sources(),
            };
            for (name, source) in sources {
                println!("{name}: on={} power={:.3}", source.is_on()?, source.power()?);
                for line in source.status()? {
                    println!("  {line}");
                }
            }
            if let Bench::VersaLase(versalase) = bench {
                let conn = versalase.connection();
                println!(
                    "base plate {} °C, interlock {}",
                    conn.base_plate_temperature()?,
                    if conn.interlock_status()? { "closed" } else { "open" }
                );
            }
        }
        Commands::Enable { name } => bench.source(name.as_deref())?.enable()?,
        Commands::Disable { name } => bench.source(name.as_deref())?.disable()?,
        Commands::Power { name, fraction } => {
            let source = bench.source(Some(name))?;
            match fraction {
                None => println!("{:.3}", source.power()?),
                Some(fraction) => match source.set_power(*fraction) {
                    Err(err) if err.is_deferred() => {
                        warn!(laser = %name, "{}", err);
                        println!("{name}: emission is off, power saved for next enable");
                    }
                    other => other?,
                },
            }
        }
        Commands::Trigger { name, kind } => {
            let Bench::VersaLase(versalase) = bench else {
                bail!("trigger selection is only available for the VersaLase");
            };
            let ttype = match kind {
                TriggerKind::High => TriggerType::High,
                TriggerKind::Software => TriggerType::Software,
            };
            match versalase.device(name)?.set_trigger(ttype, TriggerMode::Bulb) {
                Err(err) if err.is_deferred() => {
                    println!("{name}: emission is off, trigger type saved for next enable");
                }
                other => other?,
            }
        }
    }
    Ok(())
}
