//! Vortran Stradus VersaLase driver
//!
//! The VersaLase combines up to eight laser heads behind one RS-232 port
//! (19200 baud, 8N1). All heads share a single [`VersaLaseConnection`]; each head is a
//! [`LaserChannel`] addressing its slot with a `"<slot>."` command prefix.
//!
//! ## Layers
//!
//! - [`codec`]: line framing (terminator variants, echo stripping, rejections)
//! - [`connection`]: handshake and controller-level parameters
//! - [`channel`]: prefixed per-slot parameter access
//! - [`discovery`]: speculative slot probing
//! - [`laser`]: [`LightSource`](crate::hardware::LightSource) facade with deferred writes
//! - [`controller`]: ties everything together
//!
//! # Example
//!
//! ```
//! use laser_daq::hardware::{mock::VersaLaseSimulator, LightSource, SharedSerialPort};
//! use laser_daq::instrument::versalase::StradusVersaLase;
//!
//! let sim = VersaLaseSimulator::with_slots(&[2, 5]);
//! let port = SharedSerialPort::new(sim.adapter());
//! let versalase = StradusVersaLase::open(port, 1..=8).unwrap();
//! assert_eq!(versalase.names(), vec!["laser2", "laser5"]);
//!
//! let laser = versalase.device("laser2").unwrap();
//! laser.enable().unwrap();
//! laser.set_power(0.5).unwrap();
//! ```

pub mod channel;
pub mod codec;
pub mod connection;
pub mod controller;
pub mod discovery;
pub mod laser;
pub mod parse;

pub use channel::LaserChannel;
pub use connection::VersaLaseConnection;
pub use controller::StradusVersaLase;
pub use discovery::{discover, laser_name, probe_slot, ProbeResult, VERSALASE_SLOTS};
pub use laser::{DeferredSetting, VersaLaseLaser};
