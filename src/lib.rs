//! Core library for the laser_daq toolkit.
//!
//! Drivers for line-protocol laboratory light sources on a shared serial link, plus
//! the transport, configuration and logging layers they are built on. Used by the
//! `laser_daq` command-line tool and by test suites running against the simulator.
//!
//! - [`adapters`]: byte-stream transports (serial port, in-memory mock)
//! - [`hardware`]: reentrant port lock, capability traits, device simulator
//! - [`instrument`]: Stradus VersaLase and Cobolt drivers
//! - [`config`] / [`logging`]: figment configuration and tracing setup

pub mod adapters;
pub mod config;
pub mod error;
pub mod hardware;
pub mod instrument;
pub mod logging;

pub use error::{AppResult, DaqError};
