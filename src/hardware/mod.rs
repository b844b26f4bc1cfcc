//! Hardware Abstractions
//!
//! Shared port management, device capability traits, and simulated hardware.

pub mod capabilities;
pub mod mock;
pub mod shared_serial_port;

pub use capabilities::{LightSource, ParameterProtocol, TriggerMode, TriggerType};
pub use shared_serial_port::{SerialGuard, SerialParity, SerialPortConfig, SharedSerialPort};
