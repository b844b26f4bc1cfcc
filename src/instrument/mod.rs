//! Instrument drivers
//!
//! One module per device family. Each family brings its own command dialect and
//! reaches the wire through a [`SharedSerialPort`](crate::hardware::SharedSerialPort).

pub mod cobolt;
pub mod versalase;

pub use cobolt::CoboltLaser;
pub use versalase::{StradusVersaLase, VersaLaseLaser};
