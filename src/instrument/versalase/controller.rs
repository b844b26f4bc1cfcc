//! Vortran Stradus VersaLase 8 controller.

use super::connection::VersaLaseConnection;
use super::discovery::discover;
use super::laser::VersaLaseLaser;
use crate::error::{AppResult, DaqError};
use crate::hardware::SharedSerialPort;
use std::sync::Arc;
use tracing::info;

/// A VersaLase with the heads found at open time.
///
/// Heads are named `laser1` … `laser8` after their slot.
#[derive(Debug)]
pub struct StradusVersaLase {
    conn: Arc<VersaLaseConnection>,
    lasers: Vec<(String, VersaLaseLaser)>,
}

impl StradusVersaLase {
    /// Handshake on `port` and discover heads in `slots`, in that order.
    ///
    /// Only a failed handshake is an error; heads that fail to answer are skipped.
    pub fn open<I>(port: SharedSerialPort, slots: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = u8>,
    {
        let conn = Arc::new(VersaLaseConnection::open(port)?);

        let lasers = discover(&conn, slots);
        info!(
            port = conn.port().name(),
            lasers = lasers.len(),
            "VersaLase ready"
        );

        Ok(Self { conn, lasers })
    }

    /// Open a real serial port with the manual's line settings.
    #[cfg(feature = "instrument_serial")]
    pub fn open_serial<I>(config: &crate::hardware::SerialPortConfig, slots: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = u8>,
    {
        let adapter = crate::adapters::SerialAdapter::open(config)?;
        Self::open(SharedSerialPort::new(adapter), slots)
    }

    /// The controller session.
    pub fn connection(&self) -> &Arc<VersaLaseConnection> {
        &self.conn
    }

    /// Discovered heads in discovery order.
    pub fn devices(&self) -> impl Iterator<Item = (&str, &VersaLaseLaser)> {
        self.lasers.iter().map(|(name, laser)| (name.as_str(), laser))
    }

    /// Names of discovered heads.
    pub fn names(&self) -> Vec<&str> {
        self.lasers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Look a head up by name.
    pub fn device(&self, name: &str) -> AppResult<&VersaLaseLaser> {
        self.lasers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, laser)| laser)
            .ok_or_else(|| DaqError::DeviceNotFound(name.to_string()))
    }
}
