//! Capability traits implemented per device family.
//!
//! Each family speaks its own command vocabulary; drivers expose it through
//! [`ParameterProtocol`] instead of sharing any global dialect state. Light sources
//! additionally implement the [`LightSource`] facade.

use crate::error::AppResult;
use bytes::Bytes;

/// Raw named-parameter access in a device family's own dialect.
pub trait ParameterProtocol: Send + Sync {
    /// Read a parameter, returning the decoded payload bytes.
    fn query(&self, name: &str) -> AppResult<Bytes>;

    /// Change a parameter.
    fn set(&self, name: &str, value: &str) -> AppResult<()>;

    /// Read a parameter as trimmed UTF-8 text.
    fn query_string(&self, name: &str) -> AppResult<String> {
        let raw = self.query(name)?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }
}

/// How a light source reacts to its trigger input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    /// Software control only
    Software,
    /// Emit while the trigger line is high
    High,
    /// Emit while the trigger line is low
    Low,
    /// Rising-edge trigger
    RisingEdge,
    /// Falling-edge trigger
    FallingEdge,
}

/// What a trigger does once received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Emission follows the trigger level
    Bulb,
    /// Each trigger produces one exposure
    OneShot,
    /// Triggers start and stop emission
    Start,
    /// One trigger per strobe
    Strobe,
}

/// Hardware-agnostic interface for switchable, power-controlled light sources.
///
/// Power is always a fraction of the source's maximum, in `[0, 1]`.
pub trait LightSource: Send + Sync {
    /// Turn emission on.
    fn enable(&self) -> AppResult<()>;

    /// Turn emission off.
    fn disable(&self) -> AppResult<()>;

    /// Whether emission is currently on.
    fn is_on(&self) -> AppResult<bool>;

    /// Current output power as a fraction of maximum.
    fn power(&self) -> AppResult<f64>;

    /// Request output power as a fraction of maximum.
    fn set_power(&self, fraction: f64) -> AppResult<()>;

    /// Human-readable status lines.
    fn status(&self) -> AppResult<Vec<String>>;

    /// Put the device in a safe state before the session ends.
    fn shutdown(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Clamp a requested power fraction into `[0, 1]`.
pub(crate) fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}
