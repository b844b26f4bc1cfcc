//! Light-source facade for one VersaLase head.
//!
//! Power and digital modulation can only be changed while emission is on. Writes made
//! while the head is off are saved and replayed on the next [`LightSource::enable`].

use super::channel::LaserChannel;
use super::parse::{format_bool, format_power};
use crate::error::{AppResult, DaqError};
use crate::hardware::capabilities::{clamp_fraction, LightSource, TriggerMode, TriggerType};
use parking_lot::Mutex;
use tracing::{debug, info};

/// State of a write that the device only accepts while emitting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DeferredSetting<T> {
    /// Nothing known.
    #[default]
    Unset,
    /// Saved while emission was off; not yet on the device.
    Pending(T),
    /// Last value known to be on the device.
    Applied(T),
}

impl<T: Copy> DeferredSetting<T> {
    /// Save `value` for the next enable.
    pub fn defer(&mut self, value: T) {
        *self = DeferredSetting::Pending(value);
    }

    /// Record a value the device accepted.
    pub fn applied(&mut self, value: T) {
        *self = DeferredSetting::Applied(value);
    }

    /// The saved value, if one is waiting.
    pub fn pending(&self) -> Option<T> {
        match self {
            DeferredSetting::Pending(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct GatedState {
    /// Absolute power in mW.
    power: DeferredSetting<f64>,
    pulse_mode: DeferredSetting<bool>,
}

/// One VersaLase head exposed as a [`LightSource`].
///
/// Max power and the commanded power are read once at construction.
#[derive(Debug)]
pub struct VersaLaseLaser {
    channel: LaserChannel,
    max_power: f64,
    gated: Mutex<GatedState>,
}

impl VersaLaseLaser {
    /// Wrap a discovered channel, caching its calibration.
    pub fn new(channel: LaserChannel) -> AppResult<Self> {
        let max_power = channel.get_max_power()?;
        let power_setting = channel.get_power_setting()?;
        let pulse_mode = channel.get_pulse_mode()?;
        debug!(
            slot = channel.slot(),
            max_power, power_setting, pulse_mode, "VersaLase head initialised"
        );

        Ok(Self {
            channel,
            max_power,
            gated: Mutex::new(GatedState {
                power: DeferredSetting::Applied(power_setting),
                pulse_mode: DeferredSetting::Applied(pulse_mode),
            }),
        })
    }

    /// Underlying slot channel.
    pub fn channel(&self) -> &LaserChannel {
        &self.channel
    }

    /// Calibrated maximum power in mW.
    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    /// Power setting (mW) waiting for the next enable, if any.
    pub fn pending_power(&self) -> Option<f64> {
        self.gated.lock().power.pending()
    }

    /// Pulse mode waiting for the next enable, if any.
    pub fn pending_pulse_mode(&self) -> Option<bool> {
        self.gated.lock().pulse_mode.pending()
    }

    /// Wavelength label in nm.
    pub fn wavelength(&self) -> AppResult<i64> {
        self.channel.get_wavelength()
    }

    /// Emission delay setting.
    pub fn delay(&self) -> AppResult<bool> {
        self.channel.get_delay()
    }

    /// Emission follows the trigger level; no other mode is supported.
    pub fn trigger_mode(&self) -> TriggerMode {
        TriggerMode::Bulb
    }

    /// `High` when digital modulation is on, `Software` otherwise.
    pub fn trigger_type(&self) -> AppResult<TriggerType> {
        Ok(if self.channel.get_pulse_mode()? {
            TriggerType::High
        } else {
            TriggerType::Software
        })
    }

    /// Select digital modulation (`High`) or software control.
    ///
    /// Like power, the change is deferred while emission is off.
    pub fn set_trigger(&self, ttype: TriggerType, tmode: TriggerMode) -> AppResult<()> {
        if tmode != TriggerMode::Bulb {
            return Err(DaqError::Unsupported(
                "only TriggerMode::Bulb mode is supported".to_string(),
            ));
        }
        let pulse = match ttype {
            TriggerType::High => true,
            TriggerType::Software => false,
            _ => {
                return Err(DaqError::Unsupported(
                    "only trigger type HIGH and SOFTWARE are supported".to_string(),
                ))
            }
        };

        self.channel.connection().transaction(|| {
            let mut gated = self.gated.lock();
            if self.channel.get_emission_status()? {
                self.channel.set_pulse_mode(pulse)?;
                gated.pulse_mode.applied(pulse);
                Ok(())
            } else {
                gated.pulse_mode.defer(pulse);
                Err(DaqError::DeferredWrite {
                    parameter: "PUL",
                    value: format_bool(pulse).to_string(),
                })
            }
        })
    }

    /// Software triggers make no sense in bulb mode.
    pub fn trigger(&self) -> AppResult<()> {
        Err(DaqError::IncompatibleState(
            "trigger does not make sense in trigger mode bulb, only enable".to_string(),
        ))
    }

    /// Replay at most one saved write after emission came on.
    ///
    /// Power is considered before pulse mode and only the first one that differs from
    /// the device is sent; the other stays pending until the next enable. A saved value
    /// that already matches the device is marked applied without a write.
    fn reconcile(&self, gated: &mut GatedState) -> AppResult<()> {
        if let Some(power) = gated.power.pending() {
            let on_device = self.channel.get_power_setting()?;
            if format_power(on_device) != format_power(power) {
                info!(slot = self.channel.slot(), power, "Applying saved power");
                self.channel.set_power(power)?;
                gated.power.applied(power);
                return Ok(());
            }
            gated.power.applied(power);
        }

        if let Some(pulse) = gated.pulse_mode.pending() {
            if self.channel.get_pulse_mode()? != pulse {
                info!(slot = self.channel.slot(), pulse, "Applying saved pulse mode");
                self.channel.set_pulse_mode(pulse)?;
            }
            gated.pulse_mode.applied(pulse);
        }
        Ok(())
    }
}

impl LightSource for VersaLaseLaser {
    fn enable(&self) -> AppResult<()> {
        self.channel.connection().transaction(|| {
            self.channel.set_emission(true)?;
            let mut gated = self.gated.lock();
            self.reconcile(&mut gated)
        })
    }

    fn disable(&self) -> AppResult<()> {
        self.channel.set_emission(false)
    }

    fn is_on(&self) -> AppResult<bool> {
        self.channel.get_emission_status()
    }

    fn power(&self) -> AppResult<f64> {
        Ok(self.channel.get_power()? / self.max_power)
    }

    fn set_power(&self, fraction: f64) -> AppResult<()> {
        let power = clamp_fraction(fraction) * self.max_power;
        self.channel.connection().transaction(|| {
            let mut gated = self.gated.lock();
            if self.channel.get_emission_status()? {
                self.channel.set_power(power)?;
                gated.power.applied(power);
                Ok(())
            } else {
                gated.power.defer(power);
                Err(DaqError::DeferredWrite {
                    parameter: "LP",
                    value: format_power(power),
                })
            }
        })
    }

    fn status(&self) -> AppResult<Vec<String>> {
        Ok(self
            .channel
            .get_identification()?
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }
}
