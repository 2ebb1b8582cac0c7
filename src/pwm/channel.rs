//! PWM channel lifecycle and configuration
//!
//! Channel state lives in the kernel and survives between calls, so every
//! operation checks the current state first: exporting an exported channel
//! or disabling an unexported one succeeds without touching the device.

use super::fs::PwmFs;
use crate::error::{Error, Result};
use log::{debug, trace};
use std::path::PathBuf;

/// Duty cycle in nanoseconds for `duty_pct` percent of `period_ns`
///
/// Truncates, so the result never exceeds the period for `duty_pct <= 100`.
pub fn duty_ns(period_ns: u32, duty_pct: u8) -> u32 {
    (u64::from(period_ns) * u64::from(duty_pct) / 100) as u32
}

/// Controller for the channels of one PWM chip
#[derive(Debug, Clone)]
pub struct PwmController<F: PwmFs> {
    fs: F,
}

impl<F: PwmFs> PwmController<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    fn channel_dir(channel: u32) -> PathBuf {
        PathBuf::from(format!("pwm{}", channel))
    }

    fn attribute(channel: u32, name: &str) -> PathBuf {
        Self::channel_dir(channel).join(name)
    }

    fn write(&self, path: PathBuf, value: &str) -> Result<()> {
        self.fs.write(&path, value)?;
        debug!("{} <- {}", self.fs.root().join(&path).display(), value);
        Ok(())
    }

    /// Whether the channel's device node exists
    pub fn is_exported(&self, channel: u32) -> bool {
        self.fs.exists(&Self::channel_dir(channel))
    }

    /// Make the channel's attributes available
    pub fn export(&self, channel: u32) -> Result<()> {
        if self.is_exported(channel) {
            trace!("pwm{} already exported", channel);
            return Ok(());
        }
        self.write(PathBuf::from("export"), &channel.to_string())
    }

    pub fn unexport(&self, channel: u32) -> Result<()> {
        if !self.is_exported(channel) {
            trace!("pwm{} not exported", channel);
            return Ok(());
        }
        self.write(PathBuf::from("unexport"), &channel.to_string())
    }

    /// Start output, exporting the channel if needed
    pub fn enable(&self, channel: u32) -> Result<()> {
        self.export(channel)?;
        self.write(Self::attribute(channel, "enable"), "1")
    }

    /// Stop output; an unexported channel is left alone
    pub fn disable(&self, channel: u32) -> Result<()> {
        if !self.is_exported(channel) {
            trace!("pwm{} not exported, nothing to disable", channel);
            return Ok(());
        }
        self.write(Self::attribute(channel, "enable"), "0")
    }

    /// Set period and duty cycle (percent of the period)
    ///
    /// The period is written first: the kernel rejects a duty cycle longer
    /// than the period currently configured. A failed period write skips
    /// the duty cycle write.
    pub fn configure(&self, channel: u32, period_ns: u32, duty_pct: u8) -> Result<()> {
        if duty_pct > 100 {
            return Err(Error::invalid(format!(
                "duty cycle {}% out of range (0-100)",
                duty_pct
            )));
        }

        self.export(channel)?;

        self.write(Self::attribute(channel, "period"), &period_ns.to_string())?;
        self.write(
            Self::attribute(channel, "duty_cycle"),
            &duty_ns(period_ns, duty_pct).to_string(),
        )
    }
}
