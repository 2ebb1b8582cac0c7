//! LCD and keyboard backlight control
//!
//! Brightness (0 to the configured maximum, 255 by default) maps linearly
//! onto a PWM duty cycle in percent:
//!
//! ```text
//! duty% = brightness * 100 / max_brightness   (truncating)
//! ```

pub mod transition;

pub use transition::{Delay, RampSteps, ThreadDelay, Transition};

use crate::config::PwmConfig;
use crate::error::{Error, Result};
use crate::pwm::{PwmController, PwmFs};
use log::info;
use std::fmt;
use std::str::FromStr;

/// Backlit surfaces, each on its own PWM channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BacklightTarget {
    Lcd,
    Kbd,
}

impl BacklightTarget {
    /// Both targets, in the order transitions update them
    pub const ALL: [BacklightTarget; 2] = [BacklightTarget::Lcd, BacklightTarget::Kbd];
}

impl fmt::Display for BacklightTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lcd => write!(f, "lcd"),
            Self::Kbd => write!(f, "kbd"),
        }
    }
}

impl FromStr for BacklightTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lcd" | "display" => Ok(Self::Lcd),
            "kbd" | "keyboard" => Ok(Self::Kbd),
            _ => Err(Error::invalid(format!("unknown backlight: {}", s))),
        }
    }
}

/// Map a brightness to a duty cycle percentage
///
/// Values above `max_brightness` are clamped. Returns 0 when
/// `max_brightness` is 0.
pub fn brightness_to_duty(brightness: u8, max_brightness: u8) -> u8 {
    if max_brightness == 0 {
        return 0;
    }
    let brightness = brightness.min(max_brightness);
    (u32::from(brightness) * 100 / u32::from(max_brightness)) as u8
}

/// Backlight controller on top of a [`PwmController`]
pub struct Backlight<F: PwmFs> {
    pwm: PwmController<F>,
    config: PwmConfig,
}

impl<F: PwmFs> Backlight<F> {
    pub fn new(pwm: PwmController<F>, config: PwmConfig) -> Self {
        Self { pwm, config }
    }

    pub fn pwm(&self) -> &PwmController<F> {
        &self.pwm
    }

    pub fn max_brightness(&self) -> u8 {
        self.config.max_brightness
    }

    /// PWM channel driving `target`
    pub fn channel(&self, target: BacklightTarget) -> u32 {
        match target {
            BacklightTarget::Lcd => self.config.lcd_channel,
            BacklightTarget::Kbd => self.config.kbd_channel,
        }
    }

    /// Configure the channel for `brightness` and enable it
    pub fn set_brightness(&self, target: BacklightTarget, brightness: u8) -> Result<()> {
        let channel = self.channel(target);
        let duty = brightness_to_duty(brightness, self.config.max_brightness);

        self.pwm.configure(channel, self.config.period_ns, duty)?;
        self.pwm.enable(channel)
    }

    /// Full brightness
    pub fn on(&self, target: BacklightTarget) -> Result<()> {
        self.set_brightness(target, self.max_brightness())?;
        info!("{} backlight on", target);
        Ok(())
    }

    /// Zero duty cycle; the channel stays enabled
    pub fn off(&self, target: BacklightTarget) -> Result<()> {
        self.set_brightness(target, 0)?;
        info!("{} backlight off", target);
        Ok(())
    }

    /// Stop the channel's output without reconfiguring it
    pub fn disable(&self, target: BacklightTarget) -> Result<()> {
        self.pwm.disable(self.channel(target))
    }

    pub fn lcd_set_brightness(&self, brightness: u8) -> Result<()> {
        self.set_brightness(BacklightTarget::Lcd, brightness)
    }

    pub fn lcd_on(&self) -> Result<()> {
        self.on(BacklightTarget::Lcd)
    }

    pub fn lcd_off(&self) -> Result<()> {
        self.off(BacklightTarget::Lcd)
    }

    pub fn kbd_set_brightness(&self, brightness: u8) -> Result<()> {
        self.set_brightness(BacklightTarget::Kbd, brightness)
    }

    pub fn kbd_on(&self) -> Result<()> {
        self.on(BacklightTarget::Kbd)
    }

    pub fn kbd_off(&self) -> Result<()> {
        self.off(BacklightTarget::Kbd)
    }
}
