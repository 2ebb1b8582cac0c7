//! Board configuration
//!
//! Chip paths, pin assignments, PWM channels and timing for the LinHT
//! board. The defaults describe the i.MX93 board wiring; a TOML file can
//! override any subset of them, which is also how tests and bring-up on
//! other boards point the controllers at different chips. Entries under
//! `[gpio.chips]` are merged over the board chips, so naming one chip
//! keeps the others.
//!
//! ```toml
//! [gpio]
//! consumer = "liblinht-ctrl"
//!
//! [gpio.chips]
//! gpio2 = "/dev/gpiochip0"
//!
//! [gpio.pins.green_led]
//! chip = "gpio2"
//! offset = 4
//!
//! [pwm]
//! chip_path = "/sys/class/pwm/pwmchip0"
//! lcd_channel = 3
//! kbd_channel = 2
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Consumer tag attached to every line request
pub const DEFAULT_CONSUMER: &str = "liblinht-ctrl";

/// 20 kHz
pub const DEFAULT_PERIOD_NS: u32 = 50_000;

pub const MAX_BRIGHTNESS: u8 = 255;

/// Delay between brightness steps during a transition (10 ms)
pub const DEFAULT_STEP_DELAY_US: u64 = 10_000;

/// A pin bound to a named chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRef {
    /// Key into [`GpioConfig::chips`]
    pub chip: String,
    /// Line offset on that chip
    pub offset: u32,
}

impl PinRef {
    pub fn new(chip: &str, offset: u32) -> Self {
        Self {
            chip: chip.to_string(),
            offset,
        }
    }
}

/// Fixed-purpose pins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinAssignments {
    /// MX93_PAD_GPIO_IO18__GPIO2_IO18
    pub flashlight: PinRef,
    /// GPIO2_IO04
    pub green_led: PinRef,
    /// GPIO2_IO05
    pub red_led: PinRef,
    /// MX93_PAD_GPIO_IO13__GPIO2_IO13, asserted = TX
    pub tx_rx_switch: PinRef,
}

impl Default for PinAssignments {
    fn default() -> Self {
        Self {
            flashlight: PinRef::new("gpio2", 18),
            green_led: PinRef::new("gpio2", 4),
            red_led: PinRef::new("gpio2", 5),
            tx_rx_switch: PinRef::new("gpio2", 13),
        }
    }
}

/// GPIO side of the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Consumer tag shown by `gpioinfo` for lines we hold
    pub consumer: String,
    /// Controller name to character device path
    ///
    /// Entries from a configuration file are merged over the board chips.
    #[serde(deserialize_with = "merge_chips")]
    pub chips: BTreeMap<String, PathBuf>,
    pub pins: PinAssignments,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            consumer: DEFAULT_CONSUMER.to_string(),
            chips: default_chips(),
            pins: PinAssignments::default(),
        }
    }
}

fn default_chips() -> BTreeMap<String, PathBuf> {
    // Controller numbering does not follow /dev numbering on the i.MX93
    [
        ("gpio1", "/dev/gpiochip3"), // 47400000.gpio
        ("gpio2", "/dev/gpiochip0"), // 43810000.gpio
        ("gpio3", "/dev/gpiochip1"), // 43820000.gpio
        ("gpio4", "/dev/gpiochip2"), // 43830000.gpio
    ]
    .into_iter()
    .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
    .collect()
}

fn merge_chips<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut chips = default_chips();
    chips.extend(BTreeMap::<String, PathBuf>::deserialize(deserializer)?);
    Ok(chips)
}

impl GpioConfig {
    /// Resolve a chip name to its device path
    pub fn chip_path(&self, name: &str) -> Result<&Path> {
        self.chips
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::invalid(format!("unknown GPIO chip: {}", name)))
    }

    /// Resolve a pin to its (chip path, offset) pair
    pub fn resolve(&self, pin: &PinRef) -> Result<(&Path, u32)> {
        Ok((self.chip_path(&pin.chip)?, pin.offset))
    }
}

/// PWM backlight side of the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    /// sysfs controller root (TPM3)
    pub chip_path: PathBuf,
    /// TPM3_CH3
    pub lcd_channel: u32,
    /// TPM3_CH2
    pub kbd_channel: u32,
    pub period_ns: u32,
    pub max_brightness: u8,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            chip_path: PathBuf::from("/sys/class/pwm/pwmchip0"),
            lcd_channel: 3,
            kbd_channel: 2,
            period_ns: DEFAULT_PERIOD_NS,
            max_brightness: MAX_BRIGHTNESS,
        }
    }
}

/// Brightness transition timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub step_delay_us: u64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            step_delay_us: DEFAULT_STEP_DELAY_US,
        }
    }
}

/// Complete board configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub gpio: GpioConfig,
    pub pwm: PwmConfig,
    pub transition: TransitionConfig,
}

impl HardwareConfig {
    /// Load configuration from a TOML file
    ///
    /// Keys missing from the file keep their board defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.gpio.consumer.is_empty() {
            return Err(Error::invalid("GPIO consumer tag is empty"));
        }

        let pins = &self.gpio.pins;
        for (name, pin) in [
            ("flashlight", &pins.flashlight),
            ("green_led", &pins.green_led),
            ("red_led", &pins.red_led),
            ("tx_rx_switch", &pins.tx_rx_switch),
        ] {
            if !self.gpio.chips.contains_key(&pin.chip) {
                return Err(Error::invalid(format!(
                    "pin {} refers to unknown chip {}",
                    name, pin.chip
                )));
            }
        }

        if self.pwm.lcd_channel == self.pwm.kbd_channel {
            return Err(Error::invalid(format!(
                "LCD and keyboard backlight share PWM channel {}",
                self.pwm.lcd_channel
            )));
        }
        if self.pwm.period_ns == 0 {
            return Err(Error::invalid("PWM period must be non-zero"));
        }
        if self.pwm.max_brightness == 0 {
            return Err(Error::invalid("maximum brightness must be non-zero"));
        }

        Ok(())
    }
}
