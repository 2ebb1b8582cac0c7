//! LinHT hardware control
//!
//! Userspace control of the LinHT handheld's GPIO lines and PWM-driven
//! backlights.
//!
//! # Modules
//!
//! - [`gpio`]: line ownership guards, the [`gpio::LineBackend`] service and
//!   the board-level [`GpioControl`] facade (LEDs, flashlight, TX/RX switch)
//! - [`pwm`]: sysfs PWM channel lifecycle and configuration
//! - [`backlight`]: LCD and keyboard backlight brightness, and ramps across
//!   both backlights
//! - [`config`]: hardware map (chip paths, pins, PWM channels) with TOML
//!   overrides
//! - [`mock`]: in-memory backends for tests and dry runs
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(target_os = "linux")]
//! # fn main() -> linht_ctrl::Result<()> {
//! use linht_ctrl::backlight::{Backlight, ThreadDelay, Transition};
//! use linht_ctrl::gpio::CdevBackend;
//! use linht_ctrl::pwm::{PwmController, SysFs};
//! use linht_ctrl::{GpioControl, HardwareConfig};
//!
//! let config = HardwareConfig::default();
//!
//! let gpio = GpioControl::new(CdevBackend::new(), config.gpio.clone());
//! gpio.green_led(true)?;
//!
//! let pwm = PwmController::new(SysFs::new(&config.pwm.chip_path));
//! let backlight = Backlight::new(pwm, config.pwm.clone());
//! let mut transition = Transition::from_config(&config.transition, ThreadDelay);
//! transition.ramp(&backlight, 255, 0)?;
//! # Ok(())
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```
//!
//! None of the controllers lock: concurrent callers must serialize access
//! to the same pin or channel themselves.

pub mod backlight;
pub mod config;
pub mod error;
pub mod gpio;
pub mod mock;
pub mod pwm;

pub use backlight::{Backlight, BacklightTarget, Transition};
pub use config::HardwareConfig;
pub use error::{Error, ErrorKind, Result};
pub use gpio::GpioControl;
pub use pwm::PwmController;
