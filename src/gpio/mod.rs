//! GPIO line control
//!
//! - [`line`]: line ownership guards and the [`LineBackend`] service trait
//! - [`control`]: board-level operations (LEDs, flashlight, TX/RX switch)
//! - `cdev`: Linux character device backend

pub mod control;
pub mod line;

#[cfg(target_os = "linux")]
pub mod cdev;

pub use control::GpioControl;
pub use line::{
    acquire, ActiveLevel, Bias, Direction, LineBackend, LineConfig, LineRequest, LineSettings,
};

#[cfg(target_os = "linux")]
pub use cdev::CdevBackend;
