//! PWM channel control through the sysfs PWM interface

pub mod channel;
pub mod fs;

pub use channel::{duty_ns, PwmController};
pub use fs::{PwmFs, SysFs};
