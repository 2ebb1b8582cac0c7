//! PWM device filesystem access
//!
//! The kernel exposes a PWM controller as a sysfs directory:
//!
//! ```text
//! /sys/class/pwm/pwmchip0/
//! ├── export
//! ├── unexport
//! └── pwm3/            (present once channel 3 is exported)
//!     ├── period
//!     ├── duty_cycle
//!     └── enable
//! ```

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Filesystem service rooted at a PWM controller directory
///
/// Paths passed in are relative to the controller root.
pub trait PwmFs {
    /// Controller root, used for messages
    fn root(&self) -> &Path;

    fn exists(&self, path: &Path) -> bool;

    /// Write `value` to an existing attribute
    ///
    /// A write that stores fewer bytes than requested is an error.
    fn write(&self, path: &Path, value: &str) -> Result<()>;
}

/// [`PwmFs`] on the real filesystem
#[derive(Debug, Clone)]
pub struct SysFs {
    root: PathBuf,
}

impl SysFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PwmFs for SysFs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }

    fn write(&self, path: &Path, value: &str) -> Result<()> {
        let full = self.root.join(path);

        // Attributes are never created here
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&full)
            .map_err(|e| Error::io(&full, e))?;

        let written = file
            .write(value.as_bytes())
            .map_err(|e| Error::io(&full, e))?;

        if written != value.len() {
            return Err(Error::io(
                &full,
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, value.len()),
                ),
            ));
        }

        Ok(())
    }
}
