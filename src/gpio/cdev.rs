//! GPIO character device backend
//!
//! Talks to `/dev/gpiochipN` through the uAPI v2 ioctls via `gpiocdev`.

use super::line::{Bias, Direction, LineBackend, LineSettings};
use crate::error::{Error, Result};
use gpiocdev::chip::Chip;
use gpiocdev::line::{Bias as CdevBias, Value};
use gpiocdev::Request;
use std::io;
use std::path::{Path, PathBuf};

/// Line service backed by the kernel GPIO character device
#[derive(Debug, Clone, Copy, Default)]
pub struct CdevBackend;

/// A granted line on a character device
pub struct CdevLine {
    request: Request,
    offset: u32,
    chip_path: PathBuf,
}

impl CdevBackend {
    pub fn new() -> Self {
        Self
    }
}

fn cdev_bias(bias: Bias) -> CdevBias {
    match bias {
        Bias::Disabled => CdevBias::Disabled,
        Bias::PullUp => CdevBias::PullUp,
        Bias::PullDown => CdevBias::PullDown,
    }
}

fn value_of(active: bool) -> Value {
    if active {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// Value access failures surface as `Io` on the chip
fn value_error<E>(chip_path: &Path, e: E) -> Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Error::io(chip_path, io::Error::other(e))
}

impl LineBackend for CdevBackend {
    type Chip = Chip;
    type Request = CdevLine;

    fn open(&self, chip_path: &Path) -> Result<Chip> {
        Chip::from_path(chip_path).map_err(|e| Error::unavailable(chip_path.display(), e))
    }

    fn line_count(&self, chip: &Chip) -> Result<u32> {
        chip.info()
            .map(|info| info.num_lines)
            .map_err(|e| Error::unavailable(chip.path().display(), e))
    }

    fn request_line(
        &self,
        chip: &Chip,
        offset: u32,
        settings: &LineSettings,
        consumer: &str,
    ) -> Result<CdevLine> {
        let mut builder = Request::builder();
        builder
            .on_chip(chip.path())
            .with_consumer(consumer)
            .with_line(offset);

        match settings.direction {
            Direction::Output => {
                builder.as_output(Value::Inactive);
            }
            Direction::Input => {
                builder.as_input();
                if let Some(bias) = settings.bias {
                    builder.with_bias(cdev_bias(bias));
                }
            }
        }

        if settings.active_low {
            builder.as_active_low();
        }

        let request = builder.request().map_err(|e| {
            Error::unavailable(format!("{}:{}", chip.path().display(), offset), e)
        })?;

        Ok(CdevLine {
            request,
            offset,
            chip_path: chip.path().to_path_buf(),
        })
    }

    fn set_value(&self, line: &CdevLine, active: bool) -> Result<()> {
        line.request
            .set_value(line.offset, value_of(active))
            .map_err(|e| value_error(&line.chip_path, e))
    }

    fn get_value(&self, line: &CdevLine) -> Result<bool> {
        line.request
            .value(line.offset)
            .map(|value| value == Value::Active)
            .map_err(|e| value_error(&line.chip_path, e))
    }

    fn release(&self, line: CdevLine) {
        // Dropping the request closes its file descriptor
        drop(line);
    }

    fn close(&self, chip: Chip) {
        drop(chip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_open_missing_chip() {
        let err = CdevBackend::new()
            .open(Path::new("/dev/gpiochip-does-not-exist"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn test_value_error_kind() {
        let err = value_error(Path::new("/dev/gpiochip0"), "line not requested");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().starts_with("I/O error on /dev/gpiochip0"));
    }

    #[test]
    fn test_bias_mapping() {
        assert_eq!(cdev_bias(Bias::PullUp), CdevBias::PullUp);
        assert_eq!(cdev_bias(Bias::PullDown), CdevBias::PullDown);
        assert_eq!(cdev_bias(Bias::Disabled), CdevBias::Disabled);
        assert_eq!(value_of(true), Value::Active);
    }
}
