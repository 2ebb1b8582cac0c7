//! GPIO line ownership
//!
//! A line is used in three steps: open the chip, request the line with a
//! fixed configuration, act on it. [`acquire`] performs the first two and
//! returns a [`LineRequest`] guard that owns both the request and the chip
//! handle. Dropping the guard (or calling [`LineRequest::release`]) releases
//! the line and then closes the chip, so no exit path can leak either.

use crate::error::{Error, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Line direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// Input bias
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bias {
    #[default]
    Disabled,
    PullUp,
    PullDown,
}

/// Which electrical level counts as "active"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActiveLevel {
    /// HIGH = active, LOW = inactive
    #[default]
    High,
    /// LOW = active, HIGH = inactive
    Low,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "input" | "in" => Ok(Self::Input),
            "output" | "out" => Ok(Self::Output),
            _ => Err(Error::invalid(format!("unknown direction: {}", s))),
        }
    }
}

impl FromStr for Bias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disabled" | "none" => Ok(Self::Disabled),
            "pull-up" | "up" => Ok(Self::PullUp),
            "pull-down" | "down" => Ok(Self::PullDown),
            _ => Err(Error::invalid(format!("unknown bias: {}", s))),
        }
    }
}

impl FromStr for ActiveLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "high" | "active-high" => Ok(Self::High),
            "low" | "active-low" => Ok(Self::Low),
            _ => Err(Error::invalid(format!("unknown active level: {}", s))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::PullUp => write!(f, "pull-up"),
            Self::PullDown => write!(f, "pull-down"),
        }
    }
}

impl fmt::Display for ActiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "active-high"),
            Self::Low => write!(f, "active-low"),
        }
    }
}

/// Requested configuration for a single line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineConfig {
    pub direction: Direction,
    /// Only applied to inputs
    pub bias: Bias,
    pub active_level: ActiveLevel,
}

impl LineConfig {
    pub fn new(direction: Direction, bias: Bias, active_level: ActiveLevel) -> Self {
        Self {
            direction,
            bias,
            active_level,
        }
    }

    /// Output, active-low, no bias: the convention for every board pin
    pub fn output_active_low() -> Self {
        Self::new(Direction::Output, Bias::Disabled, ActiveLevel::Low)
    }

    pub fn input(bias: Bias, active_level: ActiveLevel) -> Self {
        Self::new(Direction::Input, bias, active_level)
    }
}

/// Effective settings handed to a [`LineBackend`]
///
/// Outputs always start inactive and never carry a bias; the bias of an
/// output [`LineConfig`] is dropped here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub direction: Direction,
    /// `None` leaves the bias as-is
    pub bias: Option<Bias>,
    pub active_low: bool,
}

impl From<&LineConfig> for LineSettings {
    fn from(config: &LineConfig) -> Self {
        let bias = match config.direction {
            Direction::Output => None,
            Direction::Input => Some(config.bias),
        };

        Self {
            direction: config.direction,
            bias,
            active_low: config.active_level == ActiveLevel::Low,
        }
    }
}

/// GPIO line service
///
/// Implementations map failures onto the crate taxonomy: `open` and
/// `request_line` fail with `ResourceUnavailable`, value access with `Io`.
/// An output line must be driven to its inactive level when granted.
pub trait LineBackend {
    /// Open chip handle
    type Chip;
    /// Granted line request
    type Request;

    fn open(&self, chip_path: &Path) -> Result<Self::Chip>;

    fn line_count(&self, chip: &Self::Chip) -> Result<u32>;

    fn request_line(
        &self,
        chip: &Self::Chip,
        offset: u32,
        settings: &LineSettings,
        consumer: &str,
    ) -> Result<Self::Request>;

    /// Write the logical value of a granted line
    fn set_value(&self, request: &Self::Request, active: bool) -> Result<()>;

    /// Read the logical value of a granted line
    fn get_value(&self, request: &Self::Request) -> Result<bool>;

    fn release(&self, request: Self::Request);

    fn close(&self, chip: Self::Chip);
}

/// Open chip handle, closed exactly once
struct ChipGuard<'a, B: LineBackend> {
    backend: &'a B,
    chip: Option<B::Chip>,
    path: PathBuf,
}

impl<'a, B: LineBackend> ChipGuard<'a, B> {
    fn open(backend: &'a B, path: &Path) -> Result<Self> {
        let chip = backend.open(path)?;
        trace!("opened {}", path.display());

        Ok(Self {
            backend,
            chip: Some(chip),
            path: path.to_path_buf(),
        })
    }

    fn handle(&self) -> Result<&B::Chip> {
        self.chip
            .as_ref()
            .ok_or_else(|| Error::unavailable(self.path.display(), "chip handle closed"))
    }

    fn close(&mut self) {
        if let Some(chip) = self.chip.take() {
            self.backend.close(chip);
            trace!("closed {}", self.path.display());
        }
    }
}

impl<B: LineBackend> Drop for ChipGuard<'_, B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Exclusive ownership of one line
///
/// The chip handle it was requested from stays open for as long as the
/// request lives. Both are released on drop.
pub struct LineRequest<'a, B: LineBackend> {
    backend: &'a B,
    request: Option<B::Request>,
    chip: ChipGuard<'a, B>,
    offset: u32,
}

impl<B: LineBackend> LineRequest<'_, B> {
    /// Line offset on the chip
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Path of the owning chip
    pub fn chip_path(&self) -> &Path {
        &self.chip.path
    }

    pub fn is_released(&self) -> bool {
        self.request.is_none()
    }

    /// Drive the line to its active (`true`) or inactive level
    pub fn set_value(&self, active: bool) -> Result<()> {
        let request = self.granted()?;
        self.backend.set_value(request, active)?;
        debug!(
            "{}:{} <- {}",
            self.chip.path.display(),
            self.offset,
            if active { "active" } else { "inactive" }
        );
        Ok(())
    }

    /// Read the logical value of the line
    pub fn value(&self) -> Result<bool> {
        self.backend.get_value(self.granted()?)
    }

    /// Release the line and close its chip
    ///
    /// Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if let Some(request) = self.request.take() {
            self.backend.release(request);
            trace!("released {}:{}", self.chip.path.display(), self.offset);
        }
        self.chip.close();
    }

    fn granted(&self) -> Result<&B::Request> {
        self.request.as_ref().ok_or_else(|| {
            Error::invalid(format!(
                "line {}:{} already released",
                self.chip.path.display(),
                self.offset
            ))
        })
    }
}

impl<B: LineBackend> Drop for LineRequest<'_, B> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<B: LineBackend> fmt::Debug for LineRequest<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineRequest")
            .field("chip", &self.chip.path)
            .field("offset", &self.offset)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Open `chip_path` and request line `offset` with `config`
///
/// Fails with `InvalidArgument` for an empty path or an offset beyond the
/// chip's line count (the line is not requested in that case), and with
/// `ResourceUnavailable` when the chip cannot be opened or the line is
/// already owned. The chip is closed again on every failure path.
pub fn acquire<'a, B: LineBackend>(
    backend: &'a B,
    chip_path: &Path,
    offset: u32,
    config: &LineConfig,
    consumer: &str,
) -> Result<LineRequest<'a, B>> {
    if chip_path.as_os_str().is_empty() {
        return Err(Error::invalid("GPIO chip path is empty"));
    }

    let chip = ChipGuard::open(backend, chip_path)?;

    let num_lines = backend.line_count(chip.handle()?)?;
    if offset >= num_lines {
        return Err(Error::invalid(format!(
            "pin offset {} out of range for {} ({} lines)",
            offset,
            chip_path.display(),
            num_lines
        )));
    }

    let settings = LineSettings::from(config);
    let request = backend.request_line(chip.handle()?, offset, &settings, consumer)?;
    debug!(
        "requested {}:{} as {} ({}, bias {})",
        chip_path.display(),
        offset,
        config.direction,
        config.active_level,
        settings.bias.map_or_else(|| "as-is".to_string(), |b| b.to_string())
    );

    Ok(LineRequest {
        backend,
        request: Some(request),
        chip,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockLineBackend;

    const CHIP: &str = "/dev/gpiochip0";

    fn backend() -> MockLineBackend {
        let backend = MockLineBackend::new();
        backend.add_chip(CHIP, 32);
        backend
    }

    #[test]
    fn test_output_settings_drop_bias() {
        let config = LineConfig::new(Direction::Output, Bias::PullUp, ActiveLevel::Low);
        let settings = LineSettings::from(&config);
        assert_eq!(settings.direction, Direction::Output);
        assert_eq!(settings.bias, None);
        assert!(settings.active_low);
    }

    #[test]
    fn test_input_settings_keep_bias() {
        let config = LineConfig::input(Bias::PullDown, ActiveLevel::High);
        let settings = LineSettings::from(&config);
        assert_eq!(settings.bias, Some(Bias::PullDown));
        assert!(!settings.active_low);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("out".parse::<Direction>().unwrap(), Direction::Output);
        assert_eq!("Pull-Up".parse::<Bias>().unwrap(), Bias::PullUp);
        assert_eq!("low".parse::<ActiveLevel>().unwrap(), ActiveLevel::Low);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_acquire_and_set() {
        let backend = backend();
        let line = acquire(&backend, Path::new(CHIP), 4, &LineConfig::output_active_low(), "test")
            .unwrap();

        assert_eq!(backend.open_chips(), 1);
        assert_eq!(backend.live_requests(), 1);
        assert_eq!(line.offset(), 4);
        assert_eq!(line.chip_path(), Path::new(CHIP));

        line.set_value(true).unwrap();
        assert_eq!(backend.value(CHIP, 4), Some(true));
        assert!(line.value().unwrap());

        drop(line);
        assert_eq!(backend.open_chips(), 0);
        assert_eq!(backend.live_requests(), 0);
    }

    #[test]
    fn test_output_starts_inactive() {
        let backend = backend();
        let _line = acquire(&backend, Path::new(CHIP), 7, &LineConfig::output_active_low(), "test")
            .unwrap();
        assert_eq!(backend.value(CHIP, 7), Some(false));
    }

    #[test]
    fn test_acquire_offset_out_of_range() {
        let backend = backend();
        let err = acquire(&backend, Path::new(CHIP), 32, &LineConfig::default(), "test")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(backend.requests().is_empty());
        assert_eq!(backend.open_chips(), 0);
    }

    #[test]
    fn test_acquire_missing_chip() {
        let backend = backend();
        let err = acquire(&backend, Path::new("/dev/gpiochip9"), 0, &LineConfig::default(), "test")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(backend.open_chips(), 0);
    }

    #[test]
    fn test_acquire_empty_path() {
        let backend = backend();
        let err = acquire(&backend, Path::new(""), 0, &LineConfig::default(), "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_acquire_busy_line() {
        let backend = backend();
        let config = LineConfig::output_active_low();
        let held = acquire(&backend, Path::new(CHIP), 5, &config, "holder").unwrap();

        let err = acquire(&backend, Path::new(CHIP), 5, &config, "other").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);

        // The held request is unaffected and the failed attempt leaked nothing
        assert_eq!(backend.open_chips(), 1);
        assert_eq!(backend.live_requests(), 1);
        held.set_value(true).unwrap();
        assert_eq!(backend.value(CHIP, 5), Some(true));

        drop(held);
        assert!(acquire(&backend, Path::new(CHIP), 5, &config, "other").is_ok());
    }

    #[test]
    fn test_request_failure_closes_chip() {
        let backend = backend();
        backend.fail_requests(true);
        let err = acquire(&backend, Path::new(CHIP), 1, &LineConfig::default(), "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(backend.open_chips(), 0);
        assert_eq!(backend.live_requests(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let backend = backend();
        let mut line = acquire(&backend, Path::new(CHIP), 2, &LineConfig::default(), "test")
            .unwrap();

        line.release();
        line.release();
        assert!(line.is_released());
        assert_eq!(backend.live_requests(), 0);
        assert_eq!(backend.open_chips(), 0);

        assert_eq!(line.set_value(true).unwrap_err().kind(), ErrorKind::InvalidArgument);
        drop(line);
        assert_eq!(backend.open_chips(), 0);
    }

    #[test]
    fn test_consumer_and_settings_forwarded() {
        let backend = backend();
        let config = LineConfig::input(Bias::PullUp, ActiveLevel::High);
        let _line = acquire(&backend, Path::new(CHIP), 9, &config, "liblinht-ctrl").unwrap();

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].offset, 9);
        assert_eq!(requests[0].consumer, "liblinht-ctrl");
        assert_eq!(requests[0].settings.bias, Some(Bias::PullUp));
    }
}
