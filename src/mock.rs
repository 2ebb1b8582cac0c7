//! In-memory test doubles
//!
//! Used by the unit tests and by the CLI's `--dry-run` mode:
//!
//! - [`MockLineBackend`]: GPIO chips with line counts, ownership tracking
//!   and counters for open handles, so tests can check nothing leaks
//! - [`RecordingFs`]: a PWM sysfs tree that reacts to `export`/`unexport`
//!   like the kernel does and records every write in order
//! - [`RecordingDelay`]: records ramp delays instead of sleeping

use crate::backlight::Delay;
use crate::error::{Error, Result};
use crate::gpio::{Direction, LineBackend, LineSettings};
use crate::pwm::PwmFs;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A line request as seen by [`MockLineBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub chip: PathBuf,
    pub offset: u32,
    pub settings: LineSettings,
    pub consumer: String,
}

#[derive(Debug, Default)]
struct GpioState {
    chips: HashMap<PathBuf, u32>,
    held: HashSet<(PathBuf, u32)>,
    values: HashMap<(PathBuf, u32), bool>,
    requests: Vec<RequestRecord>,
    writes: Vec<(PathBuf, u32, bool)>,
    open_chips: usize,
    live_requests: usize,
    fail_requests: bool,
    fail_writes: bool,
}

/// Chip handle issued by [`MockLineBackend`]
#[derive(Debug)]
pub struct MockChip {
    path: PathBuf,
}

/// Line request issued by [`MockLineBackend`]
#[derive(Debug)]
pub struct MockLine {
    chip: PathBuf,
    offset: u32,
}

/// In-memory GPIO line service
#[derive(Debug, Default)]
pub struct MockLineBackend {
    state: RefCell<GpioState>,
}

impl MockLineBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chip with `num_lines` lines
    pub fn add_chip(&self, path: impl AsRef<Path>, num_lines: u32) {
        self.state
            .borrow_mut()
            .chips
            .insert(path.as_ref().to_path_buf(), num_lines);
    }

    /// Chip handles currently open
    pub fn open_chips(&self) -> usize {
        self.state.borrow().open_chips
    }

    /// Line requests currently granted
    pub fn live_requests(&self) -> usize {
        self.state.borrow().live_requests
    }

    /// Every request granted so far
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.state.borrow().requests.clone()
    }

    /// Every successful value write so far, as (chip, offset, active)
    pub fn writes(&self) -> Vec<(PathBuf, u32, bool)> {
        self.state.borrow().writes.clone()
    }

    /// Last logical value of a line
    pub fn value(&self, chip: impl AsRef<Path>, offset: u32) -> Option<bool> {
        self.state
            .borrow()
            .values
            .get(&(chip.as_ref().to_path_buf(), offset))
            .copied()
    }

    /// Set the logical level an input line will read
    pub fn drive_input(&self, chip: impl AsRef<Path>, offset: u32, active: bool) {
        self.state
            .borrow_mut()
            .values
            .insert((chip.as_ref().to_path_buf(), offset), active);
    }

    /// Deny every following line request
    pub fn fail_requests(&self, fail: bool) {
        self.state.borrow_mut().fail_requests = fail;
    }

    /// Fail every following value write
    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }
}

impl LineBackend for MockLineBackend {
    type Chip = MockChip;
    type Request = MockLine;

    fn open(&self, chip_path: &Path) -> Result<MockChip> {
        let mut state = self.state.borrow_mut();
        if !state.chips.contains_key(chip_path) {
            return Err(Error::unavailable(chip_path.display(), "no such chip"));
        }
        state.open_chips += 1;

        Ok(MockChip {
            path: chip_path.to_path_buf(),
        })
    }

    fn line_count(&self, chip: &MockChip) -> Result<u32> {
        self.state
            .borrow()
            .chips
            .get(&chip.path)
            .copied()
            .ok_or_else(|| Error::unavailable(chip.path.display(), "no such chip"))
    }

    fn request_line(
        &self,
        chip: &MockChip,
        offset: u32,
        settings: &LineSettings,
        consumer: &str,
    ) -> Result<MockLine> {
        let mut state = self.state.borrow_mut();
        let key = (chip.path.clone(), offset);

        if state.fail_requests {
            return Err(Error::unavailable(
                format!("{}:{}", chip.path.display(), offset),
                "request denied",
            ));
        }
        if state.held.contains(&key) {
            return Err(Error::unavailable(
                format!("{}:{}", chip.path.display(), offset),
                "line busy",
            ));
        }

        if settings.direction == Direction::Output {
            state.values.insert(key.clone(), false);
        }
        state.held.insert(key);
        state.live_requests += 1;
        state.requests.push(RequestRecord {
            chip: chip.path.clone(),
            offset,
            settings: *settings,
            consumer: consumer.to_string(),
        });

        Ok(MockLine {
            chip: chip.path.clone(),
            offset,
        })
    }

    fn set_value(&self, line: &MockLine, active: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(Error::io(&line.chip, io::Error::from(io::ErrorKind::BrokenPipe)));
        }

        state.values.insert((line.chip.clone(), line.offset), active);
        state.writes.push((line.chip.clone(), line.offset, active));
        Ok(())
    }

    fn get_value(&self, line: &MockLine) -> Result<bool> {
        Ok(self
            .state
            .borrow()
            .values
            .get(&(line.chip.clone(), line.offset))
            .copied()
            .unwrap_or(false))
    }

    fn release(&self, line: MockLine) {
        let mut state = self.state.borrow_mut();
        if state.held.remove(&(line.chip, line.offset)) {
            state.live_requests -= 1;
        }
    }

    fn close(&self, _chip: MockChip) {
        let mut state = self.state.borrow_mut();
        state.open_chips = state.open_chips.saturating_sub(1);
    }
}

#[derive(Debug, Default)]
struct FsState {
    dirs: BTreeSet<PathBuf>,
    attributes: BTreeMap<PathBuf, String>,
    writes: Vec<(PathBuf, String)>,
    fail_names: BTreeSet<String>,
    remaining: Option<usize>,
}

/// In-memory PWM controller directory
///
/// Writing `N` to `export` creates `pwmN/` and writing it to `unexport`
/// removes it again. Writes to a channel that is not exported fail with
/// `NotFound`, and a duty cycle longer than the current period is rejected
/// with `InvalidInput`, as the kernel does.
#[derive(Debug)]
pub struct RecordingFs {
    root: PathBuf,
    state: RefCell<FsState>,
}

impl RecordingFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: RefCell::new(FsState::default()),
        }
    }

    /// Successful writes in order, as (relative path, value)
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.state.borrow().writes.clone()
    }

    /// Current content of an attribute
    pub fn value(&self, path: &Path) -> Option<String> {
        self.state.borrow().attributes.get(path).cloned()
    }

    /// Fail every write to an attribute with this file name
    pub fn fail_writes_to(&self, name: &str) {
        self.state.borrow_mut().fail_names.insert(name.to_string());
    }

    /// Let `count` more writes succeed, then fail all the others
    pub fn fail_after(&self, count: usize) {
        self.state.borrow_mut().remaining = Some(count);
    }

    fn rejected(&self, path: &Path, kind: io::ErrorKind) -> Error {
        Error::io(self.root.join(path), io::Error::from(kind))
    }

    fn channel_dir(value: &str) -> Result<PathBuf> {
        let channel: u32 = value
            .trim()
            .parse()
            .map_err(|_| Error::invalid(format!("not a channel index: {}", value)))?;
        Ok(PathBuf::from(format!("pwm{}", channel)))
    }
}

impl PwmFs for RecordingFs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.borrow();
        state.dirs.contains(path) || state.attributes.contains_key(path)
    }

    fn write(&self, path: &Path, value: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if state.fail_names.contains(&name) || state.remaining == Some(0) {
            return Err(self.rejected(path, io::ErrorKind::Other));
        }

        match name.as_str() {
            "export" => {
                let dir = Self::channel_dir(value)?;
                state.dirs.insert(dir);
            }
            "unexport" => {
                let dir = Self::channel_dir(value)?;
                state.dirs.remove(&dir);
                state.attributes.retain(|p, _| !p.starts_with(&dir));
            }
            _ => {
                let parent = path.parent().unwrap_or_else(|| Path::new(""));
                if !state.dirs.contains(parent) {
                    return Err(self.rejected(path, io::ErrorKind::NotFound));
                }

                if name == "duty_cycle" {
                    let period = state
                        .attributes
                        .get(&parent.join("period"))
                        .and_then(|p| p.parse::<u64>().ok())
                        .unwrap_or(0);
                    let duty = value.parse::<u64>().unwrap_or(u64::MAX);
                    if duty > period {
                        return Err(self.rejected(path, io::ErrorKind::InvalidInput));
                    }
                }

                state
                    .attributes
                    .insert(path.to_path_buf(), value.to_string());
            }
        }

        if let Some(remaining) = state.remaining.as_mut() {
            *remaining -= 1;
        }
        state.writes.push((path.to_path_buf(), value.to_string()));
        Ok(())
    }
}

/// [`Delay`] that records instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingDelay {
    delays: Vec<Duration>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Sum of all recorded delays
    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: Duration) {
        self.delays.push(duration);
    }
}
