//! Brightness transitions
//!
//! A ramp walks every integer brightness between two endpoints, setting
//! both backlights to the same value at each step and pausing for the
//! configured step delay afterwards. The pause is a blocking sleep.

use super::{Backlight, BacklightTarget};
use crate::config::TransitionConfig;
use crate::error::Result;
use crate::pwm::PwmFs;
use log::{debug, warn};
use std::time::Duration;

/// Blocking pause between ramp steps
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// [`Delay`] backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Inclusive brightness sequence from `start` to `end` in steps of one
///
/// Descends when `start > end`. Equal endpoints yield a single value.
#[derive(Debug, Clone)]
pub struct RampSteps {
    next: Option<u8>,
    end: u8,
    descending: bool,
}

impl RampSteps {
    pub fn new(start: u8, end: u8) -> Self {
        Self {
            next: Some(start),
            end,
            descending: start > end,
        }
    }
}

impl Iterator for RampSteps {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        self.next = if current == self.end {
            None
        } else if self.descending {
            Some(current - 1)
        } else {
            Some(current + 1)
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .map_or(0, |next| usize::from(next.abs_diff(self.end)) + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RampSteps {}

/// Drives both backlights through brightness ramps
pub struct Transition<D: Delay> {
    delay: D,
    step_delay: Duration,
}

impl<D: Delay> Transition<D> {
    pub fn new(delay: D, step_delay: Duration) -> Self {
        Self { delay, step_delay }
    }

    pub fn from_config(config: &TransitionConfig, delay: D) -> Self {
        Self::new(delay, Duration::from_micros(config.step_delay_us))
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Ramp both backlights from `start` to `end`, inclusive
    ///
    /// Each step sets the LCD and then the keyboard backlight, then sleeps
    /// for the step delay. The first failing write aborts the ramp and is
    /// returned; the backlights keep the last value that was applied.
    /// Returns the number of steps applied.
    pub fn ramp<F: PwmFs>(&mut self, backlight: &Backlight<F>, start: u8, end: u8) -> Result<usize> {
        debug!("ramp {} -> {}", start, end);

        let mut applied = 0;
        for brightness in RampSteps::new(start, end) {
            for target in BacklightTarget::ALL {
                if let Err(e) = backlight.set_brightness(target, brightness) {
                    warn!(
                        "ramp {} -> {} aborted at {} ({}): {}",
                        start, end, brightness, target, e
                    );
                    return Err(e);
                }
            }
            self.delay.delay(self.step_delay);
            applied += 1;
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlight::brightness_to_duty;
    use crate::config::PwmConfig;
    use crate::error::ErrorKind;
    use crate::mock::{RecordingDelay, RecordingFs};
    use crate::pwm::{duty_ns, PwmController};

    fn backlight() -> Backlight<RecordingFs> {
        let config = PwmConfig::default();
        Backlight::new(PwmController::new(RecordingFs::new(&config.chip_path)), config)
    }

    fn transition() -> Transition<RecordingDelay> {
        Transition::from_config(&TransitionConfig::default(), RecordingDelay::new())
    }

    /// Duty cycle writes per channel, in order
    fn duty_writes(backlight: &Backlight<RecordingFs>, channel: u32) -> Vec<String> {
        let path = format!("pwm{}/duty_cycle", channel);
        backlight
            .pwm()
            .fs()
            .writes()
            .into_iter()
            .filter(|(p, _)| p.to_str() == Some(path.as_str()))
            .map(|(_, v)| v)
            .collect()
    }

    fn expected_duties(steps: impl Iterator<Item = u8>) -> Vec<String> {
        steps
            .map(|b| duty_ns(50_000, brightness_to_duty(b, 255)).to_string())
            .collect()
    }

    #[test]
    fn test_steps_descending() {
        let steps: Vec<u8> = RampSteps::new(255, 0).collect();
        assert_eq!(steps.len(), 256);
        assert_eq!(steps[0], 255);
        assert_eq!(steps[255], 0);
        assert!(steps.windows(2).all(|w| w[0] == w[1] + 1));
    }

    #[test]
    fn test_steps_ascending() {
        let steps: Vec<u8> = RampSteps::new(0, 255).collect();
        assert_eq!(steps, (0..=255).collect::<Vec<u8>>());
    }

    #[test]
    fn test_steps_single() {
        assert_eq!(RampSteps::new(128, 128).collect::<Vec<_>>(), vec![128]);
        assert_eq!(RampSteps::new(128, 128).len(), 1);
        assert_eq!(RampSteps::new(10, 3).len(), 8);
    }

    #[test]
    fn test_ramp_down() {
        let backlight = backlight();
        let mut transition = transition();

        assert_eq!(transition.ramp(&backlight, 255, 0).unwrap(), 256);

        let expected = expected_duties(RampSteps::new(255, 0));
        assert_eq!(duty_writes(&backlight, 3), expected);
        assert_eq!(duty_writes(&backlight, 2), expected);

        let step = transition.step_delay();
        assert_eq!(step, Duration::from_micros(10_000));
        let delays = transition.delay_mut().delays();
        assert_eq!(delays.len(), 256);
        assert!(delays.iter().all(|d| *d == step));
    }

    #[test]
    fn test_ramp_up() {
        let backlight = backlight();
        let mut transition = transition();

        assert_eq!(transition.ramp(&backlight, 0, 255).unwrap(), 256);
        assert_eq!(duty_writes(&backlight, 3), expected_duties(0..=255));
        assert_eq!(duty_writes(&backlight, 2), expected_duties(0..=255));
    }

    #[test]
    fn test_ramp_single_step() {
        let backlight = backlight();
        let mut transition = transition();

        assert_eq!(transition.ramp(&backlight, 128, 128).unwrap(), 1);
        assert_eq!(duty_writes(&backlight, 3), vec!["25000"]);
        assert_eq!(duty_writes(&backlight, 2), vec!["25000"]);
        assert_eq!(transition.delay_mut().delays().len(), 1);
    }

    #[test]
    fn test_ramp_updates_lcd_before_kbd() {
        let backlight = backlight();
        let mut transition = transition();
        transition.ramp(&backlight, 10, 11).unwrap();

        let order: Vec<String> = backlight
            .pwm()
            .fs()
            .writes()
            .into_iter()
            .filter(|(p, _)| p.ends_with("duty_cycle"))
            .map(|(p, _)| p.display().to_string())
            .collect();
        assert_eq!(
            order,
            vec!["pwm3/duty_cycle", "pwm2/duty_cycle", "pwm3/duty_cycle", "pwm2/duty_cycle"]
        );
    }

    #[test]
    fn test_ramp_aborts_on_failure() {
        let backlight = backlight();
        let mut transition = transition();

        // Step one: 4 writes per channel (including export); step two: 3 per
        // channel; step three fails on the LCD enable write
        backlight.pwm().fs().fail_after(8 + 6 + 2);

        let err = transition.ramp(&backlight, 0, 255).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(duty_writes(&backlight, 3).len(), 3);
        assert_eq!(duty_writes(&backlight, 2).len(), 2);
        assert_eq!(transition.delay_mut().delays().len(), 2);
    }

    #[test]
    fn test_thread_delay() {
        let mut delay = ThreadDelay;
        let start = std::time::Instant::now();
        delay.delay(Duration::from_millis(1));
        assert!(start.elapsed() >= Duration::from_millis(1));
    }
}
