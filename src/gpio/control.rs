//! Board-level GPIO operations
//!
//! Every call opens the chip, requests the line, acts and releases again.
//! Nothing is held between calls: these pins toggle rarely, so the repeated
//! open/request cost does not matter and no line stays claimed by this
//! process after a call returns.

use super::line::{acquire, LineBackend, LineConfig};
use crate::config::{GpioConfig, PinRef};
use crate::error::Result;
use log::info;
use std::path::Path;

/// GPIO facade over a [`LineBackend`]
pub struct GpioControl<B: LineBackend> {
    backend: B,
    config: GpioConfig,
}

impl<B: LineBackend> GpioControl<B> {
    pub fn new(backend: B, config: GpioConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &GpioConfig {
        &self.config
    }

    /// Drive a pin on an arbitrary chip
    ///
    /// The line is requested as an active-low output, so `true` always
    /// asserts the pin regardless of wiring. The line is released and the
    /// chip closed whether or not the write succeeds.
    pub fn set_pin(&self, chip_path: &Path, pin_offset: u32, active: bool) -> Result<()> {
        let mut line = acquire(
            &self.backend,
            chip_path,
            pin_offset,
            &LineConfig::output_active_low(),
            &self.config.consumer,
        )?;

        let result = line.set_value(active);
        line.release();
        result
    }

    /// Apply direction, bias and polarity to a pin without driving it
    pub fn configure_pin(&self, chip_path: &Path, pin_offset: u32, config: &LineConfig) -> Result<()> {
        let mut line = acquire(&self.backend, chip_path, pin_offset, config, &self.config.consumer)?;
        line.release();
        Ok(())
    }

    /// Read the logical value of a pin requested with `config`
    pub fn read_pin(&self, chip_path: &Path, pin_offset: u32, config: &LineConfig) -> Result<bool> {
        let mut line = acquire(&self.backend, chip_path, pin_offset, config, &self.config.consumer)?;
        let result = line.value();
        line.release();
        result
    }

    pub fn flashlight(&self, on: bool) -> Result<()> {
        self.set_named("flashlight", &self.config.pins.flashlight, on)
    }

    pub fn green_led(&self, on: bool) -> Result<()> {
        self.set_named("green LED", &self.config.pins.green_led, on)
    }

    pub fn red_led(&self, on: bool) -> Result<()> {
        self.set_named("red LED", &self.config.pins.red_led, on)
    }

    /// `true` selects TX, `false` selects RX
    pub fn tx_rx_switch(&self, tx: bool) -> Result<()> {
        self.set_named("TX/RX switch", &self.config.pins.tx_rx_switch, tx)
    }

    fn set_named(&self, name: &str, pin: &PinRef, active: bool) -> Result<()> {
        let (chip_path, offset) = self.config.resolve(pin)?;
        self.set_pin(chip_path, offset, active)?;
        info!("{} {}", name, if active { "on" } else { "off" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gpio::{ActiveLevel, Bias, Direction};
    use crate::mock::MockLineBackend;

    fn control() -> GpioControl<MockLineBackend> {
        let config = GpioConfig::default();
        let backend = MockLineBackend::new();
        for path in config.chips.values() {
            backend.add_chip(path, 32);
        }
        GpioControl::new(backend, config)
    }

    const GPIO2: &str = "/dev/gpiochip0";

    #[test]
    fn test_set_pin_requests_active_low_output() {
        let gpio = control();
        gpio.set_pin(Path::new(GPIO2), 5, true).unwrap();

        let requests = gpio.backend().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].settings.direction, Direction::Output);
        assert!(requests[0].settings.active_low);
        assert_eq!(requests[0].settings.bias, None);
        assert_eq!(requests[0].consumer, "liblinht-ctrl");
        assert_eq!(gpio.backend().value(GPIO2, 5), Some(true));
    }

    #[test]
    fn test_set_pin_toggle_leaves_nothing_open() {
        let gpio = control();
        let backend = gpio.backend();

        gpio.set_pin(Path::new(GPIO2), 5, true).unwrap();
        assert_eq!((backend.open_chips(), backend.live_requests()), (0, 0));

        gpio.set_pin(Path::new(GPIO2), 5, false).unwrap();
        assert_eq!((backend.open_chips(), backend.live_requests()), (0, 0));
        assert_eq!(backend.value(GPIO2, 5), Some(false));
    }

    #[test]
    fn test_set_pin_write_failure_leaves_nothing_open() {
        let gpio = control();
        let backend = gpio.backend();
        backend.fail_writes(true);

        let err = gpio.set_pin(Path::new(GPIO2), 5, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!((backend.open_chips(), backend.live_requests()), (0, 0));
    }

    #[test]
    fn test_set_pin_bad_offset_leaves_nothing_open() {
        let gpio = control();
        let err = gpio.set_pin(Path::new(GPIO2), 200, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(gpio.backend().open_chips(), 0);
    }

    #[test]
    fn test_named_pins() {
        let gpio = control();
        gpio.green_led(true).unwrap();
        gpio.red_led(true).unwrap();
        gpio.flashlight(true).unwrap();
        gpio.tx_rx_switch(false).unwrap();

        let backend = gpio.backend();
        assert_eq!(backend.value(GPIO2, 4), Some(true));
        assert_eq!(backend.value(GPIO2, 5), Some(true));
        assert_eq!(backend.value(GPIO2, 18), Some(true));
        assert_eq!(backend.value(GPIO2, 13), Some(false));
    }

    #[test]
    fn test_named_pin_follows_config() {
        let mut config = GpioConfig::default();
        config.chips.insert("test".into(), "/dev/gpiochip9".into());
        config.pins.green_led = PinRef::new("test", 1);

        let backend = MockLineBackend::new();
        backend.add_chip("/dev/gpiochip9", 8);
        let gpio = GpioControl::new(backend, config);

        gpio.green_led(true).unwrap();
        assert_eq!(gpio.backend().value("/dev/gpiochip9", 1), Some(true));
    }

    #[test]
    fn test_configure_pin_releases_line() {
        let gpio = control();
        let config = LineConfig::new(Direction::Input, Bias::PullUp, ActiveLevel::High);
        gpio.configure_pin(Path::new(GPIO2), 3, &config).unwrap();

        let backend = gpio.backend();
        assert_eq!(backend.requests()[0].settings.bias, Some(Bias::PullUp));
        assert_eq!((backend.open_chips(), backend.live_requests()), (0, 0));
    }

    #[test]
    fn test_configure_pin_propagates_failure() {
        let gpio = control();
        let err = gpio
            .configure_pin(Path::new("/dev/gpiochip42"), 3, &LineConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn test_read_pin() {
        let gpio = control();
        gpio.backend().drive_input(GPIO2, 6, true);

        let config = LineConfig::input(Bias::PullDown, ActiveLevel::High);
        assert!(gpio.read_pin(Path::new(GPIO2), 6, &config).unwrap());
        assert_eq!(gpio.backend().live_requests(), 0);
    }
}
