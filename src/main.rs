//! LinHT control client
//!
//! Command-line access to the LinHT GPIO lines and backlights, plus the
//! board bring-up demo sequence.
//!
//! # Usage
//!
//! ```bash
//! # Drive a pin directly (chip by name or path)
//! linht-ctrl gpio set gpio2 4 on
//!
//! # Board helpers
//! linht-ctrl led green on
//! linht-ctrl txrx tx
//!
//! # Backlights
//! linht-ctrl backlight lcd level 128
//! linht-ctrl ramp 255 0
//!
//! # Show what the demo would write, without touching hardware
//! linht-ctrl --dry-run demo
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::{debug, error};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use linht_ctrl::backlight::{Backlight, BacklightTarget, Delay, Transition};
use linht_ctrl::gpio::{ActiveLevel, Bias, Direction, GpioControl, LineBackend, LineConfig};
use linht_ctrl::mock::{MockLineBackend, RecordingDelay, RecordingFs};
use linht_ctrl::pwm::{PwmController, PwmFs};
use linht_ctrl::HardwareConfig;

/// Lines per chip assumed by the dry-run backend
const DRY_RUN_LINES: u32 = 32;

/// LinHT control client
#[derive(Parser)]
#[command(name = "linht-ctrl")]
#[command(version)]
#[command(about = "GPIO and backlight control for the LinHT handheld")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Hardware map overrides (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run against in-memory devices and print what would be written
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Raw GPIO line operations
    #[command(subcommand)]
    Gpio(GpioCommands),

    /// Status LEDs
    Led {
        #[arg(value_enum)]
        led: Led,
        #[arg(value_enum)]
        state: Switch,
    },

    /// Flashlight
    Flashlight {
        #[arg(value_enum)]
        state: Switch,
    },

    /// RF path selection
    Txrx {
        #[arg(value_enum)]
        mode: RfMode,
    },

    /// LCD or keyboard backlight
    Backlight {
        /// lcd or kbd
        target: BacklightTarget,

        #[command(subcommand)]
        action: BacklightAction,
    },

    /// Raw PWM channel operations
    #[command(subcommand)]
    Pwm(PwmCommands),

    /// Ramp both backlights from one brightness to another
    Ramp { start: u8, end: u8 },

    /// Run the board bring-up sequence
    Demo,

    /// Configuration operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum GpioCommands {
    /// Drive a pin (active-low output)
    Set {
        /// Chip name from the configuration (e.g. gpio2) or device path
        chip: String,
        pin: u32,
        #[arg(value_enum)]
        state: Switch,
    },

    /// Request a pin with explicit settings and release it again
    Configure {
        chip: String,
        pin: u32,

        #[arg(long, default_value = "output")]
        direction: Direction,

        #[arg(long, default_value = "disabled")]
        bias: Bias,

        #[arg(long = "active", default_value = "low")]
        active_level: ActiveLevel,
    },

    /// Read the logical value of a pin
    Read {
        chip: String,
        pin: u32,

        #[arg(long, default_value = "disabled")]
        bias: Bias,

        #[arg(long = "active", default_value = "high")]
        active_level: ActiveLevel,
    },
}

#[derive(Subcommand)]
enum BacklightAction {
    /// Full brightness
    On,
    /// Zero brightness
    Off,
    /// Set a brightness level
    Level { value: u8 },
    /// Stop the PWM output
    Disable,
}

#[derive(Subcommand)]
enum PwmCommands {
    Export { channel: u32 },
    Unexport { channel: u32 },
    Enable { channel: u32 },
    Disable { channel: u32 },
    /// Set period and duty cycle
    Configure {
        channel: u32,
        period_ns: u32,
        /// Percent of the period (0-100)
        duty_pct: u8,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Led {
    Green,
    Red,
}

#[derive(Clone, Copy, ValueEnum)]
enum RfMode {
    Tx,
    Rx,
}

/// Everything a command can touch
struct Board<B: LineBackend, F: PwmFs, D: Delay> {
    gpio: GpioControl<B>,
    backlight: Backlight<F>,
    transition: Transition<D>,
}

impl<B: LineBackend, F: PwmFs, D: Delay> Board<B, F, D> {
    fn new(config: &HardwareConfig, backend: B, fs: F, delay: D) -> Self {
        Self {
            gpio: GpioControl::new(backend, config.gpio.clone()),
            backlight: Backlight::new(PwmController::new(fs), config.pwm.clone()),
            transition: Transition::from_config(&config.transition, delay),
        }
    }

    /// Resolve a chip given by configured name or by path
    fn chip_path(&self, chip: &str) -> PathBuf {
        self.gpio
            .config()
            .chip_path(chip)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(chip))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match &cli.config {
        Some(path) => HardwareConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HardwareConfig::default(),
    };
    config.validate().context("Invalid hardware configuration")?;

    if let Commands::Config(ConfigCommands::Show) = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if cli.dry_run {
        run_dry(&config, cli.command)
    } else {
        run_hardware(&config, cli.command)
    }
}

#[cfg(target_os = "linux")]
fn run_hardware(config: &HardwareConfig, command: Commands) -> Result<()> {
    use linht_ctrl::backlight::ThreadDelay;
    use linht_ctrl::gpio::CdevBackend;
    use linht_ctrl::pwm::SysFs;

    let mut board = Board::new(
        config,
        CdevBackend::new(),
        SysFs::new(&config.pwm.chip_path),
        ThreadDelay,
    );
    execute(&mut board, command)
}

#[cfg(not(target_os = "linux"))]
fn run_hardware(_config: &HardwareConfig, _command: Commands) -> Result<()> {
    anyhow::bail!("hardware access requires Linux; use --dry-run to simulate")
}

fn run_dry(config: &HardwareConfig, command: Commands) -> Result<()> {
    let backend = MockLineBackend::new();
    for path in config.gpio.chips.values() {
        backend.add_chip(path, DRY_RUN_LINES);
    }

    let mut board = Board::new(
        config,
        backend,
        RecordingFs::new(&config.pwm.chip_path),
        RecordingDelay::new(),
    );
    let result = execute(&mut board, command);

    print_dry_run(&board);
    result
}

fn print_dry_run(board: &Board<MockLineBackend, RecordingFs, RecordingDelay>) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Dry Run Summary".cyan().bold());
    println!("{}", "=".repeat(60));

    let gpio_writes = board.gpio.backend().writes();
    println!("\n{} ({})", "GPIO writes:".white().bold(), gpio_writes.len());
    for (chip, offset, active) in &gpio_writes {
        let level = if *active { "active".green() } else { "inactive".dimmed() };
        println!("  {}:{} <- {}", chip.display(), offset, level);
    }

    let fs = board.backlight.pwm().fs();
    let pwm_writes = fs.writes();
    println!("\n{} ({})", "PWM writes:".white().bold(), pwm_writes.len());
    for (path, value) in &pwm_writes {
        println!("  {} <- {}", fs.root().join(path).display(), value);
    }

    let delay = board.transition.delay();
    println!(
        "\n{} {} pauses, {:.2}s total",
        "Delays:".white().bold(),
        delay.delays().len(),
        delay.total().as_secs_f64()
    );
    println!("{}", "=".repeat(60));
}

fn execute<B: LineBackend, F: PwmFs, D: Delay>(
    board: &mut Board<B, F, D>,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Gpio(cmd) => handle_gpio(board, cmd)?,

        Commands::Led { led, state } => match led {
            Led::Green => board.gpio.green_led(state.is_on())?,
            Led::Red => board.gpio.red_led(state.is_on())?,
        },

        Commands::Flashlight { state } => board.gpio.flashlight(state.is_on())?,

        Commands::Txrx { mode } => board.gpio.tx_rx_switch(matches!(mode, RfMode::Tx))?,

        Commands::Backlight { target, action } => {
            let backlight = &board.backlight;
            match action {
                BacklightAction::On => backlight.on(target)?,
                BacklightAction::Off => backlight.off(target)?,
                BacklightAction::Level { value } => backlight
                    .set_brightness(target, value)
                    .with_context(|| format!("Failed to set {} brightness to {}", target, value))?,
                BacklightAction::Disable => backlight.disable(target)?,
            }
        }

        Commands::Pwm(cmd) => handle_pwm(board.backlight.pwm(), cmd)?,

        Commands::Ramp { start, end } => {
            let steps = board
                .transition
                .ramp(&board.backlight, start, end)
                .with_context(|| format!("Ramp {} -> {} failed", start, end))?;
            debug!(
                "ramp applied {} steps, {:?} apart",
                steps,
                board.transition.step_delay()
            );
        }

        Commands::Demo => run_demo(board)?,

        Commands::Config(ConfigCommands::Show) => {}
    }

    Ok(())
}

fn handle_gpio<B: LineBackend, F: PwmFs, D: Delay>(
    board: &Board<B, F, D>,
    cmd: GpioCommands,
) -> Result<()> {
    match cmd {
        GpioCommands::Set { chip, pin, state } => {
            let path = board.chip_path(&chip);
            board
                .gpio
                .set_pin(&path, pin, state.is_on())
                .with_context(|| format!("Failed to set {}:{}", path.display(), pin))?;
        }

        GpioCommands::Configure {
            chip,
            pin,
            direction,
            bias,
            active_level,
        } => {
            let path = board.chip_path(&chip);
            let line = LineConfig::new(direction, bias, active_level);
            board
                .gpio
                .configure_pin(&path, pin, &line)
                .with_context(|| format!("Failed to configure {}:{}", path.display(), pin))?;
            println!(
                "{}:{} configured as {} ({}, bias {})",
                path.display(),
                pin,
                direction,
                active_level,
                bias
            );
        }

        GpioCommands::Read {
            chip,
            pin,
            bias,
            active_level,
        } => {
            let path = board.chip_path(&chip);
            let line = LineConfig::input(bias, active_level);
            let active = board
                .gpio
                .read_pin(&path, pin, &line)
                .with_context(|| format!("Failed to read {}:{}", path.display(), pin))?;
            println!("{}", if active { "active" } else { "inactive" });
        }
    }

    Ok(())
}

fn handle_pwm<F: PwmFs>(pwm: &PwmController<F>, cmd: PwmCommands) -> Result<()> {
    match cmd {
        PwmCommands::Export { channel } => pwm.export(channel)?,
        PwmCommands::Unexport { channel } => pwm.unexport(channel)?,
        PwmCommands::Enable { channel } => pwm.enable(channel)?,
        PwmCommands::Disable { channel } => pwm.disable(channel)?,
        PwmCommands::Configure {
            channel,
            period_ns,
            duty_pct,
        } => pwm
            .configure(channel, period_ns, duty_pct)
            .with_context(|| format!("Failed to configure pwm{}", channel))?,
    }

    Ok(())
}

/// Report one demo step; failures are logged and the sequence goes on
fn step<E: Display>(name: &str, result: std::result::Result<(), E>) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    match result {
        Ok(()) => println!("[{}] {} {}", timestamp, "[OK]".green().bold(), name),
        Err(e) => {
            println!("[{}] {} {}", timestamp, "[ERROR]".red().bold(), name);
            error!("{}: {}", name, e);
        }
    }
}

fn pause<D: Delay>(transition: &mut Transition<D>, secs: u64) {
    transition.delay_mut().delay(Duration::from_secs(secs));
}

fn run_demo<B: LineBackend, F: PwmFs, D: Delay>(board: &mut Board<B, F, D>) -> Result<()> {
    // The red LED goes through the raw pin call rather than its helper
    let gpio_config = board.gpio.config();
    let (gpio2, red) = gpio_config
        .resolve(&gpio_config.pins.red_led)
        .map(|(path, offset)| (path.to_path_buf(), offset))?;

    println!("{}", "LinHT demo sequence".cyan().bold());

    step("green LED on", board.gpio.green_led(true));
    pause(&mut board.transition, 1);
    step("green LED off", board.gpio.green_led(false));

    step("red LED on", board.gpio.set_pin(&gpio2, red, true));
    pause(&mut board.transition, 1);
    step("red LED off", board.gpio.set_pin(&gpio2, red, false));

    step("LCD backlight off", board.backlight.lcd_off());
    step("keyboard backlight off", board.backlight.kbd_off());
    pause(&mut board.transition, 1);

    step("LCD backlight on", board.backlight.lcd_on());
    step("keyboard backlight on", board.backlight.kbd_on());
    pause(&mut board.transition, 2);

    step(
        "ramp 255 -> 0",
        board.transition.ramp(&board.backlight, 255, 0).map(|_| ()),
    );
    pause(&mut board.transition, 1);

    step(
        "ramp 0 -> 255",
        board.transition.ramp(&board.backlight, 0, 255).map(|_| ()),
    );
    pause(&mut board.transition, 1);

    step("green LED off", board.gpio.green_led(false));
    step("red LED off", board.gpio.set_pin(&gpio2, red, false));

    Ok(())
}
