mod config;
mod lessons;
mod utils;

use crate::config::{Backend, Config, Settings};
use crate::lessons::{Context, Lesson};
use dotenv::dotenv;
use log::{debug, info};
use pikit_gpio::GpioDriver;
use pikit_gpio::gpiod::GpiodDriver;
use pikit_gpio::raw::RawGpioDriver;
use sysinfo::System;

fn log_host() {
    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());
}

fn print_usage() {
    println!("Usage: {} <lesson>", env!("CARGO_PKG_NAME"));
    println!();
    println!("Lessons:");
    for lesson in Lesson::ALL {
        println!("  {}", lesson);
    }
}

fn run_with<D: GpioDriver>(
    gpio: &D,
    lesson: Lesson,
    config: &Config,
    settings: &Settings,
) -> eyre::Result<()> {
    debug!("{:?} initialized.", gpio);
    let ctx = Context::new(gpio, config, settings)?;
    lessons::run(lesson, &ctx)
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    let dotenv = dotenv();
    pretty_env_logger::init();
    if let Err(e) = dotenv {
        debug!("No .env loaded: {}", e);
    }

    let lesson = match std::env::args().nth(1).as_deref() {
        None | Some("list" | "help" | "--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(name) => name.parse::<Lesson>()?,
    };

    log_host();

    let settings = Settings::from_env()?;
    debug!("{:?}", settings);
    let config = Config::load_or_default(&settings.config_path)?;

    info!("Using the {} GPIO backend", settings.backend);
    match settings.backend {
        Backend::Gpiod => run_with(
            &GpiodDriver::open(&settings.gpio_chip)?,
            lesson,
            &config,
            &settings,
        ),
        Backend::GpioMem => run_with(&RawGpioDriver::new_gpiomem()?, lesson, &config, &settings),
        Backend::Mem => run_with(&RawGpioDriver::new_mem()?, lesson, &config, &settings),
    }
}
