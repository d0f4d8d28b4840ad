use super::Context;
use crate::utils::{clock, cpu_temperature};
use log::{debug, warn};
use pikit_gpio::dht::Dht11;
use pikit_gpio::i2c::I2cBus;
use pikit_gpio::keypad::{GpioKeypad, KeyList};
use pikit_gpio::lcd::CharacterDisplay;
use pikit_gpio::lcd::hd44780::driver::{HD44780Driver, LcdGeometry, Pcf8574HD44780Driver};
use pikit_gpio::ultrasonic::Ultrasonic;
use pikit_gpio::{GpioActiveLevel, GpioBias, GpioDriveMode, GpioDriver, GpioError};
use std::thread::sleep;
use std::time::Duration;

pub fn lcd<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let sensors = &ctx.config.sensors;
    let geometry = LcdGeometry {
        columns: sensors.lcd_columns,
        rows: sensors.lcd_rows,
    };
    let bus = ctx.i2c()?;
    let mut lcd = Pcf8574HD44780Driver::detect(&bus, geometry)?;
    lcd.init()?;
    debug!("{:?} initialized.", lcd);

    while ctx.limit.running() {
        let temperature = match cpu_temperature() {
            Ok(celsius) => format!("CPU: {:.2}C", celsius),
            Err(e) => {
                warn!("Failed to read CPU temperature: {}", e);
                "CPU: ?".to_string()
            }
        };
        lcd.write_line(0, &temperature)?;
        lcd.write_line(1, &format!("    {}", clock()))?;
        sleep(Duration::from_secs(1));
    }

    lcd.clear_display()?;
    lcd.set_backlight(false)?;
    Ok(())
}

pub fn dht11<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut pin = ctx.gpio.get_pin(ctx.config.sensors.dht)?;
    let mut sensor = Dht11::new(&mut *pin);

    while ctx.limit.running() {
        match sensor.read_with_default_retries() {
            Ok(reading) => println!(
                "Humidity : {:.2}, \t Temperature : {:.2}",
                reading.humidity, reading.temperature
            ),
            Err(e @ (GpioError::Timeout | GpioError::Checksum)) => {
                println!("Reading failed: {}", e)
            }
            Err(e) => return Err(e.into()),
        }
        sleep(Duration::from_secs(2));
    }

    Ok(())
}

pub fn keypad<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let sensors = &ctx.config.sensors;
    let mut col_bus = ctx.gpio.get_pin_bus(sensors.keypad_cols)?;
    let mut row_bus = ctx.gpio.get_pin_bus(sensors.keypad_rows)?;
    col_bus.set_drive_mode(GpioDriveMode::OpenDrain)?;
    col_bus.set_active_level(GpioActiveLevel::Low)?;
    row_bus.set_bias(GpioBias::PullUp)?;
    row_bus.set_active_level(GpioActiveLevel::Low)?;
    let cols = col_bus.as_output()?;
    let rows = row_bus.as_input()?;

    let keypad = GpioKeypad::new(&*cols, &*rows);
    let mut keys = KeyList::new(&keypad);
    debug!("{:?} initialized.", keys);

    while ctx.limit.running() {
        if let Some(key) = keys.get_key()? {
            println!("You Pressed Key : {}", key.to_char());
        }
        sleep(Duration::from_millis(1));
    }

    Ok(())
}

pub fn ultrasonic<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let sensors = &ctx.config.sensors;
    let mut trigger_pin = ctx.gpio.get_pin(sensors.ultrasonic_trigger)?;
    let trigger = trigger_pin.as_output()?;
    let mut echo_pin = ctx.gpio.get_pin(sensors.ultrasonic_echo)?;
    let echo = echo_pin.as_input()?;

    trigger.write(false)?;
    let sensor = Ultrasonic::new(&*trigger, &*echo);

    while ctx.limit.running() {
        match sensor.distance_cm() {
            Ok(distance) => println!("The distance is : {:.2} cm", distance),
            Err(GpioError::Timeout) => println!("Out of range"),
            Err(e) => return Err(e.into()),
        }
        sleep(Duration::from_secs(1));
    }

    Ok(())
}

pub fn i2c_scan<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let bus = ctx.i2c()?;
    let found = bus.scan();

    if found.is_empty() {
        println!("No I2C devices found on {:?}", bus);
    }
    for address in found {
        println!("Found device at {:#04x}", address);
    }

    Ok(())
}
