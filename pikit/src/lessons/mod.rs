//! The kit's lessons. Each one sets its parts up, polls in a loop until the run limit is
//! reached, and releases everything when its handles drop.
mod analog;
mod leds;
mod motion;
mod sensors;
mod shift;
mod sound;

use crate::config::{Config, Settings};
use crate::utils::RunLimit;
use log::{debug, info};
use pikit_gpio::{GpioActiveLevel, GpioBias, GpioDriver, GpioPin};
use pikit_gpio::i2c::LinuxI2cBus;
use pikit_gpio::pwm::{PwmDriver, PwmPin, SoftPwmPin, SysfsPwmDriver};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lesson {
    Blink,
    ButtonLed,
    TableLamp,
    LightWater,
    BreathingLed,
    ColorfulLed,
    Doorbell,
    Alertor,
    Adc,
    Softlight,
    ColorfulSoftlight,
    Nightlamp,
    Thermometer,
    Joystick,
    Motor,
    Relay,
    Sweep,
    Stepper,
    LightWater595,
    SevenSegment,
    Stopwatch,
    LedMatrix,
    Lcd,
    Dht11,
    Keypad,
    Ultrasonic,
    I2cScan,
}

#[derive(Debug, Error)]
#[error("unknown lesson {0:?}, try `list`")]
pub struct UnknownLesson(String);

impl Lesson {
    pub const ALL: [Lesson; 27] = [
        Lesson::Blink,
        Lesson::ButtonLed,
        Lesson::TableLamp,
        Lesson::LightWater,
        Lesson::BreathingLed,
        Lesson::ColorfulLed,
        Lesson::Doorbell,
        Lesson::Alertor,
        Lesson::Adc,
        Lesson::Softlight,
        Lesson::ColorfulSoftlight,
        Lesson::Nightlamp,
        Lesson::Thermometer,
        Lesson::Joystick,
        Lesson::Motor,
        Lesson::Relay,
        Lesson::Sweep,
        Lesson::Stepper,
        Lesson::LightWater595,
        Lesson::SevenSegment,
        Lesson::Stopwatch,
        Lesson::LedMatrix,
        Lesson::Lcd,
        Lesson::Dht11,
        Lesson::Keypad,
        Lesson::Ultrasonic,
        Lesson::I2cScan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Lesson::Blink => "blink",
            Lesson::ButtonLed => "button-led",
            Lesson::TableLamp => "table-lamp",
            Lesson::LightWater => "light-water",
            Lesson::BreathingLed => "breathing-led",
            Lesson::ColorfulLed => "colorful-led",
            Lesson::Doorbell => "doorbell",
            Lesson::Alertor => "alertor",
            Lesson::Adc => "adc",
            Lesson::Softlight => "softlight",
            Lesson::ColorfulSoftlight => "colorful-softlight",
            Lesson::Nightlamp => "nightlamp",
            Lesson::Thermometer => "thermometer",
            Lesson::Joystick => "joystick",
            Lesson::Motor => "motor",
            Lesson::Relay => "relay",
            Lesson::Sweep => "sweep",
            Lesson::Stepper => "stepper",
            Lesson::LightWater595 => "light-water-595",
            Lesson::SevenSegment => "seven-segment",
            Lesson::Stopwatch => "stopwatch",
            Lesson::LedMatrix => "led-matrix",
            Lesson::Lcd => "lcd",
            Lesson::Dht11 => "dht11",
            Lesson::Keypad => "keypad",
            Lesson::Ultrasonic => "ultrasonic",
            Lesson::I2cScan => "i2c-scan",
        }
    }
}

impl FromStr for Lesson {
    type Err = UnknownLesson;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Lesson::ALL
            .into_iter()
            .find(|lesson| lesson.name() == s)
            .ok_or(UnknownLesson(s))
    }
}

impl Display for Lesson {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a lesson gets to work with.
pub struct Context<'a, D: GpioDriver> {
    pub gpio: &'a D,
    pub config: &'a Config,
    pub settings: &'a Settings,
    pub limit: RunLimit,
    pwm: Option<SysfsPwmDriver>,
}

impl<'a, D: GpioDriver> Context<'a, D> {
    pub fn new(gpio: &'a D, config: &'a Config, settings: &'a Settings) -> eyre::Result<Self> {
        let pwm = settings
            .pwm_chip
            .map(SysfsPwmDriver::get_chip)
            .transpose()?;
        if let Some(pwm) = &pwm {
            info!("Using hardware PWM on {:?}", pwm);
        }

        Ok(Context {
            gpio,
            config,
            settings,
            limit: RunLimit::new(settings.run_limit),
            pwm,
        })
    }

    /// Claims a push button wired to ground, reading `true` while pressed.
    pub fn button(&self, pin: usize) -> eyre::Result<Box<dyn GpioPin + 'a>> {
        let mut button = self.gpio.get_pin(pin)?;
        button.set_bias(GpioBias::PullUp)?;
        button.set_active_level(GpioActiveLevel::Low)?;
        Ok(button)
    }

    pub fn i2c(&self) -> eyre::Result<LinuxI2cBus> {
        Ok(LinuxI2cBus::new(&self.settings.i2c_bus)?)
    }

    /// Runs `f` with a PWM channel driving `pin`.
    ///
    /// With a hardware PWM chip configured, its channel 0 is used and `pin` must be routed to
    /// it (GPIO 18 with the default overlay). Otherwise the pin is bit-banged.
    pub fn with_pwm<R>(
        &self,
        pin: usize,
        f: impl FnOnce(&mut dyn PwmPin) -> eyre::Result<R>,
    ) -> eyre::Result<R> {
        match &self.pwm {
            Some(driver) => {
                let mut channel = driver.get_pin(0)?;
                f(&mut *channel)
            }
            None => {
                let mut gpio_pin = self.gpio.get_pin(pin)?;
                let output = gpio_pin.as_output()?;
                let mut channel = SoftPwmPin::new(&*output);
                debug!("Bit-banging PWM on GPIO {}", pin);
                f(&mut channel)
            }
        }
    }
}

pub fn run<D: GpioDriver>(lesson: Lesson, ctx: &Context<'_, D>) -> eyre::Result<()> {
    info!("Running lesson {}", lesson);

    match lesson {
        Lesson::Blink => leds::blink(ctx),
        Lesson::ButtonLed => leds::button_led(ctx),
        Lesson::TableLamp => leds::table_lamp(ctx),
        Lesson::LightWater => leds::light_water(ctx),
        Lesson::BreathingLed => leds::breathing_led(ctx),
        Lesson::ColorfulLed => leds::colorful_led(ctx),
        Lesson::Doorbell => sound::doorbell(ctx),
        Lesson::Alertor => sound::alertor(ctx),
        Lesson::Adc => analog::adc(ctx),
        Lesson::Softlight => analog::softlight(ctx),
        Lesson::ColorfulSoftlight => analog::colorful_softlight(ctx),
        Lesson::Nightlamp => analog::nightlamp(ctx),
        Lesson::Thermometer => analog::thermometer(ctx),
        Lesson::Joystick => analog::joystick(ctx),
        Lesson::Motor => analog::motor(ctx),
        Lesson::Relay => motion::relay(ctx),
        Lesson::Sweep => motion::sweep(ctx),
        Lesson::Stepper => motion::stepper(ctx),
        Lesson::LightWater595 => shift::light_water_595(ctx),
        Lesson::SevenSegment => shift::seven_segment(ctx),
        Lesson::Stopwatch => shift::stopwatch(ctx),
        Lesson::LedMatrix => shift::led_matrix(ctx),
        Lesson::Lcd => sensors::lcd(ctx),
        Lesson::Dht11 => sensors::dht11(ctx),
        Lesson::Keypad => sensors::keypad(ctx),
        Lesson::Ultrasonic => sensors::ultrasonic(ctx),
        Lesson::I2cScan => sensors::i2c_scan(ctx),
    }?;

    info!("Lesson {} finished", lesson);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_lesson_parses_back_from_its_name() {
        for lesson in Lesson::ALL {
            assert_eq!(lesson.to_string().parse::<Lesson>().unwrap(), lesson);
        }
    }

    #[test]
    fn names_are_unique_kebab_case() {
        let names: HashSet<&str> = Lesson::ALL.iter().map(|lesson| lesson.name()).collect();
        assert_eq!(names.len(), Lesson::ALL.len());
        assert!(names.iter().all(|name| {
            name.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        }));
    }

    #[test]
    fn parsing_ignores_case_and_rejects_unknown_names() {
        assert_eq!("Stopwatch".parse::<Lesson>().unwrap(), Lesson::Stopwatch);
        assert_eq!(" i2c-scan\n".parse::<Lesson>().unwrap(), Lesson::I2cScan);
        assert!("blinky".parse::<Lesson>().is_err());
    }
}
