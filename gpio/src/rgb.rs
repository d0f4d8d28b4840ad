//! RGB LED on three PWM channels.
use crate::pwm::{PwmExtension, PwmPin, PwmPolarity};
use crate::{GpioError, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

/// A colour with each channel in percent (`0..=100`).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Color { red, green, blue }
    }

    /// Walks red → green → blue → red as `position` goes from 0 to 255.
    pub fn wheel(position: u8) -> Self {
        let percent = |value: u16| (value * 100 / 255) as u8;
        let position = position as u16;
        match position {
            0..85 => Color::new(percent(255 - position * 3), percent(position * 3), 0),
            85..170 => {
                let position = position - 85;
                Color::new(0, percent(255 - position * 3), percent(position * 3))
            }
            _ => {
                let position = position - 170;
                Color::new(percent(position * 3), 0, percent(255 - position * 3))
            }
        }
    }
}

/// An RGB LED, or three separate LEDs, on three PWM channels.
pub struct RgbLed<'a> {
    channels: [&'a mut dyn PwmPin; 3],
    color: Color,
}

impl<'a> RgbLed<'a> {
    const SLICE: Duration = Duration::from_micros(500);

    /// Sets up the channels at `hz`, all off.
    ///
    /// The kit's LED is common anode: its channels light up on a low output, which
    /// `common_anode` takes care of by inverting the polarity.
    pub fn new(
        red: &'a mut dyn PwmPin,
        green: &'a mut dyn PwmPin,
        blue: &'a mut dyn PwmPin,
        hz: f64,
        common_anode: bool,
    ) -> GpioResult<Self> {
        let polarity = if common_anode {
            PwmPolarity::Inversed
        } else {
            PwmPolarity::Normal
        };

        let mut channels = [red, green, blue];
        for channel in channels.iter_mut() {
            channel.set_frequency(hz)?;
            channel.set_duty_cycle(0.0)?;
            channel.set_polarity(polarity)?;
            channel.enable()?;
        }

        Ok(RgbLed {
            channels,
            color: Color::default(),
        })
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// # Errors
    /// - `GpioError::InvalidArgument` if a channel is above 100 %.
    pub fn set_color(&mut self, color: Color) -> GpioResult<()> {
        let values = [color.red, color.green, color.blue];
        if values.iter().any(|&value| value > 100) {
            return Err(GpioError::InvalidArgument);
        }

        trace!("{:?} <- {:?}", self, color);
        for (channel, value) in self.channels.iter_mut().zip(values) {
            channel.set_duty_cycle(value as f64 / 100.0)?;
        }
        self.color = color;
        Ok(())
    }

    /// Keeps the colour for `duration`, giving each channel short turns so that software PWM
    /// channels all keep running.
    pub fn hold(&mut self, duration: Duration) -> GpioResult<()> {
        let end = Instant::now() + duration;
        loop {
            for channel in self.channels.iter_mut() {
                let left = end.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Ok(());
                }
                channel.hold(left.min(Self::SLICE))?;
            }
        }
    }

    pub fn off(&mut self) -> GpioResult<()> {
        self.set_color(Color::default())
    }
}

impl Debug for RgbLed<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RgbLed({:?})", self.channels)
    }
}

impl Drop for RgbLed<'_> {
    fn drop(&mut self) {
        for channel in self.channels.iter_mut() {
            _ = channel.disable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPwmPin;

    #[test]
    fn wheel_starts_red_and_passes_green_and_blue() {
        assert_eq!(Color::wheel(0), Color::new(100, 0, 0));
        assert_eq!(Color::wheel(85), Color::new(0, 100, 0));
        assert_eq!(Color::wheel(170), Color::new(0, 0, 100));
        assert_eq!(Color::wheel(255), Color::new(100, 0, 0));
    }

    #[test]
    fn set_color_scales_percentages() {
        let (mut red, mut green, mut blue): (MockPwmPin, MockPwmPin, MockPwmPin) = Default::default();
        {
            let mut led = RgbLed::new(&mut red, &mut green, &mut blue, 2000.0, true).unwrap();
            led.set_color(Color::new(100, 50, 0)).unwrap();
            assert_eq!(led.set_color(Color::new(101, 0, 0)), Err(GpioError::InvalidArgument));
            assert_eq!(led.color(), Color::new(100, 50, 0));
        }

        assert_eq!(red.period_ns, 500_000);
        assert_eq!(red.duty_ns, 500_000);
        assert_eq!(green.duty_ns, 250_000);
        assert_eq!(blue.duty_ns, 0);
        assert_eq!(red.polarity, PwmPolarity::Inversed);
        assert!(!red.enabled);
    }

    #[test]
    fn hold_shares_time_between_channels() {
        let (mut red, mut green, mut blue): (MockPwmPin, MockPwmPin, MockPwmPin) = Default::default();
        {
            let mut led = RgbLed::new(&mut red, &mut green, &mut blue, 100.0, false).unwrap();
            led.hold(Duration::from_millis(3)).unwrap();
        }

        let total = red.held + green.held + blue.held;
        assert!(total <= Duration::from_millis(3));
        assert!(!red.held.is_zero() && !green.held.is_zero() && !blue.held.is_zero());
    }
}
