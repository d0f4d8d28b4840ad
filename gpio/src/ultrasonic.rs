//! HC-SR04 ultrasonic distance sensor.
//!
//! A 10 µs pulse on the trigger pin starts a measurement; the sensor then holds its echo pin
//! high for as long as the sound took to travel to the obstacle and back.
use crate::{GpioError, GpioInput, GpioOutput, GpioResult};
use log::{trace, warn};
use std::thread::sleep;
use std::time::Duration;

/// Speed of sound, in m/s.
const SOUND_SPEED: u64 = 340;
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Measures how long `input` stays at `level`, after first waiting for it to get there.
///
/// # Errors
/// - `GpioError::Timeout` if either phase lasts longer than `timeout`.
pub fn pulse_in(input: &dyn GpioInput, level: bool, timeout: Duration) -> GpioResult<Duration> {
    input.wait_while(!level, timeout)?;
    input.wait_while(level, timeout)
}

/// Converts the length of an echo pulse to a distance in centimeters.
pub fn echo_to_cm(echo: Duration) -> f64 {
    echo.as_micros() as f64 * SOUND_SPEED as f64 / 2.0 / 10_000.0
}

pub struct Ultrasonic<'a> {
    trigger: &'a dyn GpioOutput,
    echo: &'a dyn GpioInput,
    timeout: Duration,
}

impl<'a> Ultrasonic<'a> {
    pub const DEFAULT_MAX_DISTANCE_CM: u64 = 220;

    pub fn new(trigger: &'a dyn GpioOutput, echo: &'a dyn GpioInput) -> Self {
        Self::with_max_distance(trigger, echo, Self::DEFAULT_MAX_DISTANCE_CM)
    }

    /// Echoes from further than `max_distance_cm` are reported as a timeout.
    pub fn with_max_distance(
        trigger: &'a dyn GpioOutput,
        echo: &'a dyn GpioInput,
        max_distance_cm: u64,
    ) -> Self {
        Ultrasonic {
            trigger,
            echo,
            timeout: Duration::from_micros(max_distance_cm * 60),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Triggers a measurement and returns the distance in centimeters.
    ///
    /// # Errors
    /// - `GpioError::Timeout` if no echo arrived in time.
    pub fn distance_cm(&self) -> GpioResult<f64> {
        self.trigger.write(true)?;
        sleep(TRIGGER_PULSE);
        self.trigger.write(false)?;

        let echo = match pulse_in(self.echo, true, self.timeout) {
            Ok(echo) => echo,
            Err(GpioError::Timeout) => {
                warn!("No echo within {:?}", self.timeout);
                return Err(GpioError::Timeout);
            }
            Err(e) => return Err(e),
        };

        trace!("Echo lasted {:?}", echo);
        Ok(echo_to_cm(echo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockInput, MockOutput, trace};

    #[test]
    fn echo_length_maps_to_centimeters() {
        assert_eq!(echo_to_cm(Duration::from_micros(1000)), 17.0);
        assert_eq!(echo_to_cm(Duration::ZERO), 0.0);
    }

    #[test]
    fn timeout_scales_with_max_distance() {
        let t = trace();
        let trigger = MockOutput::new("trig", &t);
        let echo = MockInput::constant(false);
        let sensor = Ultrasonic::new(&trigger, &echo);
        assert_eq!(sensor.timeout(), Duration::from_micros(220 * 60));
    }

    #[test]
    fn missing_echo_times_out() {
        let t = trace();
        let trigger = MockOutput::new("trig", &t);
        let echo = MockInput::constant(false);
        let sensor = Ultrasonic::with_max_distance(&trigger, &echo, 10);

        assert_eq!(sensor.distance_cm(), Err(GpioError::Timeout));
        assert_eq!(trigger.history(), [true, false]);
    }

    #[test]
    fn short_echo_is_close() {
        let t = trace();
        let trigger = MockOutput::new("trig", &t);
        let echo = MockInput::scripted(&[false, true, false]);
        let sensor = Ultrasonic::new(&trigger, &echo);

        let distance = sensor.distance_cm().unwrap();
        assert!(distance < 17.0, "{distance}");
    }
}
