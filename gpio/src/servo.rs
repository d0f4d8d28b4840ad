//! Hobby servo (SG90) on a 50 Hz PWM channel.
use crate::pwm::{PwmExtension, PwmPin};
use crate::{GpioError, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// Maps an angle in `0..=180` degrees onto a pulse width.
///
/// Individual servos rarely reach both ends exactly at 0.5 and 2.5 ms; [Servo::with_correction]
/// widens the pulse range on both ends.
pub struct Servo<'a> {
    pwm: &'a mut dyn PwmPin,
    min_pulse: Duration,
    max_pulse: Duration,
}

impl<'a> Servo<'a> {
    pub const PERIOD: Duration = Duration::from_millis(20);
    pub const MIN_PULSE: Duration = Duration::from_micros(500);
    pub const MAX_PULSE: Duration = Duration::from_micros(2500);
    pub const MAX_ANGLE: f64 = 180.0;

    pub fn new(pwm: &'a mut dyn PwmPin) -> GpioResult<Self> {
        pwm.set_duty_ns(0)?;
        pwm.set_period(Self::PERIOD)?;
        pwm.enable()?;
        Ok(Servo {
            pwm,
            min_pulse: Self::MIN_PULSE,
            max_pulse: Self::MAX_PULSE,
        })
    }

    pub fn with_correction(mut self, correction: Duration) -> Self {
        self.min_pulse = Self::MIN_PULSE.saturating_sub(correction);
        self.max_pulse = Self::MAX_PULSE + correction;
        self
    }

    pub fn pulse_width(&self, angle: f64) -> GpioResult<Duration> {
        if !(0.0..=Self::MAX_ANGLE).contains(&angle) {
            return Err(GpioError::InvalidArgument);
        }
        let span = self.max_pulse - self.min_pulse;
        Ok(self.min_pulse + span.mul_f64(angle / Self::MAX_ANGLE))
    }

    /// # Errors
    /// - `GpioError::InvalidArgument` if `angle` is outside `0..=180`.
    pub fn set_angle(&mut self, angle: f64) -> GpioResult<()> {
        let pulse = self.pulse_width(angle)?;
        trace!("{:?}: {}° = {:?}", self, angle, pulse);
        self.pwm.set_duty(pulse)
    }

    /// Keeps the current position for `duration` (software PWM needs this to keep pulsing).
    pub fn hold(&mut self, duration: Duration) -> GpioResult<()> {
        self.pwm.hold(duration)
    }

    /// Stops sending pulses; the horn can be moved by hand afterwards.
    pub fn detach(&mut self) -> GpioResult<()> {
        self.pwm.disable()
    }
}

impl Debug for Servo<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Servo({:?})", self.pwm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPwmPin;

    #[test]
    fn angles_map_onto_half_to_two_and_a_half_ms() {
        let mut pwm = MockPwmPin::default();
        let mut servo = Servo::new(&mut pwm).unwrap();

        servo.set_angle(90.0).unwrap();
        assert_eq!(servo.pulse_width(0.0), Ok(Duration::from_micros(500)));
        assert_eq!(servo.pulse_width(180.0), Ok(Duration::from_micros(2500)));
        drop(servo);

        assert!(pwm.enabled);
        assert_eq!(pwm.period_ns, 20_000_000);
        assert_eq!(pwm.duty_ns, 1_500_000);
    }

    #[test]
    fn out_of_range_angle_is_rejected() {
        let mut pwm = MockPwmPin::default();
        let mut servo = Servo::new(&mut pwm).unwrap();
        assert_eq!(servo.set_angle(181.0), Err(GpioError::InvalidArgument));
        assert_eq!(servo.set_angle(-1.0), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn correction_widens_the_range() {
        let mut pwm = MockPwmPin::default();
        let servo = Servo::new(&mut pwm)
            .unwrap()
            .with_correction(Duration::from_micros(100));
        assert_eq!(servo.pulse_width(0.0), Ok(Duration::from_micros(400)));
        assert_eq!(servo.pulse_width(180.0), Ok(Duration::from_micros(2600)));
    }
}
