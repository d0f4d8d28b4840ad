//! Extension traits for PWM pins.

use crate::pwm::PwmPin;
use crate::{GpioError, GpioResult};
use std::time::Duration;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Extension trait for PWM pins, providing methods to work with durations, frequencies and ratios
/// instead of raw nanoseconds.
pub trait PwmExtension {
    /// Gets the period of the PWM pin as a [Duration].
    fn period(&self) -> GpioResult<Duration>;
    /// Sets the period of the PWM pin using a [Duration].
    fn set_period(&mut self, period: Duration) -> GpioResult<()>;

    /// Gets the duty cycle of the PWM pin as a [Duration].
    fn duty(&self) -> GpioResult<Duration>;
    /// Sets the duty cycle of the PWM pin using a [Duration].
    fn set_duty(&mut self, duty: Duration) -> GpioResult<()>;

    /// Sets the period from a frequency in hertz, keeping the duty cycle ratio.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the frequency is not positive or the period does not fit.
    fn set_frequency(&mut self, hz: f64) -> GpioResult<()>;

    /// Gets the duty cycle as a ratio of the period.
    fn duty_cycle(&self) -> GpioResult<f64>;
    /// Sets the duty cycle as a ratio of the period.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `ratio` is outside `0.0..=1.0`.
    fn set_duty_cycle(&mut self, ratio: f64) -> GpioResult<()>;
}

impl<T: PwmPin + ?Sized> PwmExtension for T {
    fn period(&self) -> GpioResult<Duration> {
        let period_ns = self.period_ns()?;
        Ok(Duration::from_nanos(period_ns.into()))
    }

    fn set_period(&mut self, period: Duration) -> GpioResult<()> {
        let period_ns = u32::try_from(period.as_nanos()).map_err(|_| GpioError::InvalidArgument)?;
        self.set_period_ns(period_ns)
    }

    fn duty(&self) -> GpioResult<Duration> {
        let duty_ns = self.duty_ns()?;
        Ok(Duration::from_nanos(duty_ns.into()))
    }

    fn set_duty(&mut self, duty: Duration) -> GpioResult<()> {
        let duty_ns = u32::try_from(duty.as_nanos()).map_err(|_| GpioError::InvalidArgument)?;
        self.set_duty_ns(duty_ns)
    }

    fn set_frequency(&mut self, hz: f64) -> GpioResult<()> {
        let period_ns = NANOS_PER_SECOND / hz;
        if !hz.is_finite() || hz <= 0.0 || period_ns < 1.0 || period_ns > u32::MAX as f64 {
            return Err(GpioError::InvalidArgument);
        }

        let ratio = self.duty_cycle()?;
        // Shrink the duty first, the new period might be shorter than the old duty.
        self.set_duty_ns(0)?;
        self.set_period_ns(period_ns.round() as u32)?;
        self.set_duty_cycle(ratio)
    }

    fn duty_cycle(&self) -> GpioResult<f64> {
        let period_ns = self.period_ns()?;
        if period_ns == 0 {
            return Ok(0.0);
        }
        Ok(self.duty_ns()? as f64 / period_ns as f64)
    }

    fn set_duty_cycle(&mut self, ratio: f64) -> GpioResult<()> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(GpioError::InvalidArgument);
        }
        let period_ns = self.period_ns()?;
        self.set_duty_ns((period_ns as f64 * ratio).round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPwmPin;

    #[test]
    fn frequency_keeps_duty_ratio() {
        let mut pin = MockPwmPin::default();
        pin.set_period(Duration::from_millis(10)).unwrap();
        pin.set_duty_cycle(0.25).unwrap();

        pin.set_frequency(1000.0).unwrap();
        assert_eq!(pin.period_ns, 1_000_000);
        assert_eq!(pin.duty_ns, 250_000);
    }

    #[test]
    fn duty_cycle_out_of_range_is_rejected() {
        let mut pin = MockPwmPin::default();
        pin.set_period_ns(1000).unwrap();
        assert_eq!(pin.set_duty_cycle(1.5), Err(GpioError::InvalidArgument));
        assert_eq!(pin.set_duty_cycle(-0.1), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let pin: &mut dyn PwmPin = &mut MockPwmPin::default();
        assert_eq!(pin.set_frequency(0.0), Err(GpioError::InvalidArgument));
    }
}
