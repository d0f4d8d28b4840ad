//! DC motor through an L293D half-bridge, and a relay.
use crate::pwm::{PwmExtension, PwmPin};
use crate::{GpioError, GpioOutput, GpioResult};
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// One motor on an L293D: two direction inputs and a PWM on the enable pin for the speed.
pub struct DcMotor<'a> {
    forward: &'a dyn GpioOutput,
    backward: &'a dyn GpioOutput,
    enable: &'a mut dyn PwmPin,
}

impl<'a> DcMotor<'a> {
    pub const PWM_FREQUENCY: f64 = 1000.0;

    pub fn new(
        forward: &'a dyn GpioOutput,
        backward: &'a dyn GpioOutput,
        enable: &'a mut dyn PwmPin,
    ) -> GpioResult<Self> {
        enable.set_frequency(Self::PWM_FREQUENCY)?;
        enable.set_duty_cycle(0.0)?;
        enable.enable()?;
        Ok(DcMotor {
            forward,
            backward,
            enable,
        })
    }

    /// Positive speeds turn forward, negative ones backward, zero stops.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `speed` is outside `-1.0..=1.0`.
    pub fn drive(&mut self, speed: f64) -> GpioResult<()> {
        if !(-1.0..=1.0).contains(&speed) {
            return Err(GpioError::InvalidArgument);
        }

        trace!("{:?}: speed {:.2}", self, speed);
        self.forward.write(speed > 0.0)?;
        self.backward.write(speed < 0.0)?;
        self.enable.set_duty_cycle(speed.abs())
    }

    pub fn stop(&mut self) -> GpioResult<()> {
        self.drive(0.0)
    }

    /// Keeps the current speed for `duration`.
    pub fn hold(&mut self, duration: Duration) -> GpioResult<()> {
        self.enable.hold(duration)
    }
}

impl Debug for DcMotor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DcMotor({:?}, {:?})", self.forward, self.backward)
    }
}

impl Drop for DcMotor<'_> {
    fn drop(&mut self) {
        _ = self.stop();
    }
}

/// A relay module on a single output, remembering whether it is closed.
pub struct Relay<'a> {
    output: &'a dyn GpioOutput,
    closed: bool,
}

impl<'a> Relay<'a> {
    /// Opens the relay.
    pub fn new(output: &'a dyn GpioOutput) -> GpioResult<Self> {
        output.write(false)?;
        Ok(Relay {
            output,
            closed: false,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set(&mut self, closed: bool) -> GpioResult<()> {
        self.output.write(closed)?;
        self.closed = closed;
        debug!("Relay {}", if closed { "closed" } else { "open" });
        Ok(())
    }

    pub fn toggle(&mut self) -> GpioResult<()> {
        self.set(!self.closed)
    }
}

impl Debug for Relay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Relay({:?}, closed: {})", self.output, self.closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockOutput, MockPwmPin, trace};

    #[test]
    fn drive_sets_direction_and_duty() {
        let trace = trace();
        let forward = MockOutput::new("in1", &trace);
        let backward = MockOutput::new("in2", &trace);
        let mut pwm = MockPwmPin::default();
        {
            let mut motor = DcMotor::new(&forward, &backward, &mut pwm).unwrap();
            motor.drive(-0.5).unwrap();
            assert_eq!(forward.last(), Some(false));
            assert_eq!(backward.last(), Some(true));

            motor.drive(1.0).unwrap();
            assert_eq!(forward.last(), Some(true));
            assert_eq!(backward.last(), Some(false));
            assert_eq!(motor.drive(1.5), Err(GpioError::InvalidArgument));
        }

        // Dropping the motor stops it.
        assert_eq!(forward.last(), Some(false));
        assert_eq!(backward.last(), Some(false));
        assert_eq!(pwm.duty_ns, 0);
        assert_eq!(pwm.period_ns, 1_000_000);
    }

    #[test]
    fn half_speed_is_half_duty() {
        let trace = trace();
        let forward = MockOutput::new("in1", &trace);
        let backward = MockOutput::new("in2", &trace);
        let mut pwm = MockPwmPin::default();
        {
            let mut motor = DcMotor::new(&forward, &backward, &mut pwm).unwrap();
            motor.drive(0.5).unwrap();
            assert_eq!(motor.enable.duty_ns(), Ok(500_000));
            motor.hold(Duration::from_millis(200)).unwrap();
        }

        assert_eq!(pwm.held, Duration::from_millis(200));
    }

    #[test]
    fn relay_toggles() {
        let trace = trace();
        let output = MockOutput::new("relay", &trace);
        let mut relay = Relay::new(&output).unwrap();

        relay.toggle().unwrap();
        assert!(relay.is_closed());
        relay.toggle().unwrap();
        assert!(!relay.is_closed());
        assert_eq!(output.history(), [false, true, false]);
    }
}
