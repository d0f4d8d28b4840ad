//! Active and passive buzzers.
use crate::pwm::{PwmExtension, PwmPin};
use crate::{GpioOutput, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// An active buzzer, which beeps at its own frequency whenever powered.
pub struct Buzzer<'a> {
    output: &'a dyn GpioOutput,
}

impl<'a> Buzzer<'a> {
    pub fn new(output: &'a dyn GpioOutput) -> Self {
        Buzzer { output }
    }

    pub fn on(&self) -> GpioResult<()> {
        self.output.write(true)
    }

    pub fn off(&self) -> GpioResult<()> {
        self.output.write(false)
    }

    pub fn set(&self, on: bool) -> GpioResult<()> {
        self.output.write(on)
    }
}

impl Debug for Buzzer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buzzer({:?})", self.output)
    }
}

impl Drop for Buzzer<'_> {
    fn drop(&mut self) {
        _ = self.off();
    }
}

/// A passive buzzer, driven by a square wave of the tone's frequency.
pub struct TonalBuzzer<'a> {
    pwm: &'a mut dyn PwmPin,
    frequency: Option<f64>,
}

impl<'a> TonalBuzzer<'a> {
    pub fn new(pwm: &'a mut dyn PwmPin) -> Self {
        TonalBuzzer {
            pwm,
            frequency: None,
        }
    }

    /// The siren tone at `degrees` of its sine sweep: 2 kHz ± 500 Hz.
    pub fn alert_sweep(degrees: u32) -> f64 {
        2000.0 + 500.0 * f64::from(degrees % 360).to_radians().sin()
    }

    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }

    pub fn play(&mut self, hz: f64) -> GpioResult<()> {
        if self.frequency != Some(hz) {
            trace!("{:?}: {:.0} Hz", self, hz);
            self.pwm.set_frequency(hz)?;
            self.pwm.set_duty_cycle(0.5)?;
            self.frequency = Some(hz);
        }
        self.pwm.enable()
    }

    pub fn stop(&mut self) -> GpioResult<()> {
        self.frequency = None;
        self.pwm.disable()
    }

    /// Keeps the current tone (or silence) for `duration`.
    pub fn hold(&mut self, duration: Duration) -> GpioResult<()> {
        self.pwm.hold(duration)
    }
}

impl Debug for TonalBuzzer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TonalBuzzer({:?})", self.pwm)
    }
}

impl Drop for TonalBuzzer<'_> {
    fn drop(&mut self) {
        _ = self.stop();
    }
}
