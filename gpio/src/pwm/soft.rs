use crate::pwm::{PwmPin, PwmPolarity};
use crate::{GpioError, GpioOutput, GpioResult};
use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// PWM bit-banged on a plain GPIO output.
///
/// Nothing runs in the background: the waveform is only generated while [PwmPin::hold] is
/// executing, so callers keep calling `hold` from their polling loop. Outside of `hold` the
/// output keeps the last level written.
///
/// The level is derived from the time elapsed since the pin was enabled, not from the start of
/// each `hold`. Several pins can thus share a thread by holding in short turns (see
/// [crate::rgb::RgbLed::hold]); each one only lags by the length of the other turns.
pub struct SoftPwmPin<'a> {
    output: &'a dyn GpioOutput,
    period_ns: u32,
    duty_ns: u32,
    polarity: PwmPolarity,
    enabled: bool,
    epoch: Instant,
    level: Cell<Option<bool>>,
}

impl<'a> SoftPwmPin<'a> {
    /// 100 Hz, a good compromise between flicker and scheduler jitter.
    pub const DEFAULT_PERIOD_NS: u32 = 10_000_000;

    pub fn new(output: &'a dyn GpioOutput) -> Self {
        SoftPwmPin {
            output,
            period_ns: Self::DEFAULT_PERIOD_NS,
            duty_ns: 0,
            polarity: PwmPolarity::Normal,
            enabled: false,
            epoch: Instant::now(),
            level: Cell::new(None),
        }
    }

    fn write_level(&self, active: bool) -> GpioResult<()> {
        let level = match self.polarity {
            PwmPolarity::Normal => active,
            PwmPolarity::Inversed => !active,
        };
        if self.level.get() != Some(level) {
            self.output.write(level)?;
            self.level.set(Some(level));
        }
        Ok(())
    }

    /// Whether the waveform is active at `now`, and how long until it flips.
    fn phase(&self, now: Instant) -> (bool, Duration) {
        let period = u128::from(self.period_ns);
        let duty = u128::from(self.duty_ns);
        let phase = now.duration_since(self.epoch).as_nanos() % period;
        if phase < duty {
            (true, Duration::from_nanos((duty - phase) as u64))
        } else {
            (false, Duration::from_nanos((period - phase) as u64))
        }
    }
}

impl Debug for SoftPwmPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftPwmPin({:?})", self.output)
    }
}

impl PwmPin for SoftPwmPin<'_> {
    fn period_ns(&self) -> GpioResult<u32> {
        Ok(self.period_ns)
    }

    fn set_period_ns(&mut self, period_ns: u32) -> GpioResult<()> {
        if period_ns == 0 || period_ns < self.duty_ns {
            return Err(GpioError::InvalidArgument);
        }
        self.period_ns = period_ns;
        Ok(())
    }

    fn duty_ns(&self) -> GpioResult<u32> {
        Ok(self.duty_ns)
    }

    fn set_duty_ns(&mut self, duty_ns: u32) -> GpioResult<()> {
        if duty_ns > self.period_ns {
            return Err(GpioError::InvalidArgument);
        }
        self.duty_ns = duty_ns;
        Ok(())
    }

    fn polarity(&self) -> GpioResult<PwmPolarity> {
        Ok(self.polarity)
    }

    fn set_polarity(&mut self, polarity: PwmPolarity) -> GpioResult<()> {
        self.polarity = polarity;
        Ok(())
    }

    fn is_enabled(&self) -> GpioResult<bool> {
        Ok(self.enabled)
    }

    fn enable(&mut self) -> GpioResult<()> {
        if !self.enabled {
            self.epoch = Instant::now();
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> GpioResult<()> {
        self.enabled = false;
        self.write_level(false)
    }

    fn hold(&mut self, duration: Duration) -> GpioResult<()> {
        if !self.enabled || self.duty_ns == 0 {
            self.write_level(false)?;
            sleep(duration);
            return Ok(());
        }
        if self.duty_ns == self.period_ns {
            self.write_level(true)?;
            sleep(duration);
            return Ok(());
        }

        let end = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            let (active, until_edge) = self.phase(now);
            self.write_level(active)?;
            sleep(until_edge.min(end - now));
        }
    }
}

impl Drop for SoftPwmPin<'_> {
    fn drop(&mut self) {
        _ = self.write_level(false);
    }
}
