//! Four-phase unipolar stepper motor (28BYJ-48) through a ULN2003 driver.
use crate::{GpioBusOutput, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// Drives the coils A, B, C, D (in bus order) one at a time.
///
/// One cycle energizes each coil once. With the 1:64 gearbox, 512 cycles make a full turn
/// of the output shaft.
pub struct Stepper<'a> {
    coils: &'a dyn GpioBusOutput<4>,
}

impl<'a> Stepper<'a> {
    /// Faster stepping makes the motor skip steps.
    pub const MIN_STEP_DELAY: Duration = Duration::from_millis(3);
    pub const CYCLES_PER_TURN: u32 = 512;

    pub fn new(coils: &'a dyn GpioBusOutput<4>) -> Self {
        Stepper { coils }
    }

    fn coil_order(direction: Direction) -> [usize; 4] {
        match direction {
            Direction::Clockwise => [3, 2, 1, 0],
            Direction::CounterClockwise => [0, 1, 2, 3],
        }
    }

    /// Runs one full cycle of four steps, waiting `delay` (at least 3 ms) after each step.
    pub fn step_cycle(&self, direction: Direction, delay: Duration) -> GpioResult<()> {
        let delay = delay.max(Self::MIN_STEP_DELAY);
        for coil in Self::coil_order(direction) {
            let mut phases = [false; 4];
            phases[coil] = true;
            self.coils.write(&phases)?;
            sleep(delay);
        }
        Ok(())
    }

    pub fn step_cycles(&self, direction: Direction, delay: Duration, cycles: u32) -> GpioResult<()> {
        trace!("{:?}: {} cycles {:?}", self, cycles, direction);
        for _ in 0..cycles {
            self.step_cycle(direction, delay)?;
        }
        Ok(())
    }

    /// De-energizes every coil, so the motor neither holds nor heats up.
    pub fn stop(&self) -> GpioResult<()> {
        self.coils.write(&[false; 4])
    }
}

impl Debug for Stepper<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stepper({:?})", self.coils)
    }
}
