//! 74HC595 serial-in, parallel-out shift registers and the displays the kit drives with them.
mod matrix;
mod segment;

use crate::{GpioOutput, GpioResult};
use log::trace;
use std::fmt::{Debug, Formatter};

pub use matrix::*;
pub use segment::*;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BitOrder {
    LsbFirst,
    #[default]
    MsbFirst,
}

/// One or more chained 74HC595s on three GPIO outputs.
///
/// Pins of the chip: DS (data, 14), SH_CP (shift clock, 11), ST_CP (latch, 12).
pub struct ShiftRegister<'a> {
    data: &'a dyn GpioOutput,
    clock: &'a dyn GpioOutput,
    latch: &'a dyn GpioOutput,
    bit_order: BitOrder,
}

impl<'a> ShiftRegister<'a> {
    pub fn new(data: &'a dyn GpioOutput, clock: &'a dyn GpioOutput, latch: &'a dyn GpioOutput) -> Self {
        ShiftRegister {
            data,
            clock,
            latch,
            bit_order: BitOrder::MsbFirst,
        }
    }

    pub fn with_bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }

    /// Clocks one byte into the register without latching it.
    pub fn shift_out(&self, order: BitOrder, value: u8) -> GpioResult<()> {
        for i in 0..8 {
            let bit = match order {
                BitOrder::LsbFirst => value >> i & 1,
                BitOrder::MsbFirst => value << i & 0x80,
            };
            self.clock.write(false)?;
            self.data.write(bit != 0)?;
            self.clock.write(true)?;
        }
        Ok(())
    }

    /// Shifts `bytes` in and latches them to the outputs.
    ///
    /// With chained registers, the first byte ends up in the register farthest from the Pi.
    pub fn write(&self, bytes: &[u8]) -> GpioResult<()> {
        trace!("{:?} <- {:02x?}", self, bytes);
        self.latch.write(false)?;
        for &byte in bytes {
            self.shift_out(self.bit_order, byte)?;
        }
        self.latch.write(true)
    }
}

impl Debug for ShiftRegister<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShiftRegister({:?}, {:?}, {:?})", self.data, self.clock, self.latch)
    }
}
