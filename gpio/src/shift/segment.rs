use crate::shift::ShiftRegister;
use crate::{GpioBusOutput, GpioError, GpioResult};
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;

/// Segment codes for a common-anode display wired `DP G F E D C B A` from Q7 to Q0.
///
/// Segments light up on a low output.
pub struct SevenSegment;

impl SevenSegment {
    pub const FONT: [u8; 16] = [
        0xC0, 0xF9, 0xA4, 0xB0, 0x99, 0x92, 0x82, 0xF8, // 0-7
        0x80, 0x90, 0x88, 0x83, 0xC6, 0xA1, 0x86, 0x8E, // 8-F
    ];
    pub const BLANK: u8 = 0xFF;

    /// Code of a single hexadecimal digit.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `digit` is above `0xF`.
    pub fn digit(digit: u8) -> GpioResult<u8> {
        Self::FONT
            .get(digit as usize)
            .copied()
            .ok_or(GpioError::InvalidArgument)
    }

    /// Adds the decimal point to a segment code.
    pub fn with_dot(code: u8) -> u8 {
        code & 0x7F
    }
}

/// Four seven-segment digits sharing one shift register, multiplexed through their common anodes.
///
/// The select bus lists the digits from the most significant one, and must be configured so
/// that an active value selects the digit (the kit drives them through PNP transistors, so
/// that is active low).
pub struct MultiplexedDisplay<'a> {
    register: &'a ShiftRegister<'a>,
    digits: &'a dyn GpioBusOutput<4>,
    pub dwell: Duration,
}

impl<'a> MultiplexedDisplay<'a> {
    pub fn new(register: &'a ShiftRegister<'a>, digits: &'a dyn GpioBusOutput<4>) -> Self {
        MultiplexedDisplay {
            register,
            digits,
            dwell: Duration::from_millis(3),
        }
    }

    /// Runs one refresh pass showing the last four decimal digits of `number`.
    ///
    /// Each digit is lit for [Self::dwell], so this has to be called in a loop to keep the
    /// whole number visible.
    pub fn show(&self, number: u32) -> GpioResult<()> {
        let mut rest = number;
        for position in (0..4).rev() {
            // Blank first, or the previous digit ghosts onto the newly selected one.
            self.register.write(&[SevenSegment::BLANK])?;

            let mut select = [false; 4];
            select[position] = true;
            self.digits.write(&select)?;

            self.register.write(&[SevenSegment::FONT[(rest % 10) as usize]])?;
            rest /= 10;
            sleep(self.dwell);
        }
        Ok(())
    }

    /// Turns every digit off.
    pub fn clear(&self) -> GpioResult<()> {
        self.register.write(&[SevenSegment::BLANK])?;
        self.digits.write(&[false; 4])
    }
}

impl Debug for MultiplexedDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MultiplexedDisplay({:?}, {:?})", self.register, self.digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, MockOutput, clocked_bits, msb_first_bytes, trace};

    #[test]
    fn digit_codes() {
        assert_eq!(SevenSegment::digit(0), Ok(0xC0));
        assert_eq!(SevenSegment::digit(0xF), Ok(0x8E));
        assert_eq!(SevenSegment::digit(16), Err(GpioError::InvalidArgument));
        assert_eq!(SevenSegment::with_dot(0xC0), 0x40);
    }

    #[test]
    fn refresh_pass_starts_with_units() {
        let trace = trace();
        let (data, clock, latch) = (
            MockOutput::new("data", &trace),
            MockOutput::new("clock", &trace),
            MockOutput::new("latch", &trace),
        );
        let register = ShiftRegister::new(&data, &clock, &latch);
        let digits = MockBus::<4>::default();
        let mut display = MultiplexedDisplay::new(&register, &digits);
        display.dwell = Duration::ZERO;

        display.show(1234).unwrap();

        assert_eq!(
            digits.history(),
            [
                [false, false, false, true],
                [false, false, true, false],
                [false, true, false, false],
                [true, false, false, false],
            ]
        );
        let bytes = msb_first_bytes(&clocked_bits(&trace, "data", "clock"));
        assert_eq!(bytes, [0xFF, 0x99, 0xFF, 0xB0, 0xFF, 0xA4, 0xFF, 0xF9]);
    }
}
