use crate::shift::ShiftRegister;
use crate::GpioResult;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// One 8x8 image, one byte per column from left to right, MSb at the top row.
pub type Frame = [u8; 8];

/// An 8x8 LED matrix on two chained shift registers: the first holds the row pattern,
/// the second selects the column (active low).
pub struct LedMatrix<'a> {
    register: &'a ShiftRegister<'a>,
    pub column_time: Duration,
}

impl<'a> LedMatrix<'a> {
    pub const SMILEY: Frame = [0x1C, 0x22, 0x51, 0x45, 0x45, 0x51, 0x22, 0x1C];

    pub fn new(register: &'a ShiftRegister<'a>) -> Self {
        LedMatrix {
            register,
            column_time: Duration::from_millis(1),
        }
    }

    /// Scans `frame` once, column by column.
    pub fn show(&self, frame: &Frame) -> GpioResult<()> {
        let mut column = 0x80u8;
        for &rows in frame {
            self.register.write(&[rows, !column])?;
            sleep(self.column_time);
            column >>= 1;
        }
        Ok(())
    }

    /// Keeps scanning `frame` for `duration`.
    pub fn show_for(&self, frame: &Frame, duration: Duration) -> GpioResult<()> {
        let start = Instant::now();
        while start.elapsed() < duration {
            self.show(frame)?;
        }
        Ok(())
    }

    /// Turns every LED off.
    pub fn clear(&self) -> GpioResult<()> {
        self.register.write(&[0x00, 0xFF])
    }
}

impl Debug for LedMatrix<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedMatrix({:?})", self.register)
    }
}

/// The columns of a 5-pixel-high font for the hex digits, 8 columns per glyph, space first.
const GLYPHS: [Frame; 17] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // " "
    [0x00, 0x00, 0x3E, 0x41, 0x41, 0x3E, 0x00, 0x00], // "0"
    [0x00, 0x00, 0x21, 0x7F, 0x01, 0x00, 0x00, 0x00], // "1"
    [0x00, 0x00, 0x23, 0x45, 0x49, 0x31, 0x00, 0x00], // "2"
    [0x00, 0x00, 0x22, 0x49, 0x49, 0x36, 0x00, 0x00], // "3"
    [0x00, 0x00, 0x0E, 0x32, 0x7F, 0x02, 0x00, 0x00], // "4"
    [0x00, 0x00, 0x79, 0x49, 0x49, 0x46, 0x00, 0x00], // "5"
    [0x00, 0x00, 0x3E, 0x49, 0x49, 0x26, 0x00, 0x00], // "6"
    [0x00, 0x00, 0x60, 0x47, 0x48, 0x70, 0x00, 0x00], // "7"
    [0x00, 0x00, 0x36, 0x49, 0x49, 0x36, 0x00, 0x00], // "8"
    [0x00, 0x00, 0x32, 0x49, 0x49, 0x3E, 0x00, 0x00], // "9"
    [0x00, 0x00, 0x3F, 0x44, 0x44, 0x3F, 0x00, 0x00], // "A"
    [0x00, 0x00, 0x7F, 0x49, 0x49, 0x36, 0x00, 0x00], // "B"
    [0x00, 0x00, 0x3E, 0x41, 0x41, 0x22, 0x00, 0x00], // "C"
    [0x00, 0x00, 0x7F, 0x41, 0x41, 0x3E, 0x00, 0x00], // "D"
    [0x00, 0x00, 0x7F, 0x49, 0x49, 0x41, 0x00, 0x00], // "E"
    [0x00, 0x00, 0x7F, 0x48, 0x48, 0x40, 0x00, 0x00], // "F"
];

/// The glyph of a space or a hexadecimal digit.
pub fn glyph(c: char) -> Option<Frame> {
    match c {
        ' ' => Some(GLYPHS[0]),
        _ => c.to_digit(16).map(|digit| GLYPHS[digit as usize + 1]),
    }
}

/// Lays out the glyphs of `text` side by side. Unsupported characters are skipped.
pub fn text_strip(text: &str) -> Vec<u8> {
    text.chars().filter_map(glyph).flatten().collect()
}

/// The 8-column windows of `strip`, moving one column at a time.
///
/// The window ending on the last column is left out, so a strip padded with a trailing space
/// does not end on a blank frame.
pub fn scroll(strip: &[u8]) -> impl Iterator<Item = Frame> + '_ {
    strip
        .windows(8)
        .take(strip.len().saturating_sub(8))
        .filter_map(|window| window.try_into().ok())
}
