mod gpio;
mod pcf8574;

use crate::{GpioError, GpioResult};
pub use gpio::*;
pub use pcf8574::*;
use std::fmt::Debug;

/// Size of the character grid.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LcdGeometry {
    pub columns: u8,
    pub rows: u8,
}

impl LcdGeometry {
    pub const LCD1602: LcdGeometry = LcdGeometry { columns: 16, rows: 2 };
    pub const LCD2004: LcdGeometry = LcdGeometry { columns: 20, rows: 4 };

    /// DDRAM address of the given cell, with both coordinates clamped to the grid.
    ///
    /// Rows 2 and 3 continue rows 0 and 1 right after the last visible column.
    pub fn ddram_address(&self, col: u8, row: u8) -> u8 {
        let col = col.min(self.columns.saturating_sub(1));
        let row = row.min(self.rows.saturating_sub(1));
        let row_offset = match row {
            0 => 0x00,
            1 => 0x40,
            2 => self.columns,
            _ => 0x40 + self.columns,
        };
        row_offset + col
    }
}

pub trait HD44780Driver: Debug {
    /// Runs the power-on initialization sequence, leaving the display cleared, on, with the cursor
    /// hidden and moving right.
    fn init(&mut self) -> GpioResult<()>;

    fn geometry(&self) -> LcdGeometry;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(0b00000001)
    }

    /// Sets the cursor to the home position.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(0b00000010)
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface width, the number of display lines and the font.
    fn function_set(&mut self, eight_bit: bool, two_lines: bool, alt_font: bool) -> GpioResult<()> {
        let mut command = 0b00100000;
        if eight_bit {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if alt_font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b01000000 | address)
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b10000000 | address)
    }

    /// Defines one of the 8 custom characters (codes `0..8`) from 8 rows of 5 pixels.
    fn define_char(&mut self, code: u8, rows: [u8; 8]) -> GpioResult<()> {
        if code > 7 {
            return Err(GpioError::InvalidArgument);
        }
        self.set_cgram_address(code << 3)?;
        for row in rows {
            self.send_data(row & 0b11111)?;
        }
        Ok(())
    }

    /// Reads the busy flag and address counter.
    fn get_busy_flag_and_address(&mut self) -> GpioResult<(bool, u8)> {
        let command = self.read_command()?;
        let busy_flag = command & 0b10000000 != 0;
        let address = command & 0b01111111;
        Ok((busy_flag, address))
    }

    // Low-level commands, implemented by the drivers.

    /// Sends a command to the HD44780 controller (RS low).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller (RS high).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;

    /// Reads the busy flag and address counter packed in one byte.
    /// See [Self::get_busy_flag_and_address].
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the RW line is not wired.
    fn read_command(&mut self) -> GpioResult<u8>;

    /// Reads data from the HD44780 controller (RS high).
    fn read_data(&mut self) -> GpioResult<u8>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}
