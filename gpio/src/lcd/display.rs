use crate::GpioResult;
use crate::lcd::hd44780::driver::HD44780Driver;
use log::warn;

/// Text output on top of any [HD44780Driver].
pub trait CharacterDisplay {
    /// Writes `s` at the cursor. Characters outside ASCII are shown as `?`.
    fn print(&mut self, s: &str) -> GpioResult<()>;

    /// Moves the cursor, clamping both coordinates to the display size.
    fn set_cursor(&mut self, col: u8, row: u8) -> GpioResult<()>;

    fn columns(&self) -> u8;

    fn write_at(&mut self, col: u8, row: u8, s: &str) -> GpioResult<()> {
        self.set_cursor(col, row)?;
        self.print(s)
    }

    /// Replaces the whole of `row` with `s`, padded with spaces or cut to the display width.
    fn write_line(&mut self, row: u8, s: &str) -> GpioResult<()> {
        let line: String = s
            .chars()
            .chain(std::iter::repeat(' '))
            .take(self.columns() as usize)
            .collect();
        self.write_at(0, row, &line)
    }
}

impl<T: ?Sized + HD44780Driver> CharacterDisplay for T {
    fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars() {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?;
            }
        }
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> GpioResult<()> {
        let address = self.geometry().ddram_address(col, row);
        self.set_ddram_address(address)
    }

    fn columns(&self) -> u8 {
        self.geometry().columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::driver::LcdGeometry;

    #[derive(Debug, Default)]
    struct RecordingLcd {
        geometry: Option<LcdGeometry>,
        commands: Vec<u8>,
        data: Vec<u8>,
    }

    impl HD44780Driver for RecordingLcd {
        fn init(&mut self) -> GpioResult<()> {
            Ok(())
        }

        fn geometry(&self) -> LcdGeometry {
            self.geometry.unwrap_or(LcdGeometry::LCD1602)
        }

        fn send_command(&mut self, command: u8) -> GpioResult<()> {
            self.commands.push(command);
            Ok(())
        }

        fn send_data(&mut self, data: u8) -> GpioResult<()> {
            self.data.push(data);
            Ok(())
        }

        fn read_command(&mut self) -> GpioResult<u8> {
            Ok(0)
        }

        fn read_data(&mut self) -> GpioResult<u8> {
            Ok(0)
        }
    }

    #[test]
    fn non_ascii_is_replaced() {
        let mut lcd = RecordingLcd::default();
        lcd.print("25°C").unwrap();
        assert_eq!(lcd.data, b"25?C");
    }

    #[test]
    fn write_at_positions_then_prints() {
        let mut lcd = RecordingLcd::default();
        lcd.write_at(4, 1, "ok").unwrap();
        assert_eq!(lcd.commands, [0x80 | 0x44]);
        assert_eq!(lcd.data, b"ok");
    }

    #[test]
    fn cursor_is_clamped_to_the_grid() {
        let mut lcd = RecordingLcd::default();
        let display: &mut dyn HD44780Driver = &mut lcd;
        display.set_cursor(30, 9).unwrap();
        assert_eq!(lcd.commands, [0x80 | 0x4F]);
    }

    #[test]
    fn write_line_fills_the_configured_width() {
        let mut lcd = RecordingLcd {
            geometry: Some(LcdGeometry::LCD2004),
            ..Default::default()
        };
        lcd.write_line(2, "CPU: 48.31C").unwrap();
        assert_eq!(lcd.commands, [0x80 | 20]);
        assert_eq!(lcd.data, b"CPU: 48.31C         ");
    }

    #[test]
    fn write_line_cuts_long_text() {
        let mut lcd = RecordingLcd::default();
        lcd.write_line(0, "0123456789abcdefXYZ").unwrap();
        assert_eq!(lcd.data, b"0123456789abcdef");
    }
}
