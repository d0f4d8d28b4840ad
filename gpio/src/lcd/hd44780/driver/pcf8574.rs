use crate::i2c::{I2cBus, I2cDevice};
use crate::lcd::hd44780::driver::{HD44780Driver, LcdGeometry};
use crate::{GpioError, GpioResult};
use log::{debug, trace};
use std::thread::sleep;
use std::time::Duration;

/// HD44780 behind a PCF8574 I/O expander (the usual I2C "backpack").
///
/// The expander's port drives the LCD in 4-bit mode:
/// P0 = RS, P1 = RW, P2 = E, P3 = backlight, P4..P7 = D4..D7.
/// RW is kept low, so nothing can be read back.
#[derive(Debug)]
pub struct Pcf8574HD44780Driver {
    device: Box<dyn I2cDevice>,
    geometry: LcdGeometry,
    backlight: bool,
}

impl Pcf8574HD44780Driver {
    pub const PCF8574_ADDRESS: u16 = 0x27;
    pub const PCF8574A_ADDRESS: u16 = 0x3F;

    const RS: u8 = 1 << 0;
    const EN: u8 = 1 << 2;
    const BACKLIGHT: u8 = 1 << 3;

    pub fn new(device: Box<dyn I2cDevice>, geometry: LcdGeometry) -> Self {
        Pcf8574HD44780Driver {
            device,
            geometry,
            backlight: true,
        }
    }

    /// Opens the backpack at whichever of the two expander addresses answers.
    ///
    /// # Errors
    /// - `GpioError::NotFound` if neither 0x27 nor 0x3F acknowledges.
    pub fn detect(bus: &dyn I2cBus, geometry: LcdGeometry) -> GpioResult<Self> {
        let address = [Self::PCF8574_ADDRESS, Self::PCF8574A_ADDRESS]
            .into_iter()
            .find(|&address| bus.probe(address))
            .ok_or(GpioError::NotFound)?;

        debug!("Found LCD backpack at {:#04x}", address);
        Ok(Self::new(bus.open(address)?, geometry))
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    pub fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        self.backlight = on;
        self.write_port(0)
    }

    fn write_port(&mut self, value: u8) -> GpioResult<()> {
        let value = if self.backlight {
            value | Self::BACKLIGHT
        } else {
            value & !Self::BACKLIGHT
        };
        self.device.write_byte(value)
    }

    fn write_nibble(&mut self, nibble: u8, rs: bool) -> GpioResult<()> {
        let mut value = nibble << 4;
        if rs {
            value |= Self::RS;
        }
        self.write_port(value | Self::EN)?;
        self.write_port(value)?;
        sleep(Duration::from_micros(50));
        Ok(())
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("{:?} {} {:#04x}", self.device, if rs { "data" } else { "command" }, data);
        self.write_nibble(data >> 4, rs)?;
        self.write_nibble(data & 0x0F, rs)?;

        // Clear and home take up to 1.52 ms.
        if !rs && data <= 0b11 {
            sleep(Duration::from_millis(2));
        }
        Ok(())
    }
}

impl HD44780Driver for Pcf8574HD44780Driver {
    fn init(&mut self) -> GpioResult<()> {
        // Resynchronize to 8-bit mode, then switch to 4-bit mode.
        self.send_command(0x33)?;
        sleep(Duration::from_millis(5));
        self.send_command(0x32)?;
        sleep(Duration::from_millis(5));
        self.function_set(false, self.geometry.rows > 1, false)?;
        self.set_display_control(true, false, false)?;
        self.clear_display()?;
        self.write_port(0)
    }

    fn geometry(&self) -> LcdGeometry {
        self.geometry
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }

    fn read_command(&mut self) -> GpioResult<u8> {
        Err(GpioError::NotSupported)
    }

    fn read_data(&mut self) -> GpioResult<u8> {
        Err(GpioError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{I2cOp, MockI2cBus};

    fn written(bus: &MockI2cBus) -> Vec<u8> {
        bus.ops()
            .into_iter()
            .filter_map(|op| match op {
                I2cOp::WriteByte(_, value) => Some(value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn detect_prefers_pcf8574_address() {
        let bus = MockI2cBus::with_devices(&[0x27, 0x3F]);
        let lcd = Pcf8574HD44780Driver::detect(&bus, LcdGeometry::LCD1602).unwrap();
        assert_eq!(lcd.device.address(), 0x27);
    }

    #[test]
    fn detect_falls_back_to_pcf8574a() {
        let bus = MockI2cBus::with_devices(&[0x3F]);
        let lcd = Pcf8574HD44780Driver::detect(&bus, LcdGeometry::LCD1602).unwrap();
        assert_eq!(lcd.device.address(), 0x3F);
    }

    #[test]
    fn data_byte_is_framed_as_two_strobed_nibbles() {
        let bus = MockI2cBus::with_devices(&[0x27]);
        let mut lcd = Pcf8574HD44780Driver::new(bus.open(0x27).unwrap(), LcdGeometry::LCD1602);

        lcd.send_data(b'H').unwrap();
        assert_eq!(written(&bus), [0x4D, 0x49, 0x8D, 0x89]);
    }

    #[test]
    fn backlight_off_clears_bit_3() {
        let bus = MockI2cBus::with_devices(&[0x27]);
        let mut lcd = Pcf8574HD44780Driver::new(bus.open(0x27).unwrap(), LcdGeometry::LCD1602);

        lcd.set_backlight(false).unwrap();
        lcd.send_command(0x80).unwrap();
        assert_eq!(written(&bus), [0x00, 0x84, 0x80, 0x04, 0x00]);
    }

    #[test]
    fn init_sends_the_4_bit_sequence() {
        let bus = MockI2cBus::with_devices(&[0x27]);
        let mut lcd = Pcf8574HD44780Driver::new(bus.open(0x27).unwrap(), LcdGeometry::LCD1602);
        lcd.init().unwrap();

        // Only the falling-edge writes latch a nibble.
        let nibbles: Vec<u8> = written(&bus)
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| pair[1] >> 4)
            .collect();
        assert_eq!(
            nibbles,
            [0x3, 0x3, 0x3, 0x2, 0x2, 0x8, 0x0, 0xC, 0x0, 0x1]
        );
        assert_eq!(written(&bus).last(), Some(&0x08));
    }
}
