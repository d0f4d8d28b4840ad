use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver, LcdGeometry};
use crate::{GpioBus, GpioError, GpioOutput, GpioResult};
use log::trace;
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug)]
pub enum GpioHD44780Bus<'a> {
    Bus8Bit(&'a mut dyn GpioBus<8>),
    Bus4Bit(&'a mut dyn GpioBus<4>),
}

impl GpioHD44780Bus<'_> {
    pub fn is_8bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus8Bit(_))
    }
}

/// HD44780 wired straight to GPIO pins, with a 4 or 8 bit data bus.
///
/// RW is optional; when it is tied to ground, reads fail with `NotSupported`.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: GpioHD44780Bus<'a>,
    geometry: LcdGeometry,
}

impl<'a> GpioHD44780Driver<'a> {
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<4>,
        geometry: LcdGeometry,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus4Bit(data_bus),
            geometry,
        }
    }

    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<8>,
        geometry: LcdGeometry,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus8Bit(data_bus),
            geometry,
        }
    }

    fn pulse_e(pin: &dyn GpioOutput) -> GpioResult<()> {
        pin.write(true)?;
        sleep(Duration::from_micros(1));
        pin.write(false)?;
        sleep(Duration::from_millis(1));
        Ok(())
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        self.pin_rs.write(rs)?;
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }

        match &mut self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                let bus = bus.as_output()?;
                bus.write_byte(data)?;
                Self::pulse_e(self.pin_e)?;
            }
            GpioHD44780Bus::Bus4Bit(bus) => {
                let bus = bus.as_output()?;
                bus.write_nibble(data >> 4)?;
                Self::pulse_e(self.pin_e)?;
                bus.write_nibble(data & 0x0F)?;
                Self::pulse_e(self.pin_e)?;
            }
        }

        // Clear and home take up to 1.52 ms.
        if !rs && data <= 0b11 {
            sleep(Duration::from_millis(2));
        }

        Ok(())
    }

    fn strobe(pin_e: &dyn GpioOutput, read: impl FnOnce() -> GpioResult<u8>) -> GpioResult<u8> {
        pin_e.write(true)?;
        sleep(Duration::from_micros(1));
        let data = read()?;
        pin_e.write(false)?;
        sleep(Duration::from_micros(1));
        Ok(data)
    }

    fn read(&mut self, rs: bool) -> GpioResult<u8> {
        let Some(rw) = self.pin_rw else {
            return Err(GpioError::NotSupported);
        };

        self.pin_rs.write(rs)?;
        rw.write(true)?;
        sleep(Duration::from_micros(1));

        let pin_e = self.pin_e;
        let data = match &mut self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                let input = bus.as_input()?;
                Self::strobe(pin_e, || input.read_byte())?
            }
            GpioHD44780Bus::Bus4Bit(bus) => {
                let input = bus.as_input()?;
                let high_nibble = Self::strobe(pin_e, || input.read_nibble())?;
                let low_nibble = Self::strobe(pin_e, || input.read_nibble())?;
                (high_nibble << 4) | low_nibble
            }
        };

        rw.write(false)?;

        trace!("Read data: {:08b}, RS: {}", data, rs);
        Ok(data)
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    fn init(&mut self) -> GpioResult<()> {
        // Synchronize
        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(_) => {
                self.send(0b00111000, false)?;
                self.send(0b00111000, false)?;
                self.send(0b00111000, false)?;
            }
            GpioHD44780Bus::Bus4Bit(_) => {
                self.send(0b00110011, false)?;
                self.send(0b00110010, false)?;
            }
        }
        self.function_set(self.data_bus.is_8bit(), self.geometry.rows > 1, false)?;
        self.set_display_control(true, false, false)?;
        self.clear_display()?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        Ok(())
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
        self.read(false)
    }

    fn read_data(&mut self) -> GpioResult<u8> {
        self.read(true)
    }
}
