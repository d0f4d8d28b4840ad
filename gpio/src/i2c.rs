//! SMBus-style access to I2C peripherals.
use crate::{GpioError, GpioResult};
use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Addresses that are not reserved by the I2C specification.
pub const SCAN_RANGE: RangeInclusive<u16> = 0x03..=0x77;

pub trait I2cBus: Debug {
    /// Opens the device with the given 7-bit address. Opening does not talk to the device.
    fn open(&self, address: u16) -> GpioResult<Box<dyn I2cDevice>>;

    /// Checks whether a device acknowledges at `address` by writing a zero byte to it.
    fn probe(&self, address: u16) -> bool {
        match self.open(address) {
            Ok(mut device) => device.write_byte(0).is_ok(),
            Err(_) => false,
        }
    }

    /// Lists the addresses of every device on the bus.
    fn scan(&self) -> Vec<u16> {
        SCAN_RANGE.filter(|&address| self.probe(address)).collect()
    }
}

pub trait I2cDevice: Debug {
    fn address(&self) -> u16;

    /// Sends a single byte without a register (SMBus "send byte").
    fn write_byte(&mut self, value: u8) -> GpioResult<()>;
    /// Reads a single byte without a register (SMBus "receive byte").
    fn read_byte(&mut self) -> GpioResult<u8>;

    fn read_byte_data(&mut self, register: u8) -> GpioResult<u8>;
    fn write_byte_data(&mut self, register: u8, value: u8) -> GpioResult<()>;
}

/// An I2C bus exposed by the kernel as `/dev/i2c-N`.
pub struct LinuxI2cBus {
    path: PathBuf,
}

impl LinuxI2cBus {
    /// The bus on header pins 3 (SDA) and 5 (SCL).
    pub const DEFAULT_BUS: &'static str = "/dev/i2c-1";

    pub fn new(path: impl Into<PathBuf>) -> GpioResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(GpioError::NotFound);
        }
        debug!("Using I2C bus {:?}", path);
        Ok(LinuxI2cBus { path })
    }
}

impl Debug for LinuxI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cBus({:?})", self.path)
    }
}

impl From<LinuxI2CError> for GpioError {
    fn from(err: LinuxI2CError) -> Self {
        GpioError::I2c(err.to_string())
    }
}

impl I2cBus for LinuxI2cBus {
    fn open(&self, address: u16) -> GpioResult<Box<dyn I2cDevice>> {
        let device = LinuxI2CDevice::new(&self.path, address)?;
        Ok(Box::new(LinuxI2cDevice { address, device }))
    }
}

struct LinuxI2cDevice {
    address: u16,
    device: LinuxI2CDevice,
}

impl Debug for LinuxI2cDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cDevice({:#04x})", self.address)
    }
}

impl I2cDevice for LinuxI2cDevice {
    fn address(&self) -> u16 {
        self.address
    }

    fn write_byte(&mut self, value: u8) -> GpioResult<()> {
        trace!("{:?} <- {:#04x}", self, value);
        Ok(self.device.smbus_write_byte(value)?)
    }

    fn read_byte(&mut self) -> GpioResult<u8> {
        let value = self.device.smbus_read_byte()?;
        trace!("{:?} -> {:#04x}", self, value);
        Ok(value)
    }

    fn read_byte_data(&mut self, register: u8) -> GpioResult<u8> {
        let value = self.device.smbus_read_byte_data(register)?;
        trace!("{:?}[{:#04x}] -> {:#04x}", self, register, value);
        Ok(value)
    }

    fn write_byte_data(&mut self, register: u8, value: u8) -> GpioResult<()> {
        trace!("{:?}[{:#04x}] <- {:#04x}", self, register, value);
        Ok(self.device.smbus_write_byte_data(register, value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{I2cOp, MockI2cBus};

    #[test]
    fn probe_writes_a_zero_byte() {
        let bus = MockI2cBus::with_devices(&[0x48]);
        assert!(bus.probe(0x48));
        assert!(!bus.probe(0x49));
        assert_eq!(bus.ops(), [I2cOp::WriteByte(0x48, 0)]);
    }

    #[test]
    fn scan_lists_present_devices_in_order() {
        let bus = MockI2cBus::with_devices(&[0x4B, 0x27, 0x01]);
        assert_eq!(bus.scan(), [0x27, 0x4B]);
    }
}
