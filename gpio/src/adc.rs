//! 8-bit I2C analog-to-digital converters shipped with the kit.
//!
//! Older kits come with a PCF8591, newer ones with an ADS7830. Both read back a single byte
//! per conversion, so [detect] picks whichever is present and the rest of the code does not care.
use crate::i2c::{I2cBus, I2cDevice};
use crate::{GpioError, GpioResult};
use log::{debug, trace};
use std::fmt::Debug;

pub trait AdcDevice: Debug {
    fn channel_count(&self) -> u8;

    /// Converts the given channel, returning a value in `0..=255`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the channel does not exist.
    fn analog_read(&mut self, channel: u8) -> GpioResult<u8>;
}

/// NXP PCF8591: 4 inputs, 1 output.
#[derive(Debug)]
pub struct Pcf8591 {
    device: Box<dyn I2cDevice>,
}

impl Pcf8591 {
    pub const ADDRESS: u16 = 0x48;
    const CONTROL: u8 = 0x40;

    pub fn new(device: Box<dyn I2cDevice>) -> Self {
        Pcf8591 { device }
    }

    /// Sets the DAC output (AOUT pin).
    pub fn analog_write(&mut self, value: u8) -> GpioResult<()> {
        self.device.write_byte_data(Self::CONTROL, value)
    }
}

impl AdcDevice for Pcf8591 {
    fn channel_count(&self) -> u8 {
        4
    }

    fn analog_read(&mut self, channel: u8) -> GpioResult<u8> {
        if channel >= self.channel_count() {
            return Err(GpioError::InvalidArgument);
        }

        // A read returns the conversion started by the previous one.
        let command = Self::CONTROL + channel;
        self.device.read_byte_data(command)?;
        let value = self.device.read_byte_data(command)?;
        trace!("PCF8591 A{} = {}", channel, value);
        Ok(value)
    }
}

/// TI ADS7830: 8 single-ended inputs.
#[derive(Debug)]
pub struct Ads7830 {
    device: Box<dyn I2cDevice>,
}

impl Ads7830 {
    pub const ADDRESS: u16 = 0x4B;

    pub fn new(device: Box<dyn I2cDevice>) -> Self {
        Ads7830 { device }
    }

    /// Single-ended mode, internal reference off, converter on.
    /// The channel select bits interleave odd and even inputs.
    fn command(channel: u8) -> u8 {
        0x84 | (((channel << 2 | channel >> 1) & 0x07) << 4)
    }
}

impl AdcDevice for Ads7830 {
    fn channel_count(&self) -> u8 {
        8
    }

    fn analog_read(&mut self, channel: u8) -> GpioResult<u8> {
        if channel >= self.channel_count() {
            return Err(GpioError::InvalidArgument);
        }

        let value = self.device.read_byte_data(Self::command(channel))?;
        trace!("ADS7830 A{} = {}", channel, value);
        Ok(value)
    }
}

/// Finds whichever ADC is on the bus.
///
/// # Errors
/// - `GpioError::NotFound` if neither chip answers.
pub fn detect(bus: &dyn I2cBus) -> GpioResult<Box<dyn AdcDevice>> {
    if bus.probe(Pcf8591::ADDRESS) {
        debug!("Found PCF8591 at {:#04x}", Pcf8591::ADDRESS);
        return Ok(Box::new(Pcf8591::new(bus.open(Pcf8591::ADDRESS)?)));
    }
    if bus.probe(Ads7830::ADDRESS) {
        debug!("Found ADS7830 at {:#04x}", Ads7830::ADDRESS);
        return Ok(Box::new(Ads7830::new(bus.open(Ads7830::ADDRESS)?)));
    }
    Err(GpioError::NotFound)
}

/// Converts a raw reading to volts for the given reference voltage.
pub fn to_voltage(value: u8, vref: f64) -> f64 {
    value as f64 / 255.0 * vref
}

/// Temperature of the kit's 10 kΩ NTC thermistor, wired as the low side of a divider with a
/// 10 kΩ resistor on 3.3 V.
pub fn thermistor_celsius(value: u8) -> f64 {
    const B: f64 = 3950.0;
    const T0: f64 = 273.15 + 25.0;
    const VCC: f64 = 3.3;
    const R0: f64 = 10.0;

    let voltage = to_voltage(value, VCC).clamp(0.001, VCC - 0.001);
    let resistance = R0 * voltage / (VCC - voltage);
    let kelvin = 1.0 / (1.0 / T0 + (resistance / R0).ln() / B);
    kelvin - 273.15
}

/// Linearly maps `value` from one range onto another.
pub fn map_range(value: f64, from_low: f64, from_high: f64, to_low: f64, to_high: f64) -> f64 {
    (to_high - to_low) * (value - from_low) / (from_high - from_low) + to_low
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{I2cOp, MockI2cBus};

    #[test]
    fn pcf8591_discards_stale_conversion() {
        let bus = MockI2cBus::with_devices(&[0x48]);
        bus.respond(0x48, &[12, 200]);
        let mut adc = detect(&bus).unwrap();
        bus.clear_ops();

        assert_eq!(adc.channel_count(), 4);
        assert_eq!(adc.analog_read(2).unwrap(), 200);
        assert_eq!(
            bus.ops(),
            [I2cOp::ReadByteData(0x48, 0x42), I2cOp::ReadByteData(0x48, 0x42)]
        );
    }

    #[test]
    fn ads7830_interleaves_channel_bits() {
        assert_eq!(Ads7830::command(0), 0x84);
        assert_eq!(Ads7830::command(1), 0xC4);
        assert_eq!(Ads7830::command(2), 0x94);
        assert_eq!(Ads7830::command(7), 0xF4);
    }

    #[test]
    fn detect_falls_back_to_ads7830() {
        let bus = MockI2cBus::with_devices(&[0x4B]);
        bus.respond(0x4B, &[77]);
        let mut adc = detect(&bus).unwrap();

        assert_eq!(adc.channel_count(), 8);
        assert_eq!(adc.analog_read(0).unwrap(), 77);
        assert_eq!(adc.analog_read(8), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn detect_without_adc_fails() {
        let bus = MockI2cBus::with_devices(&[0x27]);
        assert_eq!(detect(&bus).err(), Some(GpioError::NotFound));
    }

    #[test]
    fn thermistor_reads_room_temperature_at_midpoint() {
        let celsius = thermistor_celsius(128);
        assert!((celsius - 25.0).abs() < 0.5, "{}", celsius);
        assert!(thermistor_celsius(100) > thermistor_celsius(150));
    }

    #[test]
    fn helpers() {
        assert_eq!(to_voltage(255, 3.3), 3.3);
        assert_eq!(map_range(127.5, 0.0, 255.0, 0.0, 100.0), 50.0);
    }
}
