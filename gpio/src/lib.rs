//! GPIO backends and device drivers for the Raspberry Pi starter kit parts.
//!
//! Everything is built on a few object-safe traits: a [GpioDriver] hands out [GpioPin]s (or
//! [GpioBus]es of several pins), which in turn can be borrowed as [GpioInput] or [GpioOutput].
//! Device drivers (LCD, keypad, shift register, sensors, ...) only depend on those traits, so
//! they work with either backend ([gpiod::GpiodDriver] or [raw::RawGpioDriver]).

pub mod adc;
pub mod buzzer;
pub mod debounce;
pub mod dht;
pub mod gpiod;
pub mod i2c;
pub mod keypad;
pub mod lcd;
pub mod motor;
pub mod pwm;
pub mod raw;
pub mod rgb;
pub mod servo;
pub mod shift;
pub mod stepper;
pub mod ultrasonic;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt::Debug;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("checksum mismatch")]
    Checksum,
    #[error("device not found")]
    NotFound,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("I2C error: {0}")]
    I2c(String),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index (BCM numbering).
    ///
    /// The claim is released when the returned pin is dropped.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;

    /// Claims the GPIO pins at the given indices as a single bus.
    ///
    /// Either all pins get claimed or none of them.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of the GPIO pin.
///
/// By default, the active level is high.
///
/// Might be software-implemented.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default]
    High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the GPIO pin based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default]
    None,
    PullUp,
    PullDown,
}

/// Specifies the drive mode of the GPIO pin.
///
/// Works only in output mode.
///
/// By default, the drive mode is push-pull, which drives the pin high or low with low impedance.
/// There's also open-drain and open-source modes, that leave the pin floating when the output is high or low, respectively.
///
/// Leaving the pin floating might be implemented by setting the pin to input mode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    /// GPIO pin is driven high or low with low impedance.
    #[default]
    PushPull,
    /// GPIO pin is driven low or left floating when high.
    OpenDrain,
    /// GPIO pin is driven high or left floating when low.
    OpenSource,
}

impl GpioDriveMode {
    /// Gets the real state that will be outputted on the GPIO pin based on the drive mode and the value.
    ///
    /// # Returns
    /// - `Some(true)` if the pin will be driven high.
    /// - `Some(false)` if the pin will be driven low.
    /// - `None` if the pin will be left floating.
    pub fn get_state(&self, value: bool) -> Option<bool> {
        match self {
            GpioDriveMode::PushPull => Some(value),
            GpioDriveMode::OpenDrain => (!value).then_some(false),
            GpioDriveMode::OpenSource => value.then_some(true),
        }
    }
}

pub trait GpioPin: Debug {
    /// Sets the GPIO pin function to input, allowing reading its state.
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>>;
    /// Sets the GPIO pin function to output, allowing writing its state.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Gets whether the GPIO pin supports active level.
    fn supports_active_level(&self) -> bool {
        false
    }
    /// Gets the active level of the GPIO pin.
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// Gets whether the GPIO pin supports bias (pull-up/pull-down resistors).
    fn supports_bias(&self) -> bool {
        false
    }
    /// Gets the bias of the GPIO pin.
    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    /// Sets the bias of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support bias.
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// Gets whether the GPIO pin supports drive mode (push-pull, open-drain, open-source).
    fn supports_drive_mode(&self) -> bool {
        false
    }
    /// Gets the drive mode of the GPIO pin.
    fn drive_mode(&self) -> GpioDriveMode {
        GpioDriveMode::PushPull
    }
    /// Sets the drive mode of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support drive mode.
    fn set_drive_mode(&mut self, _mode: GpioDriveMode) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioInput: Debug {
    /// Reads the state of the GPIO pin.
    fn read(&self) -> GpioResult<bool>;
}

impl dyn GpioInput + '_ {
    /// Busy-waits as long as the input reads `level`, returning how long that took.
    ///
    /// # Errors
    /// - `GpioError::Timeout` if the input still reads `level` after `timeout`.
    pub fn wait_while(&self, level: bool, timeout: Duration) -> GpioResult<Duration> {
        let start = Instant::now();
        while self.read()? == level {
            if start.elapsed() > timeout {
                return Err(GpioError::Timeout);
            }
        }
        Ok(start.elapsed())
    }
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBus<const N: usize>: Debug {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>>;
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn supports_active_level(&self) -> bool {
        false
    }
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn supports_bias(&self) -> bool {
        false
    }
    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn supports_drive_mode(&self) -> bool {
        false
    }
    fn drive_mode(&self) -> GpioDriveMode {
        GpioDriveMode::PushPull
    }
    fn set_drive_mode(&mut self, _mode: GpioDriveMode) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioBusInput<const N: usize>: Debug {
    fn read(&self) -> GpioResult<[bool; N]>;
}

impl<const N: usize> dyn GpioBusInput<N> + '_ {
    /// Reads the values of the GPIO pins in the bus, packed LSb first.
    pub fn read_bits(&self) -> GpioResult<u32> {
        let values = self.read()?;
        Ok(pack_bits(&values))
    }
}

impl dyn GpioBusInput<8> + '_ {
    /// Reads the values of the GPIO pins in the bus.
    /// Returns them as a byte, LSb first.
    pub fn read_byte(&self) -> GpioResult<u8> {
        Ok(self.read_bits()? as u8)
    }
}

impl dyn GpioBusInput<4> + '_ {
    /// Reads the values of the GPIO pins in the bus.
    /// Returns them as a nibble, LSb first.
    pub fn read_nibble(&self) -> GpioResult<u8> {
        Ok(self.read_bits()? as u8)
    }
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl<const N: usize> dyn GpioBusOutput<N> + '_ {
    /// Writes the low `N` bits of `value` to the bus, LSb on the first pin.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `value` has bits set above bit `N - 1`.
    pub fn write_bits(&self, value: u32) -> GpioResult<()> {
        if N < 32 && value >> N != 0 {
            return Err(GpioError::InvalidArgument);
        }
        self.write(&unpack_bits(value))
    }
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        self.write_bits(value.into())
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        self.write_bits(value.into())
    }
}

fn pack_bits<const N: usize>(values: &[bool; N]) -> u32 {
    values
        .iter()
        .take(32)
        .enumerate()
        .filter(|&(_, &value)| value)
        .fold(0, |acc, (i, _)| acc | 1 << i)
}

fn unpack_bits<const N: usize>(value: u32) -> [bool; N] {
    let mut values = [false; N];
    for (i, bit) in values.iter_mut().enumerate().take(32) {
        *bit = value & (1 << i) != 0;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, MockInput};

    #[test]
    fn active_low_inverts() {
        assert!(!GpioActiveLevel::Low.get_state(true));
        assert!(GpioActiveLevel::High.get_state(true));
    }

    #[test]
    fn open_drain_floats_when_high() {
        assert_eq!(GpioDriveMode::OpenDrain.get_state(true), None);
        assert_eq!(GpioDriveMode::OpenDrain.get_state(false), Some(false));
        assert_eq!(GpioDriveMode::OpenSource.get_state(false), None);
        assert_eq!(GpioDriveMode::PushPull.get_state(true), Some(true));
    }

    #[test]
    fn wait_while_measures_until_level_changes() {
        let input = MockInput::scripted(&[true, true, true, false]);
        let input: &dyn GpioInput = &input;
        assert!(input.wait_while(true, Duration::from_secs(1)).is_ok());
        assert_eq!(
            input.wait_while(false, Duration::from_millis(1)),
            Err(GpioError::Timeout)
        );
    }

    #[test]
    fn nibble_is_written_lsb_first() {
        let bus = MockBus::<4>::default();
        let output: &dyn GpioBusOutput<4> = &bus;
        output.write_nibble(0b0110).unwrap();
        assert_eq!(bus.last(), [false, true, true, false]);
    }

    #[test]
    fn oversized_nibble_is_rejected() {
        let bus = MockBus::<4>::default();
        let output: &dyn GpioBusOutput<4> = &bus;
        assert_eq!(output.write_nibble(0x1F), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn ten_pin_bus_round_trips_bits() {
        let bus = MockBus::<10>::default();
        let output: &dyn GpioBusOutput<10> = &bus;
        output.write_bits(0b10_0000_0001).unwrap();
        let input: &dyn GpioBusInput<10> = &bus;
        assert_eq!(input.read_bits().unwrap(), 0b10_0000_0001);
    }
}
