//! GPIO character device backend, built on the gpiod library.
//!
//! This is the default backend. It works on every Raspberry Pi model with a recent kernel,
//! including the Pi 5, and does not need root when the user is in the `gpio` group.
//!
//! Line options (active level, bias, drive mode) are applied by the kernel, so every option
//! of [GpioPin] is supported. Each call of `as_input`/`as_output` issues a new line request;
//! keep the returned handle around instead of re-requesting it in a hot loop.
use crate::{
    GpioActiveLevel, GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioDriveMode, GpioDriver,
    GpioError, GpioInput, GpioOutput, GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::{debug, trace};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    /// The chip exposing the 40-pin header on every model but the Pi 5 with older kernels.
    pub const DEFAULT_CHIP: &'static str = "/dev/gpiochip0";

    pub fn new(chip: gpiod::Chip) -> Self {
        let used_pins = BitVec::repeat(false, chip.num_lines() as usize);
        Self { chip, used_pins }
    }

    /// Opens the GPIO chip character device at `path`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path.as_ref())?;
        debug!("Opened {} ({}), {} lines", chip.name(), chip.label(), chip.num_lines());
        Ok(Self::new(chip))
    }

    /// Marks all of `offsets` as used, or none of them.
    fn claim<const N: usize>(&self, offsets: [usize; N]) -> GpioResult<GpiodLines<'_, N>> {
        let n = self.count()?;
        if offsets.iter().any(|&offset| offset >= n) {
            return Err(GpioError::InvalidArgument);
        }
        if offsets.iter().any(|&offset| self.used_pins[offset]) {
            return Err(GpioError::AlreadyInUse);
        }

        for offset in offsets {
            self.used_pins.set_aliased(offset, true);
        }
        debug!("{:?} claimed {:?}", self, offsets);

        Ok(GpiodLines {
            driver: self,
            offsets,
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
            drive_mode: GpioDriveMode::PushPull,
        })
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        Ok(Box::new(self.claim([index])?))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        Ok(Box::new(self.claim(indices)?))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl From<GpioDriveMode> for gpiod::Drive {
    fn from(mode: GpioDriveMode) -> Self {
        match mode {
            GpioDriveMode::PushPull => gpiod::Drive::PushPull,
            GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
            GpioDriveMode::OpenSource => gpiod::Drive::OpenSource,
        }
    }
}

/// Claimed lines of the chip, along with the options of the next line request.
///
/// A single pin is the one-line case of a bus.
struct GpiodLines<'a, const N: usize> {
    driver: &'a GpiodDriver,
    offsets: [usize; N],
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
}

impl<const N: usize> GpiodLines<'_, N> {
    fn request_input(&self) -> GpioResult<GpiodInput<'_, N>> {
        let options = gpiod::Options::input(self.offsets.map(|offset| offset as u32))
            .consumer(env!("CARGO_PKG_NAME"))
            .active(self.active_level.into())
            .bias(self.bias.into());
        let request = self.driver.chip.request_lines(options)?;
        trace!("{:?} requested as input", self);
        Ok(GpiodInput { lines: self, request })
    }

    fn request_output(&self) -> GpioResult<GpiodOutput<'_, N>> {
        let options = gpiod::Options::output(self.offsets.map(|offset| offset as u32))
            .consumer(env!("CARGO_PKG_NAME"))
            .active(self.active_level.into())
            .bias(self.bias.into())
            .drive(self.drive_mode.into());
        let request = self.driver.chip.request_lines(options)?;
        trace!("{:?} requested as output", self);
        Ok(GpiodOutput { lines: self, request })
    }
}

impl<const N: usize> Debug for GpiodLines<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if N == 1 {
            write!(f, "{:?}[{}]", self.driver, self.offsets[0])
        } else {
            write!(f, "{:?}{:?}", self.driver, self.offsets)
        }
    }
}

impl<const N: usize> Drop for GpiodLines<'_, N> {
    fn drop(&mut self) {
        for offset in self.offsets {
            self.driver.used_pins.set_aliased(offset, false);
        }
    }
}

impl GpioPin for GpiodLines<'_, 1> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        Ok(Box::new(self.request_input()?))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(self.request_output()?))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        Ok(())
    }

    fn supports_drive_mode(&self) -> bool {
        true
    }

    fn drive_mode(&self) -> GpioDriveMode {
        self.drive_mode
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) -> GpioResult<()> {
        self.drive_mode = mode;
        Ok(())
    }
}

impl<const N: usize> GpioBus<N> for GpiodLines<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        Ok(Box::new(self.request_input()?))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(self.request_output()?))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        Ok(())
    }

    fn supports_drive_mode(&self) -> bool {
        true
    }

    fn drive_mode(&self) -> GpioDriveMode {
        self.drive_mode
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) -> GpioResult<()> {
        self.drive_mode = mode;
        Ok(())
    }
}

/// An active input request; the lines go back to the kernel when it drops.
struct GpiodInput<'a, const N: usize> {
    lines: &'a GpiodLines<'a, N>,
    request: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Debug for GpiodInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.lines)
    }
}

impl GpioInput for GpiodInput<'_, 1> {
    fn read(&self) -> GpioResult<bool> {
        let [value] = self.request.get_values([false])?;
        Ok(value)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        Ok(self.request.get_values([false; N])?)
    }
}

/// An active output request.
struct GpiodOutput<'a, const N: usize> {
    lines: &'a GpiodLines<'a, N>,
    request: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.lines)
    }
}

impl GpioOutput for GpiodOutput<'_, 1> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.request.set_values([value])?;
        Ok(())
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.request.set_values(*values)?;
        Ok(())
    }
}
