//! Memory-mapped register backend for the BCM2835/BCM2837/BCM2711 GPIO block.
//!
//! Register access is much faster than the character device, which matters for bit-banged
//! timing protocols like the DHT11's. It does not work on the Pi 5, whose GPIOs live on the
//! RP1 south bridge.
//!
//! Register offsets (relative to the GPIO block):
//! - `GPFSELn` at `0x00`, 3 bits per pin, 10 pins per register.
//! - `GPSETn` at `0x1C`, `GPCLRn` at `0x28`, `GPLEVn` at `0x34`, 1 bit per pin.
//! - `GPPUD` at `0x94` and `GPPUDCLKn` at `0x98` (pull control up to the BCM2837).
//! - `GPIO_PUP_PDN_CNTRL_REGn` at `0xE4`, 2 bits per pin (BCM2711 only).
use crate::{
    GpioActiveLevel, GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioDriveMode, GpioDriver,
    GpioError, GpioInput, GpioOutput, GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::{debug, trace};
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;
use std::thread::sleep;
use std::time::Duration;

/// The system-on-chip family, which decides the peripheral base address and the pull-up
/// register layout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Soc {
    /// Pi 1, Pi Zero.
    Bcm2835,
    /// Pi 2, Pi 3, Pi Zero 2.
    Bcm2837,
    /// Pi 4, Pi 400, CM4.
    Bcm2711,
}

impl Soc {
    const GPIO_OFFSET: u64 = 0x20_0000;

    /// Physical address of the peripheral block as seen by the ARM cores.
    pub fn peripheral_base(&self) -> u64 {
        match self {
            Soc::Bcm2835 => 0x2000_0000,
            Soc::Bcm2837 => 0x3F00_0000,
            Soc::Bcm2711 => 0xFE00_0000,
        }
    }

    /// Physical address of the GPIO register block.
    pub fn gpio_base(&self) -> u64 {
        self.peripheral_base() + Self::GPIO_OFFSET
    }

    /// Parses the NUL-separated contents of `/proc/device-tree/compatible`.
    pub fn from_compatible(compatible: &str) -> GpioResult<Self> {
        for entry in compatible.split('\0') {
            match entry.trim() {
                "brcm,bcm2711" => return Ok(Soc::Bcm2711),
                "brcm,bcm2837" | "brcm,bcm2836" => return Ok(Soc::Bcm2837),
                "brcm,bcm2835" => return Ok(Soc::Bcm2835),
                _ => {}
            }
        }
        Err(GpioError::NotSupported)
    }

    /// Detects the SoC of the running board from the device tree.
    pub fn detect() -> GpioResult<Self> {
        let compatible = std::fs::read_to_string("/proc/device-tree/compatible")?;
        let soc = Self::from_compatible(&compatible)?;
        debug!("Detected {:?}", soc);
        Ok(soc)
    }
}

/// Register-level GPIO driver.
pub struct RawGpioDriver {
    mmap: MmapRaw,
    soc: Soc,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    const PIN_COUNT: usize = 54;
    const BLOCK_LEN: usize = 0xF4;

    const GPFSEL: usize = 0x00;
    const GPSET: usize = 0x1C;
    const GPCLR: usize = 0x28;
    const GPLEV: usize = 0x34;
    const GPPUD: usize = 0x94;
    const GPPUDCLK: usize = 0x98;
    const GPIO_PUP_PDN_CNTRL: usize = 0xE4;

    const FUNCTION_INPUT: u8 = 0b000;
    const FUNCTION_OUTPUT: u8 = 0b001;

    fn create(path: &str, offset: u64, soc: Soc) -> GpioResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(Self::BLOCK_LEN)
            .map_raw(&file)?;

        Ok(RawGpioDriver {
            mmap,
            soc,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which only exposes the GPIO registers
    /// (at offset 0) and does not need root.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0, Soc::detect()?)
    }

    /// Maps the GPIO block through `/dev/mem`. Needs root.
    pub fn new_mem() -> GpioResult<Self> {
        let soc = Soc::detect()?;
        Self::create("/dev/mem", soc.gpio_base(), soc)
    }

    pub fn soc(&self) -> Soc {
        self.soc
    }

    fn check_pin(pin_index: usize) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    fn register(&self, offset: usize) -> *mut u32 {
        // SAFETY: every offset used by this driver is below BLOCK_LEN and 4-byte aligned.
        unsafe { (self.mmap.as_mut_ptr() as *mut u32).add(offset / 4) }
    }

    fn read_register(&self, offset: usize) -> u32 {
        // SAFETY: see `register`.
        unsafe { self.register(offset).read_volatile() }
    }

    fn write_register(&self, offset: usize, value: u32) {
        // SAFETY: see `register`.
        unsafe { self.register(offset).write_volatile(value) }
    }

    pub fn raw_get_pin_function(&self, pin_index: usize) -> GpioResult<u8> {
        Self::check_pin(pin_index)?;

        let offset = Self::GPFSEL + pin_index / 10 * 4;
        let shift = (pin_index % 10) * 3;
        Ok(((self.read_register(offset) >> shift) & 0b111) as u8)
    }

    /// Sets the function select bits of a pin (`0b000` input, `0b001` output, others are
    /// the alternate functions).
    pub fn raw_set_pin_function(&self, pin_index: usize, function: u8) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }
        Self::check_pin(pin_index)?;

        let offset = Self::GPFSEL + pin_index / 10 * 4;
        let shift = (pin_index % 10) * 3;

        let mut value = self.read_register(offset);
        value &= !(0b111 << shift);
        value |= (function as u32) << shift;
        self.write_register(offset, value);

        trace!("GPIO{} function={:03b}", pin_index, function);
        Ok(())
    }

    pub(crate) fn raw_set_pin_output(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        let base = if high { Self::GPSET } else { Self::GPCLR };
        self.write_register(base + pin_index / 32 * 4, 1 << (pin_index % 32));
        Ok(())
    }

    pub(crate) fn raw_get_pin_level(&self, pin_index: usize) -> GpioResult<bool> {
        Self::check_pin(pin_index)?;

        let value = self.read_register(Self::GPLEV + pin_index / 32 * 4);
        Ok((value >> (pin_index % 32)) & 1 != 0)
    }

    pub(crate) fn drive_pin(&self, pin_index: usize, high: bool, mode: GpioDriveMode) -> GpioResult<()> {
        match mode.get_state(high) {
            Some(output) => {
                // Latch the level first so the pin never glitches to the opposite state.
                self.raw_set_pin_output(pin_index, output)?;
                self.raw_set_pin_function(pin_index, Self::FUNCTION_OUTPUT)?;
            }
            None => {
                self.raw_set_pin_function(pin_index, Self::FUNCTION_INPUT)?;
            }
        }
        Ok(())
    }

    pub(crate) fn raw_set_bias(&self, pin_index: usize, bias: GpioBias) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        match self.soc {
            Soc::Bcm2711 => {
                let bias_value = match bias {
                    GpioBias::None => 0b00,
                    GpioBias::PullUp => 0b01,
                    GpioBias::PullDown => 0b10,
                };

                let offset = Self::GPIO_PUP_PDN_CNTRL + pin_index / 16 * 4;
                let shift = (pin_index % 16) * 2;
                let mut value = self.read_register(offset);
                value &= !(0b11 << shift);
                value |= bias_value << shift;
                self.write_register(offset, value);
            }
            Soc::Bcm2835 | Soc::Bcm2837 => {
                let control = match bias {
                    GpioBias::None => 0b00,
                    GpioBias::PullDown => 0b01,
                    GpioBias::PullUp => 0b10,
                };
                let clock = Self::GPPUDCLK + pin_index / 32 * 4;

                // The datasheet asks for 150 cycles of setup and hold, a few microseconds is plenty.
                self.write_register(Self::GPPUD, control);
                sleep(Duration::from_micros(5));
                self.write_register(clock, 1 << (pin_index % 32));
                sleep(Duration::from_micros(5));
                self.write_register(Self::GPPUD, 0);
                self.write_register(clock, 0);
            }
        }

        trace!("GPIO{} bias={:?}", pin_index, bias);
        Ok(())
    }

    /// Reads the pull configuration back. Only the BCM2711 can report it.
    pub(crate) fn raw_get_bias(&self, pin_index: usize) -> GpioResult<GpioBias> {
        Self::check_pin(pin_index)?;

        if self.soc != Soc::Bcm2711 {
            return Err(GpioError::NotSupported);
        }

        let offset = Self::GPIO_PUP_PDN_CNTRL + pin_index / 16 * 4;
        let shift = (pin_index % 16) * 2;
        match (self.read_register(offset) >> shift) & 0b11 {
            0b00 => Ok(GpioBias::None),
            0b01 => Ok(GpioBias::PullUp),
            0b10 => Ok(GpioBias::PullDown),
            _ => Err(GpioError::NotSupported),
        }
    }

    pub(crate) fn raw_reset(&self, pin_index: usize) -> GpioResult<()> {
        self.raw_set_pin_function(pin_index, Self::FUNCTION_INPUT)?;
        self.raw_set_bias(pin_index, GpioBias::None)?;
        self.raw_set_pin_output(pin_index, false)?;
        Ok(())
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.soc)
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        Self::check_pin(index)?;

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);
        self.raw_reset(index)?;
        debug!("{:?} claimed GPIO{}", self, index);

        Ok(Box::new(RawGpioPin {
            driver: self,
            pin_index: index,
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
            drive_mode: GpioDriveMode::PushPull,
        }))
    }

    fn get_pin_bus<const N: usize>(&self, indices: [usize; N]) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        if indices.iter().any(|&index| index >= Self::PIN_COUNT) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in &indices {
            self.used_pins.set_aliased(index, true);
            self.raw_reset(index)?;
        }
        debug!("{:?} claimed {:?}", self, indices);

        Ok(Box::new(RawGpioBus {
            driver: self,
            pin_indices: indices,
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
            drive_mode: GpioDriveMode::PushPull,
        }))
    }
}

struct RawGpioPin<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
}

impl Debug for RawGpioPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RawGpioPin<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        self.driver
            .raw_set_pin_function(self.pin_index, RawGpioDriver::FUNCTION_INPUT)?;
        Ok(Box::new(RawGpioInput { pin: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        // Start inactive, honoring the drive mode (open-drain lines start released).
        self.driver.drive_pin(
            self.pin_index,
            self.active_level.get_state(false),
            self.drive_mode,
        )?;
        Ok(Box::new(RawGpioOutput { pin: self }))
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
        self.driver.raw_get_bias(self.pin_index).unwrap_or(self.bias)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.driver.raw_set_bias(self.pin_index, bias)?;
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

impl Drop for RawGpioPin<'_> {
    fn drop(&mut self) {
        _ = self.driver.raw_reset(self.pin_index);
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

struct RawGpioInput<'a> {
    pin: &'a RawGpioPin<'a>,
}

impl Debug for RawGpioInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for RawGpioInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let level = self.pin.driver.raw_get_pin_level(self.pin.pin_index)?;
        Ok(self.pin.active_level.get_state(level))
    }
}

struct RawGpioOutput<'a> {
    pin: &'a RawGpioPin<'a>,
}

impl Debug for RawGpioOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for RawGpioOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.pin.driver.drive_pin(
            self.pin.pin_index,
            self.pin.active_level.get_state(value),
            self.pin.drive_mode,
        )
    }
}

struct RawGpioBus<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
}

impl<const N: usize> Debug for RawGpioBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for RawGpioBus<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        for &pin_index in &self.pin_indices {
            self.driver
                .raw_set_pin_function(pin_index, RawGpioDriver::FUNCTION_INPUT)?;
        }
        Ok(Box::new(RawGpioBusInput { bus: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        let inactive = self.active_level.get_state(false);
        for &pin_index in &self.pin_indices {
            self.driver.drive_pin(pin_index, inactive, self.drive_mode)?;
        }
        Ok(Box::new(RawGpioBusOutput { bus: self }))
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
        self.driver
            .raw_get_bias(self.pin_indices[0])
            .unwrap_or(self.bias)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        for &pin_index in &self.pin_indices {
            self.driver.raw_set_bias(pin_index, bias)?;
        }
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

impl<const N: usize> Drop for RawGpioBus<'_, N> {
    fn drop(&mut self) {
        for &pin_index in &self.pin_indices {
            _ = self.driver.raw_reset(pin_index);
            self.driver.used_pins.set_aliased(pin_index, false);
        }
    }
}

struct RawGpioBusInput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.bus)
    }
}

impl<const N: usize> GpioBusInput<N> for RawGpioBusInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let mut values = [false; N];
        for (value, &pin_index) in values.iter_mut().zip(&self.bus.pin_indices) {
            let level = self.bus.driver.raw_get_pin_level(pin_index)?;
            *value = self.bus.active_level.get_state(level);
        }
        Ok(values)
    }
}

struct RawGpioBusOutput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for RawGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (&value, &pin_index) in values.iter().zip(&self.bus.pin_indices) {
            self.bus.driver.drive_pin(
                pin_index,
                self.bus.active_level.get_state(value),
                self.bus.drive_mode,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pi4_from_device_tree() {
        let compatible = "raspberrypi,4-model-b\0brcm,bcm2711\0";
        assert_eq!(Soc::from_compatible(compatible), Ok(Soc::Bcm2711));
    }

    #[test]
    fn detects_pi3_from_device_tree() {
        let compatible = "raspberrypi,3-model-b-plus\0brcm,bcm2837\0";
        assert_eq!(Soc::from_compatible(compatible), Ok(Soc::Bcm2837));
    }

    #[test]
    fn pi5_is_not_supported() {
        let compatible = "raspberrypi,5-model-b\0brcm,bcm2712\0";
        assert_eq!(Soc::from_compatible(compatible), Err(GpioError::NotSupported));
    }

    #[test]
    fn gpio_base_addresses() {
        assert_eq!(Soc::Bcm2835.gpio_base(), 0x2020_0000);
        assert_eq!(Soc::Bcm2837.gpio_base(), 0x3F20_0000);
        assert_eq!(Soc::Bcm2711.gpio_base(), 0xFE20_0000);
    }
}
