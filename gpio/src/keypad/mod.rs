//! Matrix keypads.
mod gpio;
mod list;

use crate::GpioResult;
pub use gpio::*;
pub use list::*;
use std::fmt::Debug;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Scans the keypad, returning every key currently held down.
    fn read(&self) -> GpioResult<Vec<Self::Key>>;
}
