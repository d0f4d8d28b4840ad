//! Character LCDs driven by an HD44780 (or compatible) controller.
mod display;
pub mod hd44780;

pub use display::*;
