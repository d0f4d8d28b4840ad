//! HD44780 LCD module.
//!
//! The controller is driven either directly over GPIO ([driver::GpioHD44780Driver]) or through
//! the PCF8574 I2C backpack soldered on the kit's LCD1602 ([driver::Pcf8574HD44780Driver]).
//! Text output goes through [super::CharacterDisplay], which every driver gets for free.

pub mod driver;
