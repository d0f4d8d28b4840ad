use crate::keypad::Keypad;
use crate::{GpioBusInput, GpioBusOutput, GpioResult};
use std::fmt::{Debug, Formatter};

/// Represents the keys on a 4x4 keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeypadKey {
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    Key0,
    KeyAsterisk,
    KeyHash,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
}

impl KeypadKey {
    /// Converts a position tuple (row, column) to a [KeypadKey].
    pub fn from_position(pos: (u8, u8)) -> Option<KeypadKey> {
        use KeypadKey::*;

        const KEYS: [[KeypadKey; 4]; 4] = [
            [Key1, Key2, Key3, KeyA],
            [Key4, Key5, Key6, KeyB],
            [Key7, Key8, Key9, KeyC],
            [KeyAsterisk, Key0, KeyHash, KeyD],
        ];

        KEYS.get(pos.0 as usize)?.get(pos.1 as usize).copied()
    }

    /// Converts the [KeypadKey] to its corresponding character.
    pub fn to_char(self) -> char {
        use KeypadKey::*;

        match self {
            Key1 => '1',
            Key2 => '2',
            Key3 => '3',
            Key4 => '4',
            Key5 => '5',
            Key6 => '6',
            Key7 => '7',
            Key8 => '8',
            Key9 => '9',
            Key0 => '0',
            KeyAsterisk => '*',
            KeyHash => '#',
            KeyA => 'A',
            KeyB => 'B',
            KeyC => 'C',
            KeyD => 'D',
        }
    }
}

/// A 4x4 switch matrix scanned column by column.
///
/// Wire the columns as open-drain, active-low outputs and the rows as pulled-up, active-low
/// inputs: a selected column is pulled to ground and a pressed key pulls its row down with it.
pub struct GpioKeypad<'a> {
    cols: &'a dyn GpioBusOutput<4>,
    rows: &'a dyn GpioBusInput<4>,
}

impl Debug for GpioKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioKeypad({:?}, {:?})", self.cols, self.rows)
    }
}

impl<'a> GpioKeypad<'a> {
    pub fn new(cols: &'a dyn GpioBusOutput<4>, rows: &'a dyn GpioBusInput<4>) -> Self {
        GpioKeypad { cols, rows }
    }
}

impl Keypad for GpioKeypad<'_> {
    type Key = KeypadKey;

    fn read(&self) -> GpioResult<Vec<Self::Key>> {
        let mut pressed = Vec::new();

        for col in 0..4u8 {
            let mut select = [false; 4];
            select[col as usize] = true;
            self.cols.write(&select)?;

            let rows = self.rows.read()?;
            for (row, _) in rows.iter().enumerate().filter(|&(_, &down)| down) {
                if let Some(key) = KeypadKey::from_position((row as u8, col)) {
                    pressed.push(key);
                }
            }
        }

        self.cols.write(&[false; 4])?;
        Ok(pressed)
    }
}
