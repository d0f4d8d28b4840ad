use crate::GpioResult;
use crate::keypad::Keypad;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyState {
    Idle,
    Pressed,
    /// Held down for longer than [KeyList::hold_time].
    Hold,
    Released,
}

#[derive(Copy, Clone, Debug)]
pub struct TrackedKey<K> {
    pub key: K,
    pub state: KeyState,
    /// Whether the last update moved this key to its current state.
    pub changed: bool,
    pressed_at: Instant,
}

const SLOTS: usize = 10;

/// Tracks up to [KeyList::CAPACITY] keys of a [Keypad] through press, hold and release.
///
/// Keys keep their slot while they are tracked, and a new key takes the first free slot. A key
/// goes `Idle → Pressed → Hold → Released → Idle`, skipping `Hold` when released early,
/// and frees its slot once idle again.
pub struct KeyList<'a, K> {
    keypad: &'a dyn Keypad<Key = K>,
    slots: [Option<TrackedKey<K>>; SLOTS],
    last_scan: Option<Instant>,
    pub hold_time: Duration,
    /// Minimum time between two scans of the keypad.
    pub debounce_time: Duration,
}

impl<'a, K: Copy + Eq + Debug> KeyList<'a, K> {
    pub const CAPACITY: usize = SLOTS;

    pub fn new(keypad: &'a dyn Keypad<Key = K>) -> Self {
        KeyList {
            keypad,
            slots: [None; SLOTS],
            last_scan: None,
            hold_time: Duration::from_millis(500),
            debounce_time: Duration::from_millis(10),
        }
    }

    pub fn with_debounce_time(mut self, debounce_time: Duration) -> Self {
        self.debounce_time = debounce_time;
        self
    }

    pub fn with_hold_time(mut self, hold_time: Duration) -> Self {
        self.hold_time = hold_time;
        self
    }

    pub fn slots(&self) -> &[Option<TrackedKey<K>>] {
        &self.slots
    }

    pub fn keys(&self) -> impl Iterator<Item = &TrackedKey<K>> {
        self.slots.iter().flatten()
    }

    /// Scans the keypad if the debounce time has passed since the last scan.
    ///
    /// Returns whether any tracked key changed state.
    pub fn get_keys(&mut self) -> GpioResult<bool> {
        let now = Instant::now();
        if let Some(last_scan) = self.last_scan {
            if now.duration_since(last_scan) <= self.debounce_time {
                return Ok(false);
            }
        }

        let pressed = self.keypad.read()?;
        self.last_scan = Some(now);
        Ok(self.update(now, &pressed))
    }

    /// Returns the first tracked key if it has just been pressed.
    pub fn get_key(&mut self) -> GpioResult<Option<K>> {
        if !self.get_keys()? {
            return Ok(None);
        }
        Ok(self.fresh_press())
    }

    /// Whether `key` has just been pressed.
    pub fn is_pressed(&self, key: K) -> bool {
        self.keys()
            .any(|tracked| tracked.key == key && tracked.state == KeyState::Pressed && tracked.changed)
    }

    fn fresh_press(&self) -> Option<K> {
        self.slots[0]
            .filter(|tracked| tracked.changed && tracked.state == KeyState::Pressed)
            .map(|tracked| tracked.key)
    }

    fn update(&mut self, now: Instant, pressed: &[K]) -> bool {
        for slot in self.slots.iter_mut() {
            if slot.is_some_and(|tracked| tracked.state == KeyState::Idle) {
                *slot = None;
            }
        }

        for tracked in self.slots.iter_mut().flatten() {
            let down = pressed.contains(&tracked.key);
            let next = match tracked.state {
                KeyState::Pressed if now.duration_since(tracked.pressed_at) > self.hold_time => {
                    Some(KeyState::Hold)
                }
                KeyState::Pressed | KeyState::Hold if !down => Some(KeyState::Released),
                KeyState::Released => Some(KeyState::Idle),
                _ => None,
            };

            tracked.changed = next.is_some();
            if let Some(state) = next {
                trace!("{:?}: {:?} -> {:?}", tracked.key, tracked.state, state);
                tracked.state = state;
            }
        }

        for &key in pressed {
            if self.keys().any(|tracked| tracked.key == key) {
                continue;
            }
            let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) else {
                break;
            };
            trace!("{:?}: Idle -> Pressed", key);
            *slot = Some(TrackedKey {
                key,
                state: KeyState::Pressed,
                changed: true,
                pressed_at: now,
            });
        }

        self.keys().any(|tracked| tracked.changed)
    }
}

impl<K> Debug for KeyList<'_, K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyList({:?})", self.keypad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::{GpioKeypad, KeypadKey};
    use crate::mock::KeyMatrix;

    fn states(list: &KeyList<'_, KeypadKey>) -> Vec<(KeypadKey, KeyState)> {
        list.keys().map(|tracked| (tracked.key, tracked.state)).collect()
    }

    #[test]
    fn short_press_goes_through_released_to_idle() {
        let matrix = KeyMatrix::default();
        let keypad = GpioKeypad::new(&matrix, &matrix);
        let mut list = KeyList::new(&keypad);
        let start = Instant::now();

        assert!(list.update(start, &[KeypadKey::Key7]));
        assert_eq!(list.fresh_press(), Some(KeypadKey::Key7));

        assert!(!list.update(start + Duration::from_millis(20), &[KeypadKey::Key7]));
        assert_eq!(list.fresh_press(), None);

        assert!(list.update(start + Duration::from_millis(40), &[]));
        assert_eq!(states(&list), [(KeypadKey::Key7, KeyState::Released)]);

        assert!(list.update(start + Duration::from_millis(60), &[]));
        assert_eq!(states(&list), [(KeypadKey::Key7, KeyState::Idle)]);

        assert!(!list.update(start + Duration::from_millis(80), &[]));
        assert_eq!(list.keys().count(), 0);
    }

    #[test]
    fn long_press_reaches_hold() {
        let matrix = KeyMatrix::default();
        let keypad = GpioKeypad::new(&matrix, &matrix);
        let mut list = KeyList::new(&keypad).with_hold_time(Duration::from_millis(100));
        let start = Instant::now();

        list.update(start, &[KeypadKey::KeyHash]);
        list.update(start + Duration::from_millis(150), &[KeypadKey::KeyHash]);
        assert_eq!(states(&list), [(KeypadKey::KeyHash, KeyState::Hold)]);

        list.update(start + Duration::from_millis(200), &[]);
        assert_eq!(states(&list), [(KeypadKey::KeyHash, KeyState::Released)]);
    }

    #[test]
    fn first_key_keeps_its_slot() {
        let matrix = KeyMatrix::default();
        let keypad = GpioKeypad::new(&matrix, &matrix);
        let mut list = KeyList::new(&keypad);
        let start = Instant::now();

        list.update(start, &[KeypadKey::Key1]);
        list.update(start + Duration::from_millis(20), &[KeypadKey::Key2, KeypadKey::Key1]);

        assert_eq!(list.fresh_press(), None);
        assert!(list.is_pressed(KeypadKey::Key2));
        assert_eq!(list.slots()[0].map(|tracked| tracked.key), Some(KeypadKey::Key1));
    }

    #[test]
    fn new_key_takes_the_slot_freed_by_a_released_key() {
        let matrix = KeyMatrix::default();
        let keypad = GpioKeypad::new(&matrix, &matrix);
        let mut list = KeyList::new(&keypad);
        let start = Instant::now();
        let at = |ms| start + Duration::from_millis(ms);

        list.update(at(0), &[KeypadKey::Key1]);
        list.update(at(20), &[KeypadKey::Key1, KeypadKey::Key2]);
        list.update(at(40), &[KeypadKey::Key2]);
        list.update(at(60), &[KeypadKey::Key2]);
        list.update(at(80), &[KeypadKey::Key2]);
        assert_eq!(list.slots()[0].map(|tracked| tracked.key), None);
        assert_eq!(list.slots()[1].map(|tracked| tracked.key), Some(KeypadKey::Key2));

        assert!(list.update(at(100), &[KeypadKey::Key2, KeypadKey::Key3]));
        assert_eq!(list.fresh_press(), Some(KeypadKey::Key3));
        assert_eq!(list.slots()[1].map(|tracked| tracked.key), Some(KeypadKey::Key2));
    }

    #[test]
    fn presses_beyond_capacity_are_ignored() {
        let matrix = KeyMatrix::default();
        let keypad = GpioKeypad::new(&matrix, &matrix);
        let mut list = KeyList::new(&keypad);
        let all = [
            KeypadKey::Key1,
            KeypadKey::Key2,
            KeypadKey::Key3,
            KeypadKey::KeyA,
            KeypadKey::Key4,
            KeypadKey::Key5,
            KeypadKey::Key6,
            KeypadKey::KeyB,
            KeypadKey::Key7,
            KeypadKey::Key8,
            KeypadKey::Key9,
        ];

        list.update(Instant::now(), &all);
        assert_eq!(list.keys().count(), KeyList::<KeypadKey>::CAPACITY);
        assert!(!list.is_pressed(KeypadKey::Key9));
    }

    #[test]
    fn get_key_reads_the_keypad() {
        let matrix = KeyMatrix::default();
        let keypad = GpioKeypad::new(&matrix, &matrix);
        let mut list = KeyList::new(&keypad).with_debounce_time(Duration::ZERO);

        matrix.press(0, 3);
        assert_eq!(list.get_key().unwrap(), Some(KeypadKey::KeyA));
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(list.get_key().unwrap(), None);
    }
}
