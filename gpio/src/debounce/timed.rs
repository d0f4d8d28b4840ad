use crate::{GpioInput, GpioResult};
use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

/// A debounced GPIO input that uses a timer to filter out noise.
///
/// The reported state only follows the raw input once the raw input has kept its new value
/// for at least [TimedDebounce::debounce_time].
pub struct TimedDebounce<'a> {
    input: &'a dyn GpioInput,
    state: Cell<bool>,
    changed_since: Cell<Option<Instant>>,
    pub debounce_time: Duration,
}

impl<'a> TimedDebounce<'a> {
    pub const DEFAULT_DEBOUNCE_TIME: Duration = Duration::from_millis(50);

    pub fn new(input: &'a dyn GpioInput) -> Self {
        Self {
            input,
            state: Cell::new(false),
            changed_since: Cell::new(None),
            debounce_time: Self::DEFAULT_DEBOUNCE_TIME,
        }
    }

    pub fn with_debounce_time(mut self, debounce_time: Duration) -> Self {
        self.debounce_time = debounce_time;
        self
    }
}

impl Debug for TimedDebounce<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}(debounced)", self.input)
    }
}

impl GpioInput for TimedDebounce<'_> {
    fn read(&self) -> GpioResult<bool> {
        let stable = self.state.get();
        let raw = self.input.read()?;

        if raw == stable {
            self.changed_since.set(None);
            return Ok(stable);
        }

        match self.changed_since.get() {
            Some(since) if since.elapsed() >= self.debounce_time => {
                self.changed_since.set(None);
                self.state.set(raw);
                Ok(raw)
            }
            Some(_) => Ok(stable),
            None => {
                self.changed_since.set(Some(Instant::now()));
                Ok(stable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInput;
    use std::thread::sleep;

    #[test]
    fn short_glitch_is_ignored() {
        let input = MockInput::scripted(&[true, false, false]);
        let debounced = TimedDebounce::new(&input).with_debounce_time(Duration::from_millis(20));

        assert!(!debounced.read().unwrap());
        assert!(!debounced.read().unwrap());
        assert!(!debounced.read().unwrap());
    }

    #[test]
    fn stable_change_is_reported_after_debounce_time() {
        let input = MockInput::constant(true);
        let debounced = TimedDebounce::new(&input).with_debounce_time(Duration::from_millis(10));

        assert!(!debounced.read().unwrap());
        sleep(Duration::from_millis(15));
        assert!(debounced.read().unwrap());

        input.set(false);
        assert!(debounced.read().unwrap());
        sleep(Duration::from_millis(15));
        assert!(!debounced.read().unwrap());
    }
}
