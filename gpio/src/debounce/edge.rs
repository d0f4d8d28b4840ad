use crate::{GpioInput, GpioResult};
use std::cell::Cell;
use std::fmt::{Debug, Formatter};

/// A change of a level input between two polls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    /// The input became active.
    Pressed,
    /// The input became inactive.
    Released,
}

/// Turns a level input into press and release events by comparing each poll with the previous one.
///
/// Usually wraps a [super::TimedDebounce] so that contact bounce does not produce spurious edges.
pub struct EdgeDetector<'a> {
    input: &'a dyn GpioInput,
    last: Cell<bool>,
}

impl<'a> EdgeDetector<'a> {
    pub fn new(input: &'a dyn GpioInput) -> Self {
        EdgeDetector {
            input,
            last: Cell::new(false),
        }
    }

    /// Polls the input, returning the edge since the previous poll if there was one.
    pub fn poll(&self) -> GpioResult<Option<Edge>> {
        let value = self.input.read()?;
        let previous = self.last.replace(value);

        Ok(match (previous, value) {
            (false, true) => Some(Edge::Pressed),
            (true, false) => Some(Edge::Released),
            _ => None,
        })
    }

    /// The level seen by the last poll.
    pub fn is_active(&self) -> bool {
        self.last.get()
    }
}

impl Debug for EdgeDetector<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EdgeDetector({:?})", self.input)
    }
}
