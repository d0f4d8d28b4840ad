//! Filters for noisy mechanical inputs (buttons, keypads, reed switches).
mod edge;
mod timed;

pub use edge::*;
pub use timed::*;
