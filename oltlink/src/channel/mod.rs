//! Output accumulation for interactive sessions.
//!
//! Holds what a device printed for the command in flight and answers
//! "has the expected marker shown up yet?" cheaply.

mod buffer;

pub use buffer::{Expect, PatternBuffer};
