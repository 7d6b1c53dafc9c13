//! Collaborator adapters: tilt classification and debounced input readers.

pub mod button;
pub mod key_bank;
pub mod tilt;

pub use button::{DebouncedButton, MemorySource, PressSource};
pub use key_bank::{KeyBank, KeyBusSource, MemoryBusSource};
pub use tilt::{Direction, DEFAULT_TOLERANCE};
