//! Builders to construct scheduler components from configuration.

pub mod loop_builder;

pub use loop_builder::{build_event_loop, build_event_loop_with_clock};
