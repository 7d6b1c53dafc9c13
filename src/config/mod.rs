//! Configuration models for the loop and its policies.

pub mod run;

pub use run::LoopConfig;
