pub mod clock;
pub mod id;
pub mod telemetry;

pub use clock::*;
pub use id::*;
pub use telemetry::*;
