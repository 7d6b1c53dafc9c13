//! Process-wide identifier generation.
//!
//! Tasks and schedule descriptors draw from one shared counter, so an id is
//! unique across every loop in the process and doubles as a stable creation
//! tie-break: a lower id was always constructed earlier.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Returns the next identifier. Strictly increasing, starting at 1.
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1
}
