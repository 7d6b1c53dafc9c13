//! Loop configuration structures.

use serde::{Deserialize, Serialize};

use crate::core::event_loop::FaultPolicy;

/// Loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// What to do with a routine fault.
    pub fault_policy: FaultPolicy,
    /// Stable-sort the active set by priority order on every tick.
    pub sort_each_tick: bool,
    /// Maximum tasks advanced per tick. `null` advances all of them.
    pub step_limit: Option<usize>,
    /// Sleep between ticks, in milliseconds. `null` spins.
    pub pace_ms: Option<u64>,
    /// Stop the loop once no tasks or descriptors remain.
    pub stop_when_idle: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fault_policy: FaultPolicy::default(),
            sort_each_tick: false,
            step_limit: None,
            pace_ms: None,
            stop_when_idle: false,
        }
    }
}

impl LoopConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.step_limit == Some(0) {
            return Err("step_limit must be greater than 0 when set".into());
        }
        if self.pace_ms == Some(0) {
            return Err("pace_ms must be greater than 0 when set (use null to spin)".into());
        }
        Ok(())
    }

    /// Parse loop configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: LoopConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
