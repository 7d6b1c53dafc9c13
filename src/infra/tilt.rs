//! Tilt-direction classification from a 3-axis acceleration reading.
//!
//! A pure decision tree: each axis is classified against a dead-zone
//! threshold, and the sign triple maps to one of 26 named directions.
//! No state, no side effects; safe to call every tick.

use serde::{Deserialize, Serialize};

/// Earth gravity as reported by the reference accelerometer.
const GRAVITY: f64 = 9.68;

/// Default dead-zone threshold: a third of the positive-to-negative gravity
/// span.
pub const DEFAULT_TOLERANCE: f64 = GRAVITY * (2.0 / 6.0);

/// One of 26 tilt directions, or [`Direction::Unknown`] when every axis
/// reads inside the dead-zone.
///
/// Axis convention: +x tilts left, −x right; +y towards, −y away;
/// +z up, −z down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Direction {
    Away,
    AwayDown,
    AwayDownLeft,
    AwayDownRight,
    AwayLeft,
    AwayLeftUp,
    AwayRight,
    AwayRightUp,
    AwayUp,
    Down,
    DownLeft,
    DownLeftTowards,
    DownRight,
    DownRightTowards,
    DownTowards,
    Left,
    LeftTowards,
    LeftTowardsUp,
    LeftUp,
    Right,
    RightTowards,
    RightTowardsUp,
    RightUp,
    Towards,
    TowardsUp,
    Up,
    Unknown,
}

/// Sign of one axis against the dead-zone: −1, 0, or +1.
fn axis(value: f64, tolerance: f64) -> i8 {
    if value >= tolerance {
        1
    } else if value <= -tolerance {
        -1
    } else {
        0
    }
}

impl Direction {
    /// Classifies an acceleration reading.
    ///
    /// `tolerance` defaults to [`DEFAULT_TOLERANCE`]; any axis whose
    /// magnitude is below it counts as neutral. All three axes neutral
    /// yields [`Direction::Unknown`].
    pub fn from_acceleration(x: f64, y: f64, z: f64, tolerance: Option<f64>) -> Self {
        let tolerance = tolerance.unwrap_or(DEFAULT_TOLERANCE);
        match (axis(x, tolerance), axis(y, tolerance), axis(z, tolerance)) {
            (1, 1, 1) => Self::LeftTowardsUp,
            (1, 1, 0) => Self::LeftTowards,
            (1, 1, -1) => Self::DownLeftTowards,
            (1, 0, 1) => Self::LeftUp,
            (1, 0, 0) => Self::Left,
            (1, 0, -1) => Self::DownLeft,
            (1, -1, 1) => Self::AwayLeftUp,
            (1, -1, 0) => Self::AwayLeft,
            (1, -1, -1) => Self::AwayDownLeft,
            (0, 1, 1) => Self::TowardsUp,
            (0, 1, 0) => Self::Towards,
            (0, 1, -1) => Self::DownTowards,
            (0, 0, 1) => Self::Up,
            (0, 0, -1) => Self::Down,
            (0, -1, 1) => Self::AwayUp,
            (0, -1, 0) => Self::Away,
            (0, -1, -1) => Self::AwayDown,
            (-1, 1, 1) => Self::RightTowardsUp,
            (-1, 1, 0) => Self::RightTowards,
            (-1, 1, -1) => Self::DownRightTowards,
            (-1, 0, 1) => Self::RightUp,
            (-1, 0, 0) => Self::Right,
            (-1, 0, -1) => Self::DownRight,
            (-1, -1, 1) => Self::AwayRightUp,
            (-1, -1, 0) => Self::AwayRight,
            (-1, -1, -1) => Self::AwayDownRight,
            _ => Self::Unknown,
        }
    }

    /// The snake_case label for this direction.
    pub fn label(self) -> &'static str {
        match self {
            Self::Away => "away",
            Self::AwayDown => "away_down",
            Self::AwayDownLeft => "away_down_left",
            Self::AwayDownRight => "away_down_right",
            Self::AwayLeft => "away_left",
            Self::AwayLeftUp => "away_left_up",
            Self::AwayRight => "away_right",
            Self::AwayRightUp => "away_right_up",
            Self::AwayUp => "away_up",
            Self::Down => "down",
            Self::DownLeft => "down_left",
            Self::DownLeftTowards => "down_left_towards",
            Self::DownRight => "down_right",
            Self::DownRightTowards => "down_right_towards",
            Self::DownTowards => "down_towards",
            Self::Left => "left",
            Self::LeftTowards => "left_towards",
            Self::LeftTowardsUp => "left_towards_up",
            Self::LeftUp => "left_up",
            Self::Right => "right",
            Self::RightTowards => "right_towards",
            Self::RightTowardsUp => "right_towards_up",
            Self::RightUp => "right_up",
            Self::Towards => "towards",
            Self::TowardsUp => "towards_up",
            Self::Up => "up",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
