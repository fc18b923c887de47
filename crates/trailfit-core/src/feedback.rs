use serde::{Deserialize, Serialize};

/// What a feedback signal is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Budget,
    Color,
    Brand,
    Fit,
}

/// Which way the user wants future results to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Raise,
    Lower,
    Avoid,
    Prefer,
}

/// A structured preference delta extracted from free-text feedback.
///
/// `value` carries the detail: a color or brand name, a target fit, or a
/// budget ceiling when one was stated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub kind: SignalKind,
    pub direction: Direction,
    pub value: Option<String>,
}

impl FeedbackSignal {
    #[must_use]
    pub fn new(kind: SignalKind, direction: Direction, value: Option<&str>) -> Self {
        Self {
            kind,
            direction,
            value: value.map(str::to_owned),
        }
    }
}
