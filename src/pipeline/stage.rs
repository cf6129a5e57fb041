// Per-request state machine
// Idle -> Decoding -> Normalizing -> Aligning -> Extracting -> Scaling -> Predicting
// -> Succeeded | Failed

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Decoding,
    Normalizing,
    Aligning,
    Extracting,
    Scaling,
    Predicting,
    Succeeded,
    Failed,
}

impl Stage {
    /// Stages a successful run passes through, in order
    pub const ORDER: [Stage; 6] = [
        Stage::Decoding,
        Stage::Normalizing,
        Stage::Aligning,
        Stage::Extracting,
        Stage::Scaling,
        Stage::Predicting,
    ];

    /// The stage entered after this one succeeds
    pub fn next(&self) -> Stage {
        match self {
            Stage::Idle => Stage::Decoding,
            Stage::Decoding => Stage::Normalizing,
            Stage::Normalizing => Stage::Aligning,
            Stage::Aligning => Stage::Extracting,
            Stage::Extracting => Stage::Scaling,
            Stage::Scaling => Stage::Predicting,
            Stage::Predicting | Stage::Succeeded => Stage::Succeeded,
            Stage::Failed => Stage::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }

    /// Fraction of the pipeline completed on entering this stage
    pub fn progress(&self) -> f32 {
        match self {
            Stage::Idle => 0.0,
            Stage::Decoding => 0.0,
            Stage::Normalizing => 1.0 / 6.0,
            Stage::Aligning => 2.0 / 6.0,
            Stage::Extracting => 3.0 / 6.0,
            Stage::Scaling => 4.0 / 6.0,
            Stage::Predicting => 5.0 / 6.0,
            Stage::Succeeded | Stage::Failed => 1.0,
        }
    }

    /// Human-readable name for user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Idle => "Idle",
            Stage::Decoding => "Decoding",
            Stage::Normalizing => "Normalizing",
            Stage::Aligning => "Length alignment",
            Stage::Extracting => "Feature extraction",
            Stage::Scaling => "Scaling",
            Stage::Predicting => "Prediction",
            Stage::Succeeded => "Succeeded",
            Stage::Failed => "Failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_follows_next() {
        let mut stage = Stage::Idle;
        for expected in Stage::ORDER {
            stage = stage.next();
            assert_eq!(stage, expected);
        }
        assert_eq!(stage.next(), Stage::Succeeded);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(Stage::Succeeded.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert_eq!(Stage::Failed.next(), Stage::Failed);
        assert!(!Stage::Scaling.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut last = -1.0;
        for stage in Stage::ORDER {
            assert!(stage.progress() >= last);
            last = stage.progress();
        }
        assert_eq!(Stage::Succeeded.progress(), 1.0);
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&Stage::Extracting).unwrap(),
            "\"extracting\""
        );
    }
}
