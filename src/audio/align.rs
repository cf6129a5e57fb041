// Length alignment
// Forces a signal to the fixed clip duration the artifacts were built for

use serde::{Deserialize, Serialize};

use crate::audio::Signal;

/// What the aligner did to reach the target length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LengthAdjustment {
    Unchanged { samples: usize },
    Truncated { from: usize, to: usize },
    Padded { from: usize, to: usize },
}

impl LengthAdjustment {
    /// User-facing advisory, present only when samples were cut or added
    pub fn advisory(&self, target_duration_seconds: f64) -> Option<String> {
        match self {
            LengthAdjustment::Unchanged { .. } => None,
            LengthAdjustment::Truncated { .. } => Some(format!(
                "Signal truncated to {} seconds.",
                target_duration_seconds
            )),
            LengthAdjustment::Padded { .. } => Some(format!(
                "Signal zero-padded to {} seconds.",
                target_duration_seconds
            )),
        }
    }

    pub fn target_len(&self) -> usize {
        match *self {
            LengthAdjustment::Unchanged { samples } => samples,
            LengthAdjustment::Truncated { to, .. } | LengthAdjustment::Padded { to, .. } => to,
        }
    }
}

/// Target sample count: duration × rate, truncated toward zero
pub fn target_len(target_duration_seconds: f64, sample_rate: u32) -> usize {
    let exact = target_duration_seconds * sample_rate as f64;
    if !exact.is_finite() || exact <= 0.0 {
        return 0;
    }
    exact.trunc() as usize
}

/// Keep the first `target` samples, or append zeros up to `target`
pub fn align_length(signal: &mut Signal, target: usize) -> LengthAdjustment {
    let len = signal.samples.len();

    if len > target {
        signal.samples.truncate(target);
        LengthAdjustment::Truncated {
            from: len,
            to: target,
        }
    } else if len < target {
        signal.samples.resize(target, 0.0);
        LengthAdjustment::Padded {
            from: len,
            to: target,
        }
    } else {
        LengthAdjustment::Unchanged { samples: len }
    }
}
