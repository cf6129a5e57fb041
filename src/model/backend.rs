// Scaler and classifier seams
// The pipeline only sees these traits; artifacts and test doubles implement them

use thiserror::Error;

/// Errors raised by scaler or classifier calls
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Input has {actual} features, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite value at index {0}")]
    NonFinite(usize),

    #[error("Predicted label {0:?} is not one of the model classes")]
    UnknownLabel(String),

    #[error("Probability vector has {actual} entries for {expected} classes")]
    ProbabilityShape { expected: usize, actual: usize },

    #[error("Classification failed: {0}")]
    ClassificationError(String),
}

pub(crate) fn ensure_width(x: &[f64], expected: usize) -> Result<(), ModelError> {
    if x.len() != expected {
        return Err(ModelError::ShapeMismatch {
            expected,
            actual: x.len(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_finite(values: &[f64]) -> Result<(), ModelError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(ModelError::NonFinite(idx)),
        None => Ok(()),
    }
}

/// Pretrained feature transform
pub trait Scaler: Send + Sync {
    /// Feature count the scaler was fit on
    fn n_features_in(&self) -> usize;

    /// Column names recorded at fit time, when the artifact carries them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn transform(&self, x: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Pretrained single-label classifier
pub trait Classifier: Send + Sync {
    /// Known class labels; probability vectors follow this order
    fn classes(&self) -> &[String];

    fn n_features_in(&self) -> usize;

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Predicted label; defaults to the first class with the highest probability
    fn predict(&self, x: &[f64]) -> Result<String, ModelError> {
        let proba = self.predict_proba(x)?;
        let idx = argmax(&proba).ok_or_else(|| {
            ModelError::ClassificationError("empty probability vector".to_string())
        })?;
        self.classes()
            .get(idx)
            .cloned()
            .ok_or(ModelError::ProbabilityShape {
                expected: self.classes().len(),
                actual: proba.len(),
            })
    }
}

/// Index of the first maximum
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}
