// Model module
// Pretrained scaler and classifier artifacts behind the Scaler/Classifier traits

pub mod artifacts;
pub mod backend;
pub mod classifier;
pub mod scaler;

#[cfg(test)]
pub(crate) mod testing;

pub use artifacts::{calculate_sha256, load_classifier, load_scaler, ArtifactLoadError, Loaded};
pub use backend::{argmax, Classifier, ModelError, Scaler};
pub use classifier::{ClassifierArtifact, DecisionTree, TreeNode};
pub use scaler::ScalerArtifact;

/// Confidence (0-100) of the chosen label: the probability stored at that
/// label's position in the class list, not the largest probability
pub fn confidence_for_label(
    label: &str,
    classes: &[String],
    probabilities: &[f64],
) -> Result<f64, ModelError> {
    if probabilities.len() != classes.len() {
        return Err(ModelError::ProbabilityShape {
            expected: classes.len(),
            actual: probabilities.len(),
        });
    }

    let index = classes
        .iter()
        .position(|c| c == label)
        .ok_or_else(|| ModelError::UnknownLabel(label.to_string()))?;

    let probability = probabilities[index];
    if !probability.is_finite() {
        return Err(ModelError::NonFinite(index));
    }

    Ok(probability.clamp(0.0, 1.0) * 100.0)
}
