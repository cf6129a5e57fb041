// Command surface
// Serializable request/response types for a UI host or the CLI
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::audio::{AudioClip, AudioHint, DecodeError, LengthAdjustment};
use crate::engine::{Engine, EngineDescription};
use crate::features::FeatureVector;
use crate::model::argmax;
use crate::pipeline::{ClassProbability, PipelineError, PredictionResult, Stage};

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    /// Stage the request stopped at, when it got as far as the pipeline
    pub stage: Option<Stage>,
    pub message: String,
}

impl From<PipelineError> for CommandError {
    fn from(error: PipelineError) -> Self {
        let stage = error.stage();
        CommandError {
            stage: Some(stage),
            message: error.to_string(),
        }
    }
}

impl From<DecodeError> for CommandError {
    fn from(error: DecodeError) -> Self {
        PipelineError::from(error).into()
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyInput {
    pub audio_data: Vec<u8>,

    /// MIME type reported by the host (e.g. "audio/wav"); sniffed when absent
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ClassifyInput {
    fn into_clip(self) -> AudioClip {
        let hint = self
            .mime_type
            .as_deref()
            .map(AudioHint::from_mime)
            .unwrap_or_default();
        AudioClip::new(self.audio_data, hint)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutput {
    pub request_id: Uuid,
    pub label: String,

    /// Label as shown to the user
    pub display_label: String,

    pub confidence: f64,

    /// Confidence with two decimals, e.g. "97.00%"
    pub confidence_display: String,

    pub advisory: Option<String>,
    pub probabilities: Vec<ClassProbability>,

    /// True when the predicted label is not the most probable class
    pub label_differs_from_argmax: bool,
}

impl From<PredictionResult> for ClassifyOutput {
    fn from(result: PredictionResult) -> Self {
        let proba: Vec<f64> = result.probabilities.iter().map(|p| p.probability).collect();
        let label_differs_from_argmax = argmax(&proba)
            .map(|idx| result.probabilities[idx].label != result.label)
            .unwrap_or(false);

        ClassifyOutput {
            request_id: result.request_id,
            display_label: result.label.to_uppercase(),
            confidence_display: format!("{:.2}%", result.confidence),
            label: result.label,
            confidence: result.confidence,
            advisory: result.advisory,
            probabilities: result.probabilities,
            label_differs_from_argmax,
        }
    }
}

/// Classify one utterance
pub fn classify_audio(engine: &Engine, input: ClassifyInput) -> CommandResult<ClassifyOutput> {
    let result = engine.classify(&input.into_clip())?;
    Ok(result.into())
}

/// Classify an uploaded .wav or .mp3 file
pub fn classify_file(engine: &Engine, path: &Path) -> CommandResult<ClassifyOutput> {
    let clip = AudioClip::from_path(path)?;
    let result = engine.classify(&clip)?;
    Ok(result.into())
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureReport {
    pub sample_rate: u32,
    pub aligned_samples: usize,
    pub adjustment: LengthAdjustment,
    pub advisory: Option<String>,
    pub features: FeatureVector,
}

/// Run the signal stages only and return the named feature vector
pub fn extract_features(engine: &Engine, input: ClassifyInput) -> CommandResult<FeatureReport> {
    prepare_report(engine, &input.into_clip())
}

fn prepare_report(engine: &Engine, clip: &AudioClip) -> CommandResult<FeatureReport> {
    let prepared = engine.pipeline().prepare(clip)?;

    Ok(FeatureReport {
        sample_rate: prepared.signal.sample_rate,
        aligned_samples: prepared.signal.len(),
        adjustment: prepared.adjustment,
        advisory: prepared.advisory,
        features: prepared.features,
    })
}

/// Feature report for an uploaded .wav or .mp3 file
pub fn extract_file_features(engine: &Engine, path: &Path) -> CommandResult<FeatureReport> {
    let clip = AudioClip::from_path(path)?;
    prepare_report(engine, &clip)
}

pub fn describe_engine(engine: &Engine) -> EngineDescription {
    engine.describe()
}
