// Pipeline execution
// Runs one clip through every stage; the first failure aborts the rest

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::audio::{self, AudioClip, DecodeError, LengthAdjustment, Signal, SilentSignalError};
use crate::features::{self, FeatureConfig, FeatureError, FeatureVector};
use crate::model::{confidence_for_label, Classifier, ModelError, Scaler};
use crate::pipeline::trace::{RequestTrace, TraceWriter};
use crate::pipeline::Stage;

/// Per-request failures; each one names the stage it stopped at
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Normalizing failed: {0}")]
    SilentSignal(#[from] SilentSignalError),

    #[error("Feature extraction failed: {0}")]
    FeatureDimensionMismatch(#[from] FeatureError),

    #[error("{stage} failed: {source}")]
    Prediction {
        stage: Stage,
        #[source]
        source: ModelError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Decode(_) => Stage::Decoding,
            PipelineError::SilentSignal(_) => Stage::Normalizing,
            PipelineError::FeatureDimensionMismatch(_) => Stage::Extracting,
            PipelineError::Prediction { stage, .. } => *stage,
        }
    }
}

/// Signal shaping constants shared by every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSettings {
    pub target_duration_seconds: f64,
    pub resample_rate_hz: Option<u32>,
}

impl Default for SignalSettings {
    fn default() -> Self {
        SignalSettings {
            target_duration_seconds: 2.0,
            resample_rate_hz: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Successful classification of one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub request_id: Uuid,

    /// One of the classifier's classes, as stored in the artifact
    pub label: String,

    /// Probability of `label` as a percentage [0, 100]
    pub confidence: f64,

    pub probabilities: Vec<ClassProbability>,

    pub adjustment: LengthAdjustment,

    /// Non-fatal notice shown when the clip was truncated or padded
    pub advisory: Option<String>,

    pub sample_rate: u32,

    pub aligned_samples: usize,
}

/// Output of the signal stages, before any model call
#[derive(Debug, Clone)]
pub struct PreparedClip {
    pub signal: Signal,
    pub adjustment: LengthAdjustment,
    pub advisory: Option<String>,
    pub features: FeatureVector,
}

/// Borrowed view over the process-wide artifacts for running requests
pub struct Pipeline<'a> {
    scaler: &'a dyn Scaler,
    classifier: &'a dyn Classifier,
    features: &'a FeatureConfig,
    settings: SignalSettings,
    trace: Option<&'a TraceWriter>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        scaler: &'a dyn Scaler,
        classifier: &'a dyn Classifier,
        features: &'a FeatureConfig,
        settings: SignalSettings,
    ) -> Self {
        Pipeline {
            scaler,
            classifier,
            features,
            settings,
            trace: None,
        }
    }

    pub fn with_trace(mut self, writer: Option<&'a TraceWriter>) -> Self {
        self.trace = writer;
        self
    }

    /// Classify one clip end to end
    pub fn run(&self, clip: &AudioClip) -> Result<PredictionResult, PipelineError> {
        let trace = RequestTrace::new(Uuid::new_v4(), self.trace);

        let result = self.run_stages(clip, &trace);

        match &result {
            Ok(prediction) => {
                log::info!(
                    "Predicted {:?} with {:.2}% confidence",
                    prediction.label,
                    prediction.confidence
                );
                trace.record_with_data(
                    Stage::Succeeded,
                    "Prediction complete",
                    serde_json::json!({
                        "label": prediction.label,
                        "confidence": prediction.confidence,
                    }),
                );
            }
            Err(e) => {
                log::warn!("Request {} failed at {}: {}", trace.request_id(), e.stage(), e);
                trace.record_with_data(
                    Stage::Failed,
                    e.to_string(),
                    serde_json::json!({ "failed_stage": e.stage() }),
                );
            }
        }

        result
    }

    /// Decode, normalize, align and extract without touching the models
    pub fn prepare(&self, clip: &AudioClip) -> Result<PreparedClip, PipelineError> {
        let trace = RequestTrace::new(Uuid::new_v4(), self.trace);
        self.prepare_traced(clip, &trace)
    }

    fn prepare_traced(
        &self,
        clip: &AudioClip,
        trace: &RequestTrace<'_>,
    ) -> Result<PreparedClip, PipelineError> {
        trace.record(Stage::Decoding, format!("Decoding {} bytes", clip.bytes.len()));
        let mut signal = audio::decode(clip)?;
        if let Some(rate) = self.settings.resample_rate_hz {
            audio::resample_to(&mut signal, rate)?;
        }

        trace.record_with_data(
            Stage::Normalizing,
            "Normalizing peak amplitude",
            serde_json::json!({
                "samples": signal.len(),
                "sample_rate": signal.sample_rate,
            }),
        );
        let peak = audio::normalize_peak(&mut signal)?;
        log::debug!("Normalized by peak {:.6}", peak);

        let target = audio::target_len(self.settings.target_duration_seconds, signal.sample_rate);
        trace.record(Stage::Aligning, format!("Aligning to {} samples", target));
        let adjustment = audio::align_length(&mut signal, target);
        let advisory = adjustment.advisory(self.settings.target_duration_seconds);
        if let Some(ref message) = advisory {
            log::warn!("{} ({:?})", message, adjustment);
        }

        trace.record(Stage::Extracting, "Extracting features");
        let features = features::extract_features(&signal, self.features);

        Ok(PreparedClip {
            signal,
            adjustment,
            advisory,
            features,
        })
    }

    fn run_stages(
        &self,
        clip: &AudioClip,
        trace: &RequestTrace<'_>,
    ) -> Result<PredictionResult, PipelineError> {
        let prepared = self.prepare_traced(clip, trace)?;

        prepared
            .features
            .ensure_dimension(self.scaler.n_features_in())?;

        trace.record(Stage::Scaling, "Scaling features");
        let scaled = self
            .scaler
            .transform(prepared.features.values())
            .map_err(|source| PipelineError::Prediction {
                stage: Stage::Scaling,
                source,
            })?;

        trace.record(Stage::Predicting, "Classifying");
        let predicting = |source| PipelineError::Prediction {
            stage: Stage::Predicting,
            source,
        };
        let label = self.classifier.predict(&scaled).map_err(predicting)?;
        let proba = self.classifier.predict_proba(&scaled).map_err(predicting)?;
        let classes = self.classifier.classes();
        let confidence = confidence_for_label(&label, classes, &proba).map_err(predicting)?;

        let probabilities = classes
            .iter()
            .zip(proba.iter())
            .map(|(label, &probability)| ClassProbability {
                label: label.clone(),
                probability,
            })
            .collect();

        Ok(PredictionResult {
            request_id: trace.request_id(),
            label,
            confidence,
            probabilities,
            adjustment: prepared.adjustment,
            advisory: prepared.advisory,
            sample_rate: prepared.signal.sample_rate,
            aligned_samples: prepared.signal.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ingest::tests::wav_with_rate;
    use crate::audio::{encode_wav, AudioHint};
    use crate::model::testing::{CountingScaler, FailingClassifier, ScriptedClassifier};
    use crate::model::{ClassifierArtifact, DecisionTree, ScalerArtifact, TreeNode};
    use crate::pipeline::trace::read_trace_file;
    use tempfile::TempDir;

    const SR: u32 = 16000;

    fn tone_wav(seconds: f64, sample_rate: u32) -> AudioClip {
        let len = (seconds * sample_rate as f64) as usize;
        let samples: Vec<f32> = (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 330.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioClip::new(encode_wav(&samples, sample_rate).unwrap(), AudioHint::Wav)
    }

    fn silent_wav(seconds: f64, sample_rate: u32) -> AudioClip {
        let len = (seconds * sample_rate as f64) as usize;
        AudioClip::new(encode_wav(&vec![0.0; len], sample_rate).unwrap(), AudioHint::Wav)
    }

    fn identity_scaler(n: usize) -> ScalerArtifact {
        ScalerArtifact::StandardScaler {
            n_features_in: n,
            mean: vec![0.0; n],
            scale: vec![1.0; n],
            feature_names: None,
        }
    }

    /// Splits on the mean feature (index 30 of the statistical layout)
    fn stump_forest(n: usize) -> ClassifierArtifact {
        ClassifierArtifact::RandomForest {
            classes: vec!["buka".into(), "tutup".into()],
            n_features_in: n,
            trees: vec![DecisionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 30,
                        threshold: 0.0,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf {
                        value: vec![7.0, 3.0],
                    },
                    TreeNode::Leaf {
                        value: vec![2.0, 8.0],
                    },
                ],
            }],
        }
    }

    fn settings() -> SignalSettings {
        SignalSettings::default()
    }

    #[test]
    fn test_silent_clip_stops_before_prediction() {
        let config = FeatureConfig::statistical();
        let scaler = CountingScaler::new(config.cardinality());
        let classifier = ScriptedClassifier::new(&["buka", "tutup"], 40, "buka", &[1.0, 0.0]);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let err = pipeline.run(&silent_wav(1.0, SR)).unwrap_err();

        assert!(matches!(err, PipelineError::SilentSignal(_)));
        assert_eq!(err.stage(), Stage::Normalizing);
        assert_eq!(scaler.calls(), 0);
        assert_eq!(classifier.calls(), 0);
    }

    #[test]
    fn test_long_clip_is_truncated_and_classified() {
        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let result = pipeline.run(&tone_wav(3.0, SR)).unwrap();

        assert_eq!(result.aligned_samples, 2 * SR as usize);
        assert_eq!(
            result.adjustment,
            LengthAdjustment::Truncated {
                from: 3 * SR as usize,
                to: 2 * SR as usize
            }
        );
        assert_eq!(result.advisory.as_deref(), Some("Signal truncated to 2 seconds."));
        assert!(classifier.classes().contains(&result.label));
        assert!(result.confidence >= 0.0 && result.confidence <= 100.0);
        assert_eq!(result.probabilities.len(), 2);
    }

    #[test]
    fn test_short_clip_is_padded() {
        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let result = pipeline.run(&tone_wav(1.0, SR)).unwrap();

        assert_eq!(result.aligned_samples, 2 * SR as usize);
        assert!(matches!(result.adjustment, LengthAdjustment::Padded { from: 16000, to: 32000 }));
        assert_eq!(result.advisory.as_deref(), Some("Signal zero-padded to 2 seconds."));
    }

    #[test]
    fn test_exact_length_has_no_advisory() {
        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let result = pipeline.run(&tone_wav(2.0, SR)).unwrap();

        assert_eq!(result.adjustment, LengthAdjustment::Unchanged { samples: 32000 });
        assert!(result.advisory.is_none());
    }

    #[test]
    fn test_prepared_signal_is_unit_peak() {
        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let prepared = pipeline.prepare(&tone_wav(0.5, SR)).unwrap();

        assert!((prepared.signal.peak() - 1.0).abs() < 1e-6);
        assert_eq!(prepared.signal.len(), 32000);
        assert_eq!(prepared.features.len(), 40);
    }

    #[test]
    fn test_dimension_mismatch_halts_before_scaling() {
        let config = FeatureConfig::statistical();
        let scaler = CountingScaler::new(39);
        let classifier = ScriptedClassifier::new(&["buka", "tutup"], 39, "buka", &[1.0, 0.0]);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let err = pipeline.run(&tone_wav(2.0, SR)).unwrap_err();

        match err {
            PipelineError::FeatureDimensionMismatch(FeatureError::DimensionMismatch {
                expected,
                actual,
            }) => {
                assert_eq!(expected, 39);
                assert_eq!(actual, 40);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(scaler.calls(), 0);
        assert_eq!(classifier.calls(), 0);
    }

    #[test]
    fn test_confidence_follows_predicted_label() {
        let config = FeatureConfig::statistical();
        let scaler = CountingScaler::new(40);
        // Predicted label is deliberately not the argmax class
        let classifier =
            ScriptedClassifier::new(&["buka", "tutup", "diam"], 40, "diam", &[0.2, 0.5, 0.3]);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let result = pipeline.run(&tone_wav(2.0, SR)).unwrap();

        assert_eq!(result.label, "diam");
        assert!((result.confidence - 30.0).abs() < 1e-9);
        assert_eq!(scaler.calls(), 1);
    }

    #[test]
    fn test_classifier_failure_is_prediction_error() {
        let config = FeatureConfig::statistical();
        let scaler = CountingScaler::new(40);
        let classifier = FailingClassifier {
            classes: vec!["buka".into()],
        };
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let err = pipeline.run(&tone_wav(2.0, SR)).unwrap_err();

        assert!(matches!(err, PipelineError::Prediction { .. }));
        assert_eq!(err.stage(), Stage::Predicting);
    }

    #[test]
    fn test_scaler_failure_reports_scaling_stage() {
        let config = FeatureConfig::statistical();
        // Abs energy of the aligned tone is far above 1, so this overflows
        let scaler = ScalerArtifact::MinMaxScaler {
            n_features_in: 40,
            scale: vec![f64::MAX; 40],
            min: vec![0.0; 40],
            feature_names: None,
        };
        let classifier = stump_forest(40);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let err = pipeline.run(&tone_wav(2.0, SR)).unwrap_err();
        assert_eq!(err.stage(), Stage::Scaling);
    }

    #[test]
    fn test_garbage_bytes_fail_decoding() {
        let config = FeatureConfig::statistical();
        let scaler = CountingScaler::new(40);
        let classifier = ScriptedClassifier::new(&["buka"], 40, "buka", &[1.0]);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let clip = AudioClip::new(vec![0x42; 256], AudioHint::Unknown);
        let err = pipeline.run(&clip).unwrap_err();

        assert_eq!(err.stage(), Stage::Decoding);
        assert_eq!(classifier.calls(), 0);
    }

    #[test]
    fn test_header_sample_rate_out_of_range_fails_decoding() {
        let config = FeatureConfig::statistical();
        let scaler = CountingScaler::new(40);
        let classifier = ScriptedClassifier::new(&["buka"], 40, "buka", &[1.0]);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        for rate in [0, u32::MAX] {
            let clip = AudioClip::new(wav_with_rate(rate, &[1000, -1000, 500]), AudioHint::Wav);
            let err = pipeline.run(&clip).unwrap_err();

            assert!(matches!(
                err,
                PipelineError::Decode(DecodeError::UnsupportedSampleRate(r)) if r == rate
            ));
            assert_eq!(err.stage(), Stage::Decoding);
        }
        assert_eq!(scaler.calls(), 0);
        assert_eq!(classifier.calls(), 0);
    }

    #[test]
    fn test_mp3_clip_is_classified() {
        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings());

        let clip = AudioClip::new(
            include_bytes!("../audio/testdata/tone.mp3").to_vec(),
            AudioHint::Mp3,
        );
        let result = pipeline.run(&clip).unwrap();

        assert_eq!(result.sample_rate, 32000);
        assert_eq!(result.aligned_samples, 64000);
        assert!(matches!(result.adjustment, LengthAdjustment::Padded { .. }));
        assert!(classifier.classes().contains(&result.label));
        assert!(result.confidence >= 0.0 && result.confidence <= 100.0);
    }

    #[test]
    fn test_resampling_sets_target_length_at_canonical_rate() {
        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let settings = SignalSettings {
            target_duration_seconds: 2.0,
            resample_rate_hz: Some(16000),
        };
        let pipeline = Pipeline::new(&scaler, &classifier, &config, settings);

        let result = pipeline.run(&tone_wav(1.0, 48000)).unwrap();

        assert_eq!(result.sample_rate, 16000);
        assert_eq!(result.aligned_samples, 32000);
    }

    #[test]
    fn test_trace_records_every_stage() {
        let temp_dir = TempDir::new().unwrap();
        let writer = TraceWriter::new(temp_dir.path().join("trace.jsonl"));

        let config = FeatureConfig::statistical();
        let scaler = identity_scaler(40);
        let classifier = stump_forest(40);
        let pipeline =
            Pipeline::new(&scaler, &classifier, &config, settings()).with_trace(Some(&writer));

        pipeline.run(&tone_wav(2.0, SR)).unwrap();
        pipeline.run(&silent_wav(1.0, SR)).unwrap_err();

        let entries = read_trace_file(writer.path()).unwrap();
        let stages: Vec<Stage> = entries.iter().map(|e| e.stage).collect();

        let mut expected: Vec<Stage> = Stage::ORDER.to_vec();
        expected.push(Stage::Succeeded);
        expected.extend([Stage::Decoding, Stage::Normalizing, Stage::Failed]);
        assert_eq!(stages, expected);
        assert_ne!(entries[0].request_id, entries.last().unwrap().request_id);
    }
}
