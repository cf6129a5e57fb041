// Process-wide classification engine
// Loads configuration and artifacts once; every request borrows them read-only

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::audio::AudioClip;
use crate::config::{AppConfig, ConfigLoadError};
use crate::features::FeatureConfig;
use crate::model::{
    load_classifier, load_scaler, ArtifactLoadError, Classifier, ClassifierArtifact, Loaded,
    Scaler, ScalerArtifact,
};
use crate::pipeline::{Pipeline, PipelineError, PredictionResult, SignalSettings, TraceWriter};

/// Fatal startup failures; no request is served after one of these
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    ArtifactLoad(#[from] ArtifactLoadError),

    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),
}

/// Where an artifact was loaded from and its content digest
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub sha256: String,
}

impl<T> From<&Loaded<T>> for ArtifactInfo {
    fn from(loaded: &Loaded<T>) -> Self {
        ArtifactInfo {
            path: loaded.path.clone(),
            sha256: loaded.sha256.clone(),
        }
    }
}

/// Summary of the loaded engine for inspection
#[derive(Debug, Clone, Serialize)]
pub struct EngineDescription {
    pub classes: Vec<String>,
    pub scaler_features: usize,
    pub classifier_features: usize,
    pub extractor_features: usize,
    pub feature_names: Vec<String>,
    pub target_duration_seconds: f64,
    pub resample_rate_hz: Option<u32>,
    pub model: Option<ArtifactInfo>,
    pub scaler: Option<ArtifactInfo>,
}

pub struct Engine {
    scaler: Box<dyn Scaler>,
    classifier: Box<dyn Classifier>,
    features: FeatureConfig,
    settings: SignalSettings,
    trace: Option<TraceWriter>,
    model_info: Option<ArtifactInfo>,
    scaler_info: Option<ArtifactInfo>,
}

impl Engine {
    /// Load every artifact named by `config`
    pub fn load(config: &AppConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let features = FeatureConfig::load(config.feature_config_path.as_deref())?;
        let scaler: Loaded<ScalerArtifact> =
            load_scaler(&config.scaler_path, config.scaler_sha256.as_deref())?;
        let classifier: Loaded<ClassifierArtifact> =
            load_classifier(&config.model_path, config.model_sha256.as_deref())?;

        let model_info = ArtifactInfo::from(&classifier);
        let scaler_info = ArtifactInfo::from(&scaler);

        let mut engine = Engine::from_parts(
            Box::new(scaler.artifact),
            Box::new(classifier.artifact),
            features,
            SignalSettings {
                target_duration_seconds: config.target_duration_seconds,
                resample_rate_hz: config.resample_rate_hz,
            },
        );
        engine.model_info = Some(model_info);
        engine.scaler_info = Some(scaler_info);
        engine.trace = config.trace_path.clone().map(TraceWriter::new);

        Ok(engine)
    }

    /// Assemble an engine from already-built parts
    pub fn from_parts(
        scaler: Box<dyn Scaler>,
        classifier: Box<dyn Classifier>,
        features: FeatureConfig,
        settings: SignalSettings,
    ) -> Self {
        let engine = Engine {
            scaler,
            classifier,
            features,
            settings,
            trace: None,
            model_info: None,
            scaler_info: None,
        };
        engine.check_consistency();
        engine
    }

    // Mismatches are reported here; requests still fail individually
    fn check_consistency(&self) {
        let cardinality = self.features.cardinality();
        let scaler_width = self.scaler.n_features_in();
        let classifier_width = self.classifier.n_features_in();

        log::info!(
            "Engine ready: classes {:?}, {} features, target {}s",
            self.classifier.classes(),
            cardinality,
            self.settings.target_duration_seconds
        );

        if cardinality != scaler_width {
            log::warn!(
                "Feature configuration yields {} features but the scaler expects {}; every request will fail",
                cardinality,
                scaler_width
            );
        }

        if scaler_width != classifier_width {
            log::warn!(
                "Scaler outputs {} features but the classifier expects {}",
                scaler_width,
                classifier_width
            );
        }

        if let Some(names) = self.scaler.feature_names() {
            let expected = self.features.feature_names();
            if names != expected.as_slice() {
                log::warn!("Scaler feature names differ from the feature configuration order");
            }
        }
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(
            self.scaler.as_ref(),
            self.classifier.as_ref(),
            &self.features,
            self.settings,
        )
        .with_trace(self.trace.as_ref())
    }

    pub fn classify(&self, clip: &AudioClip) -> Result<PredictionResult, PipelineError> {
        self.pipeline().run(clip)
    }

    pub fn trace(&self) -> Option<&TraceWriter> {
        self.trace.as_ref()
    }

    pub fn describe(&self) -> EngineDescription {
        EngineDescription {
            classes: self.classifier.classes().to_vec(),
            scaler_features: self.scaler.n_features_in(),
            classifier_features: self.classifier.n_features_in(),
            extractor_features: self.features.cardinality(),
            feature_names: self.features.feature_names(),
            target_duration_seconds: self.settings.target_duration_seconds,
            resample_rate_hz: self.settings.resample_rate_hz,
            model: self.model_info.clone(),
            scaler: self.scaler_info.clone(),
        }
    }
}
