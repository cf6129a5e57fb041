// Test doubles for the model seams

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{Classifier, ModelError, Scaler};

/// Identity scaler that counts transform calls
pub struct CountingScaler {
    pub n_features: usize,
    pub calls: AtomicUsize,
}

impl CountingScaler {
    pub fn new(n_features: usize) -> Self {
        CountingScaler {
            n_features,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scaler for CountingScaler {
    fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn transform(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(x.to_vec())
    }
}

/// Classifier with a fixed answer that counts predict/predict_proba calls
pub struct ScriptedClassifier {
    pub classes: Vec<String>,
    pub n_features: usize,
    pub label: String,
    pub proba: Vec<f64>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(classes: &[&str], n_features: usize, label: &str, proba: &[f64]) -> Self {
        ScriptedClassifier {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            n_features,
            label: label.to_string(),
            proba: proba.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, _x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.proba.clone())
    }

    fn predict(&self, _x: &[f64]) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.label.clone())
    }
}

/// Classifier whose every call fails
pub struct FailingClassifier {
    pub classes: Vec<String>,
}

impl Classifier for FailingClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features_in(&self) -> usize {
        0
    }

    fn predict_proba(&self, _x: &[f64]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::ClassificationError("numerical failure".to_string()))
    }
}
