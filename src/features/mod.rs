// Feature extraction module
// Turns an aligned signal into the fixed-order vector the scaler expects

pub mod config;
pub mod statistical;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::Signal;

pub use config::{FeatureConfig, FeatureDefinition, FeatureFunction, FeatureParameters};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Feature dimension mismatch: scaler expects {expected} features, extractor produced {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Named feature values in configuration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        FeatureVector { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Fail fast when the vector width differs from what the scaler was fit on
    pub fn ensure_dimension(&self, expected: usize) -> Result<(), FeatureError> {
        if self.len() != expected {
            return Err(FeatureError::DimensionMismatch {
                expected,
                actual: self.len(),
            });
        }
        Ok(())
    }
}

/// Extract every enabled feature of `config` from the signal
pub fn extract_features(signal: &Signal, config: &FeatureConfig) -> FeatureVector {
    let x: Vec<f64> = signal.samples.iter().map(|&s| s as f64).collect();
    let sorted = statistical::sorted(&x);
    let median = statistical::median_sorted(&sorted);

    let mut names = Vec::with_capacity(config.cardinality());
    let mut values = Vec::with_capacity(config.cardinality());

    for definition in config.enabled() {
        let computed = compute(definition, &x, &sorted, median, signal.sample_rate);
        names.extend(definition.output_names());
        values.extend(computed);
    }

    FeatureVector::new(names, values)
}

fn compute(
    definition: &FeatureDefinition,
    x: &[f64],
    sorted: &[f64],
    median: f64,
    sample_rate: u32,
) -> Vec<f64> {
    use statistical as st;

    match definition.function {
        FeatureFunction::AbsEnergy => vec![st::abs_energy(x)],
        FeatureFunction::AveragePower => vec![st::average_power(x, sample_rate)],
        FeatureFunction::Ecdf => st::ecdf(x.len(), definition.ecdf_d()),
        FeatureFunction::EcdfPercentile => st::ecdf_percentile(sorted, &definition.percentiles()),
        FeatureFunction::EcdfPercentileCount => {
            st::ecdf_percentile_count(x.len(), &definition.percentiles())
        }
        FeatureFunction::Entropy => vec![st::entropy(sorted)],
        FeatureFunction::Histogram => st::histogram(
            x,
            definition.histogram_bins(),
            definition.histogram_range(),
        ),
        FeatureFunction::InterquartileRange => vec![st::interquartile_range_sorted(sorted)],
        FeatureFunction::Kurtosis => vec![st::kurtosis(x)],
        FeatureFunction::Max => vec![st::max(x)],
        FeatureFunction::Mean => vec![st::mean(x)],
        FeatureFunction::MeanAbsDeviation => vec![st::mean_abs_deviation(x)],
        FeatureFunction::Median => vec![median],
        FeatureFunction::MedianAbsDeviation => vec![st::median_abs_deviation(x, median)],
        FeatureFunction::Min => vec![st::min(x)],
        FeatureFunction::PeakToPeak => vec![st::peak_to_peak(x)],
        FeatureFunction::RootMeanSquare => vec![st::root_mean_square(x)],
        FeatureFunction::Skewness => vec![st::skewness(x)],
        FeatureFunction::StandardDeviation => vec![st::standard_deviation(x)],
        FeatureFunction::Variance => vec![st::variance(x)],
    }
}
