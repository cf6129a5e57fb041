// Feature configuration
// Named, ordered statistical feature definitions; fixes the vector layout

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ConfigLoadError;

/// Statistical feature functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFunction {
    AbsEnergy,
    AveragePower,
    Ecdf,
    EcdfPercentile,
    EcdfPercentileCount,
    Entropy,
    Histogram,
    InterquartileRange,
    Kurtosis,
    Max,
    Mean,
    MeanAbsDeviation,
    Median,
    MedianAbsDeviation,
    Min,
    PeakToPeak,
    RootMeanSquare,
    Skewness,
    StandardDeviation,
    Variance,
}

/// Optional parameters; only the ones a function reads matter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureParameters {
    /// ECDF ordinates to emit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<usize>,

    /// Percentiles in [0, 1] for the ECDF percentile features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<Vec<f64>>,

    /// Histogram bin count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbins: Option<usize>,

    /// Histogram covers [-r, r]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
}

pub const DEFAULT_ECDF_D: usize = 10;
pub const DEFAULT_PERCENTILES: [f64; 2] = [0.2, 0.8];
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;
pub const DEFAULT_HISTOGRAM_RANGE: f64 = 1.0;

fn enabled_by_default() -> bool {
    true
}

/// One entry of the feature configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub name: String,

    pub function: FeatureFunction,

    #[serde(default)]
    pub parameters: FeatureParameters,

    #[serde(rename = "use", default = "enabled_by_default")]
    pub enabled: bool,
}

impl FeatureDefinition {
    pub fn new(name: &str, function: FeatureFunction) -> Self {
        FeatureDefinition {
            name: name.to_string(),
            function,
            parameters: FeatureParameters::default(),
            enabled: true,
        }
    }

    fn with_parameters(mut self, parameters: FeatureParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn ecdf_d(&self) -> usize {
        self.parameters.d.unwrap_or(DEFAULT_ECDF_D)
    }

    pub fn percentiles(&self) -> Vec<f64> {
        self.parameters
            .percentile
            .clone()
            .unwrap_or_else(|| DEFAULT_PERCENTILES.to_vec())
    }

    pub fn histogram_bins(&self) -> usize {
        self.parameters.nbins.unwrap_or(DEFAULT_HISTOGRAM_BINS)
    }

    pub fn histogram_range(&self) -> f64 {
        self.parameters.r.unwrap_or(DEFAULT_HISTOGRAM_RANGE)
    }

    /// Number of values this definition contributes to the vector
    pub fn output_count(&self) -> usize {
        match self.function {
            FeatureFunction::Ecdf => self.ecdf_d(),
            FeatureFunction::EcdfPercentile | FeatureFunction::EcdfPercentileCount => {
                self.percentiles().len()
            }
            FeatureFunction::Histogram => self.histogram_bins(),
            _ => 1,
        }
    }

    /// Column names, `0_<name>` or `0_<name>_<i>` for multi-valued features
    pub fn output_names(&self) -> Vec<String> {
        let count = self.output_count();
        let multi = matches!(
            self.function,
            FeatureFunction::Ecdf
                | FeatureFunction::EcdfPercentile
                | FeatureFunction::EcdfPercentileCount
                | FeatureFunction::Histogram
        );

        if multi {
            (0..count).map(|i| format!("0_{}_{}", self.name, i)).collect()
        } else {
            vec![format!("0_{}", self.name)]
        }
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        let invalid = |reason: String| ConfigLoadError::Invalid {
            field: format!("features.{}", self.name),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                field: "features.name".to_string(),
                reason: "feature name must not be empty".to_string(),
            });
        }

        match self.function {
            FeatureFunction::Ecdf if self.ecdf_d() == 0 => {
                Err(invalid("d must be at least 1".to_string()))
            }
            FeatureFunction::EcdfPercentile | FeatureFunction::EcdfPercentileCount => {
                let percentiles = self.percentiles();
                if percentiles.is_empty() {
                    return Err(invalid("percentile list must not be empty".to_string()));
                }
                match percentiles
                    .iter()
                    .find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0)
                {
                    Some(p) => Err(invalid(format!("percentile {} outside [0, 1]", p))),
                    None => Ok(()),
                }
            }
            FeatureFunction::Histogram => {
                if self.histogram_bins() == 0 {
                    return Err(invalid("nbins must be at least 1".to_string()));
                }
                let r = self.histogram_range();
                if !r.is_finite() || r <= 0.0 {
                    return Err(invalid(format!("histogram range must be positive, got {}", r)));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Ordered feature set defining vector layout and cardinality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_domain")]
    pub domain: String,

    pub features: Vec<FeatureDefinition>,
}

fn default_domain() -> String {
    "statistical".to_string()
}

impl FeatureConfig {
    /// The statistical domain feature set the bundled artifacts are built on
    pub fn statistical() -> Self {
        use FeatureFunction::*;

        let percentiles = FeatureParameters {
            percentile: Some(DEFAULT_PERCENTILES.to_vec()),
            ..FeatureParameters::default()
        };

        let features = vec![
            FeatureDefinition::new("Absolute energy", AbsEnergy),
            FeatureDefinition::new("Average power", AveragePower),
            FeatureDefinition::new("ECDF", Ecdf).with_parameters(FeatureParameters {
                d: Some(DEFAULT_ECDF_D),
                ..FeatureParameters::default()
            }),
            FeatureDefinition::new("ECDF Percentile", EcdfPercentile)
                .with_parameters(percentiles.clone()),
            FeatureDefinition::new("ECDF Percentile Count", EcdfPercentileCount)
                .with_parameters(percentiles),
            FeatureDefinition::new("Entropy", Entropy),
            FeatureDefinition::new("Histogram", Histogram).with_parameters(FeatureParameters {
                nbins: Some(DEFAULT_HISTOGRAM_BINS),
                r: Some(DEFAULT_HISTOGRAM_RANGE),
                ..FeatureParameters::default()
            }),
            FeatureDefinition::new("Interquartile range", InterquartileRange),
            FeatureDefinition::new("Kurtosis", Kurtosis),
            FeatureDefinition::new("Max", Max),
            FeatureDefinition::new("Mean", Mean),
            FeatureDefinition::new("Mean absolute deviation", MeanAbsDeviation),
            FeatureDefinition::new("Median", Median),
            FeatureDefinition::new("Median absolute deviation", MedianAbsDeviation),
            FeatureDefinition::new("Min", Min),
            FeatureDefinition::new("Peak to peak distance", PeakToPeak),
            FeatureDefinition::new("Root mean square", RootMeanSquare),
            FeatureDefinition::new("Skewness", Skewness),
            FeatureDefinition::new("Standard deviation", StandardDeviation),
            FeatureDefinition::new("Variance", Variance),
        ];

        FeatureConfig {
            domain: default_domain(),
            features,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let data = std::fs::read(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: FeatureConfig =
            serde_json::from_slice(&data).map_err(|source| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a file, or fall back to the statistical set
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::statistical()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.enabled().next().is_none() {
            return Err(ConfigLoadError::Invalid {
                field: "features".to_string(),
                reason: "no enabled features".to_string(),
            });
        }

        for definition in self.enabled() {
            definition.validate()?;
        }

        Ok(())
    }

    /// Enabled definitions in output order
    pub fn enabled(&self) -> impl Iterator<Item = &FeatureDefinition> {
        self.features.iter().filter(|f| f.enabled)
    }

    /// Vector length this configuration produces, independent of the signal
    pub fn cardinality(&self) -> usize {
        self.enabled().map(|f| f.output_count()).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.enabled().flat_map(|f| f.output_names()).collect()
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::statistical()
    }
}
