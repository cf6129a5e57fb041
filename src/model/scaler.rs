// Feature scaler artifacts

use serde::{Deserialize, Serialize};

use crate::model::backend::{ensure_finite, ensure_width, ModelError, Scaler};

/// Serialized scaler, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerArtifact {
    /// (x - mean) / scale
    StandardScaler {
        n_features_in: usize,
        mean: Vec<f64>,
        scale: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
    },

    /// x * scale + min
    MinMaxScaler {
        n_features_in: usize,
        scale: Vec<f64>,
        min: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
    },
}

impl ScalerArtifact {
    /// Check the internal widths agree; returns a reason on failure
    pub fn validate(&self) -> Result<(), String> {
        let (n, a, b, names, labels) = match self {
            ScalerArtifact::StandardScaler {
                n_features_in,
                mean,
                scale,
                feature_names,
            } => (*n_features_in, mean, scale, feature_names, ("mean", "scale")),
            ScalerArtifact::MinMaxScaler {
                n_features_in,
                scale,
                min,
                feature_names,
            } => (*n_features_in, scale, min, feature_names, ("scale", "min")),
        };

        if n == 0 {
            return Err("n_features_in must be at least 1".to_string());
        }
        if a.len() != n {
            return Err(format!("{} has {} entries, expected {}", labels.0, a.len(), n));
        }
        if b.len() != n {
            return Err(format!("{} has {} entries, expected {}", labels.1, b.len(), n));
        }
        if let Some(names) = names {
            if names.len() != n {
                return Err(format!(
                    "feature_names has {} entries, expected {}",
                    names.len(),
                    n
                ));
            }
        }
        if let Err(e) = ensure_finite(a).and_then(|_| ensure_finite(b)) {
            return Err(e.to_string());
        }

        Ok(())
    }
}

impl Scaler for ScalerArtifact {
    fn n_features_in(&self) -> usize {
        match self {
            ScalerArtifact::StandardScaler { n_features_in, .. }
            | ScalerArtifact::MinMaxScaler { n_features_in, .. } => *n_features_in,
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        match self {
            ScalerArtifact::StandardScaler { feature_names, .. }
            | ScalerArtifact::MinMaxScaler { feature_names, .. } => feature_names.as_deref(),
        }
    }

    fn transform(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(x, self.n_features_in())?;

        let scaled: Vec<f64> = match self {
            ScalerArtifact::StandardScaler { mean, scale, .. } => x
                .iter()
                .zip(mean.iter().zip(scale.iter()))
                // Constant training columns are stored with scale 0; treat as 1
                .map(|(v, (m, s))| if *s == 0.0 { v - m } else { (v - m) / s })
                .collect(),
            ScalerArtifact::MinMaxScaler { scale, min, .. } => x
                .iter()
                .zip(scale.iter().zip(min.iter()))
                .map(|(v, (s, m))| v * s + m)
                .collect(),
        };

        ensure_finite(&scaled)?;
        Ok(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler_transform() {
        let scaler = ScalerArtifact::StandardScaler {
            n_features_in: 3,
            mean: vec![1.0, 0.0, 5.0],
            scale: vec![2.0, 1.0, 0.0],
            feature_names: None,
        };
        assert!(scaler.validate().is_ok());
        assert_eq!(scaler.transform(&[3.0, -1.0, 7.0]).unwrap(), vec![1.0, -1.0, 2.0]);
    }

    #[test]
    fn test_min_max_scaler_transform() {
        let scaler = ScalerArtifact::MinMaxScaler {
            n_features_in: 2,
            scale: vec![0.5, 2.0],
            min: vec![0.0, -1.0],
            feature_names: None,
        };
        assert_eq!(scaler.transform(&[2.0, 1.0]).unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let scaler = ScalerArtifact::StandardScaler {
            n_features_in: 2,
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
            feature_names: None,
        };
        assert!(matches!(
            scaler.transform(&[1.0]),
            Err(ModelError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_validate_catches_inconsistent_widths() {
        let scaler = ScalerArtifact::StandardScaler {
            n_features_in: 3,
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0, 1.0],
            feature_names: None,
        };
        assert!(scaler.validate().is_err());
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "kind": "standard_scaler",
            "n_features_in": 2,
            "mean": [0.5, 1.5],
            "scale": [1.0, 3.0],
            "feature_names": ["0_Mean", "0_Max"]
        }"#;
        let scaler: ScalerArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(scaler.n_features_in(), 2);
        assert_eq!(
            scaler.feature_names().map(|n| n.to_vec()),
            Some(vec!["0_Mean".to_string(), "0_Max".to_string()])
        );
    }
}
