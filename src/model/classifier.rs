// Classifier artifacts
// Random forest (decision-tree ensemble) and logistic regression readers

use serde::{Deserialize, Serialize};

use crate::model::backend::{ensure_finite, ensure_width, Classifier, ModelError};

/// A decision tree node; children always come after their parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// `x[feature] <= threshold` goes left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },

    /// Per-class weights (sample counts or fractions) at this leaf
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", idx));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(format!(
                            "leaf {} has {} class weights, expected {}",
                            idx,
                            value.len(),
                            n_classes
                        ));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(format!("leaf {} has an invalid class weight", idx));
                    }
                }
            }
        }

        Ok(())
    }

    /// Walk from the root to a leaf; validation guarantees termination
    fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

/// Serialized classifier, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    RandomForest {
        classes: Vec<String>,
        n_features_in: usize,
        trees: Vec<DecisionTree>,
    },

    /// Binary models carry a single coefficient row for the second class
    LogisticRegression {
        classes: Vec<String>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
}

impl ClassifierArtifact {
    pub fn validate(&self) -> Result<(), String> {
        let classes = self.classes();
        if classes.is_empty() {
            return Err("classifier has no classes".to_string());
        }
        for (i, class) in classes.iter().enumerate() {
            if classes[..i].contains(class) {
                return Err(format!("duplicate class label {:?}", class));
            }
        }

        match self {
            ClassifierArtifact::RandomForest {
                n_features_in,
                trees,
                ..
            } => {
                if *n_features_in == 0 {
                    return Err("n_features_in must be at least 1".to_string());
                }
                if trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(*n_features_in, classes.len())
                        .map_err(|e| format!("tree {}: {}", i, e))?;
                }
            }
            ClassifierArtifact::LogisticRegression { coef, intercept, .. } => {
                let expected_rows = if classes.len() == 2 { 1 } else { classes.len() };
                if coef.len() != expected_rows || intercept.len() != expected_rows {
                    return Err(format!(
                        "expected {} coefficient rows and intercepts, got {} and {}",
                        expected_rows,
                        coef.len(),
                        intercept.len()
                    ));
                }
                let width = coef.first().map(Vec::len).unwrap_or(0);
                if width == 0 || coef.iter().any(|row| row.len() != width) {
                    return Err("coefficient rows must share a non-zero width".to_string());
                }
            }
        }

        Ok(())
    }

    fn forest_proba(trees: &[DecisionTree], n_classes: usize, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; n_classes];

        for tree in trees {
            let leaf = tree.leaf(x);
            let total: f64 = leaf.iter().sum();
            if total > 0.0 {
                for (p, w) in proba.iter_mut().zip(leaf.iter()) {
                    *p += w / total;
                }
            }
        }

        let n_trees = trees.len() as f64;
        for p in proba.iter_mut() {
            *p /= n_trees;
        }
        proba
    }

    fn logistic_proba(coef: &[Vec<f64>], intercept: &[f64], x: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = coef
            .iter()
            .zip(intercept.iter())
            .map(|(row, b)| row.iter().zip(x.iter()).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect();

        if scores.len() == 1 {
            let positive = 1.0 / (1.0 + (-scores[0]).exp());
            return vec![1.0 - positive, positive];
        }

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }
}

impl Classifier for ClassifierArtifact {
    fn classes(&self) -> &[String] {
        match self {
            ClassifierArtifact::RandomForest { classes, .. }
            | ClassifierArtifact::LogisticRegression { classes, .. } => classes,
        }
    }

    fn n_features_in(&self) -> usize {
        match self {
            ClassifierArtifact::RandomForest { n_features_in, .. } => *n_features_in,
            ClassifierArtifact::LogisticRegression { coef, .. } => {
                coef.first().map(Vec::len).unwrap_or(0)
            }
        }
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        ensure_width(x, self.n_features_in())?;
        ensure_finite(x)?;

        let proba = match self {
            ClassifierArtifact::RandomForest { classes, trees, .. } => {
                Self::forest_proba(trees, classes.len(), x)
            }
            ClassifierArtifact::LogisticRegression {
                coef, intercept, ..
            } => Self::logistic_proba(coef, intercept, x),
        };

        ensure_finite(&proba)?;
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, left: [f64; 2], right: [f64; 2]) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    value: left.to_vec(),
                },
                TreeNode::Leaf {
                    value: right.to_vec(),
                },
            ],
        }
    }

    fn forest() -> ClassifierArtifact {
        ClassifierArtifact::RandomForest {
            classes: vec!["buka".into(), "tutup".into()],
            n_features_in: 2,
            trees: vec![
                stump(0, 0.0, [9.0, 1.0], [1.0, 9.0]),
                stump(1, 0.0, [1.0, 0.0], [0.0, 1.0]),
            ],
        }
    }

    #[test]
    fn test_forest_averages_normalized_leaves() {
        let model = forest();
        assert!(model.validate().is_ok());

        let proba = model.predict_proba(&[-1.0, -1.0]).unwrap();
        assert!((proba[0] - 0.95).abs() < 1e-12);
        assert!((proba[1] - 0.05).abs() < 1e-12);
        assert_eq!(model.predict(&[-1.0, -1.0]).unwrap(), "buka");

        let proba = model.predict_proba(&[1.0, 1.0]).unwrap();
        assert!((proba[1] - 0.95).abs() < 1e-12);
        assert_eq!(model.predict(&[1.0, 1.0]).unwrap(), "tutup");
    }

    #[test]
    fn test_split_threshold_is_inclusive_left() {
        let model = forest();
        let proba = model.predict_proba(&[0.0, 0.0]).unwrap();
        assert!(proba[0] > proba[1]);
    }

    #[test]
    fn test_forest_rejects_wrong_width() {
        assert!(matches!(
            forest().predict_proba(&[1.0]),
            Err(ModelError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let model = ClassifierArtifact::RandomForest {
            classes: vec!["a".into(), "b".into()],
            n_features_in: 1,
            trees: vec![DecisionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 0.0,
                        left: 0,
                        right: 1,
                    },
                    TreeNode::Leaf {
                        value: vec![1.0, 0.0],
                    },
                ],
            }],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_leaf_width() {
        let model = ClassifierArtifact::RandomForest {
            classes: vec!["a".into(), "b".into(), "c".into()],
            n_features_in: 2,
            trees: vec![stump(0, 0.0, [1.0, 0.0], [0.0, 1.0])],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_logistic_binary() {
        let model = ClassifierArtifact::LogisticRegression {
            classes: vec!["buka".into(), "tutup".into()],
            coef: vec![vec![2.0, 0.0]],
            intercept: vec![0.0],
        };
        assert!(model.validate().is_ok());

        let proba = model.predict_proba(&[0.0, 5.0]).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);

        assert_eq!(model.predict(&[3.0, 0.0]).unwrap(), "tutup");
        assert_eq!(model.predict(&[-3.0, 0.0]).unwrap(), "buka");
    }

    #[test]
    fn test_logistic_multiclass_sums_to_one() {
        let model = ClassifierArtifact::LogisticRegression {
            classes: vec!["a".into(), "b".into(), "c".into()],
            coef: vec![vec![1.0], vec![0.0], vec![-1.0]],
            intercept: vec![0.0, 0.5, 0.0],
        };
        let proba = model.predict_proba(&[2.0]).unwrap();
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(model.predict(&[2.0]).unwrap(), "a");
    }

    #[test]
    fn test_parse_forest_json() {
        let json = r#"{
            "kind": "random_forest",
            "classes": ["buka", "tutup"],
            "n_features_in": 1,
            "trees": [
                { "nodes": [
                    { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                    { "value": [3.0, 1.0] },
                    { "value": [0.0, 4.0] }
                ] }
            ]
        }"#;
        let model: ClassifierArtifact = serde_json::from_str(json).unwrap();
        assert!(model.validate().is_ok());
        assert_eq!(model.predict_proba(&[0.0]).unwrap(), vec![0.75, 0.25]);
    }
}
