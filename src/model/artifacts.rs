// Artifact loading
// Reads the serialized scaler and classifier once at startup and pins their digests

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{ClassifierArtifact, ScalerArtifact};

#[derive(Debug, Error)]
pub enum ArtifactLoadError {
    #[error("Artifact not found or unreadable at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Artifact {path} is invalid: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("Artifact {path} has digest {actual}, expected {expected}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// A loaded artifact together with where it came from
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub artifact: T,
    pub path: PathBuf,
    pub sha256: String,
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn load_json<T: DeserializeOwned>(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<(T, String), ArtifactLoadError> {
    let data = std::fs::read(path).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let sha256 = calculate_sha256(&data);
    if let Some(expected) = expected_sha256 {
        if !expected.eq_ignore_ascii_case(&sha256) {
            return Err(ArtifactLoadError::DigestMismatch {
                path: path.to_path_buf(),
                expected: expected.to_ascii_lowercase(),
                actual: sha256,
            });
        }
    }

    let artifact = serde_json::from_slice(&data).map_err(|source| ArtifactLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok((artifact, sha256))
}

pub fn load_scaler(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<Loaded<ScalerArtifact>, ArtifactLoadError> {
    let (artifact, sha256) = load_json::<ScalerArtifact>(path, expected_sha256)?;
    artifact
        .validate()
        .map_err(|reason| ArtifactLoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;

    log::info!("Loaded scaler {} (sha256 {})", path.display(), sha256);
    Ok(Loaded {
        artifact,
        path: path.to_path_buf(),
        sha256,
    })
}

pub fn load_classifier(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<Loaded<ClassifierArtifact>, ArtifactLoadError> {
    let (artifact, sha256) = load_json::<ClassifierArtifact>(path, expected_sha256)?;
    artifact
        .validate()
        .map_err(|reason| ArtifactLoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;

    log::info!("Loaded classifier {} (sha256 {})", path.display(), sha256);
    Ok(Loaded {
        artifact,
        path: path.to_path_buf(),
        sha256,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scaler;
    use tempfile::TempDir;

    const SCALER_JSON: &str = r#"{
        "kind": "standard_scaler",
        "n_features_in": 2,
        "mean": [0.0, 0.0],
        "scale": [1.0, 1.0]
    }"#;

    #[test]
    fn test_calculate_sha256() {
        let data = b"hello world";
        let hash = calculate_sha256(data);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_load_scaler() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scaler.json");
        std::fs::write(&path, SCALER_JSON).unwrap();

        let loaded = load_scaler(&path, None).unwrap();
        assert_eq!(loaded.artifact.n_features_in(), 2);
        assert_eq!(loaded.sha256, calculate_sha256(SCALER_JSON.as_bytes()));

        let pinned = load_scaler(&path, Some(&loaded.sha256.to_uppercase()));
        assert!(pinned.is_ok());
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_classifier(&temp_dir.path().join("model.json"), None);
        assert!(matches!(result, Err(ArtifactLoadError::Io { .. })));
    }

    #[test]
    fn test_corrupt_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        std::fs::write(&path, b"\x80\x04\x95 pickled bytes").unwrap();

        assert!(matches!(
            load_classifier(&path, None),
            Err(ArtifactLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scaler.json");
        std::fs::write(
            &path,
            r#"{ "kind": "standard_scaler", "n_features_in": 3, "mean": [0.0], "scale": [1.0] }"#,
        )
        .unwrap();

        assert!(matches!(
            load_scaler(&path, None),
            Err(ArtifactLoadError::Invalid { .. })
        ));
    }

    #[test]
    fn test_digest_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scaler.json");
        std::fs::write(&path, SCALER_JSON).unwrap();

        let wrong = "0".repeat(64);
        assert!(matches!(
            load_scaler(&path, Some(&wrong)),
            Err(ArtifactLoadError::DigestMismatch { .. })
        ));
    }
}
