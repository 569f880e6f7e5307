use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::algorithm::AlgorithmSet;
use crate::engine::{FailurePolicy, DEFAULT_BATCH_SIZE};
use crate::error::{FuzzError, FuzzResult};

pub const DEFAULT_DATABASE_FILE_NAME: &str = "fuzzer-results.sqlite";

/// Everything a fuzzing run needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    /// Directory holding `fuzzer-input.json` and the listed images.
    pub input_path: PathBuf,
    /// Directory receiving the CSV report, annotated images and the default database.
    pub output_path: PathBuf,
    pub algorithms: AlgorithmSet,
    /// Parameter sets run concurrently per batch.
    pub batch_size: usize,
    #[serde(with = "failure_policy_serde")]
    pub failure_policy: FailurePolicy,
    pub write_images: bool,
    /// Overrides `<output_path>/fuzzer-results.sqlite`.
    pub database_path: Option<PathBuf>,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: PathBuf::new(),
            algorithms: AlgorithmSet::all(),
            batch_size: DEFAULT_BATCH_SIZE,
            failure_policy: FailurePolicy::Abort,
            write_images: true,
            database_path: None,
        }
    }
}

impl FuzzConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> FuzzResult<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(FuzzError::Configuration("input path is required".to_string()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(FuzzError::Configuration("output path is required".to_string()));
        }
        if self.batch_size == 0 {
            return Err(FuzzError::Configuration("batch size must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.output_path.join(DEFAULT_DATABASE_FILE_NAME))
    }
}

mod failure_policy_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::engine::FailurePolicy;

    pub fn serialize<S: Serializer>(policy: &FailurePolicy, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&policy.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FailurePolicy, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;

    #[test]
    fn defaults() {
        let config = FuzzConfig::new("in", "out");

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.algorithms, AlgorithmSet::all());
        assert!(config.write_images);
        assert_eq!(config.database_path(), PathBuf::from("out").join("fuzzer-results.sqlite"));
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let zero_batch = FuzzConfig {
            batch_size: 0,
            ..FuzzConfig::new("in", "out")
        };
        assert!(matches!(zero_batch.validate(), Err(FuzzError::Configuration(_))));
        assert!(matches!(
            FuzzConfig::new("", "out").validate(),
            Err(FuzzError::Configuration(_))
        ));
        assert!(matches!(
            FuzzConfig::new("in", "").validate(),
            Err(FuzzError::Configuration(_))
        ));
    }

    #[test]
    fn explicit_database_path_wins() {
        let config = FuzzConfig {
            database_path: Some(PathBuf::from("/tmp/results.db")),
            ..FuzzConfig::new("in", "out")
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/results.db"));
    }

    #[test]
    fn deserializes_from_json() {
        let config: FuzzConfig = serde_json::from_str(
            r#"{"input_path": "in", "output_path": "out", "algorithms": "orb,sift", "failure_policy": "skip"}"#,
        )
        .unwrap();

        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert!(config.algorithms.contains(Algorithm::Orb));
        assert!(config.algorithms.contains(Algorithm::Sift));
        assert_eq!(config.algorithms.len(), 2);
        assert_eq!(config.batch_size, 10);
    }
}
