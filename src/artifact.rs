use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::error::{EarlyWarningError, Result};
use crate::features::FeatureVector;

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const COLUMNS_FILE: &str = "columns.json";

#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    #[serde(deserialize_with = "array_from_list")]
    pub mean: Array1<f64>,
    #[serde(deserialize_with = "array_from_list")]
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn transform(&self, values: &Array1<f64>) -> Array1<f64> {
        // A constant training column has zero scale; it is only centred.
        let scale = self.scale.mapv(|s| if s == 0.0 { 1.0 } else { s });
        (values - &self.mean) / &scale
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticClassifier {
    #[serde(deserialize_with = "array_from_list")]
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LogisticClassifier {
    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    pub fn predict_proba(&self, scaled: &Array1<f64>) -> f64 {
        Self::sigmoid(scaled.dot(&self.coefficients) + self.intercept)
    }
}

#[derive(Debug, Clone)]
pub struct ModelArtifact {
    classifier: LogisticClassifier,
    scaler: StandardScaler,
    expected_columns: Vec<String>,
}

impl ModelArtifact {
    pub fn new(
        classifier: LogisticClassifier,
        scaler: StandardScaler,
        expected_columns: Vec<String>,
        origin: &Path,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = expected_columns.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(EarlyWarningError::ArtifactInvalid {
                path: origin.join(COLUMNS_FILE),
                reason: format!("column {duplicate} is listed twice"),
            });
        }

        let expected = expected_columns.len();
        for got in [
            classifier.coefficients.len(),
            scaler.mean.len(),
            scaler.scale.len(),
        ] {
            if got != expected {
                return Err(EarlyWarningError::SchemaMismatch { expected, got });
            }
        }

        Ok(Self {
            classifier,
            scaler,
            expected_columns,
        })
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let paths = [
            dir.join(CLASSIFIER_FILE),
            dir.join(SCALER_FILE),
            dir.join(COLUMNS_FILE),
        ];
        if let Some(missing) = paths.iter().find(|path| !path.is_file()) {
            return Err(EarlyWarningError::ArtifactMissing {
                path: missing.clone(),
            });
        }

        let classifier: LogisticClassifier = read_json(&paths[0])?;
        let scaler: StandardScaler = read_json(&paths[1])?;
        let expected_columns: Vec<String> = read_json(&paths[2])?;

        let artifact = Self::new(classifier, scaler, expected_columns, dir)?;
        info!(
            model_dir = %dir.display(),
            columns = artifact.expected_columns.len(),
            "model artifact loaded"
        );
        Ok(artifact)
    }

    pub fn expected_columns(&self) -> &[String] {
        &self.expected_columns
    }

    pub fn score(&self, vector: &FeatureVector) -> Result<f64> {
        if vector.len() != self.expected_columns.len() {
            return Err(EarlyWarningError::SchemaMismatch {
                expected: self.expected_columns.len(),
                got: vector.len(),
            });
        }
        let scaled = self.scaler.transform(vector.values());
        Ok(self.classifier.predict_proba(&scaled))
    }

    /// Scores many vectors. Each row goes through [`ModelArtifact::score`], so
    /// results are bit-identical to scoring the rows one at a time.
    pub fn score_batch(&self, vectors: &[FeatureVector]) -> Result<Vec<f64>> {
        vectors.iter().map(|vector| self.score(vector)).collect()
    }
}

fn array_from_list<'de, D>(deserializer: D) -> std::result::Result<Array1<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<f64>::deserialize(deserializer).map(Array1::from)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| EarlyWarningError::ArtifactInvalid {
        path: PathBuf::from(path),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn write_artifact(dir: &Path, columns: &str, scaler: &str, classifier: &str) {
        std::fs::write(dir.join(COLUMNS_FILE), columns).unwrap();
        std::fs::write(dir.join(SCALER_FILE), scaler).unwrap();
        std::fs::write(dir.join(CLASSIFIER_FILE), classifier).unwrap();
    }

    fn two_column_artifact() -> ModelArtifact {
        ModelArtifact::new(
            LogisticClassifier {
                coefficients: array![0.5, -2.0],
                intercept: 0.25,
            },
            StandardScaler {
                mean: array![10.0, 1.0],
                scale: array![2.0, 0.0],
            },
            vec!["a".to_string(), "b".to_string()],
            Path::new("memory"),
        )
        .unwrap()
    }

    #[test]
    fn loads_complete_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(
            dir.path(),
            r#"["average_grade", "absence_count"]"#,
            r#"{"mean": [75.0, 5.0], "scale": [10.0, 4.0]}"#,
            r#"{"coefficients": [-1.0, 1.0], "intercept": 0.0}"#,
        );

        let artifact = ModelArtifact::load(dir.path()).unwrap();
        assert_eq!(artifact.expected_columns(), ["average_grade", "absence_count"]);
    }

    #[test]
    fn missing_file_reports_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "[]", r#"{"mean": [], "scale": []}"#, "{}");
        std::fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();

        match ModelArtifact::load(dir.path()) {
            Err(EarlyWarningError::ArtifactMissing { path }) => {
                assert!(path.ends_with(SCALER_FILE));
            }
            other => panic!("expected ArtifactMissing, got {other:?}"),
        }
    }

    #[test]
    fn malformed_file_reports_artifact_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(
            dir.path(),
            r#"["a"]"#,
            r#"{"mean": [0.0], "scale": [1.0]}"#,
            r#"{"weights": [1.0]}"#,
        );
        assert!(matches!(
            ModelArtifact::load(dir.path()),
            Err(EarlyWarningError::ArtifactInvalid { .. })
        ));
    }

    #[test]
    fn length_disagreement_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(
            dir.path(),
            r#"["a", "b"]"#,
            r#"{"mean": [0.0, 0.0], "scale": [1.0, 1.0]}"#,
            r#"{"coefficients": [1.0], "intercept": 0.0}"#,
        );
        assert!(matches!(
            ModelArtifact::load(dir.path()),
            Err(EarlyWarningError::SchemaMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let result = ModelArtifact::new(
            LogisticClassifier {
                coefficients: array![1.0, 1.0],
                intercept: 0.0,
            },
            StandardScaler {
                mean: array![0.0, 0.0],
                scale: array![1.0, 1.0],
            },
            vec!["a".to_string(), "a".to_string()],
            Path::new("memory"),
        );
        assert!(matches!(result, Err(EarlyWarningError::ArtifactInvalid { .. })));
    }

    #[test]
    fn score_applies_scaler_then_logistic() {
        let artifact = two_column_artifact();
        let record = crate::models::StudentRecord::simulated(
            0.0,
            0,
            crate::models::ScholarshipStatus::No,
            crate::models::GuardianOccupation::Other,
            0,
        );
        let vector = crate::features::reconcile(&record, artifact.expected_columns());
        // Both columns are unknown to the record, so the vector is [0, 0]:
        // z = 0.5 * (0 - 10) / 2 + (-2.0) * (0 - 1) / 1 + 0.25 = -0.25
        let expected = 1.0 / (1.0 + 0.25_f64.exp());
        let probability = artifact.score(&vector).unwrap();
        assert!((probability - expected).abs() < 1e-12);
    }

    #[test]
    fn batch_and_single_scores_are_identical() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("model");
        let artifact = ModelArtifact::load(&dir).unwrap();
        let records: Vec<_> = [
            (65.0, 15, "No", "Farmer", 35),
            (91.0, 1, "Yes", "CivilServant", 0),
            (70.0, 12, "No", "Laborer", 30),
            (55.5, 22, "Unknown", "Fisher", 60),
        ]
        .into_iter()
        .map(|(grade, absences, scholarship, occupation, violations)| {
            crate::models::StudentRecord::simulated(
                grade,
                absences,
                scholarship.to_string().into(),
                occupation.to_string().into(),
                violations,
            )
        })
        .collect();

        let vectors: Vec<_> = records
            .iter()
            .map(|record| crate::features::reconcile(record, artifact.expected_columns()))
            .collect();
        let batch = artifact.score_batch(&vectors).unwrap();

        for (vector, batch_score) in vectors.iter().zip(batch) {
            let single = artifact.score(vector).unwrap();
            assert_eq!(single.to_bits(), batch_score.to_bits());
            assert!((0.0..=1.0).contains(&single));
        }
    }

    #[test]
    fn wrong_length_vector_never_reaches_classifier() {
        let artifact = two_column_artifact();
        let vector = crate::features::reconcile(
            &crate::models::StudentRecord::simulated(
                80.0,
                0,
                crate::models::ScholarshipStatus::Yes,
                crate::models::GuardianOccupation::Farmer,
                0,
            ),
            &["only".to_string()],
        );
        assert!(matches!(
            artifact.score(&vector),
            Err(EarlyWarningError::SchemaMismatch { expected: 2, got: 1 })
        ));
    }
}
