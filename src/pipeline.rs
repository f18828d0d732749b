//! End-to-end training pipeline.
//!
//! ```text
//! RawTable ─▶ SchemaNormalizer ─▶ OneHotEncoder ─▶ ModelTrainer ─▶ TrainedArtifact
//!                                      │                                 ▲
//!                                      └──────── FeatureSchema ──────────┘
//! ```
//!
//! The schema produced by the encoder is moved into the artifact next to the
//! models fitted on it; nothing downstream rebuilds it from data.

use crate::config::PipelineConfig;
use crate::dataset::{load_table, RawTable};
use crate::error::Result;
use crate::preprocessing::{FittedTransformer, OneHotEncoder, SchemaNormalizer, Transformer};
use crate::serialization::TrainedArtifact;
use crate::trainer::ModelTrainer;
use std::path::Path;
use tracing::info;

/// Normalize, encode and train on an in-memory table.
pub fn train_from_table(table: &RawTable, config: &PipelineConfig) -> Result<TrainedArtifact> {
    config.validate()?;

    let normalized = SchemaNormalizer::new(config.clone()).normalize(table)?;
    let encoder = OneHotEncoder::new().fit(&normalized)?;
    let encoded = encoder.transform(&normalized)?;
    info!(
        "Encoded {} rows into {} feature columns",
        encoded.n_rows(),
        encoded.n_features()
    );

    let trained = ModelTrainer::new(config.training.clone()).fit(&encoded)?;
    TrainedArtifact::new(encoder.into_schema(), trained)
}

/// Load a CSV file or workbook and train on it.
pub fn train_from_path<P: AsRef<Path>>(data: P, config: &PipelineConfig) -> Result<TrainedArtifact> {
    let table = load_table(data)?;
    train_from_table(&table, config)
}

/// Train on a CSV file or workbook and write the artifact to `artifact_path`.
pub fn train_and_save<P, Q>(data: P, artifact_path: Q, config: &PipelineConfig) -> Result<TrainedArtifact>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let artifact = train_from_path(data, config)?;
    artifact.save_to_file(artifact_path)?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::model::ModelFamily;
    use std::io::Write;

    fn write_csv(dir: &Path, rows: usize) -> std::path::PathBuf {
        let path = dir.join("listings.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "ilce,tip,metrekare,binayas,fiyat").unwrap();
        let districts = ["Kadıköy", "Beşiktaş", "Şişli"];
        for i in 0..rows {
            let area = 60 + (i * 17) % 100;
            let age = (i * 7) % 30;
            let price = area * 3_000 + (i % 3) * 50_000 + 100_000 - age * 1_000;
            writeln!(
                file,
                "{},{},{},{},\"{}TL\"",
                districts[i % 3],
                if i % 2 == 0 { "Daire" } else { "Villa" },
                area,
                age,
                format_thousands(price)
            )
            .unwrap();
        }
        path
    }

    fn format_thousands(v: usize) -> String {
        let s = v.to_string();
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i > 0 && (s.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_categorical_fields(&["ilce", "tip"])
            .with_numeric_fields(&["metrekare", "binayas"]);
        config.training.svr_c_values = vec![1.0];
        config.training.mlp_hidden_widths = vec![10];
        config.training.mlp_max_iter = 100;
        config
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(450000), "450,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(999), "999");
    }

    #[test]
    fn test_train_and_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_csv(dir.path(), 60);
        let artifact_path = dir.path().join("model.bin");

        let artifact = train_and_save(&data, &artifact_path, &config()).unwrap();
        let loaded = TrainedArtifact::load_from_file(&artifact_path).unwrap();

        assert_eq!(loaded.schema(), artifact.schema());
        for family in ModelFamily::ALL {
            assert_eq!(loaded.score(family), artifact.score(family));
        }
    }

    #[test]
    fn test_missing_source_is_data_load_error() {
        let result = train_from_path("/nonexistent/listings.csv", &config());
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }

    #[test]
    fn test_workbook_source_is_read() {
        let workbook = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/listings.xlsx");
        // Three listings load fine but are far below the training floor.
        let result = train_from_path(workbook, &config());
        assert!(result.is_err());
        assert!(!matches!(result, Err(PipelineError::DataLoad { .. })));
    }
}
