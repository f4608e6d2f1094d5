use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::data::dataset_code::{sanitize, DatasetCode};
use crate::error::Result;

/// `<prefix>_<sanitized code>_<timestamp>`
pub fn save_dir_name(prefix: &str, dataset_code: &str, timestamp: i64) -> String {
    format!("{}_{}_{}", prefix, sanitize(dataset_code), timestamp)
}

/// Seconds since the Unix epoch, used to tag the save directory.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One invocation of the solver for one model.
///
/// The save directory exists once `create` returns and is owned by this run.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Used in every file name the run writes.
    pub experiment_id: String,
    /// Stored in the checkpoint.
    pub model_id: i64,
    pub timestamp: i64,
    pub dataset: DatasetCode,
    pub save_dir: PathBuf,
}

impl Run {
    /// Derives the save directory under `output_root` and creates it.
    pub fn create(
        output_root: &Path,
        dir_prefix: &str,
        dataset: DatasetCode,
        experiment_id: impl Into<String>,
        model_id: i64,
        timestamp: i64,
    ) -> Result<Run> {
        let save_dir = output_root.join(save_dir_name(dir_prefix, &dataset.to_string(), timestamp));
        fs::create_dir_all(&save_dir)?;
        let run = Run { experiment_id: experiment_id.into(), model_id, timestamp, dataset, save_dir };
        info!(
            experiment = %run.experiment_id,
            dataset = %run.dataset,
            save_dir = %run.save_dir.display(),
            "Created run"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_dir_name_is_sanitized() {
        assert_eq!(save_dir_name("run", "H.E+T-", 1000), "run_HoEpTm_1000");
    }

    #[test]
    fn test_create_makes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let code: DatasetCode = "H+E.T.".parse().unwrap();
        let run = Run::create(tmp.path(), "exp", code, "0", 0, 42).unwrap();
        assert_eq!(run.save_dir, tmp.path().join("exp_HpEoTo_42"));
        assert!(run.save_dir.is_dir());
    }

    #[test]
    fn test_create_fails_when_root_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        assert!(Run::create(&blocker, "run", DatasetCode::default(), "0", 0, 1).is_err());
    }
}
