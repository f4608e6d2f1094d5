//! Terminal run record, stored as an `.npz` archive.
//!
//! Archive members (all NPY v1.0):
//! - `params_000.npy`, `params_001.npy`, …: parameter tensors in model order
//! - `losses.npy`: per-batch training loss
//! - `regularization.npy`: per-batch penalty
//! - `model_id.npy`: int64 scalar

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::checkpoint::npy::{read_npy, write_npy, NpyArray};
use crate::error::{Result, SolverError};
use crate::train::trainable::ParamArray;

const PARAMS_PREFIX: &str = "params_";

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Parameter tensors; `layer`/`name` are not stored and read back empty.
    pub params: Vec<ParamArray>,
    pub losses: Vec<f64>,
    pub regularization: Vec<f64>,
    pub model_id: i64,
}

impl Checkpoint {
    /// `<dir>/<experiment_id>.npz`
    pub fn path_for(dir: &Path, experiment_id: &str) -> PathBuf {
        dir.join(format!("{}.npz", experiment_id))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (i, param) in self.params.iter().enumerate() {
            zip.start_file(format!("{}{:03}.npy", PARAMS_PREFIX, i), options)?;
            write_npy(&mut zip, &NpyArray::f64(param.shape.clone(), param.values.clone()))?;
        }
        zip.start_file("losses.npy", options)?;
        write_npy(&mut zip, &NpyArray::f64(vec![self.losses.len()], self.losses.clone()))?;
        zip.start_file("regularization.npy", options)?;
        write_npy(
            &mut zip,
            &NpyArray::f64(vec![self.regularization.len()], self.regularization.clone()),
        )?;
        zip.start_file("model_id.npy", options)?;
        write_npy(&mut zip, &NpyArray::scalar_i64(self.model_id))?;

        let mut inner = zip.finish()?;
        std::io::Write::flush(&mut inner)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Checkpoint> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;

        let mut param_names: Vec<String> = archive.file_names()
            .filter(|n| n.starts_with(PARAMS_PREFIX) && n.ends_with(".npy"))
            .map(str::to_string)
            .collect();
        param_names.sort();

        let mut params = Vec::with_capacity(param_names.len());
        for name in &param_names {
            let array = read_member(&mut archive, name)?;
            let shape = array.shape.clone();
            params.push(ParamArray {
                layer: String::new(),
                name: String::new(),
                shape,
                values: array.into_f64()?,
            });
        }

        Ok(Checkpoint {
            params,
            losses: read_member(&mut archive, "losses.npy")?.into_f64()?,
            regularization: read_member(&mut archive, "regularization.npy")?.into_f64()?,
            model_id: read_member(&mut archive, "model_id.npy")?.into_scalar_i64()?,
        })
    }
}

fn read_member<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<NpyArray> {
    let mut member = archive.by_name(name)
        .map_err(|e| SolverError::checkpoint(format!("missing {}: {}", name, e)))?;
    read_npy(&mut member)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> Checkpoint {
        Checkpoint {
            params: vec![
                ParamArray { layer: "color".into(), name: "W".into(), shape: vec![3, 3], values: (0..9).map(|v| v as f64 * 0.5).collect() },
                ParamArray { layer: "color".into(), name: "b".into(), shape: vec![3], values: vec![0.1, -0.2, 0.3] },
            ],
            losses: vec![0.9, 0.5, 0.25],
            regularization: vec![0.01, 0.02, 0.03],
            model_id: 1,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = Checkpoint::path_for(dir.path(), "1");
        assert!(path.ends_with("1.npz"));
        let original = sample_checkpoint();
        original.write(&path).unwrap();

        let back = Checkpoint::read(&path).unwrap();
        assert_eq!(back.model_id, original.model_id);
        assert_eq!(back.losses, original.losses);
        assert_eq!(back.regularization, original.regularization);
        assert_eq!(back.params.len(), 2);
        assert_eq!(back.params[0].shape, vec![3, 3]);
        assert_eq!(back.params[1].values, original.params[1].values);
    }

    #[test]
    fn test_archive_members_are_plain_npz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.npz");
        sample_checkpoint().write(&path).unwrap();
        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec!["losses.npy", "model_id.npy", "params_000.npy", "params_001.npy", "regularization.npy"]
        );
    }

    #[test]
    fn test_empty_trace_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2.npz");
        let empty = Checkpoint { params: vec![], losses: vec![], regularization: vec![], model_id: 2 };
        empty.write(&path).unwrap();
        assert_eq!(Checkpoint::read(&path).unwrap(), empty);
    }
}
