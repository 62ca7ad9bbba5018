//! Artifact persistence
//!
//! Fitted objects and numeric arrays are stored with bincode, reports with
//! YAML. Every writer creates missing parent directories.

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    Ok(())
}

fn open_existing(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact(path.to_path_buf()));
    }
    File::open(path).map_err(|e| PipelineError::io(path, e))
}

/// Serialize an object to `path`
pub fn save_object<T: Serialize + ?Sized>(path: &Path, object: &T) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    bincode::serialize_into(BufWriter::new(file), object)
        .map_err(|e| PipelineError::serialization(path, e))?;
    debug!("Saved object to {}", path.display());
    Ok(())
}

/// Deserialize an object written by [`save_object`]
pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open_existing(path)?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| PipelineError::serialization(path, e))
}

pub fn save_array(path: &Path, array: &Array2<f64>) -> Result<()> {
    save_object(path, array)
}

pub fn load_array(path: &Path) -> Result<Array2<f64>> {
    load_object(path)
}

/// Write YAML, optionally replacing an existing file
pub fn write_yaml_file<T: Serialize>(path: &Path, content: &T, replace: bool) -> Result<()> {
    if path.exists() {
        if !replace {
            return Err(PipelineError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "refusing to overwrite existing file",
                ),
            });
        }
        fs::remove_file(path).map_err(|e| PipelineError::io(path, e))?;
    }

    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    serde_yaml::to_writer(BufWriter::new(file), content)
        .map_err(|e| PipelineError::serialization(path, e))
}

pub fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open_existing(path)?;
    serde_yaml::from_reader(BufReader::new(file)).map_err(|e| PipelineError::serialization(path, e))
}
