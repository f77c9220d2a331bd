use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::layers::StateDict;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl StoredArray {
    fn from_array(array: &ArrayD<f64>) -> StoredArray {
        StoredArray {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    fn into_array(self) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(ndarray::IxDyn(&self.shape), self.data).map_err(|e| {
            Error::Serialization(format!("stored array does not match its shape: {}", e))
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Snapshot {
    parameters: std::collections::BTreeMap<String, StoredArray>,
}

fn io_error(err: std::io::Error) -> Error {
    Error::Io(err.to_string())
}

fn serde_error(err: impl ToString) -> Error {
    Error::Serialization(err.to_string())
}

/// Write a state dict as pretty JSON, one named array per parameter
pub fn save_state_dict_json<P: AsRef<Path>>(state: &StateDict, path: P) -> Result<()> {
    let snapshot = Snapshot {
        parameters: state
            .iter()
            .map(|(name, value)| (name.clone(), StoredArray::from_array(value)))
            .collect(),
    };
    let file = File::create(path.as_ref()).map_err(io_error)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &snapshot).map_err(serde_error)?;
    Ok(())
}

/// Read a state dict back; shapes are restored from the snapshot
pub fn load_state_dict_json<P: AsRef<Path>>(path: P) -> Result<StateDict> {
    let file = File::open(path.as_ref()).map_err(io_error)?;
    let reader = BufReader::new(file);
    let snapshot: Snapshot = serde_json::from_reader(reader).map_err(serde_error)?;
    snapshot
        .parameters
        .into_iter()
        .map(|(name, stored)| Ok((name, stored.into_array()?)))
        .collect()
}
