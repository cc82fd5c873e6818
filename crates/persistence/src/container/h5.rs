//! `.h5` container: datasets `rgb` and `targets`, gzip-compressed,
//! chunked one sample per HDF5 chunk.

use std::fs::{self, OpenOptions};
use std::path::Path;

use contracts::{Sample, CONTROL_VECTOR_LEN, IMAGE_BYTES, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_WIDTH};

use super::{LoadedChunk, RGB_DATASET, TARGETS_DATASET};
use crate::PersistenceError;

fn h5_err(path: &Path, e: hdf5::Error) -> PersistenceError {
    PersistenceError::io(path, std::io::Error::other(e.to_string()))
}

pub(super) fn write(path: &Path, samples: &[Sample], level: u8) -> Result<(), PersistenceError> {
    // 先以 create_new 占住文件名，已存在时直接返回 AlreadyExists
    let reserved = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| PersistenceError::io(path, e))?;
    drop(reserved);

    if let Err(e) = write_file(path, samples, level) {
        let _ = fs::remove_file(path);
        return Err(h5_err(path, e));
    }
    Ok(())
}

fn write_file(path: &Path, samples: &[Sample], level: u8) -> hdf5::Result<()> {
    let n = samples.len();
    let file = hdf5::File::create(path)?;

    let mut rgb = Vec::with_capacity(n * IMAGE_BYTES);
    let mut targets = Vec::with_capacity(n * CONTROL_VECTOR_LEN);
    for sample in samples {
        rgb.extend_from_slice(sample.rgb());
        targets.extend_from_slice(sample.targets().as_array());
    }

    let rgb_ds = file
        .new_dataset::<u8>()
        .chunk((1, IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS))
        .deflate(level)
        .shape((n, IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS))
        .create(RGB_DATASET)?;
    rgb_ds.write_raw(&rgb)?;

    let targets_ds = file
        .new_dataset::<f32>()
        .chunk((n, CONTROL_VECTOR_LEN))
        .deflate(level)
        .shape((n, CONTROL_VECTOR_LEN))
        .create(TARGETS_DATASET)?;
    targets_ds.write_raw(&targets)?;

    file.flush()?;
    Ok(())
}

pub(super) fn read(path: &Path) -> Result<LoadedChunk, PersistenceError> {
    let file = hdf5::File::open(path).map_err(|e| h5_err(path, e))?;

    let rgb_ds = file
        .dataset(RGB_DATASET)
        .map_err(|_| PersistenceError::MissingDataset {
            path: path.to_path_buf(),
            dataset: RGB_DATASET,
        })?;
    let targets_ds = file
        .dataset(TARGETS_DATASET)
        .map_err(|_| PersistenceError::MissingDataset {
            path: path.to_path_buf(),
            dataset: TARGETS_DATASET,
        })?;

    Ok(LoadedChunk {
        path: path.to_path_buf(),
        rgb_shape: rgb_ds.shape(),
        targets_shape: targets_ds.shape(),
        rgb: rgb_ds.read_raw::<u8>().map_err(|e| h5_err(path, e))?,
        targets: targets_ds.read_raw::<f32>().map_err(|e| h5_err(path, e))?,
    })
}
