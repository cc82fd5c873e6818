//! On-disk chunk containers
//!
//! Every container holds exactly two datasets:
//! - `rgb`: u8, shape [N, 88, 200, 3]
//! - `targets`: f32, shape [N, 25]

mod npz;

#[cfg(feature = "hdf5")]
mod h5;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use contracts::{
    ContainerFormat, ControlVector, Sample, CONTROL_VECTOR_LEN, IMAGE_BYTES, IMAGE_CHANNELS,
    IMAGE_HEIGHT, IMAGE_WIDTH,
};

use crate::PersistenceError;

pub(crate) const RGB_DATASET: &str = "rgb";
pub(crate) const TARGETS_DATASET: &str = "targets";

/// Expected trailing dimensions of the `rgb` dataset
pub const RGB_FRAME_SHAPE: [usize; 3] = [IMAGE_HEIGHT, IMAGE_WIDTH, IMAGE_CHANNELS];

/// Write `samples` into a new file at `path`.
///
/// The file is created exclusively; an existing file yields
/// [`PersistenceError::AlreadyExists`]. A partially written file is removed
/// before the error is returned.
pub fn write_chunk(
    format: ContainerFormat,
    path: &Path,
    samples: &[Sample],
    compression_level: u8,
) -> Result<(), PersistenceError> {
    match format {
        ContainerFormat::Npz => npz::write(path, samples, compression_level),
        #[cfg(feature = "hdf5")]
        ContainerFormat::Hdf5 => h5::write(path, samples, compression_level),
        #[cfg(not(feature = "hdf5"))]
        ContainerFormat::Hdf5 => Err(PersistenceError::UnsupportedContainer(format)),
    }
}

/// Whether this build can write `format`.
pub fn is_supported(format: ContainerFormat) -> bool {
    match format {
        ContainerFormat::Npz => true,
        ContainerFormat::Hdf5 => cfg!(feature = "hdf5"),
    }
}

/// Read a chunk file, dispatching on its extension.
pub fn read_chunk(path: &Path) -> Result<LoadedChunk, PersistenceError> {
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ContainerFormat::from_extension)
        .ok_or_else(|| PersistenceError::UnknownFile {
            path: path.to_path_buf(),
        })?;

    let chunk = match format {
        ContainerFormat::Npz => npz::read(path)?,
        #[cfg(feature = "hdf5")]
        ContainerFormat::Hdf5 => h5::read(path)?,
        #[cfg(not(feature = "hdf5"))]
        ContainerFormat::Hdf5 => return Err(PersistenceError::UnsupportedContainer(format)),
    };
    chunk.check_shapes()?;
    Ok(chunk)
}

/// Raw datasets read back from a chunk file
#[derive(Debug, Clone)]
pub struct LoadedChunk {
    pub path: PathBuf,
    pub rgb_shape: Vec<usize>,
    pub targets_shape: Vec<usize>,
    pub rgb: Vec<u8>,
    pub targets: Vec<f32>,
}

impl LoadedChunk {
    /// Number of samples (leading axis).
    pub fn len(&self) -> usize {
        self.rgb_shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enforce the container invariants.
    pub fn check_shapes(&self) -> Result<(), PersistenceError> {
        let path = &self.path;
        if self.rgb_shape.len() != 4 || self.rgb_shape[1..] != RGB_FRAME_SHAPE {
            return Err(PersistenceError::shape(
                path,
                format!("rgb shape {:?}, expected [N, 88, 200, 3]", self.rgb_shape),
            ));
        }
        if self.targets_shape.len() != 2 || self.targets_shape[1] != CONTROL_VECTOR_LEN {
            return Err(PersistenceError::shape(
                path,
                format!("targets shape {:?}, expected [N, 25]", self.targets_shape),
            ));
        }
        if self.rgb_shape[0] != self.targets_shape[0] {
            return Err(PersistenceError::shape(
                path,
                format!(
                    "rgb has {} samples but targets has {}",
                    self.rgb_shape[0], self.targets_shape[0]
                ),
            ));
        }
        if self.rgb.len() != self.len() * IMAGE_BYTES
            || self.targets.len() != self.len() * CONTROL_VECTOR_LEN
        {
            return Err(PersistenceError::shape(path, "dataset length disagrees with shape"));
        }
        Ok(())
    }

    /// Label vectors, one per sample.
    pub fn target_rows(&self) -> impl Iterator<Item = ControlVector> + '_ {
        self.targets.chunks_exact(CONTROL_VECTOR_LEN).map(|row| {
            let mut values = [0.0f32; CONTROL_VECTOR_LEN];
            values.copy_from_slice(row);
            ControlVector::from_array(values)
        })
    }

    /// Rebuild the samples stored in this chunk.
    pub fn samples(&self) -> Result<Vec<Sample>, PersistenceError> {
        self.rgb
            .chunks_exact(IMAGE_BYTES)
            .zip(self.target_rows())
            .map(|(rgb, targets)| {
                Sample::new(Bytes::copy_from_slice(rgb), targets)
                    .map_err(|e| PersistenceError::shape(&self.path, e.to_string()))
            })
            .collect()
    }
}
