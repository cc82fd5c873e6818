//! `.npz` container: a zip archive with `rgb.npy` and `targets.npy`,
//! each entry deflate-compressed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use contracts::{Sample, CONTROL_VECTOR_LEN, IMAGE_CHANNELS, IMAGE_HEIGHT, IMAGE_WIDTH};
use npyz::npz::{NpzArchive, NpzWriter};
use npyz::WriterBuilder;
use zip::write::FileOptions;
use zip::CompressionMethod;

use super::{LoadedChunk, RGB_DATASET, TARGETS_DATASET};
use crate::PersistenceError;

pub(super) fn write(path: &Path, samples: &[Sample], level: u8) -> Result<(), PersistenceError> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| PersistenceError::io(path, e))?;

    let result = write_archive(BufWriter::new(file), samples, level);
    if let Err(e) = result {
        let _ = fs::remove_file(path);
        return Err(PersistenceError::io(path, e));
    }
    Ok(())
}

fn write_archive(writer: BufWriter<File>, samples: &[Sample], level: u8) -> io::Result<()> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(i32::from(level)));
    let n = samples.len() as u64;

    let mut npz = NpzWriter::new(writer);

    let mut rgb = npz
        .array::<u8>(RGB_DATASET, options)?
        .default_dtype()
        .shape(&[
            n,
            IMAGE_HEIGHT as u64,
            IMAGE_WIDTH as u64,
            IMAGE_CHANNELS as u64,
        ])
        .begin_nd()?;
    for sample in samples {
        rgb.extend(sample.rgb().iter().copied())?;
    }
    rgb.finish()?;

    let mut targets = npz
        .array::<f32>(TARGETS_DATASET, options)?
        .default_dtype()
        .shape(&[n, CONTROL_VECTOR_LEN as u64])
        .begin_nd()?;
    for sample in samples {
        targets.extend(sample.targets().as_array().iter().copied())?;
    }
    targets.finish()?;

    let mut inner = npz.zip_writer().finish()?;
    inner.flush()?;
    inner.get_ref().sync_all()?;
    Ok(())
}

pub(super) fn read(path: &Path) -> Result<LoadedChunk, PersistenceError> {
    let io_err = |e: io::Error| PersistenceError::io(path, e);
    let mut archive = NpzArchive::open(path).map_err(io_err)?;

    let rgb_file = archive
        .by_name(RGB_DATASET)
        .map_err(io_err)?
        .ok_or_else(|| PersistenceError::MissingDataset {
            path: path.to_path_buf(),
            dataset: RGB_DATASET,
        })?;
    let rgb_shape = to_usize(rgb_file.shape());
    let rgb = rgb_file.into_vec::<u8>().map_err(io_err)?;

    let targets_file = archive
        .by_name(TARGETS_DATASET)
        .map_err(io_err)?
        .ok_or_else(|| PersistenceError::MissingDataset {
            path: path.to_path_buf(),
            dataset: TARGETS_DATASET,
        })?;
    let targets_shape = to_usize(targets_file.shape());
    let targets = targets_file.into_vec::<f32>().map_err(io_err)?;

    Ok(LoadedChunk {
        path: path.to_path_buf(),
        rgb_shape,
        targets_shape,
        rgb,
        targets,
    })
}

fn to_usize(shape: &[u64]) -> Vec<usize> {
    shape.iter().map(|&d| d as usize).collect()
}
