//! Persistence error types

use std::path::PathBuf;

use contracts::{ContainerFormat, ContractError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("'{}' is missing dataset '{dataset}'", path.display())]
    MissingDataset { path: PathBuf, dataset: &'static str },

    #[error("'{}' has inconsistent shape: {message}", path.display())]
    ShapeMismatch { path: PathBuf, message: String },

    #[error("container format {0:?} is not compiled in (enable the `hdf5` feature)")]
    UnsupportedContainer(ContainerFormat),

    #[error("'{}' is not a recognised chunk file", path.display())]
    UnknownFile { path: PathBuf },

    #[error("too many parts for '{stem}' in one second")]
    PartsExhausted { stem: String },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::AlreadyExists {
            return Self::AlreadyExists { path };
        }
        Self::Io { path, source }
    }

    pub fn shape(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Path the error refers to, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. }
            | Self::AlreadyExists { path }
            | Self::MissingDataset { path, .. }
            | Self::ShapeMismatch { path, .. }
            | Self::UnknownFile { path } => Some(path),
            Self::UnsupportedContainer(_) | Self::PartsExhausted { .. } => None,
        }
    }
}

impl From<PersistenceError> for ContractError {
    fn from(err: PersistenceError) -> Self {
        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
        ContractError::persistence(path, err.to_string())
    }
}
