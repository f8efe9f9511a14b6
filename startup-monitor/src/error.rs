use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use common::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("the provided path {} is incorrect and points to a directory", .path.display())]
    NotAPointer { path: PathBuf },

    #[error("unable to extract revision from {name} due to incorrect format")]
    RevisionFormat { name: String },

    #[error("unable to parse revision of {name}: {source}")]
    RevisionParse {
        name: String,
        #[source]
        source: ParseIntError,
    },

    #[error("failed to create a symbolic link {link:?} for {target:?} due to {source}")]
    Symlink {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("probe interval cannot be 0")]
    ZeroProbeInterval,

    #[error("sync task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MonitorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MonitorError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, source: ManifestError) -> Self {
        MonitorError::Manifest {
            path: path.into(),
            source,
        }
    }
}
