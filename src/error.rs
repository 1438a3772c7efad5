use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GDAL error")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("invalid raster {path}: {reason}")]
    InvalidRaster { path: PathBuf, reason: String },

    #[error("invalid STAC document {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status} while writing {output}")]
    Warp {
        program: String,
        status: ExitStatus,
        output: PathBuf,
    },

    #[error("collection '{collection}' has no items; its extent is undefined")]
    EmptyCollection { collection: String },

    #[error("duplicate item id '{0}' in collection")]
    DuplicateItem(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// `err` followed by each of its sources, joined with `: `.
pub fn report(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
