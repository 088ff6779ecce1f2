use std::path::PathBuf;

use thiserror::Error;

use crate::labels::ClassId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] json5::Error),

    #[error("label class id {0} registered twice")]
    DuplicateClassId(ClassId),

    #[error("label class name {0:?} registered twice")]
    DuplicateClassName(String),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "raster")]
    #[error("svg error: {0}")]
    Svg(#[from] usvg::Error),

    #[error("cannot allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },

    #[error("png encoding failed: {0}")]
    Png(String),
}
