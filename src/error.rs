use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {path:?}")]
    NotFound { path: PathBuf },
    #[error("unsupported table format {extension:?} for {path:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("{path:?} contains no usable rows")]
    Empty { path: PathBuf },
    #[error("failed to parse {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("I/O error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("row has no value for required column {column:?}")]
    MissingValue { column: String },
    #[error("export with {program:?} failed: {reason}")]
    Export { program: String, reason: String },
    #[error("invalid field mapping in {path:?}: {source}")]
    Mapping {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O failure on `path`, turning `ErrorKind::NotFound` into [`Error::NotFound`].
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { path }
        } else {
            Error::Io { path, source }
        }
    }
}
