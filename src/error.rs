//! Error types for `sketch-binpack`.
//!
//! Failures are never retried or recovered locally: an [`OracleError`] raised while probing a
//! candidate placement aborts the whole packing run and bubbles up to the caller unchanged.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of an external cardinality oracle or sketch merger
#[derive(Error, Debug)]
pub enum OracleError {
    /// Sketch engine executable could not be located
    #[error("sketch engine `{binary}` not found: {source}")]
    EngineNotFound {
        binary: String,
        #[source]
        source: which::Error,
    },

    /// Sketch engine process could not be started
    #[error("could not execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Sketch engine process exited unsuccessfully
    #[error("`{command}` failed with {status}: {detail}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        detail: String,
    },

    /// Engine output did not contain a cardinality
    #[error("unparsable cardinality in engine output `{output}`")]
    UnparsableCardinality { output: String },

    /// Engine reported a negative, infinite or NaN cardinality
    #[error("invalid cardinality {0}: must be a non-negative finite number")]
    InvalidCardinality(f64),

    /// Sketch file could not be read or written
    #[error("sketch I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Sketch file content is not a valid sketch
    #[error("malformed sketch {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Generic oracle failure with message
    #[error("{0}")]
    Other(String),
}

impl OracleError {
    /// Create a generic oracle failure
    pub fn other(msg: impl Into<String>) -> Self {
        OracleError::Other(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        OracleError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate error type
#[derive(Error, Debug)]
pub enum Error {
    /// Bin capacity is not a positive finite number
    #[error("invalid bin capacity {0}: must be a positive finite number")]
    InvalidCapacity(f64),

    /// Saturation fraction is outside `(0, 1]`
    #[error("invalid saturation threshold {0}: must be within (0, 1]")]
    InvalidSaturation(f64),

    /// Cardinality or union computation failed
    #[error("oracle failure: {0}")]
    Oracle(#[from] OracleError),

    /// Two catalog entries resolved to the same identifier
    #[error("duplicate identifier `{id}` for `{first}` and `{second}`")]
    DuplicateIdentifier {
        id: String,
        first: String,
        second: String,
    },

    /// No clean identifier token and the fallback policy rejects verbatim names
    #[error("no identifier token in `{0}`")]
    UnrecognizedIdentifier(String),

    /// I/O error with path context
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an I/O error bound to `path`
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
