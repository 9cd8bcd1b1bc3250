// Error type for corpus intake, configuration, and engine construction.
//
// Everything here is an invalid-input failure detected before or while the
// engine is built: a bad corpus file, an out-of-range config value, a silent
// reference melody. Once a run has started nothing is recoverable, so the
// generational loop itself never returns these. Programming errors inside the
// operators (an index past the end, mismatched chunk sizes during crossover)
// panic instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CantusError {
    #[error("corpus is empty: at least one reference melody is required")]
    EmptyCorpus,

    #[error("reference melody {index} contains no notes")]
    SilentReference { index: usize },

    #[error("a selection needs at least one chunk")]
    EmptySelection,

    #[error("a selection cannot begin with a hold")]
    LeadingHold,

    #[error("chunk code {code} is outside 0..=129")]
    InvalidChunkCode { code: i64 },

    #[error("chunk size must be positive, got {chunk_size}")]
    InvalidChunkSize { chunk_size: i64 },

    #[error("cannot equalize chunk size {from} to {to}: target is not a multiple")]
    IncompatibleChunkSize { from: u32, to: u32 },

    #[error("cannot equalize chunk size {from} to {to}: more than {limit} slots per chunk")]
    StretchTooLarge { from: u32, to: u32, limit: u32 },

    #[error("{source_name}:{line}: expected an integer, found {token:?}")]
    Parse {
        source_name: String,
        line: usize,
        token: String,
    },

    #[error("{source_name}: missing chunk size")]
    MissingChunkSize { source_name: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CantusError>;

impl CantusError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CantusError::Io {
            path: path.into(),
            source,
        }
    }
}
