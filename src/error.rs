//! Error type shared by every stage of the transcoder.

use std::fmt;
use thiserror::Error;

/// Part of the run an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Stream,
    Encode,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Stream => "matrix streaming",
            Stage::Encode => "variant encoding",
            Stage::Finalize => "output finalization",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Sample arrays in the store differ in length.
    #[error("array `{key}` has {found} calls, expected {expected}")]
    ShapeMismatch {
        key: String,
        expected: usize,
        found: usize,
    },

    /// An intermediate row does not have one field per header column.
    #[error("row at line {line} has {found} columns, header declares {expected}")]
    RowShape {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Intermediate rows skip, repeat or reorder a position.
    #[error("row at line {line} has position {found}, expected {expected}")]
    PositionOrder {
        line: u64,
        expected: u64,
        found: u64,
    },

    #[error("row at line {line} has position `{value}`, expected an integer")]
    InvalidPosition { line: u64, value: String },

    #[error("invalid table header: {message}")]
    InvalidHeader { message: String },

    #[error("array `{key}` is not present in the store")]
    MissingKey { key: String },

    #[error("array store contains no arrays")]
    EmptyStore,

    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{stage} stage failed")]
    Failed {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    pub fn missing_key(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    pub fn in_stage(stage: Stage, source: Error) -> Self {
        Self::Failed {
            stage,
            source: Box::new(source),
        }
    }

    /// The error underneath any stage wrapping.
    pub fn root(&self) -> &Error {
        match self {
            Self::Failed { source, .. } => source.root(),
            other => other,
        }
    }
}
