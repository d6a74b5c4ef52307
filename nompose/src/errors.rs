use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("empty source provided")]
    EmptySource,

    #[error("URL provided but not a supported GitHub repository")]
    UnsupportedUrl(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read docker-compose file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse docker-compose YAML in {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures of the interactive channel. Invalid answers are never errors,
/// they are re-prompted.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input ended before all questions were answered")]
    Exhausted,

    #[error("failed to confirm service {name}")]
    Service {
        name: String,
        #[source]
        source: Box<InputError>,
    },

    #[error("no value given for required field {field:?}")]
    RetriesExhausted { field: String },

    #[error("terminal I/O failed")]
    Io(#[from] io::Error),

    #[error("failed to write to the terminal")]
    Terminal(#[from] crossterm::ErrorKind),
}
