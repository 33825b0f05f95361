//! Error types.
//!
//! Every failure in this crate is local and recoverable. Save errors are
//! recorded by the autosave engine and surfaced as status text; search errors
//! are ordinary outcomes of a query. Nothing here terminates the host.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A write to the save target failed. The previous on-disk content is left
/// untouched in every case.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The process working directory could not be resolved for the fallback
    /// target.
    #[error("cannot resolve working directory: {0}")]
    WorkingDir(#[source] io::Error),

    /// No temporary file could be created next to the target.
    #[error("cannot create temporary file in {}: {source}", .dir.display())]
    TempFile {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or flushing the temporary file failed (disk full, I/O error).
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Renaming the temporary file over the target failed.
    #[error("cannot replace {}: {source}", .path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SaveError {
    /// The underlying I/O error kind.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::WorkingDir(source)
            | Self::TempFile { source, .. }
            | Self::Write { source, .. }
            | Self::Replace { source, .. } => source.kind(),
        }
    }
}

/// A search command produced no match.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    /// The query was empty. Reported before any scan.
    #[error("query empty")]
    EmptyQuery,

    /// No occurrence anywhere in the document, even after wrapping.
    #[error("not found")]
    NotFound,
}

/// Opening a document from disk failed.
#[derive(Debug, Error)]
#[error("cannot open {}: {source}", .path.display())]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A `:set` directive could not be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    Unknown(String),

    #[error("invalid argument: {name}={value}")]
    InvalidValue { name: String, value: String },

    #[error("option is not a toggle: {0}")]
    NotBoolean(String),
}
