//! Error types shared across operations, the journal and rollback.
//!
//! Per-item failures (a single move that could not complete) are never surfaced
//! through these types to the caller of an operation; they are tallied and
//! journaled instead. Only validation problems, journal integrity problems and
//! configuration errors abort a call.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Bad or missing input, detected before anything is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A directory parameter is empty or does not name a directory.
    #[error("A valid {label} is required: {}", .path.display())]
    MissingDirectory { label: &'static str, path: PathBuf },

    /// A file parameter is empty or does not name a regular file.
    #[error("A valid {label} is required: {}", .path.display())]
    MissingFile { label: &'static str, path: PathBuf },

    /// A required text field is empty.
    #[error("The '{0}' field cannot be empty.")]
    EmptyField(&'static str),

    /// A regular expression did not compile.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A mapping file is unreadable or lacks its required columns.
    #[error("Invalid mapping file {}: {reason}", .path.display())]
    InvalidMapping { path: PathBuf, reason: String },

    /// No usable search term was supplied.
    #[error("At least one search term is required, either inline or from a file.")]
    NoSearchTerms,

    /// A search term cannot be used as a folder name.
    #[error("Search term '{0}' cannot be used as a folder name")]
    InvalidSearchTerm(String),
}

/// Failures of the journal itself. These are fatal to whichever call needed
/// the journal, since a damaged journal makes later rollback unsafe.
#[derive(Debug, Error)]
pub enum JournalError {
    /// No active journal exists in the directory.
    #[error("No change journal found in {}", .dir.display())]
    Missing { dir: PathBuf },

    /// Another live handle already holds the directory's journal lock.
    #[error("Change journal in {} is locked by another operation", .dir.display())]
    Locked { dir: PathBuf },

    /// Reading, writing or syncing the journal file failed.
    #[error("Journal I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV layer rejected a record.
    #[error("Journal format error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A record parsed but its contents make no sense.
    #[error("Malformed journal record {record} in {}: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        record: u64,
        reason: String,
    },

    /// The active journal could not be renamed to its archived name.
    #[error("Could not archive journal {} to {}: {source}", .from.display(), .to.display())]
    ArchiveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single planned change that failed at the filesystem boundary.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The source no longer exists.
    #[error("source {} does not exist", .0.display())]
    SourceMissing(PathBuf),

    /// Something already occupies the destination.
    #[error("destination {} already exists", .0.display())]
    DestinationExists(PathBuf),

    /// A parent directory could not be created.
    #[error("could not create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rename, copy or delete itself failed.
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Top-level error for a single command invocation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A report could not be serialized.
    #[error("Could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Listing or reading inputs failed while planning.
    #[error("Error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for journal access.
pub type JournalResult<T> = std::result::Result<T, JournalError>;
