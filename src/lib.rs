//! refile - bulk file renaming and reorganization with rollback
//!
//! Every change an operation makes is recorded in a CSV journal inside the
//! target directory, so a whole run can be reverted with [`rollback`]. Operations
//! are planned first, then applied or simulated, and filtering rules can be
//! configured in TOML files.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod file_organizer;
pub mod journal;
pub mod kind;
pub mod logging;
pub mod mapping;
pub mod operation;
pub mod output;
pub mod rollback;

pub use config::{CompiledFilters, Config, ConfigError};
pub use duplicates::{DetectionMode, DuplicateDetector, DuplicateGroup};
pub use error::{Error, JournalError, Result, ValidationError};
pub use file_organizer::FileOrganizer;
pub use journal::{Journal, JournalEntry};
pub use kind::OperationKind;
pub use operation::{ApplyReport, Operation, Plan};
pub use rollback::{RollbackEngine, RollbackOutcome, RollbackReport};

pub use cli::{Cli, run_cli};
