//! Rename files from an explicit mapping.

use super::{Change, Plan, Planner, Skipped, is_plain_name, require_dir, require_file};
use crate::config::CompiledFilters;
use crate::error::{Result, ValidationError};
use crate::journal::Journal;
use crate::kind::OperationKind;
use crate::mapping::read_rename_mapping;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Renames files in `dir` according to a headed CSV mapping of original to
/// new file names.
#[derive(Debug, Clone)]
pub struct RenameOp {
    pub dir: PathBuf,
    pub mapping: PathBuf,
}

impl RenameOp {
    pub fn new(dir: impl Into<PathBuf>, mapping: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mapping: mapping.into(),
        }
    }
}

impl Planner for RenameOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Rename
    }

    fn journal_dir(&self) -> &Path {
        &self.dir
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("source directory", &self.dir)?;
        require_file("mapping file", &self.mapping)?;
        read_rename_mapping(&self.mapping).map(|_| ())
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let rows = read_rename_mapping(&self.mapping)?;
        let mut plan = Plan::new(self.kind(), &self.dir);

        for row in rows {
            let label = format!("row {}", row.line);
            let (original, new) = match (row.original, row.new) {
                (Some(original), Some(new)) => (original, new),
                _ => {
                    plan.skip(Skipped::new(label, "missing original or new filename"));
                    continue;
                }
            };
            if !is_plain_name(&original) || !is_plain_name(&new) {
                plan.skip(Skipped::new(
                    original,
                    format!("'{}' is not a plain file name", new),
                ));
                continue;
            }
            if original == new {
                plan.skip(Skipped::new(original, "name unchanged"));
                continue;
            }

            let source = self.dir.join(&original);
            if !source.is_file() {
                plan.skip(Skipped::new(original, "file not found"));
                continue;
            }
            if Journal::is_journal_artifact(OsStr::new(&original))
                || !filters.should_include(Path::new(&original))
            {
                plan.skip(Skipped::new(original, "excluded by filters"));
                continue;
            }

            plan.push(Change::Move {
                from: source,
                to: self.dir.join(&new),
            });
        }

        Ok(plan)
    }
}
