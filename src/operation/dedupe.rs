//! Delete the redundant members of duplicate groups.

use super::{Change, Plan, Planner, require_dir};
use crate::config::CompiledFilters;
use crate::duplicates::{DetectionMode, DuplicateDetector, DuplicateGroup};
use crate::error::{Result, ValidationError};
use crate::kind::OperationKind;
use std::path::{Path, PathBuf};

/// Keeps the first member of every duplicate group, in path order, and
/// deletes the rest. Deletions cannot be rolled back.
#[derive(Debug, Clone)]
pub struct DeleteDuplicatesOp {
    pub dir: PathBuf,
    pub mode: DetectionMode,
    pub recursive: bool,
}

impl DeleteDuplicatesOp {
    pub fn new(dir: impl Into<PathBuf>, mode: DetectionMode, recursive: bool) -> Self {
        Self {
            dir: dir.into(),
            mode,
            recursive,
        }
    }

    pub fn detector(&self) -> DuplicateDetector {
        DuplicateDetector::new(self.mode, self.recursive)
    }

    /// Builds the deletion plan for groups that were already detected.
    pub fn plan_groups(&self, groups: &[DuplicateGroup]) -> Plan {
        let mut plan = Plan::new(self.kind(), &self.dir);
        for group in groups {
            let Some(keeper) = group.keeper() else {
                continue;
            };
            for path in group.redundant() {
                plan.push(Change::Delete {
                    path: path.clone(),
                    details: format!("{}:{}; kept {}", self.mode, group.key, keeper.display()),
                });
            }
        }
        plan
    }
}

impl Planner for DeleteDuplicatesOp {
    fn kind(&self) -> OperationKind {
        OperationKind::DuplicateDelete
    }

    fn journal_dir(&self) -> &Path {
        &self.dir
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("directory", &self.dir)
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let groups = self.detector().detect(&self.dir, filters)?;
        Ok(self.plan_groups(&groups))
    }
}
