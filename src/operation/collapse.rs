//! Flatten a directory tree into its root.

use super::{Change, Plan, Planner, collect_files, require_dir};
use crate::config::CompiledFilters;
use crate::error::{Result, ValidationError};
use crate::kind::OperationKind;
use std::path::{Path, PathBuf};

/// Moves every file below a subdirectory of `dir` up into `dir` itself, then
/// removes the directories that were emptied.
///
/// With `prefix_paths` set, `a/b/c.txt` lands as `a_b_c.txt` so names from
/// different folders cannot collide. Without it, the file keeps its name and
/// a clash with an existing file fails that one move.
#[derive(Debug, Clone)]
pub struct CollapseOp {
    pub dir: PathBuf,
    pub prefix_paths: bool,
}

impl CollapseOp {
    pub fn new(dir: impl Into<PathBuf>, prefix_paths: bool) -> Self {
        Self {
            dir: dir.into(),
            prefix_paths,
        }
    }

    fn flattened_name(&self, relative: &Path) -> Option<String> {
        let name = relative.file_name()?.to_string_lossy().into_owned();
        if !self.prefix_paths {
            return Some(name);
        }
        let folders: Vec<String> = relative
            .parent()?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("{}_{}", folders.join("_"), name))
    }
}

impl Planner for CollapseOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Collapse
    }

    fn journal_dir(&self) -> &Path {
        &self.dir
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("parent folder", &self.dir)
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let mut plan = Plan::new(self.kind(), &self.dir);
        plan.prune_empty_dirs = true;

        for path in collect_files(&self.dir, true, filters)? {
            let Ok(relative) = path.strip_prefix(&self.dir) else {
                continue;
            };
            if relative.components().count() < 2 {
                continue;
            }
            let Some(name) = self.flattened_name(relative) else {
                continue;
            };
            let to = self.dir.join(name);
            plan.push(Change::Move { from: path, to });
        }

        Ok(plan)
    }
}
