//! Prepend a prefix to files whose stem starts with a mapped base name.

use super::{
    Change, Plan, Planner, Skipped, collect_files, relative, require_dir, require_file, split_name,
};
use crate::config::CompiledFilters;
use crate::error::{Result, ValidationError};
use crate::kind::OperationKind;
use crate::mapping::read_prefix_mapping;
use std::path::{Path, PathBuf};

/// Renames top-level files of `dir` to `<prefix>_<name>` using an unheaded
/// `base_filename,prefix` mapping.
#[derive(Debug, Clone)]
pub struct PrefixOp {
    pub dir: PathBuf,
    pub mapping: PathBuf,
}

impl PrefixOp {
    pub fn new(dir: impl Into<PathBuf>, mapping: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mapping: mapping.into(),
        }
    }
}

impl Planner for PrefixOp {
    fn kind(&self) -> OperationKind {
        OperationKind::RenamePrefix
    }

    fn journal_dir(&self) -> &Path {
        &self.dir
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("source directory", &self.dir)?;
        require_file("prefix mapping file", &self.mapping)?;
        let mapping = read_prefix_mapping(&self.mapping)?;
        if mapping.rules.is_empty() {
            return Err(ValidationError::InvalidMapping {
                path: self.mapping.clone(),
                reason: "no row holds both a base filename and a prefix".to_string(),
            });
        }
        Ok(())
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let mapping = read_prefix_mapping(&self.mapping)?;
        let mut plan = Plan::new(self.kind(), &self.dir);

        for line in &mapping.rejected {
            plan.skip(Skipped::new(
                format!("mapping row {}", line),
                "needs both a base filename and a prefix",
            ));
        }

        for path in collect_files(&self.dir, false, filters)? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let (stem, _) = split_name(&name);
            let Some((_, prefix)) = mapping.lookup(stem) else {
                continue;
            };
            if name.starts_with(&format!("{}_", prefix)) {
                plan.skip(Skipped::path(&path, &self.dir, "already prefixed"));
                continue;
            }
            let to = self.dir.join(format!("{}_{}", prefix, name));
            tracing::trace!(file = %relative(&path, &self.dir), prefix = %prefix, "prefix match");
            plan.push(Change::Move { from: path, to });
        }

        Ok(plan)
    }
}
