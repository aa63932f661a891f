//! Find and replace text in file names.

use super::{Change, Plan, Planner, Skipped, collect_files, is_plain_name, require_dir, split_name};
use crate::config::CompiledFilters;
use crate::error::{Result, ValidationError};
use crate::kind::OperationKind;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Which part of the file name is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReplaceTarget {
    /// The name without its extension.
    #[default]
    Name,
    /// The extension, without the dot.
    Ext,
}

/// Replaces every occurrence of `find` with `replace` in each file's stem or
/// extension. With `regex` set, `find` is a regular expression and `replace`
/// may refer to capture groups as `$1` or `${name}`.
#[derive(Debug, Clone)]
pub struct ReplaceOp {
    pub dir: PathBuf,
    pub find: String,
    pub replace: String,
    pub regex: bool,
    pub target: ReplaceTarget,
    pub recursive: bool,
}

enum Matcher<'a> {
    Literal(&'a str),
    Pattern(Regex),
}

impl Matcher<'_> {
    fn apply(&self, text: &str, replacement: &str) -> String {
        match self {
            Matcher::Literal(find) => text.replace(find, replacement),
            Matcher::Pattern(regex) => regex.replace_all(text, replacement).into_owned(),
        }
    }
}

impl ReplaceOp {
    pub fn new(
        dir: impl Into<PathBuf>,
        find: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            find: find.into(),
            replace: replace.into(),
            regex: false,
            target: ReplaceTarget::Name,
            recursive: false,
        }
    }

    fn matcher(&self) -> std::result::Result<Matcher<'_>, ValidationError> {
        if !self.regex {
            return Ok(Matcher::Literal(&self.find));
        }
        Regex::new(&self.find)
            .map(Matcher::Pattern)
            .map_err(|e| ValidationError::InvalidPattern {
                pattern: self.find.clone(),
                reason: e.to_string(),
            })
    }

    fn rewrite(&self, matcher: &Matcher<'_>, name: &str) -> String {
        let (stem, extension) = split_name(name);
        match self.target {
            ReplaceTarget::Name => format!("{}{}", matcher.apply(stem, &self.replace), extension),
            ReplaceTarget::Ext => {
                let current = extension.strip_prefix('.').unwrap_or(extension);
                let replaced = matcher.apply(current, &self.replace);
                if replaced.is_empty() {
                    stem.to_string()
                } else {
                    format!("{}.{}", stem, replaced)
                }
            }
        }
    }
}

impl Planner for ReplaceOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Replace
    }

    fn journal_dir(&self) -> &Path {
        &self.dir
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("source directory", &self.dir)?;
        if self.find.is_empty() {
            return Err(ValidationError::EmptyField("find"));
        }
        self.matcher().map(|_| ())
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let matcher = self.matcher()?;
        let mut plan = Plan::new(self.kind(), &self.dir);

        for path in collect_files(&self.dir, self.recursive, filters)? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let new_name = self.rewrite(&matcher, &name);
            if new_name == name {
                continue;
            }
            if !is_plain_name(&new_name) {
                plan.skip(Skipped::path(
                    &path,
                    &self.dir,
                    format!("'{}' is not a valid file name", new_name),
                ));
                continue;
            }
            let to = path.with_file_name(&new_name);
            plan.push(Change::Move { from: path, to });
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup(files: &[&str]) -> TempDir {
        let dir = TempDir::new().expect("Failed to create temp directory");
        for name in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent directory");
            }
            fs::write(path, name).expect("Failed to write test file");
        }
        dir
    }

    fn names(plan: &Plan) -> Vec<String> {
        plan.changes
            .iter()
            .filter_map(|c| c.destination())
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_literal_replace_in_stem_only() {
        let dir = setup(&["draft draft.txt", "final.txt", "draft.draft"]);
        let op = ReplaceOp::new(dir.path(), "draft", "v2");

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert_eq!(names(&plan), vec!["v2 v2.txt", "v2.draft"]);
    }

    #[test]
    fn test_regex_replace_with_groups() {
        let dir = setup(&["IMG_1234.jpg", "notes.txt"]);
        let mut op = ReplaceOp::new(dir.path(), r"IMG_(\d+)", "photo-$1");
        op.regex = true;

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert_eq!(names(&plan), vec!["photo-1234.jpg"]);
    }

    #[test]
    fn test_extension_target() {
        let dir = setup(&["a.jpeg", "b.txt", "c.jpeg"]);
        let mut op = ReplaceOp::new(dir.path(), "jpeg", "jpg");
        op.target = ReplaceTarget::Ext;

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert_eq!(names(&plan), vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn test_removing_extension_drops_the_dot() {
        let dir = setup(&["archive.bak"]);
        let mut op = ReplaceOp::new(dir.path(), "bak", "");
        op.target = ReplaceTarget::Ext;

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert_eq!(names(&plan), vec!["archive"]);
    }

    #[test]
    fn test_empty_result_is_skipped() {
        let dir = setup(&["temp"]);
        let op = ReplaceOp::new(dir.path(), "temp", "");

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 1);
    }

    #[test]
    fn test_recursive_replace_stays_in_parent() {
        let dir = setup(&["sub/old_name.txt"]);
        let mut op = ReplaceOp::new(dir.path(), "old", "new");
        op.recursive = true;

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert_eq!(
            plan.changes[0].destination(),
            Some(dir.path().join("sub/new_name.txt").as_path())
        );
    }

    #[test]
    fn test_validation() {
        let dir = setup(&[]);
        assert!(matches!(
            ReplaceOp::new(dir.path(), "", "x").validate(),
            Err(ValidationError::EmptyField("find"))
        ));

        let mut op = ReplaceOp::new(dir.path(), "(unclosed", "x");
        op.regex = true;
        assert!(matches!(
            op.validate(),
            Err(ValidationError::InvalidPattern { .. })
        ));
    }
}
