//! Split file names on a delimiter into nested folders.
//!
//! `2024-reports-q1.pdf` with delimiter `-` becomes `2024/reports/q1.pdf`
//! under the output directory.

use super::{Change, Plan, Planner, Skipped, collect_files, require_dir, split_name};
use crate::config::CompiledFilters;
use crate::error::{Result, ValidationError};
use crate::kind::OperationKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct OrganizeOp {
    pub source: PathBuf,
    /// Where the folder tree is built. Defaults to `source`.
    pub output: Option<PathBuf>,
    pub delimiter: String,
    pub recursive: bool,
}

impl OrganizeOp {
    pub fn new(source: impl Into<PathBuf>, delimiter: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            output: None,
            delimiter: delimiter.into(),
            recursive: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    fn output_dir(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.source)
    }

    /// The destination for a file name, relative to the output directory.
    fn destination_for(&self, name: &str) -> std::result::Result<PathBuf, &'static str> {
        let (stem, extension) = split_name(name);
        if !stem.contains(self.delimiter.as_str()) {
            return Err("no delimiter found");
        }

        let mut parts: Vec<&str> = stem.split(self.delimiter.as_str()).collect();
        let last = parts.pop().unwrap_or_default();
        if last.is_empty() {
            return Err("nothing after the last delimiter");
        }

        let mut destination: PathBuf = parts
            .into_iter()
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .collect();
        destination.push(format!("{}{}", last, extension));
        Ok(destination)
    }
}

impl Planner for OrganizeOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Organize
    }

    fn journal_dir(&self) -> &Path {
        &self.source
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("source directory", &self.source)?;
        if let Some(output) = &self.output {
            require_dir("output directory", output)?;
        }
        if self.delimiter.is_empty() {
            return Err(ValidationError::EmptyField("delimiter"));
        }
        Ok(())
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let mut plan = Plan::new(self.kind(), &self.source);
        let output = self.output_dir();

        for path in collect_files(&self.source, self.recursive, filters)? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            match self.destination_for(&name) {
                Ok(destination) => plan.push(Change::Move {
                    from: path,
                    to: output.join(destination),
                }),
                Err(reason) => plan.skip(Skipped::path(&path, &self.source, reason)),
            }
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_destination_for() {
        let op = OrganizeOp::new("/src", "-");

        assert_eq!(
            op.destination_for("2024-reports-q1.pdf"),
            Ok(PathBuf::from("2024/reports/q1.pdf"))
        );
        assert_eq!(op.destination_for("a--b.txt"), Ok(PathBuf::from("a/b.txt")));
        assert_eq!(op.destination_for("plain.txt"), Err("no delimiter found"));
        assert_eq!(
            op.destination_for("trailing-.txt"),
            Err("nothing after the last delimiter")
        );
    }

    #[test]
    fn test_multi_character_delimiter() {
        let op = OrganizeOp::new("/src", "__");
        assert_eq!(
            op.destination_for("client__2024__invoice.pdf"),
            Ok(PathBuf::from("client/2024/invoice.pdf"))
        );
    }

    #[test]
    fn test_plan_uses_output_directory() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let output = TempDir::new().expect("Failed to create temp directory");
        fs::write(source.path().join("a-b.txt"), "x").expect("Failed to write test file");
        fs::write(source.path().join("plain.txt"), "x").expect("Failed to write test file");

        let op = OrganizeOp::new(source.path(), "-").with_output(output.path());
        op.validate().expect("Validation should pass");
        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");

        assert_eq!(
            plan.changes,
            vec![Change::Move {
                from: source.path().join("a-b.txt"),
                to: output.path().join("a").join("b.txt"),
            }]
        );
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.root, source.path());
    }

    #[test]
    fn test_recursion_is_optional() {
        let source = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(source.path().join("sub")).expect("Failed to create subdirectory");
        fs::write(source.path().join("sub/x-y.txt"), "x").expect("Failed to write test file");

        let flat = OrganizeOp::new(source.path(), "-")
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert!(flat.is_empty());

        let deep = OrganizeOp::new(source.path(), "-")
            .recursive(true)
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");
        assert_eq!(deep.changes.len(), 1);
        assert_eq!(
            deep.changes[0].destination(),
            Some(source.path().join("x/y.txt").as_path())
        );
    }

    #[test]
    fn test_empty_delimiter_is_rejected() {
        let source = TempDir::new().expect("Failed to create temp directory");
        let op = OrganizeOp::new(source.path(), "");
        assert!(matches!(
            op.validate(),
            Err(ValidationError::EmptyField("delimiter"))
        ));
    }
}
