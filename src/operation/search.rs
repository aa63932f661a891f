//! Bucket files into folders named after the search term they contain.

use super::{Change, Plan, Planner, collect_files, is_plain_name, require_dir, require_file};
use crate::config::CompiledFilters;
use crate::error::{Result, ValidationError};
use crate::kind::OperationKind;
use crate::mapping::read_search_terms;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Moves each top-level file of `source` whose name contains a search term,
/// ignoring case, into `<output>/<term>/`. Terms are tried in order and a
/// file goes to the first term it matches.
#[derive(Debug, Clone)]
pub struct SearchOrganizeOp {
    pub source: PathBuf,
    /// Defaults to `source`.
    pub output: Option<PathBuf>,
    /// Terms given directly.
    pub terms: Vec<String>,
    /// Optional file with more terms, read after the direct ones.
    pub terms_file: Option<PathBuf>,
}

impl SearchOrganizeOp {
    pub fn new(source: impl Into<PathBuf>, terms: Vec<String>) -> Self {
        Self {
            source: source.into(),
            output: None,
            terms,
            terms_file: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_terms_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.terms_file = Some(path.into());
        self
    }

    /// All terms, trimmed and de-duplicated ignoring case, first occurrence kept.
    pub fn resolved_terms(&self) -> std::result::Result<Vec<String>, ValidationError> {
        let mut all: Vec<String> = self.terms.iter().map(|t| t.trim().to_string()).collect();
        if let Some(path) = &self.terms_file {
            all.extend(read_search_terms(path)?);
        }

        let mut seen = HashSet::new();
        Ok(all
            .into_iter()
            .filter(|term| !term.is_empty())
            .filter(|term| seen.insert(term.to_lowercase()))
            .collect())
    }
}

impl Planner for SearchOrganizeOp {
    fn kind(&self) -> OperationKind {
        OperationKind::SearchOrganize
    }

    fn journal_dir(&self) -> &Path {
        &self.source
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_dir("source folder", &self.source)?;
        if let Some(output) = &self.output {
            require_dir("output folder", output)?;
        }
        if let Some(path) = &self.terms_file {
            require_file("search terms file", path)?;
        }

        let terms = self.resolved_terms()?;
        if terms.is_empty() {
            return Err(ValidationError::NoSearchTerms);
        }
        if let Some(bad) = terms.iter().find(|term| !is_plain_name(term)) {
            return Err(ValidationError::InvalidSearchTerm(bad.clone()));
        }
        Ok(())
    }

    fn plan(&self, filters: &CompiledFilters) -> Result<Plan> {
        let terms = self.resolved_terms()?;
        let output = self.output.as_deref().unwrap_or(&self.source);
        let mut plan = Plan::new(self.kind(), &self.source);

        let files: Vec<(PathBuf, String)> = collect_files(&self.source, false, filters)?
            .into_iter()
            .filter_map(|path| {
                let lowered = path.file_name()?.to_string_lossy().to_lowercase();
                Some((path, lowered))
            })
            .collect();
        let mut claimed: HashSet<&Path> = HashSet::new();

        for term in &terms {
            let needle = term.to_lowercase();
            for (path, lowered) in &files {
                if claimed.contains(path.as_path()) || !lowered.contains(&needle) {
                    continue;
                }
                let Some(name) = path.file_name() else {
                    continue;
                };
                claimed.insert(path.as_path());
                plan.push(Change::Move {
                    from: path.clone(),
                    to: output.join(term).join(name),
                });
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

    fn setup(files: &[&str]) -> (TempDir, TempDir) {
        let source = TempDir::new().expect("Failed to create temp directory");
        let output = TempDir::new().expect("Failed to create temp directory");
        for name in files {
            fs::write(source.path().join(name), name).expect("Failed to write test file");
        }
        (source, output)
    }

    #[test]
    fn test_matching_ignores_case() {
        let (source, output) = setup(&["Report-JAN.pdf"]);
        let op = SearchOrganizeOp::new(source.path(), vec!["report-jan".to_string()])
            .with_output(output.path());

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");

        assert_eq!(
            plan.changes,
            vec![Change::Move {
                from: source.path().join("Report-JAN.pdf"),
                to: output.path().join("report-jan").join("Report-JAN.pdf"),
            }]
        );
    }

    #[test]
    fn test_first_matching_term_claims_the_file() {
        let (source, output) = setup(&["Project-Alpha-Report.docx", "Project-Beta.docx"]);
        let op = SearchOrganizeOp::new(
            source.path(),
            vec!["Report".to_string(), "Project".to_string()],
        )
        .with_output(output.path());

        let plan = op
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");

        let destinations: Vec<_> = plan
            .changes
            .iter()
            .filter_map(|c| c.destination())
            .map(|p| p.strip_prefix(output.path()).expect("Outside output").to_path_buf())
            .collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("Report/Project-Alpha-Report.docx"),
                PathBuf::from("Project/Project-Beta.docx"),
            ]
        );
    }

    #[test]
    fn test_terms_are_merged_and_deduplicated() {
        let (source, _output) = setup(&[]);
        let terms_path = source.path().join("terms.txt");
        fs::write(&terms_path, "BETA\nalpha\n\ngamma\nAlpha\n").expect("Failed to write terms");

        let terms = vec![" alpha ".to_string(), "beta".to_string()];
        let op = SearchOrganizeOp::new(source.path(), terms).with_terms_file(&terms_path);

        assert_eq!(
            op.resolved_terms().expect("Failed to resolve terms"),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn test_validation() {
        let (source, _output) = setup(&[]);

        let empty = SearchOrganizeOp::new(source.path(), vec!["  ".to_string()]);
        assert!(matches!(empty.validate(), Err(ValidationError::NoSearchTerms)));

        let nested = SearchOrganizeOp::new(source.path(), vec!["a/b".to_string()]);
        assert!(matches!(
            nested.validate(),
            Err(ValidationError::InvalidSearchTerm(_))
        ));

        let missing_file = SearchOrganizeOp::new(source.path(), Vec::new())
            .with_terms_file(source.path().join("nope.txt"));
        assert!(matches!(
            missing_file.validate(),
            Err(ValidationError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_subdirectories_are_not_searched() {
        let (source, _output) = setup(&["report.txt"]);
        fs::create_dir(source.path().join("nested")).expect("Failed to create dir");
        fs::write(source.path().join("nested/report-2.txt"), "x").expect("Failed to write file");

        let plan = SearchOrganizeOp::new(source.path(), vec!["report".to_string()])
            .plan(&CompiledFilters::default())
            .expect("Failed to plan");

        assert_eq!(plan.changes.len(), 1);
        assert_eq!(
            plan.changes[0].destination(),
            Some(source.path().join("report").join("report.txt").as_path())
        );
    }
}
