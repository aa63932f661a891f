//! File operations.
//!
//! Every operation follows the same three steps. `validate` checks its
//! parameters without touching the filesystem beyond existence checks. `plan`
//! computes the full list of changes and skipped items up front. [`apply`]
//! then executes the plan, or narrates it when simulating. The plan is the
//! same either way, so a dry run shows exactly what a real run would attempt.
//!
//! A real run journals one entry per attempted change in the operation's
//! source directory. Skipped items are reported but never journaled.

pub mod collapse;
pub mod dedupe;
pub mod organize;
pub mod prefix;
pub mod rename;
pub mod replace;
pub mod search;

pub use collapse::CollapseOp;
pub use dedupe::DeleteDuplicatesOp;
pub use organize::OrganizeOp;
pub use prefix::PrefixOp;
pub use rename::RenameOp;
pub use replace::{ReplaceOp, ReplaceTarget};
pub use search::SearchOrganizeOp;

use crate::config::CompiledFilters;
use crate::error::{Error, JournalResult, Result, ValidationError};
use crate::file_organizer::FileOrganizer;
use crate::journal::{Journal, JournalEntry};
use crate::kind::OperationKind;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One planned mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Move or rename a file.
    Move { from: PathBuf, to: PathBuf },
    /// Delete a file. `details` is written to the journal.
    Delete { path: PathBuf, details: String },
}

impl Change {
    pub fn source(&self) -> &Path {
        match self {
            Change::Move { from, .. } => from,
            Change::Delete { path, .. } => path,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        match self {
            Change::Move { to, .. } => Some(to),
            Change::Delete { .. } => None,
        }
    }

    /// Present-tense description with paths shown relative to `root`.
    pub fn describe(&self, root: &Path) -> String {
        match self {
            Change::Move { from, to } => {
                format!("move '{}' to '{}'", relative(from, root), relative(to, root))
            }
            Change::Delete { path, .. } => format!("delete '{}'", relative(path, root)),
        }
    }
}

/// Renders `path` relative to `root` when it lies inside it.
pub fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// An item left out of the plan, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub item: String,
    pub reason: String,
}

impl Skipped {
    pub fn new(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            reason: reason.into(),
        }
    }

    pub fn path(path: &Path, root: &Path, reason: impl Into<String>) -> Self {
        Self::new(relative(path, root), reason)
    }
}

/// The full, ordered result of planning.
#[derive(Debug, Clone)]
pub struct Plan {
    pub kind: OperationKind,
    /// Directory whose journal records this plan's changes.
    pub root: PathBuf,
    pub changes: Vec<Change>,
    pub skipped: Vec<Skipped>,
    /// After a real run, remove directories emptied by the moves, up to `root`.
    pub prune_empty_dirs: bool,
}

impl Plan {
    pub fn new(kind: OperationKind, root: &Path) -> Self {
        Self {
            kind,
            root: root.to_path_buf(),
            changes: Vec::new(),
            skipped: Vec::new(),
            prune_empty_dirs: false,
        }
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn skip(&mut self, skipped: Skipped) {
        debug!(item = %skipped.item, reason = %skipped.reason, "skipped");
        self.skipped.push(skipped);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Result of one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub change: Change,
    pub status: ItemStatus,
    /// True if nothing was actually done.
    pub simulated: bool,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }

    /// The user-facing line for this outcome.
    pub fn message(&self, root: &Path) -> String {
        let action = self.change.describe(root);
        match (&self.status, self.simulated) {
            (ItemStatus::Succeeded, true) => format!("DRY RUN: Would {}", action),
            (ItemStatus::Failed(reason), true) => {
                format!("DRY RUN: Would fail to {}. Reason: {}", action, reason)
            }
            (ItemStatus::Succeeded, false) => format!("SUCCESS: {}", capitalize(&action)),
            (ItemStatus::Failed(reason), false) => {
                format!("FAILURE: Could not {}. Reason: {}", action, reason)
            }
        }
    }
}

fn capitalize(action: &str) -> String {
    let past = action
        .strip_prefix("move ")
        .map(|rest| format!("Moved {}", rest))
        .or_else(|| action.strip_prefix("delete ").map(|rest| format!("Deleted {}", rest)));
    past.unwrap_or_else(|| action.to_string())
}

/// Counts and per-item outcomes of an applied plan.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub kind: OperationKind,
    pub root: PathBuf,
    pub simulated: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: Vec<Skipped>,
    pub outcomes: Vec<ItemOutcome>,
    /// Empty directories removed after the run.
    pub pruned_dirs: usize,
}

impl ApplyReport {
    pub fn messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|outcome| outcome.message(&self.root))
            .collect()
    }
}

/// Applies `plan`, journaling each attempted change unless simulating.
pub fn apply(plan: &Plan, journal: &mut Journal, simulate: bool) -> JournalResult<ApplyReport> {
    apply_with(plan, journal, simulate, |_| {})
}

/// Like [`apply`], calling `observer` after every change.
///
/// Per-item failures are recorded and the run continues. Only a journal
/// failure stops it, since continuing would leave changes rollback cannot see.
pub fn apply_with<F>(
    plan: &Plan,
    journal: &mut Journal,
    simulate: bool,
    mut observer: F,
) -> JournalResult<ApplyReport>
where
    F: FnMut(&ItemOutcome),
{
    info!(
        kind = %plan.kind,
        root = %plan.root.display(),
        changes = plan.changes.len(),
        skipped = plan.skipped.len(),
        simulate,
        "applying plan"
    );

    let mut report = ApplyReport {
        kind: plan.kind,
        root: plan.root.clone(),
        simulated: simulate,
        succeeded: 0,
        failed: 0,
        skipped: plan.skipped.clone(),
        outcomes: Vec::with_capacity(plan.changes.len()),
        pruned_dirs: 0,
    };
    let mut occupancy = Occupancy::default();

    for change in &plan.changes {
        let status = if simulate {
            occupancy.predict(change)
        } else {
            let (status, created) = perform(change);
            journal.append(&journal_entry(plan.kind, change, &status, created.as_deref()))?;
            status
        };

        match &status {
            ItemStatus::Succeeded => report.succeeded += 1,
            ItemStatus::Failed(reason) => {
                warn!(change = %change.describe(&plan.root), reason = %reason, "change failed");
                report.failed += 1;
            }
        }

        let outcome = ItemOutcome {
            change: change.clone(),
            status,
            simulated: simulate,
        };
        observer(&outcome);
        report.outcomes.push(outcome);
    }

    if plan.prune_empty_dirs && !simulate {
        report.pruned_dirs = report
            .outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .filter_map(|outcome| match &outcome.change {
                Change::Move { from, .. } => {
                    Some(FileOrganizer::prune_empty_parents(from, &plan.root))
                }
                Change::Delete { .. } => None,
            })
            .sum();
    }

    info!(
        kind = %plan.kind,
        succeeded = report.succeeded,
        failed = report.failed,
        "plan applied"
    );
    Ok(report)
}

/// Performs one change, returning its status and the topmost directory a
/// move had to create.
fn perform(change: &Change) -> (ItemStatus, Option<PathBuf>) {
    let result = match change {
        Change::Move { from, to } => FileOrganizer::move_file(from, to),
        Change::Delete { path, .. } => FileOrganizer::remove_file(path).map(|()| None),
    };
    match result {
        Ok(created) => (ItemStatus::Succeeded, created),
        Err(e) => (ItemStatus::Failed(e.to_string()), None),
    }
}

fn journal_entry(
    kind: OperationKind,
    change: &Change,
    status: &ItemStatus,
    created: Option<&Path>,
) -> JournalEntry {
    let entry = match status {
        ItemStatus::Succeeded => {
            JournalEntry::success(kind, change.source(), change.destination())
        }
        ItemStatus::Failed(reason) => {
            JournalEntry::failure(kind, change.source(), change.destination(), reason.clone())
        }
    };
    match (change, created) {
        (Change::Delete { details, .. }, _) => entry.with_details(details.clone()),
        (Change::Move { .. }, Some(dir)) => entry.with_created_dir(dir),
        (Change::Move { .. }, None) => entry,
    }
}

/// Tracks what a simulated run would have done to the filesystem so far.
#[derive(Default)]
struct Occupancy {
    claimed: HashSet<PathBuf>,
    vacated: HashSet<PathBuf>,
}

impl Occupancy {
    fn occupied(&self, path: &Path) -> bool {
        self.claimed.contains(path) || (path.exists() && !self.vacated.contains(path))
    }

    fn predict(&mut self, change: &Change) -> ItemStatus {
        let source = change.source();
        if !self.occupied(source) {
            return ItemStatus::Failed(format!("source {} does not exist", source.display()));
        }
        if let Some(to) = change.destination()
            && self.occupied(to)
        {
            return ItemStatus::Failed(format!("destination {} already exists", to.display()));
        }

        self.claimed.remove(source);
        self.vacated.insert(source.to_path_buf());
        if let Some(to) = change.destination() {
            self.vacated.remove(to);
            self.claimed.insert(to.to_path_buf());
        }
        ItemStatus::Succeeded
    }
}

/// The contract each operation implements.
pub trait Planner {
    fn kind(&self) -> OperationKind;

    /// Directory whose journal records the changes.
    fn journal_dir(&self) -> &Path;

    /// Checks parameters. The first problem found is returned.
    fn validate(&self) -> std::result::Result<(), ValidationError>;

    /// Computes the plan. Must not mutate anything.
    fn plan(&self, filters: &CompiledFilters) -> Result<Plan>;
}

/// The closed set of operations.
#[derive(Debug, Clone)]
pub enum Operation {
    Rename(RenameOp),
    RenamePrefix(PrefixOp),
    Organize(OrganizeOp),
    Replace(ReplaceOp),
    Collapse(CollapseOp),
    SearchOrganize(SearchOrganizeOp),
    DeleteDuplicates(DeleteDuplicatesOp),
}

impl Operation {
    fn planner(&self) -> &dyn Planner {
        match self {
            Operation::Rename(op) => op,
            Operation::RenamePrefix(op) => op,
            Operation::Organize(op) => op,
            Operation::Replace(op) => op,
            Operation::Collapse(op) => op,
            Operation::SearchOrganize(op) => op,
            Operation::DeleteDuplicates(op) => op,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.planner().kind()
    }

    pub fn journal_dir(&self) -> &Path {
        self.planner().journal_dir()
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.planner().validate()
    }

    /// Validates, then plans.
    pub fn prepare(&self, filters: &CompiledFilters) -> Result<Plan> {
        self.validate()?;
        self.planner().plan(filters)
    }

    /// Applies a prepared plan, opening the journal unless simulating.
    pub fn execute<F>(&self, plan: &Plan, simulate: bool, observer: F) -> Result<ApplyReport>
    where
        F: FnMut(&ItemOutcome),
    {
        let mut journal = if simulate {
            Journal::simulated(self.journal_dir())
        } else {
            Journal::open(self.journal_dir())?
        };
        Ok(apply_with(plan, &mut journal, simulate, observer)?)
    }

    /// Validates, plans and applies in one call.
    pub fn run(&self, filters: &CompiledFilters, simulate: bool) -> Result<ApplyReport> {
        let plan = self.prepare(filters)?;
        self.execute(&plan, simulate, |_| {})
    }
}

/// Lists the regular files below `root`, sorted by path.
///
/// Journal files, and anything the filters reject, are left out. Unreadable
/// subdirectories are logged and skipped.
pub fn collect_files(
    root: &Path,
    recursive: bool,
    filters: &CompiledFilters,
) -> Result<Vec<PathBuf>> {
    fs::read_dir(root).map_err(|e| Error::io(root, e))?;

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let allows_hidden = filters.allows_hidden();
    let mut files = Vec::new();
    let entries = walker.into_iter().filter_entry(|entry| {
        allows_hidden
            || !entry.file_type().is_dir()
            || !entry.file_name().to_string_lossy().starts_with('.')
    });
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || Journal::is_journal_artifact(entry.file_name()) {
            continue;
        }
        let relative_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if filters.should_include(relative_path) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub(crate) fn require_dir(
    label: &'static str,
    path: &Path,
) -> std::result::Result<(), ValidationError> {
    if path.as_os_str().is_empty() || !path.is_dir() {
        return Err(ValidationError::MissingDirectory {
            label,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

pub(crate) fn require_file(
    label: &'static str,
    path: &Path,
) -> std::result::Result<(), ValidationError> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return Err(ValidationError::MissingFile {
            label,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Returns true if `name` is usable as a single path component.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains(std::path::MAIN_SEPARATOR)
}

/// Splits a file name into stem and extension (with its dot).
///
/// A leading dot does not start an extension, so `.bashrc` has no extension.
pub(crate) fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, "content").expect("Failed to write test file");
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("report.final.pdf"), ("report.final", ".pdf"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
    }

    #[test]
    fn test_collect_files_excludes_journal_and_hidden() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("sub/b.txt"));
        touch(&root.join(".git/config"));
        touch(&root.join(".hidden"));
        touch(&Journal::active_path(root));

        let filters = CompiledFilters::default();
        let recursive = collect_files(root, true, &filters).expect("Failed to collect files");
        assert_eq!(recursive, vec![root.join("a.txt"), root.join("sub/b.txt")]);

        let flat = collect_files(root, false, &filters).expect("Failed to collect files");
        assert_eq!(flat, vec![root.join("a.txt")]);
    }

    #[test]
    fn test_collect_files_missing_root() {
        let result = collect_files(
            Path::new("/non/existent/root"),
            true,
            &CompiledFilters::default(),
        );
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_simulation_predicts_collisions() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("b.txt"));
        touch(&root.join("taken.txt"));

        let mut plan = Plan::new(OperationKind::Rename, root);
        plan.push(Change::Move {
            from: root.join("a.txt"),
            to: root.join("x.txt"),
        });
        plan.push(Change::Move {
            from: root.join("b.txt"),
            to: root.join("x.txt"),
        });
        plan.push(Change::Move {
            from: root.join("taken.txt"),
            to: root.join("a.txt"),
        });

        let mut journal = Journal::simulated(root);
        let report = apply(&plan, &mut journal, true).expect("Failed to simulate");

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.outcomes[1].is_success());
        assert!(report.outcomes[2].is_success());
        assert!(root.join("a.txt").exists());
        assert!(!root.join("x.txt").exists());
        assert!(!Journal::exists(root));
    }

    #[test]
    fn test_real_run_journals_failures() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("b.txt"));

        let mut plan = Plan::new(OperationKind::Rename, root);
        plan.push(Change::Move {
            from: root.join("a.txt"),
            to: root.join("b.txt"),
        });
        plan.push(Change::Move {
            from: root.join("b.txt"),
            to: root.join("c.txt"),
        });
        plan.skip(Skipped::new("row 3", "missing new filename"));

        let mut journal = Journal::open(root).expect("Failed to open journal");
        let report = apply(&plan, &mut journal, false).expect("Failed to apply");
        drop(journal);

        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert_eq!(report.skipped.len(), 1);
        assert!(report.messages()[0].starts_with("FAILURE: Could not move 'a.txt' to 'b.txt'"));
        assert_eq!(report.messages()[1], "SUCCESS: Moved 'b.txt' to 'c.txt'");

        let entries = Journal::load(root).expect("Failed to load journal");
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_success());
        assert!(entries[1].is_success());
    }

    #[test]
    fn test_dry_run_messages() {
        let root = Path::new("/data");
        let outcome = ItemOutcome {
            change: Change::Delete {
                path: root.join("b/dup.txt"),
                details: String::new(),
            },
            status: ItemStatus::Succeeded,
            simulated: true,
        };
        assert_eq!(outcome.message(root), "DRY RUN: Would delete 'b/dup.txt'");
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("Report"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
    }
}
