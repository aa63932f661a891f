//! Rollback of journaled changes.
//!
//! Rollback reverses the active journal of a directory, newest entry first,
//! moving every file back to where it was. Reverse order matters: when one
//! operation moved a file that an earlier operation had already moved, only
//! undoing the later move first puts the file where the earlier entry
//! expects it.
//!
//! Deleted duplicates cannot be brought back; those entries are reported as
//! irreversible. After the pass the journal is archived, so the same changes
//! are never reverted twice.

use crate::error::{JournalError, JournalResult};
use crate::file_organizer::FileOrganizer;
use crate::journal::{Journal, JournalEntry, Status};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a rollback is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackState {
    Idle,
    Loaded,
    Replaying,
    Archived,
    Failed,
}

/// What happened during a completed rollback.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Number of files moved back.
    pub reverted: usize,
    /// Entries that could not be reverted, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Deleted files that cannot be restored.
    pub irreversible: Vec<PathBuf>,
    /// Failure entries, which changed nothing and need no undo.
    pub ignored: usize,
    /// Where the journal was archived.
    pub archived_to: Option<PathBuf>,
}

impl RollbackReport {
    /// Entries that were not reverted, for whatever reason.
    pub fn failed_or_skipped(&self) -> usize {
        self.failed.len() + self.irreversible.len()
    }

    /// Returns true if every reversible entry was reverted.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub enum RollbackOutcome {
    /// The confirmation was declined. Nothing was touched.
    Cancelled,
    Completed(RollbackReport),
}

/// Reverts one directory's journal.
pub struct RollbackEngine {
    dir: PathBuf,
    state: RollbackState,
}

impl RollbackEngine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: RollbackState::Idle,
        }
    }

    pub fn state(&self) -> RollbackState {
        self.state
    }

    /// Rolls back the active journal after `confirm` agrees.
    ///
    /// `confirm` receives the journal's path and is called exactly once,
    /// before anything is changed.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Missing`] if there is no active journal, and
    /// any error from locking, reading or archiving it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refile::rollback::{RollbackEngine, RollbackOutcome};
    ///
    /// let mut engine = RollbackEngine::new("/path/to/directory");
    /// match engine.rollback(|_| true) {
    ///     Ok(RollbackOutcome::Completed(report)) => println!("Reverted {} files", report.reverted),
    ///     Ok(RollbackOutcome::Cancelled) => println!("Cancelled"),
    ///     Err(e) => eprintln!("Rollback failed: {}", e),
    /// }
    /// ```
    pub fn rollback<F>(&mut self, confirm: F) -> JournalResult<RollbackOutcome>
    where
        F: FnOnce(&Path) -> bool,
    {
        if !Journal::exists(&self.dir) {
            return Err(JournalError::Missing {
                dir: self.dir.clone(),
            });
        }
        if !confirm(&Journal::active_path(&self.dir)) {
            info!(dir = %self.dir.display(), "rollback cancelled");
            return Ok(RollbackOutcome::Cancelled);
        }

        let result = self.run();
        if result.is_err() {
            self.state = RollbackState::Failed;
        }
        result.map(RollbackOutcome::Completed)
    }

    fn run(&mut self) -> JournalResult<RollbackReport> {
        let _lock = Journal::open(&self.dir)?;
        let entries = Journal::load(&self.dir)?;
        self.state = RollbackState::Loaded;
        info!(dir = %self.dir.display(), entries = entries.len(), "rolling back");

        self.state = RollbackState::Replaying;
        let mut report = RollbackReport::default();
        for entry in entries.iter().rev() {
            self.replay(entry, &mut report);
        }

        let archived = Journal::archive(&self.dir)?;
        self.state = RollbackState::Archived;
        info!(
            reverted = report.reverted,
            failed = report.failed.len(),
            irreversible = report.irreversible.len(),
            archived = %archived.display(),
            "rollback finished"
        );
        report.archived_to = Some(archived);
        Ok(report)
    }

    fn replay(&self, entry: &JournalEntry, report: &mut RollbackReport) {
        if let Status::Failure(_) = entry.status {
            report.ignored += 1;
            return;
        }
        if !entry.kind.is_reversible() {
            debug!(path = %entry.original_path.display(), kind = %entry.kind, "irreversible entry");
            report.irreversible.push(entry.original_path.clone());
            return;
        }

        match revert_entry(entry) {
            Ok(()) => report.reverted += 1,
            Err(reason) => {
                warn!(path = %entry.original_path.display(), reason = %reason, "could not revert");
                report.failed.push((entry.original_path.clone(), reason));
            }
        }
    }
}

/// Moves an entry's file from its new path back to its original path.
///
/// Directories the forward move created are removed again once empty.
/// Directories that existed before it are never touched.
pub fn revert_entry(entry: &JournalEntry) -> Result<(), String> {
    let Some(new_path) = &entry.new_path else {
        return Err("entry has no new path to restore from".to_string());
    };

    FileOrganizer::move_file(new_path, &entry.original_path).map_err(|e| e.to_string())?;
    if let Some(created) = entry.created_dir()
        && let Some(stop) = created.parent()
    {
        FileOrganizer::prune_empty_parents(new_path, stop);
    }
    debug!(
        from = %new_path.display(),
        to = %entry.original_path.display(),
        "reverted"
    );
    Ok(())
}

/// Rolls back the active journal of `dir`.
pub fn rollback<F>(dir: &Path, confirm: F) -> JournalResult<RollbackOutcome>
where
    F: FnOnce(&Path) -> bool,
{
    RollbackEngine::new(dir).rollback(confirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::OperationKind;
    use std::fs;
    use tempfile::TempDir;

    fn record(dir: &Path, entries: &[JournalEntry]) {
        let mut journal = Journal::open(dir).expect("Failed to open journal");
        for entry in entries {
            journal.append(entry).expect("Failed to append");
        }
    }

    fn completed(outcome: RollbackOutcome) -> RollbackReport {
        match outcome {
            RollbackOutcome::Completed(report) => report,
            RollbackOutcome::Cancelled => panic!("Rollback was cancelled"),
        }
    }

    #[test]
    fn test_rollback_without_journal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut asked = false;

        let result = rollback(temp_dir.path(), |_| {
            asked = true;
            true
        });

        assert!(matches!(result, Err(JournalError::Missing { .. })));
        assert!(!asked);
    }

    #[test]
    fn test_declined_confirmation_changes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::write(dir.join("x.txt"), "x").expect("Failed to write file");
        record(
            dir,
            &[JournalEntry::success(
                OperationKind::Rename,
                &dir.join("a.txt"),
                Some(&dir.join("x.txt")),
            )],
        );

        let mut engine = RollbackEngine::new(dir);
        let outcome = engine.rollback(|_| false).expect("Rollback errored");

        assert!(matches!(outcome, RollbackOutcome::Cancelled));
        assert_eq!(engine.state(), RollbackState::Idle);
        assert!(dir.join("x.txt").exists());
        assert!(Journal::exists(dir));
    }

    #[test]
    fn test_rollback_reverts_and_archives() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::create_dir(dir.join("docs")).expect("Failed to create dir");
        fs::write(dir.join("docs/b.txt"), "b").expect("Failed to write file");
        record(
            dir,
            &[
                JournalEntry::success(
                    OperationKind::Organize,
                    &dir.join("docs-b.txt"),
                    Some(&dir.join("docs/b.txt")),
                )
                .with_created_dir(&dir.join("docs")),
                JournalEntry::failure(
                    OperationKind::Organize,
                    &dir.join("c-d.txt"),
                    Some(&dir.join("c/d.txt")),
                    "permission denied",
                ),
            ],
        );

        let mut engine = RollbackEngine::new(dir);
        let report = completed(engine.rollback(|_| true).expect("Rollback failed"));

        assert_eq!(engine.state(), RollbackState::Archived);
        assert_eq!(report.reverted, 1);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.failed_or_skipped(), 0);
        assert!(dir.join("docs-b.txt").exists());
        assert!(!dir.join("docs").exists());
        assert!(report.archived_to.is_some_and(|p| p.exists()));
        assert!(!Journal::exists(dir));
    }

    #[test]
    fn test_irreversible_entries_are_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        record(
            dir,
            &[JournalEntry::success(OperationKind::DuplicateDelete, &dir.join("dup.txt"), None)
                .with_details("name:dup.txt")],
        );

        let report = completed(rollback(dir, |_| true).expect("Rollback failed"));

        assert_eq!(report.reverted, 0);
        assert_eq!(report.irreversible, vec![dir.join("dup.txt")]);
        assert_eq!(report.failed_or_skipped(), 1);
        assert!(!dir.join("dup.txt").exists());
    }

    #[test]
    fn test_rollback_never_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::write(dir.join("x.txt"), "renamed").expect("Failed to write file");
        fs::write(dir.join("a.txt"), "newcomer").expect("Failed to write file");
        record(
            dir,
            &[JournalEntry::success(
                OperationKind::Rename,
                &dir.join("a.txt"),
                Some(&dir.join("x.txt")),
            )],
        );

        let report = completed(rollback(dir, |_| true).expect("Rollback failed"));

        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete_success());
        assert_eq!(
            fs::read_to_string(dir.join("a.txt")).expect("Failed to read file"),
            "newcomer"
        );
        assert!(dir.join("x.txt").exists());
    }

    #[test]
    fn test_entry_without_new_path_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let entry = JournalEntry::success(OperationKind::Rename, &temp_dir.path().join("a"), None);

        assert!(revert_entry(&entry).is_err());
    }

    #[test]
    fn test_reverse_order_is_required() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        // organize a-b.txt -> a/b.txt, then collapse a/b.txt -> a_b.txt
        let organize = JournalEntry::success(
            OperationKind::Organize,
            &dir.join("a-b.txt"),
            Some(&dir.join("a/b.txt")),
        )
        .with_created_dir(&dir.join("a"));
        let collapse = JournalEntry::success(
            OperationKind::Collapse,
            &dir.join("a/b.txt"),
            Some(&dir.join("a_b.txt")),
        );

        fs::write(dir.join("a_b.txt"), "data").expect("Failed to write file");
        assert!(revert_entry(&organize).is_err());
        revert_entry(&collapse).expect("Failed to revert collapse");
        assert!(!dir.join("a-b.txt").exists());
        assert!(dir.join("a/b.txt").exists());

        fs::remove_dir_all(dir.join("a")).expect("Failed to reset");
        fs::write(dir.join("a_b.txt"), "data").expect("Failed to write file");
        revert_entry(&collapse).expect("Failed to revert collapse");
        revert_entry(&organize).expect("Failed to revert organize");
        assert!(dir.join("a-b.txt").exists());
        assert!(!dir.join("a").exists());
    }

    #[test]
    fn test_rollback_while_locked() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        record(
            dir,
            &[JournalEntry::success(
                OperationKind::Rename,
                &dir.join("a.txt"),
                Some(&dir.join("x.txt")),
            )],
        );

        let _holder = Journal::open(dir).expect("Failed to open journal");
        let mut engine = RollbackEngine::new(dir);
        let result = engine.rollback(|_| true);

        assert!(matches!(result, Err(JournalError::Locked { .. })));
        assert_eq!(engine.state(), RollbackState::Failed);
        assert!(Journal::exists(dir));
    }

    #[test]
    fn test_rollback_keeps_directories_that_existed_before() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::create_dir_all(dir.join("kept/made")).expect("Failed to create dirs");
        fs::write(dir.join("kept/made/b.txt"), "b").expect("Failed to write file");
        fs::write(dir.join("kept/c.txt"), "c").expect("Failed to write file");
        record(
            dir,
            &[
                JournalEntry::success(
                    OperationKind::Organize,
                    &dir.join("kept-made-b.txt"),
                    Some(&dir.join("kept/made/b.txt")),
                )
                .with_created_dir(&dir.join("kept/made")),
                JournalEntry::success(
                    OperationKind::Organize,
                    &dir.join("kept-c.txt"),
                    Some(&dir.join("kept/c.txt")),
                ),
            ],
        );

        let report = completed(rollback(dir, |_| true).expect("Rollback failed"));

        assert_eq!(report.reverted, 2);
        assert!(dir.join("kept-made-b.txt").exists());
        assert!(dir.join("kept-c.txt").exists());
        assert!(!dir.join("kept/made").exists());
        assert!(dir.join("kept").is_dir());
    }
}
