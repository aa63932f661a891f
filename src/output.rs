//! Output formatting and styling.
//!
//! All user-facing output goes through [`OutputFormatter`] so styling stays
//! consistent across subcommands. Diagnostics go through `tracing` instead.

use crate::duplicates::DuplicateGroup;
use crate::kind::OperationKind;
use crate::operation::{ApplyReport, ItemOutcome, ItemStatus, relative};
use crate::rollback::RollbackReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages CLI output with consistent styling.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use refile::output::OutputFormatter;
    /// OutputFormatter::success("Rollback complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` changes.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use refile::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Styles one per-item outcome line.
    pub fn outcome_line(outcome: &ItemOutcome, root: &Path) -> String {
        let message = outcome.message(root);
        match (&outcome.status, outcome.simulated) {
            (ItemStatus::Succeeded, true) => message.yellow().to_string(),
            (ItemStatus::Succeeded, false) => message.green().to_string(),
            (ItemStatus::Failed(_), _) => message.red().to_string(),
        }
    }

    /// Prints a two-column table of labelled counts with a total row.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use refile::output::OutputFormatter;
    /// OutputFormatter::summary_table(&[("Succeeded", 12), ("Failed", 1)], 13);
    /// ```
    pub fn summary_table(rows: &[(&str, usize)], total: usize) {
        Self::header("SUMMARY");

        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0)
            .max(6);

        println!("{:<width$} | {}", "Result".bold(), "Items".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let count = if *count == 0 {
                count.to_string().normal()
            } else {
                count.to_string().green()
            };
            println!("{:<width$} | {}", label, count, width = width);
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            total.to_string().bold(),
            width = width
        );
    }

    /// Prints skipped items and the summary of an applied plan.
    pub fn apply_report(report: &ApplyReport) {
        if !report.skipped.is_empty() {
            Self::header("SKIPPED");
            for skipped in &report.skipped {
                println!("  {} {}", skipped.item, format!("({})", skipped.reason).dimmed());
            }
        }

        let (done_label, failed_label) = if report.simulated {
            ("Would succeed", "Would fail")
        } else {
            ("Succeeded", "Failed")
        };
        let total = report.succeeded + report.failed + report.skipped.len();
        Self::summary_table(
            &[
                (done_label, report.succeeded),
                (failed_label, report.failed),
                ("Skipped", report.skipped.len()),
            ],
            total,
        );
        if report.pruned_dirs > 0 {
            Self::info(&format!("Removed {} empty directories", report.pruned_dirs));
        }
    }

    /// Lists duplicate groups with the member that would be kept.
    pub fn duplicate_groups(groups: &[DuplicateGroup], root: &Path) {
        if groups.is_empty() {
            Self::success("No duplicates found");
            return;
        }

        let mut reclaimable = 0;
        for group in groups {
            Self::header(&format!("{} ({} bytes)", group.key, group.size));
            for (index, member) in group.members.iter().enumerate() {
                let marker = if index == 0 { "keep".green() } else { "dup ".red() };
                println!("  [{}] {}", marker, relative(member, root));
            }
            reclaimable += group.reclaimable_bytes();
        }
        Self::info(&format!(
            "\n{} groups, {} bytes reclaimable",
            groups.len(),
            reclaimable
        ));
    }

    pub fn rollback_report(report: &RollbackReport) {
        for path in &report.irreversible {
            Self::warning(&format!(
                "Cannot restore deleted file {}",
                path.display()
            ));
        }
        for (path, reason) in &report.failed {
            Self::error(&format!("Could not restore {}: {}", path.display(), reason));
        }

        Self::summary_table(
            &[
                ("Reverted", report.reverted),
                ("Failed", report.failed.len()),
                ("Irreversible", report.irreversible.len()),
                ("Ignored", report.ignored),
            ],
            report.reverted + report.failed_or_skipped(),
        );
        if let Some(archived) = &report.archived_to {
            Self::info(&format!("Journal archived to {}", archived.display()));
        }
    }

    /// Lists every operation kind with its reversibility.
    pub fn action_table() {
        Self::header("ACTIONS");
        for kind in OperationKind::ALL {
            let marker = if kind.is_reversible() {
                "reversible".green()
            } else {
                "irreversible".red()
            };
            println!("{:<18} {:<16} {}", kind.label().bold(), kind.as_str(), marker);
        }
    }
}
