//! Command-line interface.
//!
//! Parses arguments, loads configuration, and drives operations and rollback,
//! printing their outcomes through [`OutputFormatter`].

use crate::config::{CompiledFilters, Config};
use crate::duplicates::DetectionMode;
use crate::error::Result;
use crate::operation::{
    CollapseOp, DeleteDuplicatesOp, Operation, OrganizeOp, Planner, PrefixOp, RenameOp,
    ReplaceOp, ReplaceTarget, SearchOrganizeOp,
};
use crate::output::OutputFormatter;
use crate::rollback::{RollbackOutcome, rollback};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "refile", version)]
#[command(about = "Bulk rename, organize, collapse and de-duplicate files, with rollback")]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Shared `--dry-run` flag.
#[derive(Debug, Clone, Copy, Args)]
pub struct DryRun {
    /// Show what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Shared `--recursive` / `--no-recursive` pair, falling back to configuration.
#[derive(Debug, Clone, Copy, Args)]
pub struct Recursion {
    /// Descend into subdirectories
    #[arg(long, conflicts_with = "no_recursive")]
    pub recursive: bool,

    /// Only process the top-level directory
    #[arg(long)]
    pub no_recursive: bool,
}

impl Recursion {
    fn resolve(self, default: bool) -> bool {
        flag(self.recursive, self.no_recursive, default)
    }
}

fn flag(yes: bool, no: bool, default: bool) -> bool {
    if yes {
        true
    } else if no {
        false
    } else {
        default
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rename files from a CSV of original and new file names
    Rename {
        dir: PathBuf,
        /// CSV with 'original filename' and 'new filename' columns
        #[arg(long, short)]
        mapping: PathBuf,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Prefix files whose name starts with a base listed in a CSV
    Prefix {
        dir: PathBuf,
        /// Unheaded CSV of base_filename,prefix rows
        #[arg(long, short)]
        mapping: PathBuf,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Split file names on a delimiter into nested folders
    Organize {
        dir: PathBuf,
        #[arg(long, short)]
        delimiter: Option<String>,
        /// Build the folders here instead of in DIR
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        recursion: Recursion,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Find and replace text in file names
    Replace {
        dir: PathBuf,
        #[arg(long)]
        find: String,
        #[arg(long = "with", default_value = "")]
        replace: String,
        /// Treat --find as a regular expression
        #[arg(long)]
        regex: bool,
        #[arg(long, value_enum, default_value_t = ReplaceTarget::Name)]
        target: ReplaceTarget,
        #[command(flatten)]
        recursion: Recursion,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Move every file in subdirectories up into DIR
    Collapse {
        dir: PathBuf,
        /// Prefix moved files with their former folder path
        #[arg(long, conflicts_with = "no_prefix_paths")]
        prefix_paths: bool,
        /// Keep file names as they are
        #[arg(long)]
        no_prefix_paths: bool,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Move files whose name contains a search term into a folder per term
    Search {
        dir: PathBuf,
        /// Search term, may be repeated
        #[arg(long = "term", short)]
        terms: Vec<String>,
        /// File of terms: one per line, or first column of a .csv
        #[arg(long)]
        terms_file: Option<PathBuf>,
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Find duplicate files and optionally delete all but one of each group
    Dupes {
        dir: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<DetectionMode>,
        #[command(flatten)]
        recursion: Recursion,
        /// Delete redundant copies. This cannot be rolled back.
        #[arg(long)]
        delete: bool,
        /// Print groups as JSON
        #[arg(long, conflicts_with = "delete")]
        json: bool,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Revert the changes recorded in DIR's journal
    Rollback {
        dir: PathBuf,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// List the available actions
    Actions,
}

/// Runs a parsed command line.
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let filters = config.compile()?;
    let defaults = &config.defaults;

    match cli.command {
        Command::Rename {
            dir,
            mapping,
            dry_run,
        } => run_operation(
            Operation::Rename(RenameOp::new(resolve_dir(&dir), mapping)),
            &filters,
            dry_run.dry_run,
        ),
        Command::Prefix {
            dir,
            mapping,
            dry_run,
        } => run_operation(
            Operation::RenamePrefix(PrefixOp::new(resolve_dir(&dir), mapping)),
            &filters,
            dry_run.dry_run,
        ),
        Command::Organize {
            dir,
            delimiter,
            output,
            recursion,
            dry_run,
        } => {
            let mut op = OrganizeOp::new(
                resolve_dir(&dir),
                delimiter.unwrap_or_else(|| defaults.delimiter.clone()),
            )
            .recursive(recursion.resolve(defaults.recursive));
            if let Some(output) = output {
                op = op.with_output(resolve_dir(&output));
            }
            run_operation(Operation::Organize(op), &filters, dry_run.dry_run)
        }
        Command::Replace {
            dir,
            find,
            replace,
            regex,
            target,
            recursion,
            dry_run,
        } => {
            let mut op = ReplaceOp::new(resolve_dir(&dir), find, replace);
            op.regex = regex;
            op.target = target;
            op.recursive = recursion.resolve(defaults.recursive);
            run_operation(Operation::Replace(op), &filters, dry_run.dry_run)
        }
        Command::Collapse {
            dir,
            prefix_paths,
            no_prefix_paths,
            dry_run,
        } => {
            let prefix = flag(prefix_paths, no_prefix_paths, defaults.collapse_prefix_paths);
            run_operation(
                Operation::Collapse(CollapseOp::new(resolve_dir(&dir), prefix)),
                &filters,
                dry_run.dry_run,
            )
        }
        Command::Search {
            dir,
            terms,
            terms_file,
            output,
            dry_run,
        } => {
            let mut op = SearchOrganizeOp::new(resolve_dir(&dir), terms);
            if let Some(path) = terms_file {
                op = op.with_terms_file(path);
            }
            if let Some(output) = output {
                op = op.with_output(resolve_dir(&output));
            }
            run_operation(Operation::SearchOrganize(op), &filters, dry_run.dry_run)
        }
        Command::Dupes {
            dir,
            mode,
            recursion,
            delete,
            json,
            dry_run,
        } => {
            let op = DeleteDuplicatesOp::new(
                resolve_dir(&dir),
                mode.unwrap_or(defaults.duplicate_mode),
                recursion.resolve(defaults.recursive),
            );
            run_dupes(op, &filters, delete, json, dry_run.dry_run)
        }
        Command::Rollback { dir, yes } => run_rollback(&resolve_dir(&dir), yes),
        Command::Actions => {
            OutputFormatter::action_table();
            Ok(())
        }
    }
}

/// Canonicalizes `dir` if possible so journal paths are absolute.
fn resolve_dir(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

fn run_operation(op: Operation, filters: &CompiledFilters, dry_run: bool) -> Result<()> {
    let plan = op.prepare(filters)?;
    let root = plan.root.clone();

    OutputFormatter::header(&format!("{}: {}", op.kind().label(), root.display()));
    if dry_run {
        OutputFormatter::dry_run_notice("No files will be changed.");
    }
    if plan.is_empty() {
        OutputFormatter::info("Nothing to do.");
    }

    let progress = (!dry_run && !plan.is_empty())
        .then(|| OutputFormatter::create_progress_bar(plan.changes.len() as u64));
    let report = op.execute(&plan, dry_run, |outcome| {
        let line = OutputFormatter::outcome_line(outcome, &root);
        match &progress {
            Some(pb) => {
                pb.println(line);
                pb.inc(1);
            }
            None => OutputFormatter::plain(&line),
        }
    })?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    OutputFormatter::apply_report(&report);
    if !dry_run && report.succeeded > 0 && op.kind().is_reversible() {
        OutputFormatter::info(&format!(
            "Run 'refile rollback {}' to revert these changes.",
            root.display()
        ));
    }
    Ok(())
}

fn run_dupes(
    op: DeleteDuplicatesOp,
    filters: &CompiledFilters,
    delete: bool,
    json: bool,
    dry_run: bool,
) -> Result<()> {
    op.validate()?;
    let groups = op.detector().detect(&op.dir, filters)?;
    debug!(groups = groups.len(), "duplicates detected");

    if json {
        OutputFormatter::plain(&serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    OutputFormatter::duplicate_groups(&groups, &op.dir);
    if !delete || groups.is_empty() {
        return Ok(());
    }

    let plan = op.plan_groups(&groups);
    let operation = Operation::DeleteDuplicates(op);
    let report = operation.execute(&plan, dry_run, |outcome| {
        OutputFormatter::plain(&OutputFormatter::outcome_line(outcome, &plan.root));
    })?;
    OutputFormatter::apply_report(&report);
    if !dry_run && report.succeeded > 0 {
        OutputFormatter::warning("Deleted duplicates cannot be restored by rollback.");
    }
    Ok(())
}

fn run_rollback(dir: &Path, yes: bool) -> Result<()> {
    let outcome = rollback(dir, |journal| {
        yes || prompt_confirm(
            &format!("Revert every change recorded in {}?", journal.display()),
            Some(false),
        )
        .unwrap_or(false)
    })?;

    match outcome {
        RollbackOutcome::Cancelled => OutputFormatter::warning("Rollback cancelled."),
        RollbackOutcome::Completed(report) => {
            OutputFormatter::rollback_report(&report);
            if report.is_complete_success() {
                OutputFormatter::success("Rollback complete.");
            } else {
                OutputFormatter::warning("Rollback finished with failures.");
            }
        }
    }
    Ok(())
}

/// Asks a yes/no question on stdin.
pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let stdin = io::stdin();
    prompt_confirm_with(&mut stdin.lock(), &mut io::stdout(), prompt, default)
}

/// Asks a yes/no question, re-asking until the answer is understood.
///
/// An empty answer takes `default` when there is one. End of input counts as
/// the default, or as "no" without one.
pub fn prompt_confirm_with<R, W>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    default: Option<bool>,
) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    let mut answer = String::new();
    loop {
        answer.clear();
        match default {
            Some(true) => write!(output, "{} (Y/n): ", prompt)?,
            Some(false) | None => write!(output, "{} (y/N): ", prompt)?,
        }
        output.flush()?;

        if input.read_line(&mut answer)? == 0 {
            return Ok(default.unwrap_or(false));
        }
        match answer.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            _ => {}
        }
    }
}
