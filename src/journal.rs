//! The per-directory change journal.
//!
//! Every mutation attempted by an operation is appended to a CSV file that
//! lives in the directory the operation targeted. Rows are written and synced
//! one at a time, so a crash loses at most the row in flight. Rollback reads
//! the file back, replays it newest-first and then archives it under a
//! timestamped name so the same changes can never be reverted twice.
//!
//! A live [`Journal`] handle holds an exclusive advisory lock on a sibling lock
//! file for as long as it exists, so two invocations cannot interleave rows in
//! the same directory.

use crate::error::{JournalError, JournalResult};
use crate::kind::OperationKind;
use chrono::NaiveDateTime;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the active journal inside a directory.
pub const JOURNAL_FILE_NAME: &str = "file_name_change_log.csv";

/// File name of the advisory lock guarding the journal.
pub const LOCK_FILE_NAME: &str = ".file_name_change_log.lock";

/// Prefix of the details of a move that created directories.
const CREATED_DIR_PREFIX: &str = "created_dir=";

/// Marker between the journal name and the archival timestamp.
const ARCHIVE_MARKER: &str = ".rolled_back_";

/// Column names, in order.
pub const HEADER: [&str; 6] = [
    "timestamp",
    "old_path",
    "new_path",
    "status",
    "action_type",
    "details",
];

const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ARCHIVE_STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Outcome recorded for a mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure(String),
}

impl Status {
    fn to_field(&self) -> String {
        match self {
            Status::Success => "success".to_string(),
            Status::Failure(reason) => format!("failure - {}", reason),
        }
    }

    fn parse(field: &str) -> Option<Self> {
        if field == "success" {
            return Some(Status::Success);
        }
        let rest = field.strip_prefix("failure")?;
        let reason = rest.trim_start_matches([' ', '-']).to_string();
        Some(Status::Failure(reason))
    }
}

/// One row of the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Local time at which the attempt was recorded.
    pub timestamp: NaiveDateTime,
    /// Where the file was before the mutation.
    pub original_path: PathBuf,
    /// Where the file ended up. `None` for deletions.
    pub new_path: Option<PathBuf>,
    pub status: Status,
    pub kind: OperationKind,
    /// Free-form context, e.g. the duplicate group a deleted file belonged to.
    pub details: String,
}

impl JournalEntry {
    /// Creates a successful entry stamped with the current time.
    pub fn success(kind: OperationKind, original: &Path, new: Option<&Path>) -> Self {
        Self::new(kind, original, new, Status::Success)
    }

    /// Creates a failed entry stamped with the current time.
    pub fn failure(
        kind: OperationKind,
        original: &Path,
        new: Option<&Path>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(kind, original, new, Status::Failure(reason.into()))
    }

    fn new(kind: OperationKind, original: &Path, new: Option<&Path>, status: Status) -> Self {
        Self {
            timestamp: chrono::Local::now().naive_local(),
            original_path: original.to_path_buf(),
            new_path: new.map(Path::to_path_buf),
            status,
            kind,
            details: String::new(),
        }
    }

    /// Attaches details to this entry.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Records the topmost directory the forward move had to create.
    pub fn with_created_dir(self, dir: &Path) -> Self {
        let details = format!("{}{}", CREATED_DIR_PREFIX, dir.display());
        self.with_details(details)
    }

    /// The topmost directory created by the forward move, if one was recorded.
    pub fn created_dir(&self) -> Option<PathBuf> {
        self.details
            .strip_prefix(CREATED_DIR_PREFIX)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    fn to_row(&self) -> JournalRow {
        JournalRow {
            timestamp: self.timestamp.format(TIMESTAMP_WRITE_FORMAT).to_string(),
            old_path: self.original_path.to_string_lossy().into_owned(),
            new_path: self
                .new_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            status: self.status.to_field(),
            action_type: self.kind.as_str().to_string(),
            details: self.details.clone(),
        }
    }

    fn from_row(row: JournalRow) -> Result<Self, String> {
        let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_READ_FORMAT)
            .map_err(|e| format!("bad timestamp '{}': {}", row.timestamp, e))?;
        let status =
            Status::parse(&row.status).ok_or_else(|| format!("bad status '{}'", row.status))?;
        let kind = row
            .action_type
            .parse::<OperationKind>()
            .map_err(|e| e.to_string())?;
        if row.old_path.is_empty() {
            return Err("empty old_path".to_string());
        }

        Ok(Self {
            timestamp,
            original_path: PathBuf::from(row.old_path),
            new_path: (!row.new_path.is_empty()).then(|| PathBuf::from(row.new_path)),
            status,
            kind,
            details: row.details,
        })
    }
}

/// On-disk shape of a row. Field order matches [`HEADER`].
#[derive(Debug, Serialize, Deserialize)]
struct JournalRow {
    timestamp: String,
    old_path: String,
    new_path: String,
    status: String,
    action_type: String,
    details: String,
}

/// Handle for appending to one directory's journal.
///
/// Obtain a live handle with [`Journal::open`] or a handle that ignores every
/// append with [`Journal::simulated`].
pub struct Journal {
    dir: PathBuf,
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    lock: Option<DirLock>,
    appended: usize,
}

impl Journal {
    /// Opens the journal of `dir` for appending and takes its lock.
    ///
    /// The journal file itself is not created until the first append.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Locked`] if another live handle holds the lock.
    pub fn open(dir: &Path) -> JournalResult<Self> {
        let lock = DirLock::acquire(dir)?;
        debug!(dir = %dir.display(), "journal opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            path: Self::active_path(dir),
            writer: None,
            lock: Some(lock),
            appended: 0,
        })
    }

    /// Returns a handle whose appends do nothing. Used for dry runs.
    pub fn simulated(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            path: Self::active_path(dir),
            writer: None,
            lock: None,
            appended: 0,
        }
    }

    /// Returns true if appends are discarded.
    pub fn is_simulated(&self) -> bool {
        self.lock.is_none()
    }

    /// The directory this journal belongs to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of rows written through this handle.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Writes one entry and syncs it to disk before returning.
    pub fn append(&mut self, entry: &JournalEntry) -> JournalResult<()> {
        if self.is_simulated() {
            return Ok(());
        }

        let path = self.path.clone();
        let io_err = |source: io::Error| JournalError::Io {
            path: path.clone(),
            source,
        };
        let csv_err = |source: csv::Error| JournalError::Csv {
            path: path.clone(),
            source,
        };

        if self.writer.is_none() {
            let is_new = trim_torn_tail(&self.path).map_err(io_err)? == 0;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(io_err)?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            if is_new {
                writer.write_record(HEADER).map_err(csv_err)?;
            }
            self.writer = Some(writer);
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.serialize(entry.to_row()).map_err(csv_err)?;
            writer.flush().map_err(io_err)?;
            writer.get_ref().sync_data().map_err(io_err)?;
        }
        self.appended += 1;
        Ok(())
    }

    /// Path of the active journal in `dir`.
    pub fn active_path(dir: &Path) -> PathBuf {
        dir.join(JOURNAL_FILE_NAME)
    }

    /// Returns true if `dir` has an active journal.
    pub fn exists(dir: &Path) -> bool {
        Self::active_path(dir).is_file()
    }

    /// Returns true if `name` is the active journal, an archived journal or the lock file.
    ///
    /// Operations never plan changes to these files.
    pub fn is_journal_artifact(name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        name == JOURNAL_FILE_NAME
            || name == LOCK_FILE_NAME
            || name.starts_with(&format!("{}{}", JOURNAL_FILE_NAME, ARCHIVE_MARKER))
    }

    /// Reads every entry of the active journal in `dir`, oldest first.
    ///
    /// A final record with too few fields is treated as a write torn by a
    /// crash and dropped with a warning. Any other malformed record is an error.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Missing`] if `dir` has no active journal.
    pub fn load(dir: &Path) -> JournalResult<Vec<JournalEntry>> {
        let path = Self::active_path(dir);
        if !path.is_file() {
            return Err(JournalError::Missing {
                dir: dir.to_path_buf(),
            });
        }

        let csv_err = |source: csv::Error| JournalError::Csv {
            path: path.clone(),
            source,
        };
        let malformed = |record: u64, reason: String| JournalError::Malformed {
            path: path.clone(),
            record,
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(csv_err)?;

        let headers = reader.headers().map_err(csv_err)?.clone();
        let found: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}'))
            .collect();
        if found != HEADER {
            return Err(malformed(0, format!("unexpected header {:?}", found)));
        }

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        let total = records.len();

        let mut entries = Vec::with_capacity(total);
        for (index, record) in records.into_iter().enumerate() {
            let number = index as u64 + 1;
            if record.len() != HEADER.len() {
                if index + 1 == total && record.len() < HEADER.len() {
                    warn!(
                        journal = %path.display(),
                        record = number,
                        "dropping truncated trailing journal record"
                    );
                    continue;
                }
                return Err(malformed(
                    number,
                    format!("expected {} fields, found {}", HEADER.len(), record.len()),
                ));
            }
            let row: JournalRow = record
                .deserialize(Some(&headers))
                .map_err(|e| malformed(number, e.to_string()))?;
            let entry = JournalEntry::from_row(row).map_err(|reason| malformed(number, reason))?;
            entries.push(entry);
        }

        debug!(journal = %path.display(), entries = entries.len(), "journal loaded");
        Ok(entries)
    }

    /// Renames the active journal in `dir` to a unique archived name.
    ///
    /// On failure the active journal is left where it was.
    pub fn archive(dir: &Path) -> JournalResult<PathBuf> {
        let from = Self::active_path(dir);
        if !from.is_file() {
            return Err(JournalError::Missing {
                dir: dir.to_path_buf(),
            });
        }

        let stamp = chrono::Local::now().format(ARCHIVE_STAMP_FORMAT).to_string();
        let base = format!("{}{}{}", JOURNAL_FILE_NAME, ARCHIVE_MARKER, stamp);
        let mut to = dir.join(&base);
        let mut suffix = 1;
        while to.exists() {
            to = dir.join(format!("{}_{}", base, suffix));
            suffix += 1;
        }

        fs::rename(&from, &to).map_err(|source| JournalError::ArchiveFailed {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        debug!(from = %from.display(), to = %to.display(), "journal archived");
        Ok(to)
    }

    /// Lists archived journals in `dir`, oldest first.
    pub fn archives(dir: &Path) -> JournalResult<Vec<PathBuf>> {
        let prefix = format!("{}{}", JOURNAL_FILE_NAME, ARCHIVE_MARKER);
        let entries = fs::read_dir(dir).map_err(|source| JournalError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut archives: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
            })
            .collect();
        archives.sort();
        Ok(archives)
    }
}

/// Cuts a record left without its line terminator by an interrupted write,
/// so the next row starts on a line of its own. Returns the remaining length.
fn trim_torn_tail(path: &Path) -> io::Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(len);
    }

    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;
    let keep = content
        .iter()
        .rposition(|&byte| byte == b'\n')
        .map_or(0, |index| index + 1) as u64;
    warn!(
        journal = %path.display(),
        dropped_bytes = len - keep,
        "discarding torn journal record before appending"
    );
    file.set_len(keep)?;
    file.sync_data()?;
    Ok(keep)
}

/// Exclusive advisory lock on a directory's journal.
///
/// The lock file stays on disk after release. Unlinking it would let a waiter
/// lock the orphaned inode while a newcomer locks a fresh file.
struct DirLock {
    file: File,
}

impl DirLock {
    fn acquire(dir: &Path) -> JournalResult<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;

        FileExt::try_lock_exclusive(&file).map_err(|source| {
            if source.kind() == io::ErrorKind::WouldBlock {
                JournalError::Locked {
                    dir: dir.to_path_buf(),
                }
            } else {
                JournalError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(error = %e, "could not release journal lock");
        }
    }
}
