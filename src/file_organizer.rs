//! Filesystem primitives shared by operations and rollback.
//!
//! Everything here refuses to overwrite: a move onto an occupied path fails
//! with [`MoveError::DestinationExists`] and leaves both files untouched.

use crate::error::MoveError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Moves and deletes files on behalf of operations.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Moves `source` to `destination`, creating missing parent directories.
    ///
    /// Returns the topmost directory this call had to create, if any, so the
    /// caller can record it and remove exactly that chain later. Falls back to
    /// copy-and-remove when the two paths are on different filesystems.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use refile::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// match FileOrganizer::move_file(Path::new("/data/a-b.txt"), Path::new("/data/a/b.txt")) {
    ///     Ok(Some(created)) => println!("moved, created {}", created.display()),
    ///     Ok(None) => println!("moved"),
    ///     Err(e) => eprintln!("move failed: {}", e),
    /// }
    /// ```
    pub fn move_file(source: &Path, destination: &Path) -> Result<Option<PathBuf>, MoveError> {
        if fs::symlink_metadata(source).is_err() {
            return Err(MoveError::SourceMissing(source.to_path_buf()));
        }
        if fs::symlink_metadata(destination).is_ok() {
            return Err(MoveError::DestinationExists(destination.to_path_buf()));
        }

        let created = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::create_parents(parent)?,
            _ => None,
        };

        if let Err(e) = Self::rename(source, destination) {
            if let Some(stop) = created.as_deref().and_then(Path::parent) {
                Self::prune_empty_parents(destination, stop);
            }
            return Err(e);
        }

        debug!(from = %source.display(), to = %destination.display(), "moved");
        Ok(created)
    }

    fn rename(source: &Path, destination: &Path) -> Result<(), MoveError> {
        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(
                    from = %source.display(),
                    to = %destination.display(),
                    "rename crosses devices, copying instead"
                );
                fs::copy(source, destination)?;
                fs::remove_file(source)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates `dir` and its missing ancestors, returning the topmost one created.
    fn create_parents(dir: &Path) -> Result<Option<PathBuf>, MoveError> {
        if dir.is_dir() {
            return Ok(None);
        }
        let topmost = dir
            .ancestors()
            .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
            .last()
            .map(Path::to_path_buf);
        fs::create_dir_all(dir).map_err(|source| MoveError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(topmost)
    }

    /// Deletes a single file.
    pub fn remove_file(path: &Path) -> Result<(), MoveError> {
        if fs::symlink_metadata(path).is_err() {
            return Err(MoveError::SourceMissing(path.to_path_buf()));
        }
        fs::remove_file(path)?;
        debug!(path = %path.display(), "deleted");
        Ok(())
    }

    /// Removes empty ancestors of `path`, walking upward until `stop`.
    ///
    /// `stop` itself is never removed and nothing outside it is touched.
    /// Returns the number of directories removed.
    pub fn prune_empty_parents(path: &Path, stop: &Path) -> usize {
        let mut removed = 0;
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == stop || !dir.starts_with(stop) {
                break;
            }
            if !Self::is_empty_dir(dir) {
                break;
            }
            if let Err(e) = fs::remove_dir(dir) {
                warn!(dir = %dir.display(), error = %e, "could not remove empty directory");
                break;
            }
            removed += 1;
            current = dir.parent();
        }
        removed
    }

    fn is_empty_dir(dir: &Path) -> bool {
        fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }
}
