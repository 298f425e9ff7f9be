//! Per-ID file locking for cache mutations.
//!
//! Inserts and age-based evictions touching the same ID are serialised
//! through an exclusive advisory lock, while different IDs proceed in
//! parallel. On Unix systems this uses `flock(2)`; elsewhere locking is a
//! no-op.
//!
//! Evicting an entry also deletes its lock file. A waiter that was queued on
//! the deleted file finds it unlinked once it gets the lock and starts over
//! on a fresh file, so two holders never coexist.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use crate::artifact::ArtifactId;

/// Hidden directory under the cache root holding one lock file per ID.
pub(crate) const LOCKS_SUBDIR: &str = ".locks";

/// Exclusive hold on one cache entry; released when dropped.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
    path: Utf8PathBuf,
}

impl CacheLock {
    /// Acquires the exclusive lock guarding `id` within `cache_dir`.
    ///
    /// Blocks until any other holder, in this or another process, releases
    /// the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or the lock cannot
    /// be acquired.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use lightcurve_acquire::ArtifactId;
    /// use lightcurve_acquire::cache::CacheLock;
    ///
    /// let id = ArtifactId::new(757_450).expect("non-zero id");
    /// let _lock = CacheLock::acquire_exclusive(Utf8Path::new("/tmp/lc-cache"), id)?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    #[cfg(unix)]
    pub fn acquire_exclusive(cache_dir: &Utf8Path, id: ArtifactId) -> io::Result<Self> {
        let path = lock_path(cache_dir, id);
        loop {
            let file = open_lock_file(&path)?;

            // SAFETY: `file` owns the descriptor for the whole call and is
            // moved into the guard only afterwards.
            if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) } != 0 {
                return Err(io::Error::last_os_error());
            }

            if still_linked(&file, &path)? {
                return Ok(Self { _file: file, path });
            }
        }
    }

    /// No-op lock acquisition on non-Unix platforms.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created.
    #[cfg(not(unix))]
    pub fn acquire_exclusive(cache_dir: &Utf8Path, id: ArtifactId) -> io::Result<Self> {
        let path = lock_path(cache_dir, id);
        let file = open_lock_file(&path)?;
        Ok(Self { _file: file, path })
    }

    /// Deletes the lock file while still holding it, then releases the lock.
    ///
    /// Used once the entry it guards is gone, so `.locks/` only holds files
    /// for live entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file exists but cannot be removed.
    pub fn retire(self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

fn lock_path(cache_dir: &Utf8Path, id: ArtifactId) -> Utf8PathBuf {
    cache_dir.join(LOCKS_SUBDIR).join(format!("{id}.lock"))
}

fn open_lock_file(path: &Utf8Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

/// Whether `path` still names the file behind `file`.
#[cfg(unix)]
fn still_linked(file: &File, path: &Utf8Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
