//! Retrying filesystem primitives.
//!
//! Media files are often briefly locked by indexers, antivirus scanners or a
//! media server reading them. Deletes and renames here retry a bounded number
//! of times with a fixed delay before giving up.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Blocking delay between retry attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] that blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retrying delete and replace operations.
#[derive(Clone)]
pub struct SafeFileOps {
    sleeper: Arc<dyn Sleeper>,
}

impl Default for SafeFileOps {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SafeFileOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeFileOps").finish_non_exhaustive()
    }
}

impl SafeFileOps {
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Delete `path`, then optionally move `replacement` into its place.
    ///
    /// Makes up to `retries + 1` attempts, sleeping `delay` between them. A
    /// failed delete and a failed rename are both retried; once the delete
    /// has succeeded later attempts only retry the rename.
    ///
    /// Without `replacement`, returns true when `path` is gone after all
    /// attempts; a `path` that never existed counts as deleted. With one,
    /// returns true only when `replacement` has moved into `path`.
    pub fn remove(
        &self,
        path: &Path,
        retries: u32,
        delay: Duration,
        replacement: Option<&Path>,
    ) -> bool {
        let mut removed = false;

        for attempt in 0..=retries {
            if attempt > 0 {
                self.sleeper.sleep(delay);
            }

            if !removed {
                match delete(path) {
                    Ok(()) => {
                        tracing::debug!("Removed {:?}", path);
                        removed = true;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Unable to remove {:?} (attempt {}/{}): {}",
                            path,
                            attempt + 1,
                            retries + 1,
                            e
                        );
                        continue;
                    }
                }
            }

            match replacement {
                None => break,
                Some(rep) => match fs::rename(rep, path) {
                    Ok(()) => {
                        tracing::debug!("Moved {:?} into place at {:?}", rep, path);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Unable to move {:?} to {:?} (attempt {}/{}): {}",
                            rep,
                            path,
                            attempt + 1,
                            retries + 1,
                            e
                        );
                    }
                },
            }
        }

        match replacement {
            Some(rep) => path.exists() && !rep.exists(),
            None => !path.exists(),
        }
    }

    /// Move `replacement` over `path` with the retry behaviour of [`remove`].
    ///
    /// [`remove`]: SafeFileOps::remove
    pub fn replace(&self, path: &Path, replacement: &Path, retries: u32, delay: Duration) -> bool {
        self.remove(path, retries, delay, Some(replacement))
    }
}

/// Remove a file, clearing a read-only flag first. Absent files are fine.
fn delete(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            let mut perms = meta.permissions();
            if perms.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                perms.set_readonly(false);
                let _ = fs::set_permissions(path, perms);
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }

    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Make a finished output readable, writable and executable by everyone.
///
/// Media servers commonly run as a different user than the converter.
pub fn make_world_accessible(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o777))
    }

    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(path)?.permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(path, perms)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records requested delays instead of sleeping.
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) calls: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }

    fn ops() -> (SafeFileOps, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        (SafeFileOps::with_sleeper(sleeper.clone()), sleeper)
    }

    #[test]
    fn remove_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("movie.mkv");
        fs::write(&path, b"data").unwrap();

        let (ops, sleeper) = ops();
        assert!(ops.remove(&path, 2, Duration::from_secs(10), None));
        assert!(!path.exists());
        assert!(sleeper.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn remove_absent_file_succeeds() {
        let dir = tempdir().unwrap();
        let (ops, _) = ops();
        assert!(ops.remove(&dir.path().join("gone.mkv"), 0, Duration::ZERO, None));
    }

    #[test]
    fn remove_read_only_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.mkv");
        fs::write(&path, b"data").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let (ops, _) = ops();
        assert!(ops.remove(&path, 0, Duration::ZERO, None));
        assert!(!path.exists());
    }

    #[test]
    fn failing_remove_retries_then_reports_false() {
        // remove_file refuses directories, so every attempt fails.
        let dir = tempdir().unwrap();
        let target = dir.path().join("stuck");
        fs::create_dir(&target).unwrap();

        let (ops, sleeper) = ops();
        assert!(!ops.remove(&target, 2, Duration::from_secs(10), None));
        assert!(target.exists());
        assert_eq!(
            *sleeper.calls.lock().unwrap(),
            vec![Duration::from_secs(10), Duration::from_secs(10)]
        );
    }

    #[test]
    fn replace_moves_replacement_into_place() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("movie.mp4");
        let temp = dir.path().join("movie.mp4.QTFS");
        fs::write(&target, b"old").unwrap();
        fs::write(&temp, b"new").unwrap();

        let (ops, _) = ops();
        assert!(ops.replace(&target, &temp, 2, Duration::ZERO));
        assert!(!temp.exists());
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn replace_into_absent_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("movie.mp4");
        let temp = dir.path().join("movie.mp4.QTFS");
        fs::write(&temp, b"new").unwrap();

        let (ops, _) = ops();
        assert!(ops.replace(&target, &temp, 0, Duration::ZERO));
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn replace_with_missing_replacement_fails() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("movie.mp4");
        fs::write(&target, b"old").unwrap();

        let (ops, sleeper) = ops();
        let missing = dir.path().join("missing.QTFS");
        assert!(!ops.replace(&target, &missing, 1, Duration::from_secs(3)));
        assert!(!target.exists());
        assert_eq!(sleeper.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn replace_blocked_target_keeps_replacement() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("movie.mp4");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"").unwrap();
        let temp = dir.path().join("movie.mp4.QTFS");
        fs::write(&temp, b"new").unwrap();

        let (ops, _) = ops();
        assert!(!ops.replace(&target, &temp, 2, Duration::ZERO));
        assert_eq!(fs::read(&temp).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn world_accessible_sets_mode() {
        use std::os::unix::fs::PermissionsExt;
        let file = tempfile::NamedTempFile::new().unwrap();
        make_world_accessible(file.path()).unwrap();
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
