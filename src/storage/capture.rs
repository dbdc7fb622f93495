use crate::common::Result;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};

const CAPTURE_SUFFIX: &str = "_capture.jpg";
const MAX_PREFIX_LEN: usize = 32;

/// Directory holding probe photos for the duration of one verification.
#[derive(Debug, Clone)]
pub struct CaptureArea {
    dir: PathBuf,
}

/// A probe photo on disk. The file is removed when the capture is released
/// or dropped, whichever comes first.
pub struct Capture {
    path: TempPath,
}

impl Capture {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove capture {}: {}", shown, e);
            }
        }
    }
}

impl CaptureArea {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `photo` to a fresh file named after `voter_id`, run `f` on it,
    /// and delete the file before returning. Nothing is run if the write fails.
    pub fn with_capture<F, R>(&self, voter_id: &str, photo: &[u8], f: F) -> Result<R>
    where
        F: FnOnce(&Path) -> R,
    {
        let capture = self.acquire(voter_id, photo)?;
        let result = f(capture.path());
        capture.release();
        Ok(result)
    }

    pub fn acquire(&self, voter_id: &str, photo: &[u8]) -> Result<Capture> {
        let prefix = format!("{}_", capture_prefix(voter_id));
        let mut file = Builder::new()
            .prefix(&prefix)
            .suffix(CAPTURE_SUFFIX)
            .tempfile_in(&self.dir)?;

        // A failed write drops `file`, which unlinks the partial capture.
        file.write_all(photo)?;
        file.as_file().sync_all()?;

        let path = file.into_temp_path();
        tracing::debug!("Stored capture for {} at {}", voter_id, path.display());
        Ok(Capture { path })
    }

    /// Remove captures left behind by a process that died mid-request.
    /// Only safe before the service starts accepting requests.
    pub fn purge_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_capture = name.to_str().map_or(false, |n| n.ends_with(CAPTURE_SUFFIX));
            if is_capture && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Purged {} stale capture(s) from {}", removed, self.dir.display());
        }
        Ok(removed)
    }
}

/// File-name-safe form of a voter id. Ids are free text, so anything outside
/// `[A-Za-z0-9_-]` is replaced.
fn capture_prefix(voter_id: &str) -> String {
    let cleaned: String = voter_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_PREFIX_LEN)
        .collect();

    if cleaned.is_empty() {
        "voter".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn capture_exists_during_callback_and_is_removed_after() {
        let dir = tempfile::tempdir().unwrap();
        let area = CaptureArea::new(dir.path().join("temp")).unwrap();

        let seen = area
            .with_capture("v0001", b"probe", |path| {
                assert!(path.starts_with(area.dir()));
                let name = path.file_name().unwrap().to_str().unwrap().to_string();
                assert!(name.starts_with("v0001_"));
                assert!(name.ends_with(CAPTURE_SUFFIX));
                fs::read(path).unwrap()
            })
            .unwrap();

        assert_eq!(seen, b"probe");
        assert_eq!(entries(area.dir()), 0);
    }

    #[test]
    fn concurrent_captures_for_same_voter_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let area = CaptureArea::new(dir.path().to_path_buf()).unwrap();

        let first = area.acquire("v0001", b"a").unwrap();
        let second = area.acquire("v0001", b"b").unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(entries(area.dir()), 2);

        first.release();
        drop(second);
        assert_eq!(entries(area.dir()), 0);
    }

    #[test]
    fn capture_is_removed_when_callback_panics() {
        let dir = tempfile::tempdir().unwrap();
        let area = CaptureArea::new(dir.path().to_path_buf()).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            area.with_capture("v0001", b"probe", |_| -> () { panic!("comparator blew up") })
        }));

        assert!(outcome.is_err());
        assert_eq!(entries(area.dir()), 0);
    }

    #[test]
    fn write_failure_skips_callback() {
        let dir = tempfile::tempdir().unwrap();
        let area = CaptureArea::new(dir.path().join("temp")).unwrap();
        fs::remove_dir(area.dir()).unwrap();

        let mut called = false;
        let result = area.with_capture("v0001", b"probe", |_| called = true);

        assert!(result.is_err());
        assert!(!called);
    }

    #[test]
    fn hostile_voter_ids_stay_inside_the_area() {
        assert_eq!(capture_prefix("../../etc/passwd"), "______etc_passwd");
        assert_eq!(capture_prefix(""), "voter");
        assert_eq!(capture_prefix(&"x".repeat(100)).len(), MAX_PREFIX_LEN);
    }

    #[test]
    fn purge_only_touches_captures() {
        let dir = tempfile::tempdir().unwrap();
        let area = CaptureArea::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("v0001_abc123_capture.jpg"), b"stale").unwrap();
        fs::write(dir.path().join("keep.txt"), b"keep").unwrap();

        assert_eq!(area.purge_stale().unwrap(), 1);
        assert!(dir.path().join("keep.txt").exists());
    }
}
