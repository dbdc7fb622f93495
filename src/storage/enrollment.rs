use crate::common::{VoteError, Result};
use crate::storage::VoterStore;
use std::fs;
use std::path::{Component, Path};

const PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrollmentSummary {
    pub added: usize,
    pub existing: usize,
}

impl VoterStore {
    /// Register one voter per photo in `photo_dir`, using the file stem as the
    /// voter id. `photo_dir` is relative to the photo root. Already enrolled
    /// ids are counted but left as they are.
    pub fn enroll_directory(&self, photo_dir: &Path) -> Result<EnrollmentSummary> {
        let relative = self.relative_to_root(photo_dir)?;
        let full_dir = self.photo_root().join(&relative);
        if !full_dir.is_dir() {
            return Err(VoteError::Storage(format!(
                "Photo folder '{}' not found. Please create it and add voter images.",
                full_dir.display()
            )));
        }

        let mut photos: Vec<_> = fs::read_dir(&full_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_photo(path))
            .collect();
        photos.sort();

        let mut summary = EnrollmentSummary::default();
        for photo in photos {
            let (Some(stem), Some(file_name)) = (
                photo.file_stem().and_then(|s| s.to_str()),
                photo.file_name().and_then(|s| s.to_str()),
            ) else {
                tracing::warn!("Skipping photo with non UTF-8 name: {}", photo.display());
                continue;
            };

            let stored_path = join_stored_path(&relative, file_name);
            if self.register(stem, &stored_path)? {
                tracing::info!("Added voter: {} with photo {}", stem, stored_path);
                summary.added += 1;
            } else {
                summary.existing += 1;
            }
        }

        Ok(summary)
    }

    /// `path` expressed relative to the photo root. Absolute paths must lie
    /// under the root; relative ones may not climb out of it.
    pub fn relative_to_root(&self, path: &Path) -> Result<String> {
        let relative = if path.is_absolute() {
            path.strip_prefix(self.photo_root()).map_err(|_| {
                VoteError::Storage(format!(
                    "{} is outside the photo root {}",
                    path.display(),
                    self.photo_root().display()
                ))
            })?
        } else {
            path
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part),
                    None => return Err(VoteError::Storage(format!(
                        "Path {} is not valid UTF-8", path.display()
                    ))),
                },
                Component::CurDir => {}
                _ => return Err(VoteError::Storage(format!(
                    "{} must stay inside the photo root", path.display()
                ))),
            }
        }

        Ok(parts.join("/"))
    }
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn join_stored_path(dir: &str, file_name: &str) -> String {
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn store(root: &Path) -> VoterStore {
        VoterStore::open(root.join("voters.db"), root.to_path_buf()).unwrap()
    }

    #[test]
    fn enrolls_every_photo_once() {
        let dir = tempfile::tempdir().unwrap();
        let photos = dir.path().join("stored_photos");
        fs::create_dir_all(&photos).unwrap();
        for name in ["v0001.jpg", "v0002.PNG", "notes.txt"] {
            fs::write(photos.join(name), b"x").unwrap();
        }
        let store = store(dir.path());

        let first = store.enroll_directory(Path::new("stored_photos")).unwrap();
        assert_eq!(first, EnrollmentSummary { added: 2, existing: 0 });

        let again = store.enroll_directory(Path::new("stored_photos")).unwrap();
        assert_eq!(again, EnrollmentSummary { added: 0, existing: 2 });

        let voter = store.get("v0002").unwrap().unwrap();
        assert_eq!(voter.reference_photo_path, "stored_photos/v0002.PNG");
        assert!(store.get("notes").unwrap().is_none());
    }

    #[test]
    fn missing_folder_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).enroll_directory(Path::new("nope")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn paths_are_confined_to_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert_eq!(store.relative_to_root(Path::new("./a/b.jpg")).unwrap(), "a/b.jpg");
        assert_eq!(store.relative_to_root(&dir.path().join("a/b.jpg")).unwrap(), "a/b.jpg");
        assert!(store.relative_to_root(Path::new("../b.jpg")).is_err());
        assert!(store.relative_to_root(&PathBuf::from("/elsewhere/b.jpg")).is_err());
    }
}
