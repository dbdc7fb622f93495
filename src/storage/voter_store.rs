use crate::common::{VoteError, Result};
use crate::storage::migrations::run_migrations;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterRecord {
    pub voter_id: String,
    /// Relative to the store's photo root.
    pub reference_photo_path: String,
    pub has_voted: bool,
}

fn row_to_voter(row: &Row) -> rusqlite::Result<VoterRecord> {
    let has_voted: Option<i64> = row.get("has_voted")?;
    Ok(VoterRecord {
        voter_id: row.get("voter_id")?,
        reference_photo_path: row.get("photo_path")?,
        has_voted: has_voted.unwrap_or(0) != 0,
    })
}

/// Handle to the voter database and the photo directory behind it.
///
/// Cloning is cheap. Every operation opens its own connection, so handles can
/// be shared across request threads without a process-wide connection.
#[derive(Clone)]
pub struct VoterStore {
    db_path: Arc<PathBuf>,
    photo_root: Arc<PathBuf>,
}

impl VoterStore {
    /// Create the database if needed and bring its schema up to date.
    pub fn open(db_path: PathBuf, photo_root: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(&db_path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Voter database journal mode: {}", mode);
        run_migrations(&mut conn)?;

        tracing::info!("Voter store opened at {}", db_path.display());

        Ok(Self {
            db_path: Arc::new(db_path),
            photo_root: Arc::new(photo_root),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn photo_root(&self) -> &Path {
        &self.photo_root
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            self.db_path.as_path(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    pub fn get(&self, voter_id: &str) -> Result<Option<VoterRecord>> {
        let conn = self.connect()?;
        let voter = conn
            .query_row(
                "SELECT voter_id, photo_path, has_voted FROM voters WHERE voter_id = ?1",
                params![voter_id],
                row_to_voter,
            )
            .optional()?;
        Ok(voter)
    }

    /// Flip `has_voted` to true. Returns true only for the call that performed
    /// the transition; the `WHERE` clause makes the check and the write one
    /// atomic statement.
    pub fn try_set_voted(&self, voter_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE voters SET has_voted = 1
             WHERE voter_id = ?1 AND COALESCE(has_voted, 0) = 0",
            params![voter_id],
        )?;
        Ok(changed == 1)
    }

    /// Read the voter's reference photo. A missing file is reported as
    /// `ReferencePhotoMissing` rather than a generic I/O error.
    pub fn load_reference_photo(&self, voter: &VoterRecord) -> Result<Vec<u8>> {
        let path = self.photo_root.join(&voter.reference_photo_path);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VoteError::ReferencePhotoMissing(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Enroll a voter. Returns false when the id already exists; the existing
    /// row is left untouched.
    pub fn register(&self, voter_id: &str, photo_path: &str) -> Result<bool> {
        if voter_id.is_empty() || voter_id.trim() != voter_id {
            return Err(VoteError::Storage(format!(
                "Invalid voter id {:?}: must be non-empty without surrounding whitespace", voter_id
            )));
        }

        let full_path = self.photo_root.join(photo_path);
        if !full_path.is_file() {
            return Err(VoteError::ReferencePhotoMissing(full_path));
        }

        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO voters (voter_id, photo_path, has_voted) VALUES (?1, ?2, 0)",
            params![voter_id, photo_path],
        )?;
        Ok(inserted == 1)
    }

    pub fn list(&self) -> Result<Vec<VoterRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT voter_id, photo_path, has_voted FROM voters ORDER BY voter_id ASC",
        )?;
        let voters = stmt
            .query_map([], row_to_voter)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(voters)
    }
}
