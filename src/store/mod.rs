// Store module - one JSON file per challenge
//
// Every challenge id gets its own stats file in the data directory:
//   <data_dir>/stats_<challenge_id>.json
//
// The file holds a single JSON object mapping userId -> stats payload. It is
// created on the first write for its challenge and rewritten whole on every
// later write. A missing file reads as an empty document.
//
// The store never merges: callers load, modify and save. `with_write_lock`
// lets them hold the challenge's lock around that sequence.

mod error;
mod locks;

pub use error::StoreError;
pub use locks::ChallengeLocks;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::Clock;

/// Longest challenge id accepted (ids become part of a file name)
const MAX_CHALLENGE_LEN: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Challenge Id
// ─────────────────────────────────────────────────────────────────────────────

/// Key of one stats file, usually an ISO date like "2024-01-01"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChallengeId(String);

impl ChallengeId {
    /// Validate a raw id. Only `[A-Za-z0-9_-]` is allowed so the id can never
    /// escape the data directory.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_CHALLENGE_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidChallenge(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this challenge's stats file
    pub fn file_name(&self) -> String {
        format!("stats_{}.json", self.0)
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats Document
// ─────────────────────────────────────────────────────────────────────────────

/// All stats for one challenge: userId -> opaque payload, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsDocument(Map<String, Value>);

impl StatsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&Value> {
        self.0.get(user_id)
    }

    /// Replace a user's entry wholesale (no deep merge)
    pub fn insert(&mut self, user_id: impl Into<String>, stats: Value) -> Option<Value> {
        self.0.insert(user_id.into(), stats)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Durability options (both leave the load/save contract unchanged)
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Write to a temp file and rename it over the target
    pub atomic_writes: bool,
    /// Serialize read-modify-write sequences per challenge within this process
    pub serialize_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            atomic_writes: true,
            serialize_writes: true,
        }
    }
}

/// File-backed stats store, sharded by challenge id
pub struct StatsStore {
    data_dir: PathBuf,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
    locks: ChallengeLocks,
}

impl StatsStore {
    /// Create a store rooted at `data_dir`. The directory is created lazily
    /// on first save.
    pub fn new(data_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>, options: StoreOptions) -> Self {
        Self {
            data_dir: data_dir.into(),
            clock,
            options,
            locks: ChallengeLocks::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolve a possibly-absent id, substituting today's date for empty input
    pub fn resolve(&self, challenge: Option<&str>) -> Result<ChallengeId, StoreError> {
        match challenge.filter(|c| !c.is_empty()) {
            Some(raw) => ChallengeId::parse(raw),
            None => ChallengeId::parse(&self.clock.today_id()),
        }
    }

    /// Path of the stats file for a possibly-absent id
    pub fn resolve_path(&self, challenge: Option<&str>) -> Result<PathBuf, StoreError> {
        Ok(self.path_for(&self.resolve(challenge)?))
    }

    pub fn path_for(&self, challenge: &ChallengeId) -> PathBuf {
        self.data_dir.join(challenge.file_name())
    }

    /// Load the document for a possibly-absent id
    pub fn load(&self, challenge: Option<&str>) -> Result<StatsDocument, StoreError> {
        self.load_challenge(&self.resolve(challenge)?)
    }

    /// Save the document for a possibly-absent id
    pub fn save(
        &self,
        document: &StatsDocument,
        challenge: Option<&str>,
    ) -> Result<(), StoreError> {
        self.save_challenge(document, &self.resolve(challenge)?)
    }

    /// Read and parse a challenge's stats file. A missing file is an empty
    /// document; a file that is not a JSON object is an error.
    pub fn load_challenge(&self, challenge: &ChallengeId) -> Result<StatsDocument, StoreError> {
        let path = self.path_for(challenge);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!(challenge = %challenge, "No stats file yet");
                return Ok(StatsDocument::new());
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        serde_json::from_str(&contents).map_err(|source| StoreError::Malformed { path, source })
    }

    /// Overwrite a challenge's stats file with `document`
    pub fn save_challenge(
        &self,
        document: &StatsDocument,
        challenge: &ChallengeId,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Write {
            path: self.data_dir.clone(),
            source,
        })?;

        // to_string_pretty: 2-space indent, non-ASCII written as-is
        let json = serde_json::to_string_pretty(document).map_err(StoreError::Serialize)?;
        let path = self.path_for(challenge);

        let written = if self.options.atomic_writes {
            write_atomic(&path, json.as_bytes())
        } else {
            fs::write(&path, json).map_err(|source| StoreError::Write { path, source })
        };
        written?;

        tracing::trace!(challenge = %challenge, users = document.len(), "Stats file written");
        Ok(())
    }

    /// Run a read-modify-write sequence for `challenge`. With
    /// `serialize_writes` enabled, concurrent callers for the same challenge
    /// run one at a time; otherwise `f` runs unguarded.
    pub fn with_write_lock<T>(&self, challenge: &ChallengeId, f: impl FnOnce() -> T) -> T {
        if self.options.serialize_writes {
            self.locks.with_lock(challenge, f)
        } else {
            f()
        }
    }
}

/// Write `bytes` to a uniquely named sibling temp file, fsync it, then rename
/// it over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Each writer gets its own temp file, so concurrent saves never share one.
    // The temp file is removed on drop if anything below fails.
    let mut tmp = tempfile::Builder::new()
        .prefix(".stats-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
