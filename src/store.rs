//! On-disk session store
//!
//! One JSON document per session plus one encryption-key file, partitioned
//! first by lifecycle bucket (active vs completed) and then by the session's
//! creation date at day granularity. Two flat index files give O(1) listing
//! without opening every document.
//!
//! Document and key writes go through a temporary file followed by an atomic
//! rename, so a reader never observes a torn file and a crash mid-write
//! leaves either the old content or nothing. Index updates are
//! read-modify-write over the whole file, serialized behind a store-level
//! mutex; cross-process writers are out of scope.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::link::{KeySource, SessionKey};
use crate::types::{IndexDocument, IndexEntry, Session, SessionStatus};
use crate::{Error, Result};

/// Lifecycle partition a session document lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBucket {
    /// Draft and active sessions
    Active,
    /// Completed sessions
    Completed,
}

impl StorageBucket {
    /// Directory name under the data directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageBucket::Active => "active",
            StorageBucket::Completed => "completed",
        }
    }

    /// Index file name under the data directory
    pub fn index_file(&self) -> &'static str {
        match self {
            StorageBucket::Active => "active_sessions_index.json",
            StorageBucket::Completed => "completed_sessions_index.json",
        }
    }

    /// Which bucket a session with this status belongs in
    pub fn for_status(status: SessionStatus) -> Self {
        if status.is_completed() {
            StorageBucket::Completed
        } else {
            StorageBucket::Active
        }
    }
}

/// File-backed store for session documents, key files, and listing indexes
#[derive(Debug)]
pub struct SessionStore {
    data_dir: PathBuf,
    // Serializes index read-modify-write cycles so concurrent saves within
    // the process cannot lose each other's index updates.
    index_lock: Mutex<()>,
}

impl SessionStore {
    /// Open a store rooted at `data_dir`, creating the partition
    /// directories and empty index files when absent.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();

        for bucket in [StorageBucket::Active, StorageBucket::Completed] {
            fs::create_dir_all(data_dir.join(bucket.dir_name()))?;
        }

        let store = Self {
            data_dir,
            index_lock: Mutex::new(()),
        };

        for bucket in [StorageBucket::Active, StorageBucket::Completed] {
            let path = store.index_path(bucket);
            if !path.exists() {
                store.write_index_file(&path, &IndexDocument::empty())?;
            }
        }

        Ok(store)
    }

    /// Root data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn index_path(&self, bucket: StorageBucket) -> PathBuf {
        self.data_dir.join(bucket.index_file())
    }

    /// Path of the session document for its current status and creation date
    pub fn document_path(&self, session: &Session) -> PathBuf {
        let bucket = StorageBucket::for_status(session.status);
        self.data_dir
            .join(bucket.dir_name())
            .join(session.date_partition())
            .join(format!("{}.json", session.id))
    }

    /// Path of the session's encryption key file
    pub fn key_path(&self, session: &Session) -> PathBuf {
        self.document_path(session).with_extension("key")
    }

    /// Persist a session document atomically and upsert its index entry.
    ///
    /// The key file is generated lazily on the first save. On any I/O
    /// failure temporary files are cleaned up best-effort and the error is
    /// re-raised.
    pub fn save(&self, session: &Session) -> Result<()> {
        let doc_path = self.document_path(session);
        let key_path = doc_path.with_extension("key");

        let result = self.write_session_files(session, &doc_path, &key_path);
        if let Err(e) = result {
            tracing::error!("Failed to save session {}: {e}", session.id);
            for tmp in [tmp_path(&doc_path), tmp_path(&key_path)] {
                let _ = fs::remove_file(tmp);
            }
            return Err(e);
        }

        self.upsert_index(StorageBucket::for_status(session.status), session.index_entry())?;

        tracing::info!("Session {} saved to {}", session.id, doc_path.display());
        Ok(())
    }

    fn write_session_files(
        &self,
        session: &Session,
        doc_path: &Path,
        key_path: &Path,
    ) -> Result<()> {
        if let Some(parent) = doc_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if !key_path.exists() {
            write_atomic(key_path, SessionKey::generate().encode().as_bytes())?;
        }

        let raw = serde_json::to_string_pretty(session)?;
        write_atomic(doc_path, raw.as_bytes())
    }

    /// Load a session by id from the given partition.
    ///
    /// Scans the dated subdirectories for `<id>.json`. Returns `Ok(None)`
    /// when absent; directory read errors on this path also degrade to
    /// `Ok(None)` so listing endpoints stay resilient.
    pub fn load(&self, session_id: &str, bucket: StorageBucket) -> Result<Option<Session>> {
        let Some(doc_path) = self.find_document(session_id, bucket) else {
            return Ok(None);
        };

        let raw = fs::read_to_string(&doc_path)?;
        let mut session: Session = serde_json::from_str(&raw)?;
        session.normalize();
        Ok(Some(session))
    }

    fn find_document(&self, session_id: &str, bucket: StorageBucket) -> Option<PathBuf> {
        let file_name = format!("{session_id}.json");
        for date_dir in read_dir_sorted(&self.data_dir.join(bucket.dir_name())) {
            let candidate = date_dir.join(&file_name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Delete a session's document, key file, and index entry
    pub fn delete(&self, session: &Session) -> Result<()> {
        let doc_path = self.document_path(session);
        let key_path = doc_path.with_extension("key");

        if doc_path.exists() {
            fs::remove_file(&doc_path)?;
        }
        if key_path.exists() {
            fs::remove_file(&key_path)?;
        }

        let bucket = StorageBucket::for_status(session.status);
        self.remove_index_entry(bucket, &session.id)?;

        tracing::info!("Session {} deleted", session.id);
        Ok(())
    }

    /// Relocate a session from the active to the completed partition.
    ///
    /// Stamps the completion timestamp, renames the document and key file
    /// into the completed bucket (date path computed from the original
    /// creation date), rewrites the document with its new status, removes
    /// the active index entry and inserts the completed one. If the rename
    /// fails the in-memory status is rolled back so the object stays
    /// consistent with what is actually on disk.
    pub fn move_to_completed(&self, session: &mut Session) -> Result<()> {
        if session.status.is_completed() {
            return Ok(());
        }

        let old_doc = self.document_path(session);
        let old_key = old_doc.with_extension("key");
        let prior_status = session.status;

        session.mark_completed();

        let new_doc = self.document_path(session);
        let new_key = new_doc.with_extension("key");

        let renamed = (|| -> Result<()> {
            if let Some(parent) = new_doc.parent() {
                fs::create_dir_all(parent)?;
            }
            if old_doc.exists() {
                fs::rename(&old_doc, &new_doc)?;
            }
            if old_key.exists() {
                fs::rename(&old_key, &new_key)?;
            }
            Ok(())
        })();

        if let Err(e) = renamed {
            tracing::error!("Failed to move session {} to completed: {e}", session.id);
            session.status = prior_status;
            session.completed = None;
            return Err(e);
        }

        // Rewrite the relocated document so its stored status matches the
        // partition, and land its entry in the completed index.
        self.save(session)?;
        self.remove_index_entry(StorageBucket::Active, &session.id)?;

        tracing::info!("Session {} moved to completed", session.id);
        Ok(())
    }

    /// List index entries for a partition, newest first, up to `limit`.
    ///
    /// The active bucket orders by creation time, the completed bucket by
    /// completion time (falling back to creation time). A corrupt index
    /// degrades silently: the active bucket falls back to a full
    /// filesystem scan, the completed bucket to an empty listing.
    pub fn list_index(&self, bucket: StorageBucket, limit: usize) -> Result<Vec<IndexEntry>> {
        let mut entries = match self.read_index(bucket) {
            Ok(index) => index.sessions,
            Err(e) => {
                tracing::error!(
                    "Failed to read {} index, falling back: {e}",
                    bucket.dir_name()
                );
                match bucket {
                    StorageBucket::Active => self.scan_partition(bucket),
                    StorageBucket::Completed => Vec::new(),
                }
            }
        };

        match bucket {
            StorageBucket::Active => entries.sort_by(|a, b| b.created.cmp(&a.created)),
            StorageBucket::Completed => entries.sort_by(|a, b| {
                b.completed
                    .unwrap_or(b.created)
                    .cmp(&a.completed.unwrap_or(a.created))
            }),
        }

        entries.truncate(limit);
        Ok(entries)
    }

    /// Rebuild index entries by opening every document in a partition.
    /// Slow path, used when the index file is unreadable.
    fn scan_partition(&self, bucket: StorageBucket) -> Vec<IndexEntry> {
        let mut entries = Vec::new();
        for date_dir in read_dir_sorted(&self.data_dir.join(bucket.dir_name())) {
            for doc in read_dir_sorted(&date_dir) {
                if doc.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match fs::read_to_string(&doc)
                    .map_err(Error::from)
                    .and_then(|raw| serde_json::from_str::<Session>(&raw).map_err(Error::from))
                {
                    Ok(session) => entries.push(session.index_entry()),
                    Err(e) => tracing::warn!("Skipping unreadable document {}: {e}", doc.display()),
                }
            }
        }
        entries
    }

    fn read_index(&self, bucket: StorageBucket) -> Result<IndexDocument> {
        let raw = fs::read_to_string(self.index_path(bucket))?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn upsert_index(&self, bucket: StorageBucket, entry: IndexEntry) -> Result<()> {
        let _guard = self.index_lock.lock().expect("index lock poisoned");
        let mut index = self.read_index(bucket).unwrap_or_else(|e| {
            tracing::warn!("Rebuilding {} index: {e}", bucket.dir_name());
            IndexDocument::empty()
        });
        index.upsert(entry);
        self.write_index_file(&self.index_path(bucket), &index)
    }

    fn remove_index_entry(&self, bucket: StorageBucket, session_id: &str) -> Result<()> {
        let _guard = self.index_lock.lock().expect("index lock poisoned");
        let mut index = match self.read_index(bucket) {
            Ok(index) => index,
            Err(e) => {
                tracing::error!("Failed to update {} index: {e}", bucket.dir_name());
                return Ok(());
            }
        };
        index.remove(session_id);
        self.write_index_file(&self.index_path(bucket), &index)
    }

    fn write_index_file(&self, path: &Path, index: &IndexDocument) -> Result<()> {
        let raw = serde_json::to_string_pretty(index)?;
        write_atomic(path, raw.as_bytes())
    }

    /// Read (creating if absent) the session's symmetric key
    pub fn session_key(&self, session: &Session) -> Result<SessionKey> {
        let key_path = self.key_path(session);
        if !key_path.exists() {
            if let Some(parent) = key_path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_atomic(&key_path, SessionKey::generate().encode().as_bytes())?;
        }
        let encoded = fs::read_to_string(&key_path)?;
        SessionKey::from_encoded(encoded.trim()).ok_or(Error::InvalidLink)
    }
}

impl KeySource for SessionStore {
    /// Every key in the active partition, for exhaustive trial decryption.
    /// Unreadable key files are skipped.
    fn keys(&self) -> Vec<SessionKey> {
        let mut keys = Vec::new();
        for date_dir in read_dir_sorted(&self.data_dir.join(StorageBucket::Active.dir_name())) {
            for file in read_dir_sorted(&date_dir) {
                if file.extension().and_then(|e| e.to_str()) != Some("key") {
                    continue;
                }
                if let Ok(encoded) = fs::read_to_string(&file) {
                    if let Some(key) = SessionKey::from_encoded(encoded.trim()) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Write through a temporary file in the same directory, then atomically
/// rename over the destination.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, contents).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Subdirectory/file paths of `dir`, sorted for deterministic scans.
/// An unreadable directory yields an empty list.
fn read_dir_sorted(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (_dir, store) = store();
        let mut session = Session::new("Round trip", "desc");
        session.add_item("Pizza", "").unwrap();
        store.save(&session).unwrap();

        let loaded = store
            .load(&session.id, StorageBucket::Active)
            .unwrap()
            .expect("session should exist");
        assert_eq!(loaded, session);

        // Unknown ids are not-found, never an error.
        assert!(store.load("missing", StorageBucket::Active).unwrap().is_none());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let (dir, store) = store();
        let session = Session::new("Clean", "");
        store.save(&session).unwrap();

        let date_dir = dir
            .path()
            .join("active")
            .join(session.date_partition());
        let leftovers: Vec<_> = fs::read_dir(date_dir)
            .unwrap()
            .flatten()
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_key_file_generated_once() {
        let (_dir, store) = store();
        let session = Session::new("Keyed", "");
        store.save(&session).unwrap();

        let key1 = store.session_key(&session).unwrap();
        store.save(&session).unwrap();
        let key2 = store.session_key(&session).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_save_upserts_index_without_duplicates() {
        let (_dir, store) = store();
        let mut session = Session::new("Indexed", "");
        store.save(&session).unwrap();
        session.add_item("Pizza", "").unwrap();
        store.save(&session).unwrap();

        let entries = store.list_index(StorageBucket::Active, 100).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].items_count, 1);
    }

    #[test]
    fn test_move_to_completed_relocates_files_and_index() {
        let (dir, store) = store();
        let mut session = Session::new("Finished", "");
        session.add_item("Pizza", "").unwrap();
        session.start().unwrap();
        store.save(&session).unwrap();
        let date = session.date_partition();

        store.move_to_completed(&mut session).unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        // Date path comes from the original creation date.
        let new_doc = dir
            .path()
            .join("completed")
            .join(&date)
            .join(format!("{}.json", session.id));
        assert!(new_doc.exists());
        assert!(new_doc.with_extension("key").exists());
        assert!(!dir
            .path()
            .join("active")
            .join(&date)
            .join(format!("{}.json", session.id))
            .exists());

        // Exactly one index entry, in the completed index only.
        let active = store.list_index(StorageBucket::Active, 100).unwrap();
        let completed = store.list_index(StorageBucket::Completed, 100).unwrap();
        assert!(active.iter().all(|e| e.id != session.id));
        assert_eq!(
            completed.iter().filter(|e| e.id == session.id).count(),
            1
        );

        // The relocated document is loadable and carries its new status.
        let loaded = store
            .load(&session.id, StorageBucket::Completed)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, SessionStatus::Completed);
    }

    #[test]
    fn test_delete_removes_files_and_index_entry() {
        let (_dir, store) = store();
        let session = Session::new("Doomed", "");
        store.save(&session).unwrap();
        store.delete(&session).unwrap();

        assert!(store.load(&session.id, StorageBucket::Active).unwrap().is_none());
        let entries = store.list_index(StorageBucket::Active, 100).unwrap();
        assert!(entries.iter().all(|e| e.id != session.id));
    }

    #[test]
    fn test_corrupt_active_index_falls_back_to_scan() {
        let (dir, store) = store();
        let session = Session::new("Resilient", "");
        store.save(&session).unwrap();

        fs::write(dir.path().join("active_sessions_index.json"), "{broken").unwrap();

        let entries = store.list_index(StorageBucket::Active, 100).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, session.id);
    }

    #[test]
    fn test_listing_is_newest_first_and_limited() {
        let (_dir, store) = store();
        let mut ids = Vec::new();
        for i in 0..3i64 {
            let mut session = Session::new(format!("Session {i}"), "");
            // Space creation times out so ordering is deterministic.
            session.created = session.created - chrono::Duration::hours(3 - i);
            store.save(&session).unwrap();
            ids.push(session.id);
        }

        let entries = store.list_index(StorageBucket::Active, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, ids[2]);
        assert_eq!(entries[1].id, ids[1]);
    }
}
