//! File-backed persistence of the shared session document.
//!
//! The whole document is rewritten on every save; there is no partial-update
//! API. Writes are guarded by an in-process revision counter so that two
//! sessions racing through load-modify-save cannot silently drop each other's
//! votes: the losing writer gets a [`StoreError::Conflict`] and retries.

use crate::types::SessionDocument;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write session document: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode session document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session document changed since it was read (seen revision {seen}, now {current})")]
    Conflict { seen: u64, current: u64 },
}

/// Opaque digest of the persisted document's raw bytes.
///
/// Used only to decide whether a cached view is stale; not an integrity
/// check. Absent storage maps to the distinguished empty fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn absent() -> Self {
        Fingerprint(String::new())
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_empty()
    }
}

/// A point-in-time read of the store: the document plus the revision it was
/// read at, which a subsequent [`StateStore::save`] must present.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: SessionDocument,
    pub revision: u64,
}

pub struct StateStore {
    path: PathBuf,
    revision: Mutex<u64>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            revision: Mutex::new(0),
        }
    }

    /// Read the current document. Missing or corrupt storage is downgraded
    /// to the default empty document; corruption is logged and discarded,
    /// never surfaced to the caller.
    pub async fn load(&self) -> Snapshot {
        let revision = self.revision.lock().await;
        let document = match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        "discarding corrupt session document at {}: {}",
                        self.path.display(),
                        e
                    );
                    SessionDocument::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => SessionDocument::default(),
            Err(e) => {
                tracing::warn!(
                    "failed to read session document at {}: {}",
                    self.path.display(),
                    e
                );
                SessionDocument::default()
            }
        };
        Snapshot {
            document,
            revision: *revision,
        }
    }

    /// Persist the full document, overwriting previous content. Fails with
    /// [`StoreError::Conflict`] if another save landed since `seen_revision`
    /// was read; the caller re-reads and retries. Returns the new revision.
    pub async fn save(
        &self,
        document: &SessionDocument,
        seen_revision: u64,
    ) -> Result<u64, StoreError> {
        let mut revision = self.revision.lock().await;
        if *revision != seen_revision {
            return Err(StoreError::Conflict {
                seen: seen_revision,
                current: *revision,
            });
        }
        self.write(document).await?;
        *revision += 1;
        Ok(*revision)
    }

    /// Persist unconditionally, ignoring the revision check. Used by Reset,
    /// which fully overwrites without reading first.
    pub async fn replace(&self, document: &SessionDocument) -> Result<u64, StoreError> {
        let mut revision = self.revision.lock().await;
        self.write(document).await?;
        *revision += 1;
        Ok(*revision)
    }

    async fn write(&self, document: &SessionDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(document)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    /// Content digest of the backing file, a pure function of its bytes.
    pub async fn fingerprint(&self) -> Fingerprint {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Fingerprint(hex::encode(Sha256::digest(&bytes))),
            Err(_) => Fingerprint::absent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Card;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("poker_data.json"))
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let snap = store.load().await;
        assert_eq!(snap.document, SessionDocument::default());
        assert_eq!(snap.revision, 0);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poker_data.json");
        tokio::fs::write(&path, b"{not json at all").await.unwrap();

        let store = StateStore::new(&path);
        let snap = store.load().await;
        assert_eq!(snap.document, SessionDocument::default());
    }

    #[tokio::test]
    async fn test_load_wrong_shape_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poker_data.json");
        // Well-formed JSON, wrong schema (votes must map to deck cards)
        tokio::fs::write(&path, br#"{"votes":{"Alice":"999"},"revealed":false}"#)
            .await
            .unwrap();

        let store = StateStore::new(&path);
        let snap = store.load().await;
        assert_eq!(snap.document, SessionDocument::default());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut doc = SessionDocument::default();
        doc.votes.insert("Alice".to_string(), Card::Eight);
        doc.revealed = true;

        let snap = store.load().await;
        store.save(&doc, snap.revision).await.unwrap();

        let reloaded = store.load().await;
        assert_eq!(reloaded.document, doc);
    }

    #[tokio::test]
    async fn test_resave_unmodified_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut doc = SessionDocument::default();
        doc.votes.insert("Bob".to_string(), Card::Three);
        store.replace(&doc).await.unwrap();

        let first = store.load().await;
        store.save(&first.document, first.revision).await.unwrap();
        let second = store.load().await;

        assert_eq!(first.document, second.document);
    }

    #[tokio::test]
    async fn test_conflicting_save_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let snap = store.load().await;

        // Another writer lands in between
        let mut other = SessionDocument::default();
        other.votes.insert("Bob".to_string(), Card::Five);
        store.replace(&other).await.unwrap();

        let mut mine = SessionDocument::default();
        mine.votes.insert("Alice".to_string(), Card::One);
        let result = store.save(&mine, snap.revision).await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        // The other writer's document survived
        assert_eq!(store.load().await.document, other);
    }

    #[tokio::test]
    async fn test_fingerprint_absent_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.fingerprint().await.is_absent());
    }

    #[tokio::test]
    async fn test_fingerprint_stable_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.replace(&SessionDocument::default()).await.unwrap();

        let a = store.fingerprint().await;
        let b = store.fingerprint().await;
        assert_eq!(a, b);
        assert!(!a.is_absent());
    }

    #[tokio::test]
    async fn test_fingerprint_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.replace(&SessionDocument::default()).await.unwrap();
        let before = store.fingerprint().await;

        let mut doc = SessionDocument::default();
        doc.votes.insert("Carol".to_string(), Card::TwentyOne);
        store.replace(&doc).await.unwrap();
        let after = store.fingerprint().await;

        assert_ne!(before, after);
    }
}
