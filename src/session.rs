//! Per-client session logic.
//!
//! Each WebSocket connection owns one `Session`. A session moves through
//! NotJoined -> Joined(unauthenticated) -> Joined(authenticated); joining is
//! irreversible and admin status is never revoked once granted.

use crate::store::{Fingerprint, StateStore, StoreError};
use crate::types::{Card, SessionDocument};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a name is required before voting")]
    NotJoined,
    #[error("name cannot be empty")]
    EmptyName,
    #[error("already joined as '{0}'")]
    AlreadyJoined(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Session {
    store: Arc<StateStore>,
    participant: Option<String>,
    /// Whether the connection arrived via the admin route. Without it the
    /// password prompt never applies, regardless of the password.
    admin_route: bool,
    is_admin: bool,
    last_seen: Fingerprint,
}

impl Session {
    /// Create a session for a new connection, recording the store's current
    /// fingerprint as the baseline for staleness checks.
    pub async fn connect(store: Arc<StateStore>, admin_route: bool) -> Self {
        let last_seen = store.fingerprint().await;
        Self {
            store,
            participant: None,
            admin_route,
            is_admin: false,
            last_seen,
        }
    }

    pub fn participant(&self) -> Option<&str> {
        self.participant.as_deref()
    }

    pub fn is_joined(&self) -> bool {
        self.participant.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn admin_route(&self) -> bool {
        self.admin_route
    }

    pub fn join(&mut self, name: &str) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        if let Some(existing) = &self.participant {
            return Err(SessionError::AlreadyJoined(existing.clone()));
        }
        self.participant = Some(name.to_string());
        tracing::info!("participant joined: {}", name);
        Ok(())
    }

    /// Compare a presented password against the configured secret. Only
    /// effective on the admin route and after joining; admin status sticks
    /// once granted.
    pub fn authenticate(&mut self, password: &str, verify: impl Fn(&str) -> bool) -> bool {
        if self.participant.is_none() {
            tracing::warn!("password presented before joining, ignoring");
            return false;
        }
        if !self.admin_route {
            tracing::warn!("password presented on a non-admin connection, ignoring");
            return self.is_admin;
        }
        if verify(password) {
            self.is_admin = true;
            tracing::info!("admin authenticated");
        }
        self.is_admin
    }

    /// Record this participant's vote, overwriting any prior one. Retries
    /// the read-modify-write when another session's save lands in between.
    pub async fn cast_vote(&mut self, card: Card) -> Result<(), SessionError> {
        let name = self
            .participant
            .clone()
            .ok_or(SessionError::NotJoined)?;

        loop {
            let snapshot = self.store.load().await;
            let mut document = snapshot.document;
            document.votes.insert(name.clone(), card);
            match self.store.save(&document, snapshot.revision).await {
                Ok(_) => {
                    tracing::debug!("{} voted {}", name, card);
                    return Ok(());
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Open the results for everyone. Silent no-op without admin status.
    pub async fn reveal(&mut self) -> Result<(), SessionError> {
        if !self.is_admin {
            tracing::warn!("reveal attempted without admin authentication, ignoring");
            return Ok(());
        }
        loop {
            let snapshot = self.store.load().await;
            let mut document = snapshot.document;
            document.revealed = true;
            match self.store.save(&document, snapshot.revision).await {
                Ok(_) => {
                    tracing::info!("results revealed");
                    return Ok(());
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Wipe the table back to the empty document. Silent no-op without
    /// admin status. Overwrites unconditionally, no load needed.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        if !self.is_admin {
            tracing::warn!("reset attempted without admin authentication, ignoring");
            return Ok(());
        }
        self.store.replace(&SessionDocument::default()).await?;
        tracing::info!("table reset");
        Ok(())
    }

    /// End-of-turn staleness check: true when the stored document changed
    /// since this session last rendered it, in which case the caller must
    /// re-render immediately. Updates the baseline either way.
    pub async fn check_stale(&mut self) -> bool {
        let current = self.store.fingerprint().await;
        if current != self.last_seen {
            self.last_seen = current;
            true
        } else {
            false
        }
    }

    /// Load the document for rendering and mark it as seen. The fingerprint
    /// is captured before the load: a write landing mid-refresh may already
    /// be in the rendered document, but it still reads as stale afterwards
    /// and triggers one more render rather than going unseen.
    pub async fn refresh_view(&mut self) -> SessionDocument {
        self.last_seen = self.store.fingerprint().await;
        let snapshot = self.store.load().await;
        snapshot.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(dir: &tempfile::TempDir) -> Arc<StateStore> {
        Arc::new(StateStore::new(dir.path().join("poker_data.json")))
    }

    async fn admin_session(store: Arc<StateStore>) -> Session {
        let mut session = Session::connect(store, true).await;
        session.join("Admin").unwrap();
        assert!(session.authenticate("pw", |p| p == "pw"));
        session
    }

    #[tokio::test]
    async fn test_vote_requires_join() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::connect(test_store(&dir), false).await;

        let result = session.cast_vote(Card::Five).await;
        assert!(matches!(result, Err(SessionError::NotJoined)));
    }

    #[tokio::test]
    async fn test_join_rejects_empty_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::connect(test_store(&dir), false).await;

        assert!(matches!(session.join("   "), Err(SessionError::EmptyName)));
        session.join("Alice").unwrap();
        assert!(matches!(
            session.join("Bob"),
            Err(SessionError::AlreadyJoined(_))
        ));
        assert_eq!(session.participant(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_last_vote_wins_per_participant() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let mut session = Session::connect(store.clone(), false).await;
        session.join("Alice").unwrap();

        session.cast_vote(Card::Three).await.unwrap();
        session.cast_vote(Card::Thirteen).await.unwrap();

        let doc = store.load().await.document;
        assert_eq!(doc.votes.len(), 1);
        assert_eq!(doc.votes.get("Alice"), Some(&Card::Thirteen));
    }

    #[tokio::test]
    async fn test_unauthorized_reveal_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let mut session = Session::connect(store.clone(), true).await;
        session.join("Mallory").unwrap();
        session.authenticate("wrong", |p| p == "pw");

        session.reveal().await.unwrap();
        assert!(!store.load().await.document.revealed);

        session.reset().await.unwrap();
        // Reset never wrote, file still absent
        assert!(store.fingerprint().await.is_absent());
    }

    #[tokio::test]
    async fn test_authenticate_ignored_off_admin_route() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::connect(test_store(&dir), false).await;
        session.join("Alice").unwrap();

        assert!(!session.authenticate("pw", |p| p == "pw"));
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn test_authenticate_requires_join() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let mut session = Session::connect(store.clone(), true).await;

        // Correct password on the admin route, but no name yet
        assert!(!session.authenticate("pw", |p| p == "pw"));
        assert!(!session.is_admin());
        session.reveal().await.unwrap();
        assert!(!store.load().await.document.revealed);

        // Once joined the same password works
        session.join("Dana").unwrap();
        assert!(session.authenticate("pw", |p| p == "pw"));
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn test_reveal_touches_only_revealed_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut voter = Session::connect(store.clone(), false).await;
        voter.join("Alice").unwrap();
        voter.cast_vote(Card::Eight).await.unwrap();

        let mut admin = admin_session(store.clone()).await;
        admin.reveal().await.unwrap();

        let doc = store.load().await.document;
        assert!(doc.revealed);
        assert_eq!(doc.votes.get("Alice"), Some(&Card::Eight));
    }

    #[tokio::test]
    async fn test_reset_yields_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut voter = Session::connect(store.clone(), false).await;
        voter.join("Alice").unwrap();
        voter.cast_vote(Card::One).await.unwrap();

        let mut admin = admin_session(store.clone()).await;
        admin.reveal().await.unwrap();
        admin.reset().await.unwrap();

        assert_eq!(store.load().await.document, SessionDocument::default());
    }

    #[tokio::test]
    async fn test_late_vote_after_reveal_lands() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut admin = admin_session(store.clone()).await;
        admin.reveal().await.unwrap();

        let mut voter = Session::connect(store.clone(), false).await;
        voter.join("Late Larry").unwrap();
        voter.cast_vote(Card::Two).await.unwrap();

        let doc = store.load().await.document;
        assert!(doc.revealed);
        assert_eq!(doc.votes.get("Late Larry"), Some(&Card::Two));
    }

    #[tokio::test]
    async fn test_staleness_fires_on_other_sessions_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut x = Session::connect(store.clone(), false).await;
        let mut y = Session::connect(store.clone(), false).await;
        x.join("X").unwrap();
        y.join("Y").unwrap();

        assert!(!y.check_stale().await);

        x.cast_vote(Card::Five).await.unwrap();

        assert!(y.check_stale().await);
        // Baseline updated, no repeat trigger without a new write
        assert!(!y.check_stale().await);
    }

    #[tokio::test]
    async fn test_unrendered_write_still_reads_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut reader = Session::connect(store.clone(), false).await;
        reader.join("Reader").unwrap();

        // Each write adds a new participant so no two documents are ever
        // byte-identical
        let writer_store = store.clone();
        let writer = tokio::spawn(async move {
            for i in 0..60 {
                let snapshot = writer_store.load().await;
                let mut document = snapshot.document;
                document.votes.insert(format!("Writer{}", i), Card::One);
                writer_store
                    .save(&document, snapshot.revision)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        });

        // Refresh concurrently with the writes, whatever interleaving occurs
        let mut rendered = reader.refresh_view().await;
        for _ in 0..50 {
            rendered = reader.refresh_view().await;
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        // Any write the reader has not rendered must leave it stale, so the
        // final document is never silently skipped
        let current = store.load().await.document;
        if rendered != current {
            assert!(reader.check_stale().await);
            assert_eq!(reader.refresh_view().await, current);
        }
    }

    #[tokio::test]
    async fn test_refresh_view_marks_seen() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut x = Session::connect(store.clone(), false).await;
        let mut y = Session::connect(store.clone(), false).await;
        x.join("X").unwrap();
        y.join("Y").unwrap();

        x.cast_vote(Card::Coffee).await.unwrap();

        let doc = y.refresh_view().await;
        assert_eq!(doc.votes.get("X"), Some(&Card::Coffee));
        assert!(!y.check_stale().await);
    }
}
