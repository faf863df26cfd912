//! Session manager
//!
//! Facade over the on-disk store: creation, lookup, listing, lifecycle
//! transitions, item/participant/vote operations. An in-memory cache
//! short-circuits repeated loads within the process; entries land in the
//! cache on creation and on any disk load, are evicted on deletion, and
//! the cache is bounded by the configured capacity with least-recently-used
//! eviction beyond it.
//!
//! There is no per-session lock: two concurrent writers to the same session
//! race and the later save wins. File-level atomicity still guarantees no
//! reader ever sees a torn document.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::EmailConfig;
use crate::link::{self, KeySource};
use crate::mail::{validate_email, Invitation, Mailer};
use crate::notify::{EventBus, SessionEvent};
use crate::results::{compute_results, results_csv, ItemResult};
use crate::store::{SessionStore, StorageBucket};
use crate::types::{
    IndexEntry, Item, LinkPayload, ResultsAccess, Session, SessionStatus, VoteAllocation,
};
use crate::{Error, Result, state_error};

struct CacheEntry {
    session: Session,
    last_access: u64,
}

/// Partial settings update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub anonymous: Option<bool>,
    pub show_results_live: Option<bool>,
    pub votes_per_participant: Option<i64>,
    pub results_access: Option<ResultsAccess>,
    pub show_item_names: Option<bool>,
    pub presentation_mode: Option<bool>,
}

/// Outcome of adding a participant, including the invitation attempt
#[derive(Debug, Clone)]
pub struct AddParticipantOutcome {
    pub participant_id: String,
    pub participant_token: String,
    /// `None` when no invitation was requested
    pub invitation_sent: Option<bool>,
    /// Delivery failure detail; the participant was still added
    pub warning: Option<String>,
}

/// Tally of a bulk invitation send
#[derive(Debug, Clone, Default)]
pub struct InvitationReport {
    pub sent_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
}

/// Facade over the session store with caching and event emission
pub struct SessionManager {
    store: SessionStore,
    events: Arc<EventBus>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_capacity: usize,
    access_clock: AtomicU64,
}

impl SessionManager {
    /// Build a manager over a store. `cache_capacity` of zero disables
    /// caching entirely.
    pub fn new(store: SessionStore, events: Arc<EventBus>, cache_capacity: usize) -> Self {
        Self {
            store,
            events,
            cache: RwLock::new(HashMap::new()),
            cache_capacity,
            access_clock: AtomicU64::new(0),
        }
    }

    /// Underlying store (key access for the link codec, tests)
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    fn cache_put(&self, session: Session) {
        if self.cache_capacity == 0 {
            return;
        }
        let mut cache = self.cache.write().expect("session cache lock poisoned");
        let last_access = self.tick();
        cache.insert(
            session.id.clone(),
            CacheEntry {
                session,
                last_access,
            },
        );

        // Bounded cache: drop the least recently used entry beyond capacity.
        while cache.len() > self.cache_capacity {
            let oldest = cache
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    cache.remove(&id);
                }
                None => break,
            }
        }
    }

    fn cache_get(&self, session_id: &str) -> Option<Session> {
        let mut cache = self.cache.write().expect("session cache lock poisoned");
        let entry = cache.get_mut(session_id)?;
        entry.last_access = self.tick();
        Some(entry.session.clone())
    }

    fn cache_evict(&self, session_id: &str) {
        let mut cache = self.cache.write().expect("session cache lock poisoned");
        cache.remove(session_id);
    }

    /// Create a new draft session
    pub fn create_session(
        &self,
        title: &str,
        description: &str,
        votes_per_participant: i64,
        anonymous: bool,
    ) -> Result<Session> {
        if title.trim().is_empty() {
            return Err(Error::validation("title"));
        }

        let mut session = Session::new(title, description);
        session.settings.votes_per_participant = votes_per_participant;
        session.settings.anonymous = anonymous;

        self.store.save(&session)?;
        self.cache_put(session.clone());

        tracing::info!(
            "Created session {} - {} (votes: {}, anonymous: {})",
            session.id,
            title,
            votes_per_participant,
            anonymous
        );
        Ok(session)
    }

    /// Get a session by id, from cache or disk (active then completed)
    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        if let Some(session) = self.cache_get(session_id) {
            return Ok(session);
        }

        let loaded = self
            .store
            .load(session_id, StorageBucket::Active)?
            .map_or_else(
                || self.store.load(session_id, StorageBucket::Completed),
                |s| Ok(Some(s)),
            )?;

        match loaded {
            Some(session) => {
                self.cache_put(session.clone());
                Ok(session)
            }
            None => Err(Error::not_found("Session")),
        }
    }

    /// List active (draft or running) sessions, newest first
    pub fn list_active(&self, limit: usize) -> Result<Vec<IndexEntry>> {
        self.store.list_index(StorageBucket::Active, limit)
    }

    /// List completed sessions, most recently completed first
    pub fn list_completed(&self, limit: usize) -> Result<Vec<IndexEntry>> {
        self.store.list_index(StorageBucket::Completed, limit)
    }

    /// Delete a session and all its files
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let session = self.get_session(session_id)?;
        self.store.delete(&session)?;
        self.cache_evict(session_id);
        self.events.remove(session_id);
        Ok(())
    }

    /// Load, mutate, persist, and re-cache a session
    fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> Result<R>,
    ) -> Result<(Session, R)> {
        let mut session = self.get_session(session_id)?;
        let value = f(&mut session)?;
        self.store.save(&session)?;
        self.cache_put(session.clone());
        Ok((session, value))
    }

    fn ensure_editable(session: &Session) -> Result<()> {
        if session.status.is_completed() {
            return Err(state_error!("completed sessions cannot be modified"));
        }
        Ok(())
    }

    /// Start a session (`draft -> active`); requires at least one item
    pub fn start_session(&self, session_id: &str) -> Result<Session> {
        let (session, _) = self.update(session_id, |s| s.start())?;
        self.events.publish(session_id, SessionEvent::SessionStarted);
        Ok(session)
    }

    /// Complete a session (`active -> completed`): stamp the completion
    /// timestamp and relocate it to the completed partition.
    pub fn complete_session(&self, session_id: &str) -> Result<Session> {
        let mut session = self.get_session(session_id)?;
        if session.status != SessionStatus::Active {
            return Err(state_error!(
                "cannot complete session in {} state",
                session.status
            ));
        }

        self.store.move_to_completed(&mut session)?;
        self.cache_put(session.clone());

        let completed_at = session.completed.unwrap_or_else(chrono::Utc::now);
        self.events
            .publish(session_id, SessionEvent::SessionCompleted { completed_at });
        Ok(session)
    }

    /// Validated status transition, emitting a status-changed event
    pub fn set_status(&self, session_id: &str, new_status: SessionStatus) -> Result<Session> {
        let old_status = self.get_session(session_id)?.status;
        if old_status == new_status {
            return self.get_session(session_id);
        }

        let session = match new_status {
            SessionStatus::Completed => {
                // Route through completion so the document is relocated.
                let mut session = self.get_session(session_id)?;
                session.clone().transition(SessionStatus::Completed)?;
                self.store.move_to_completed(&mut session)?;
                self.cache_put(session.clone());
                session
            }
            _ => self.update(session_id, |s| s.transition(new_status))?.0,
        };

        self.events.publish(
            session_id,
            SessionEvent::StatusChanged {
                old_status,
                new_status,
            },
        );
        Ok(session)
    }

    /// Update title and/or description
    pub fn update_details(
        &self,
        session_id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Session> {
        let (session, _) = self.update(session_id, |s| {
            Self::ensure_editable(s)?;
            if let Some(title) = title {
                if title.trim().is_empty() {
                    return Err(Error::validation("title"));
                }
                s.title = title.to_string();
            }
            if let Some(description) = description {
                s.description = description.to_string();
            }
            Ok(())
        })?;
        Ok(session)
    }

    /// Apply a partial settings update
    pub fn update_settings(&self, session_id: &str, update: SettingsUpdate) -> Result<Session> {
        let (session, _) = self.update(session_id, |s| {
            Self::ensure_editable(s)?;
            let settings = &mut s.settings;
            if let Some(v) = update.anonymous {
                settings.anonymous = v;
            }
            if let Some(v) = update.show_results_live {
                settings.show_results_live = v;
            }
            if let Some(v) = update.votes_per_participant {
                settings.votes_per_participant = v;
            }
            if let Some(v) = update.results_access {
                settings.results_access = v;
            }
            if let Some(v) = update.show_item_names {
                settings.show_item_names = v;
            }
            if let Some(v) = update.presentation_mode {
                settings.presentation_mode = v;
            }
            Ok(())
        })?;
        Ok(session)
    }

    /// Add a voting item
    pub fn add_item(&self, session_id: &str, name: &str, description: &str) -> Result<Item> {
        let (_, item) = self.update(session_id, |s| {
            Self::ensure_editable(s)?;
            s.add_item(name, description)
        })?;
        Ok(item)
    }

    /// Remove a voting item
    pub fn remove_item(&self, session_id: &str, item_id: u32) -> Result<()> {
        let (_, ()) = self.update(session_id, |s| {
            Self::ensure_editable(s)?;
            s.remove_item(item_id)
        })?;
        Ok(())
    }

    /// Enroll a participant, optionally sending an invitation.
    ///
    /// Delivery failure never rolls back the enrollment; it comes back as
    /// a warning on the outcome.
    pub fn add_participant(
        &self,
        session_id: &str,
        email: &str,
        invite: Option<(&dyn Mailer, &EmailConfig)>,
    ) -> Result<AddParticipantOutcome> {
        validate_email(email)?;

        let (session, participant_id) = self.update(session_id, |s| {
            Self::ensure_editable(s)?;
            Ok(s.add_participant(email))
        })?;
        let participant_token = session.participants[&participant_id].token.clone();

        let mut outcome = AddParticipantOutcome {
            participant_id: participant_id.clone(),
            participant_token,
            invitation_sent: None,
            warning: None,
        };

        if let Some((mailer, email_config)) = invite {
            match self.send_invitation(&session, &participant_id, mailer, email_config) {
                Ok(()) => outcome.invitation_sent = Some(true),
                Err(e) => {
                    tracing::error!("Failed to send invitation to {email}: {e}");
                    outcome.invitation_sent = Some(false);
                    outcome.warning =
                        Some(format!("Participant added but invitation failed to send: {e}"));
                }
            }
        }

        Ok(outcome)
    }

    /// Remove a participant
    pub fn remove_participant(&self, session_id: &str, participant_id: &str) -> Result<()> {
        let (_, ()) = self.update(session_id, |s| {
            Self::ensure_editable(s)?;
            s.remove_participant(participant_id)
        })?;
        Ok(())
    }

    /// Encrypted voting-link path for one participant
    pub fn participant_link(&self, session_id: &str, participant_id: &str) -> Result<String> {
        let session = self.get_session(session_id)?;
        let key = self.store.session_key(&session)?;
        let token = link::issue(&key, &session, participant_id)?;
        Ok(link::vote_path(&token))
    }

    fn send_invitation(
        &self,
        session: &Session,
        participant_id: &str,
        mailer: &dyn Mailer,
        email_config: &EmailConfig,
    ) -> Result<()> {
        let key = self.store.session_key(session)?;
        let token = link::issue(&key, session, participant_id)?;
        let invitation =
            Invitation::compose(&session.title, &session.description, &link::vote_path(&token));

        let recipient = &session.participants[participant_id].email;
        mailer.send(email_config, recipient, &invitation.subject, &invitation.body)
    }

    /// Send invitations to every participant; failures are tallied, not
    /// raised.
    pub fn send_all_invitations(
        &self,
        session_id: &str,
        mailer: &dyn Mailer,
        email_config: &EmailConfig,
    ) -> Result<InvitationReport> {
        let session = self.get_session(session_id)?;
        if session.participants.is_empty() {
            return Err(Error::not_found("Participants"));
        }

        let mut report = InvitationReport::default();
        for (participant_id, participant) in &session.participants {
            match self.send_invitation(&session, participant_id, mailer, email_config) {
                Ok(()) => report.sent_count += 1,
                Err(e) => {
                    report.failed_count += 1;
                    report.errors.push(format!("{}: {e}", participant.email));
                }
            }
        }
        Ok(report)
    }

    /// Resolve a voting-link token to its session and embedded payload.
    ///
    /// Trial-decrypts against every active session key; any failure,
    /// including a vanished session, is the same generic invalid-link
    /// outcome.
    pub fn resolve_link(&self, token: &str) -> Result<(Session, LinkPayload)> {
        let payload = link::resolve(&self.store as &dyn KeySource, token)?;
        let session = self
            .get_session(&payload.session_id)
            .map_err(|_| Error::InvalidLink)?;
        Ok((session, payload))
    }

    /// Record a vote submitted through a voting link.
    ///
    /// The session must be active. Resubmission overwrites the prior
    /// allocation. Emits a vote event (participant id suppressed for
    /// anonymous sessions) and, when live results are enabled, a results
    /// update.
    pub fn submit_vote(&self, token: &str, allocation: VoteAllocation) -> Result<Session> {
        let (session, payload) = self.resolve_link(token)?;

        match session.status {
            SessionStatus::Draft => {
                return Err(state_error!("this voting session has not started yet"));
            }
            SessionStatus::Completed => {
                return Err(state_error!("this voting session has ended"));
            }
            SessionStatus::Active => {}
        }
        if allocation.is_empty() {
            return Err(Error::validation("votes"));
        }

        let (session, _) = self.update(&session.id, |s| {
            s.record_vote(&payload.participant_id, allocation);
            Ok(())
        })?;

        let participant_id = if session.settings.anonymous {
            None
        } else {
            Some(payload.participant_id.clone())
        };
        self.events.publish(
            &session.id,
            SessionEvent::VoteSubmitted {
                participant_id: participant_id.clone(),
                total_votes: session.votes.len(),
            },
        );
        self.events
            .publish(&session.id, SessionEvent::VoteUpdate { participant_id });
        if session.settings.show_results_live {
            self.events.publish(
                &session.id,
                SessionEvent::ResultsUpdate {
                    results: compute_results(&session),
                },
            );
        }

        tracing::info!(
            "Vote submitted by participant {} in session {}",
            payload.participant_id,
            session.id
        );
        Ok(session)
    }

    /// Duplicate a session's structure (items and settings) into a fresh
    /// draft with no participants or votes.
    pub fn duplicate_session(&self, session_id: &str) -> Result<Session> {
        let original = self.get_session(session_id)?;

        let mut copy = Session::new(format!("{} (Copy)", original.title), original.description);
        copy.items = original.items.clone();
        copy.settings = original.settings.clone();
        copy.next_item_id = original.next_item_id;

        self.store.save(&copy)?;
        self.cache_put(copy.clone());
        Ok(copy)
    }

    /// Ranked results for a session
    pub fn results(&self, session_id: &str) -> Result<Vec<ItemResult>> {
        Ok(compute_results(&self.get_session(session_id)?))
    }

    /// Ranked results rendered as CSV
    pub fn export_csv(&self, session_id: &str) -> Result<String> {
        Ok(results_csv(&self.get_session(session_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::LogMailer;
    use tempfile::TempDir;

    fn manager() -> (TempDir, SessionManager) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let manager = SessionManager::new(store, Arc::new(EventBus::new()), 20);
        (dir, manager)
    }

    fn manager_with(events: Arc<EventBus>, capacity: usize) -> (TempDir, SessionManager) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        let manager = SessionManager::new(store, events, capacity);
        (dir, manager)
    }

    struct FailingMailer;
    impl Mailer for FailingMailer {
        fn send(&self, _: &EmailConfig, _: &str, _: &str, _: &str) -> Result<()> {
            Err(Error::external("connection refused"))
        }
    }

    #[test]
    fn test_create_and_get_session() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Team lunch", "where to", 10, true).unwrap();

        let fetched = manager.get_session(&session.id).unwrap();
        assert_eq!(fetched, session);

        assert!(matches!(
            manager.get_session("nope").unwrap_err(),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            manager.create_session("  ", "", 10, true).unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn test_cache_eviction_is_bounded_lru() {
        let (_dir, manager) = manager_with(Arc::new(EventBus::new()), 2);
        let s1 = manager.create_session("One", "", 10, true).unwrap();
        let s2 = manager.create_session("Two", "", 10, true).unwrap();

        // Touch s1 so s2 is the LRU entry when s3 arrives.
        manager.get_session(&s1.id).unwrap();
        let _s3 = manager.create_session("Three", "", 10, true).unwrap();

        let cache = manager.cache.read().unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains_key(&s1.id));
        assert!(!cache.contains_key(&s2.id));
        drop(cache);

        // The evicted session is still loadable from disk.
        assert!(manager.get_session(&s2.id).is_ok());
    }

    #[test]
    fn test_lifecycle_events() {
        let events = Arc::new(EventBus::new());
        let (_dir, manager) = manager_with(events.clone(), 20);
        let session = manager.create_session("Lifecycle", "", 10, true).unwrap();
        let mut rx = events.subscribe(&session.id);

        manager.add_item(&session.id, "Pizza", "").unwrap();
        manager.start_session(&session.id).unwrap();
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SessionStarted);

        let completed = manager.complete_session(&session.id).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::SessionCompleted { .. }
        ));
        assert_eq!(completed.status, SessionStatus::Completed);

        // Terminal: no further transitions.
        assert!(manager.start_session(&session.id).is_err());
        assert!(manager
            .set_status(&session.id, SessionStatus::Active)
            .is_err());
    }

    #[test]
    fn test_start_requires_items() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Empty", "", 10, true).unwrap();
        assert!(manager.start_session(&session.id).is_err());
        assert_eq!(
            manager.get_session(&session.id).unwrap().status,
            SessionStatus::Draft
        );
    }

    #[test]
    fn test_set_status_emits_and_validates() {
        let events = Arc::new(EventBus::new());
        let (_dir, manager) = manager_with(events.clone(), 20);
        let session = manager.create_session("Status", "", 10, true).unwrap();
        manager.add_item(&session.id, "Pizza", "").unwrap();
        let mut rx = events.subscribe(&session.id);

        // Draft cannot jump straight to completed.
        assert!(manager
            .set_status(&session.id, SessionStatus::Completed)
            .is_err());

        manager.set_status(&session.id, SessionStatus::Active).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::StatusChanged {
                old_status: SessionStatus::Draft,
                new_status: SessionStatus::Active,
            }
        );

        let session = manager
            .set_status(&session.id, SessionStatus::Completed)
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        // Completion through set_status also relocates the document.
        assert!(manager
            .store()
            .load(&session.id, StorageBucket::Completed)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_completed_sessions_are_immutable() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Frozen", "", 10, true).unwrap();
        manager.add_item(&session.id, "Pizza", "").unwrap();
        manager.start_session(&session.id).unwrap();
        manager.complete_session(&session.id).unwrap();

        assert!(manager.add_item(&session.id, "Late", "").is_err());
        assert!(manager
            .add_participant(&session.id, "late@example.com", None)
            .is_err());
        assert!(manager
            .update_details(&session.id, Some("New title"), None)
            .is_err());
    }

    #[test]
    fn test_vote_through_link() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Voting", "", 10, true).unwrap();
        manager.add_item(&session.id, "Pizza", "").unwrap();
        manager.add_item(&session.id, "Burger", "").unwrap();
        let outcome = manager
            .add_participant(&session.id, "voter@example.com", None)
            .unwrap();

        let path = manager
            .participant_link(&session.id, &outcome.participant_id)
            .unwrap();
        let token = path.strip_prefix("/vote/").unwrap().to_string();

        // Votes are rejected before the session starts.
        assert!(manager
            .submit_vote(&token, VoteAllocation::from([(1, 5)]))
            .is_err());

        manager.start_session(&session.id).unwrap();
        let session = manager
            .submit_vote(&token, VoteAllocation::from([(1, 7), (2, 3)]))
            .unwrap();
        assert!(session.participants[&outcome.participant_id].voted);

        // And after completion.
        manager.complete_session(&session.id).unwrap();
        assert!(manager
            .submit_vote(&token, VoteAllocation::from([(1, 1)]))
            .is_err());
    }

    #[test]
    fn test_invitation_failure_is_a_warning() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Invites", "", 10, true).unwrap();
        let config = EmailConfig::default();

        let outcome = manager
            .add_participant(&session.id, "voter@example.com", Some((&FailingMailer, &config)))
            .unwrap();
        assert_eq!(outcome.invitation_sent, Some(false));
        assert!(outcome.warning.unwrap().contains("connection refused"));
        // The participant was still enrolled.
        let session = manager.get_session(&session.id).unwrap();
        assert!(session.participants.contains_key(&outcome.participant_id));

        let ok = manager
            .add_participant(&session.id, "second@example.com", Some((&LogMailer, &config)))
            .unwrap();
        assert_eq!(ok.invitation_sent, Some(true));
        assert!(ok.warning.is_none());

        let report = manager
            .send_all_invitations(&session.id, &FailingMailer, &config)
            .unwrap();
        assert_eq!(report.sent_count, 0);
        assert_eq!(report.failed_count, 2);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_invalid_email_rejected() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Emails", "", 10, true).unwrap();
        assert!(matches!(
            manager
                .add_participant(&session.id, "not-an-email", None)
                .unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn test_duplicate_session_copies_structure_only() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Original", "desc", 5, false).unwrap();
        manager.add_item(&session.id, "Pizza", "").unwrap();
        manager
            .add_participant(&session.id, "voter@example.com", None)
            .unwrap();

        let copy = manager.duplicate_session(&session.id).unwrap();
        assert_eq!(copy.title, "Original (Copy)");
        assert_eq!(copy.status, SessionStatus::Draft);
        assert_eq!(copy.items.len(), 1);
        assert_eq!(copy.settings.votes_per_participant, 5);
        assert!(copy.participants.is_empty());
        assert!(copy.votes.is_empty());
        assert_ne!(copy.id, session.id);
    }

    #[test]
    fn test_delete_session() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Doomed", "", 10, true).unwrap();
        manager.delete_session(&session.id).unwrap();
        assert!(matches!(
            manager.get_session(&session.id).unwrap_err(),
            Error::NotFound { .. }
        ));
        assert!(manager.list_active(100).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_link_for_vanished_session_is_generic() {
        let (_dir, manager) = manager();
        let session = manager.create_session("Vanishing", "", 10, true).unwrap();
        let outcome = manager
            .add_participant(&session.id, "voter@example.com", None)
            .unwrap();
        let path = manager
            .participant_link(&session.id, &outcome.participant_id)
            .unwrap();
        let token = path.strip_prefix("/vote/").unwrap().to_string();

        assert!(manager.resolve_link(&token).is_ok());

        // Key file survives in a copied-off token, session is gone: the
        // caller sees the same generic outcome as tampering.
        manager.delete_session(&session.id).unwrap();
        assert!(matches!(
            manager.resolve_link(&token).unwrap_err(),
            Error::InvalidLink
        ));
    }
}
