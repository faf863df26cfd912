//! # Core Types for the Live Poll Platform
//!
//! This module defines the fundamental data structures used throughout the
//! platform. The on-disk JSON schema is fixed and shared with older
//! deployments, so field names here match the stored documents exactly.
//!
//! ## Type Categories
//!
//! ### Core Entities
//! - [`Session`]: one voting event with items, participants, and votes
//! - [`Item`]: a thing being voted on within a session
//! - [`Participant`]: an invited voter with an access token
//! - [`SessionSettings`]: per-session behavior flags
//!
//! ### Storage and Transport
//! - [`IndexEntry`] / [`IndexDocument`]: denormalized listing records
//! - [`LinkPayload`]: the encrypted participant-link bundle
//!
//! ## Lifecycle
//!
//! Sessions move monotonically through `draft -> active -> completed`.
//! Starting requires at least one item; `completed` is terminal. Completed
//! sessions are immutable except for relocation between storage partitions.

use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{Error, Result, state_error};

/// A participant's vote allocation: item id mapped to vote count.
///
/// Serialized with string keys (`{"1": 5, "2": 3}`) for compatibility with
/// documents written by older deployments.
pub type VoteAllocation = BTreeMap<u32, i64>;

/// Lifecycle status of a voting session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Being configured; not yet open for votes
    Draft,
    /// Open for votes
    Active,
    /// Closed; terminal state
    Completed,
}

impl SessionStatus {
    /// Lowercase wire name, matching the stored documents
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    /// Whether sessions in this status live in the completed partition
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A thing being voted on within a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Integer id unique within the session. Assigned from a monotonic
    /// counter and never reused after deletion.
    pub id: u32,

    /// Display name shown to participants
    pub name: String,

    /// Optional longer description
    #[serde(default)]
    pub description: String,
}

/// An invited voter with an access token and a vote allocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    /// Email address the invitation was sent to
    pub email: String,

    /// Opaque URL-safe access token, generated at enrollment
    pub token: String,

    /// Whether this participant has cast a vote. Set idempotently; a
    /// resubmission overwrites the prior allocation but the flag stays set.
    pub voted: bool,

    /// Per-item vote allocation recorded on the participant record
    #[serde(default)]
    pub votes: VoteAllocation,

    /// Enrollment timestamp
    pub added: DateTime<Utc>,

    /// When the participant cast their vote, if they have
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_timestamp: Option<DateTime<Utc>>,
}

/// Who may view session results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsAccess {
    Public,
    Private,
}

/// Per-session behavior flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    /// Suppress participant identity in events and analytics
    pub anonymous: bool,

    /// Show running results to participants while voting is open
    pub show_results_live: bool,

    /// Vote budget each participant may distribute across items
    pub votes_per_participant: i64,

    /// Result visibility after completion
    pub results_access: ResultsAccess,

    /// Show item names on the results view
    pub show_item_names: bool,

    /// Enable the full-screen presentation view
    pub presentation_mode: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            anonymous: true,
            show_results_live: false,
            votes_per_participant: 10,
            results_access: ResultsAccess::Public,
            show_item_names: true,
            presentation_mode: true,
        }
    }
}

/// One voting event with items, participants, and votes
///
/// The struct mirrors the stored JSON document field for field. Mutations
/// happen through the methods here; persistence and cache concerns live in
/// the store and manager layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Opaque unique session id (UUID v4, stringly typed on the wire)
    pub id: String,

    /// Creation timestamp; also determines the date partition on disk
    pub created: DateTime<Utc>,

    /// Completion timestamp, stamped by [`Session::mark_completed`]
    pub completed: Option<DateTime<Utc>>,

    /// Human-readable session title
    pub title: String,

    /// Optional longer description
    #[serde(default)]
    pub description: String,

    /// Ordered list of items being voted on
    #[serde(default)]
    pub items: Vec<Item>,

    /// Participant id mapped to participant record
    #[serde(default)]
    pub participants: BTreeMap<String, Participant>,

    /// Participant id mapped to that participant's vote allocation
    #[serde(default)]
    pub votes: BTreeMap<String, VoteAllocation>,

    /// Behavior flags
    #[serde(default)]
    pub settings: SessionSettings,

    /// Lifecycle status
    pub status: SessionStatus,

    /// Next item id to assign. Documents written by older deployments lack
    /// this field (they assigned ids from the list length, which reused ids
    /// after deletion); [`Session::normalize`] recomputes it on load.
    #[serde(default)]
    pub next_item_id: u32,
}

impl Session {
    /// Create a new draft session
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created: Utc::now(),
            completed: None,
            title: title.into(),
            description: description.into(),
            items: Vec::new(),
            participants: BTreeMap::new(),
            votes: BTreeMap::new(),
            settings: SessionSettings::default(),
            status: SessionStatus::Draft,
            next_item_id: 1,
        }
    }

    /// Repair invariants on documents loaded from disk.
    ///
    /// Older documents carry no item-id counter; seed it past the highest
    /// existing id so deleted ids are never handed out again.
    pub fn normalize(&mut self) {
        let max_id = self.items.iter().map(|i| i.id).max().unwrap_or(0);
        if self.next_item_id <= max_id {
            self.next_item_id = max_id + 1;
        }
    }

    /// Date partition segment derived from the creation timestamp
    pub fn date_partition(&self) -> String {
        self.created.format("%Y-%m-%d").to_string()
    }

    /// Add a voting item; returns the assigned item
    pub fn add_item(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Item> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("name"));
        }

        let item = Item {
            id: self.next_item_id,
            name,
            description: description.into(),
        };
        self.next_item_id += 1;
        self.items.push(item.clone());
        Ok(item)
    }

    /// Remove a voting item by id
    pub fn remove_item(&mut self, item_id: u32) -> Result<()> {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before {
            return Err(Error::not_found("Item"));
        }
        Ok(())
    }

    /// Enroll a participant; returns the generated participant id
    pub fn add_participant(&mut self, email: impl Into<String>) -> String {
        let participant_id = Uuid::new_v4().to_string();
        self.participants.insert(
            participant_id.clone(),
            Participant {
                email: email.into(),
                token: generate_access_token(),
                voted: false,
                votes: VoteAllocation::new(),
                added: Utc::now(),
                vote_timestamp: None,
            },
        );
        participant_id
    }

    /// Remove a participant by id
    pub fn remove_participant(&mut self, participant_id: &str) -> Result<()> {
        self.participants
            .remove(participant_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Participant"))
    }

    /// Record a participant's vote allocation.
    ///
    /// Resubmission overwrites the prior allocation; the voted flag is an
    /// idempotent set. The allocation is stored even when the participant
    /// record has since been removed, matching the stored-document model
    /// where `votes` is an independent map.
    pub fn record_vote(&mut self, participant_id: &str, allocation: VoteAllocation) {
        self.votes
            .insert(participant_id.to_string(), allocation.clone());

        if let Some(participant) = self.participants.get_mut(participant_id) {
            participant.voted = true;
            participant.votes = allocation;
            participant.vote_timestamp = Some(Utc::now());
        }
    }

    /// Number of participants who have voted
    pub fn voted_count(&self) -> usize {
        self.participants.values().filter(|p| p.voted).count()
    }

    /// Start the session (`draft -> active`). Requires at least one item.
    pub fn start(&mut self) -> Result<()> {
        if self.status != SessionStatus::Draft {
            return Err(state_error!(
                "cannot start session in {} state",
                self.status
            ));
        }
        if self.items.is_empty() {
            return Err(state_error!("cannot start session without voting items"));
        }
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// Complete the session (`active -> completed`), stamping the
    /// completion timestamp.
    pub fn complete(&mut self) -> Result<()> {
        if self.status != SessionStatus::Active {
            return Err(state_error!(
                "cannot complete session in {} state",
                self.status
            ));
        }
        self.mark_completed();
        Ok(())
    }

    /// Stamp the completion timestamp and flip the status. Used by the
    /// store during relocation; callers enforcing the state machine go
    /// through [`Session::complete`].
    pub fn mark_completed(&mut self) {
        self.completed = Some(Utc::now());
        self.status = SessionStatus::Completed;
    }

    /// Validate and perform a lifecycle transition.
    ///
    /// Transitions are monotonic: `draft -> active -> completed`. A
    /// same-status request is a no-op. Everything else is rejected with
    /// the state unchanged.
    pub fn transition(&mut self, to: SessionStatus) -> Result<()> {
        if self.status == to {
            return Ok(());
        }
        match (self.status, to) {
            (SessionStatus::Completed, _) => {
                Err(state_error!("cannot change status of completed session"))
            }
            (SessionStatus::Draft, SessionStatus::Active) => self.start(),
            (SessionStatus::Draft, SessionStatus::Completed) => Err(state_error!(
                "cannot complete draft session, it must be active first"
            )),
            (SessionStatus::Active, SessionStatus::Completed) => self.complete(),
            (from, to) => Err(state_error!("cannot move session from {from} to {to}")),
        }
    }

    /// Denormalized summary used by the listing indexes
    pub fn index_entry(&self) -> IndexEntry {
        IndexEntry {
            id: self.id.clone(),
            title: self.title.clone(),
            created: self.created,
            completed: self.completed,
            status: self.status,
            participants_count: self.participants.len(),
            items_count: self.items.len(),
        }
    }
}

/// Denormalized session summary stored in the flat listing indexes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub participants_count: usize,
    pub items_count: usize,
}

/// One flat index file: all entries for a storage partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub sessions: Vec<IndexEntry>,
    pub last_updated: DateTime<Utc>,
}

impl IndexDocument {
    /// Fresh empty index
    pub fn empty() -> Self {
        Self {
            sessions: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Insert or replace the entry with the same id
    pub fn upsert(&mut self, entry: IndexEntry) {
        match self.sessions.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.sessions.push(entry),
        }
        self.last_updated = Utc::now();
    }

    /// Remove the entry with the given id; returns whether one was present
    pub fn remove(&mut self, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|e| e.id != session_id);
        self.last_updated = Utc::now();
        self.sessions.len() != before
    }
}

/// Participant identity bundle carried inside an encrypted voting link.
///
/// Never persisted; regenerated on demand from the session's key. The
/// expiry is advisory seconds since the Unix epoch, 30 days from issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkPayload {
    pub session_id: String,
    pub participant_id: String,
    pub email: String,
    pub token: String,
    pub expires: f64,
}

/// Generate an opaque URL-safe participant access token (32 random bytes)
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
