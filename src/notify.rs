//! Real-time notification fan-out
//!
//! Lifecycle and vote events are pushed to subscribers of a session's
//! broadcast group. Delivery is best-effort: publishing to a session with
//! no subscribers is not an error, and a lagging receiver misses events
//! rather than blocking the mutating request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::results::ItemResult;
use crate::types::SessionStatus;
use chrono::{DateTime, Utc};

/// Events carried on a session's real-time channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted,
    SessionCompleted {
        completed_at: DateTime<Utc>,
    },
    StatusChanged {
        old_status: SessionStatus,
        new_status: SessionStatus,
    },
    /// A participant cast (or recast) their vote. The participant id is
    /// suppressed for anonymous sessions.
    VoteSubmitted {
        participant_id: Option<String>,
        total_votes: usize,
    },
    VoteUpdate {
        participant_id: Option<String>,
    },
    ResultsUpdate {
        results: Vec<ItemResult>,
    },
}

/// Buffered events per channel before a slow receiver starts lagging
const CHANNEL_CAPACITY: usize = 64;

/// Per-session broadcast channels
#[derive(Debug)]
pub struct EventBus {
    channels: RwLock<HashMap<String, broadcast::Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Join a session's broadcast group
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a session's subscribers, best-effort
    pub fn publish(&self, session_id: &str, event: SessionEvent) {
        let channels = self.channels.read().expect("event bus lock poisoned");
        if let Some(sender) = channels.get(session_id) {
            // A send error just means nobody is listening right now.
            let _ = sender.send(event);
        }
    }

    /// Tear down a session's channel (after deletion)
    pub fn remove(&self, session_id: &str) {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels.remove(session_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
