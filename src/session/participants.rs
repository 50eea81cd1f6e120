//! Participant registry of a live session
//!
//! Tracks who has joined a session and when. Entries are keyed by user id; a
//! user joining again replaces their record. Leaving only removes the entry,
//! the session itself stays alive.

use crate::UserId;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity as resolved by the participant directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: UserId,
    pub display_name: String,
}

impl Participant {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A participant's membership in one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub user_id: UserId,
    pub display_name: String,
    /// UTC, serialized as RFC 3339
    pub joined_at: DateTime<Utc>,
}

impl Participation {
    pub fn new(participant: &Participant) -> Self {
        Self {
            user_id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            joined_at: Utc::now(),
        }
    }

    /// `joined_at` as an RFC 3339 string with millisecond precision
    pub fn joined_at_rfc3339(&self) -> String {
        self.joined_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Concurrent participant registry
#[derive(Debug, Default)]
pub struct Participants {
    entries: DashMap<UserId, (u64, Participation)>,
    sequence: AtomicU64,
}

impl Participants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `participant`, replacing any earlier record for the same user
    pub fn add(&self, participant: &Participant) -> Participation {
        let participation = Participation::new(participant);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.entries
            .insert(participant.id.clone(), (seq, participation.clone()));
        participation
    }

    /// Remove a user; returns their record if they were present
    pub fn remove(&self, user_id: &str) -> Option<Participation> {
        self.entries.remove(user_id).map(|(_, (_, p))| p)
    }

    pub fn get(&self, user_id: &str) -> Option<Participation> {
        self.entries.get(user_id).map(|entry| entry.value().1.clone())
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Every participant, in join order
    pub fn list(&self) -> Vec<Participation> {
        let mut entries: Vec<(u64, Participation)> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, p)| p).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
