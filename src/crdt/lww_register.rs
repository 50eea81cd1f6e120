//! Last-Write-Wins register
//!
//! A single-value cell. Of two states, the one with the greater timestamp
//! wins; equal timestamps are broken by comparing `stateId` byte-wise, the
//! greater one winning. Should two states share both timestamp and stateId
//! but carry different values, the greater value wins. Merge is therefore
//! commutative, associative and idempotent over any set of states.
//!
//! # Example
//!
//! ```rust
//! use cowrite_core::crdt::LwwRegister;
//!
//! let mut register = LwwRegister::new("editor-a", 5, "X".to_string());
//! let changed = register.merge(LwwRegister::new("editor-b", 5, "Y".to_string()));
//!
//! assert!(changed);
//! assert_eq!(register.value(), "Y");
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// LWW register state: `{stateId, timestamp, value}` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LwwRegister<T> {
    state_id: String,
    #[serde(alias = "timeStamp")]
    timestamp: u64,
    value: T,
}

impl<T> LwwRegister<T> {
    pub fn new(state_id: impl Into<String>, timestamp: u64, value: T) -> Self {
        Self {
            state_id: state_id.into(),
            timestamp,
            value,
        }
    }

    /// Writer id, used only to break timestamp ties
    pub fn state_id(&self) -> &str {
        &self.state_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Order of two states under the last-write-wins rule
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.state_id.as_bytes().cmp(other.state_id.as_bytes()))
    }

    /// Whether this state strictly beats `other`
    pub fn wins_over(&self, other: &Self) -> bool {
        self.precedence(other) == Ordering::Greater
    }
}

impl<T: Ord> LwwRegister<T> {
    /// Merge `candidate` into this register
    ///
    /// Returns whether the held value changed. A winning candidate carrying
    /// the current value still advances timestamp and stateId but reports
    /// `false`, so duplicate or retried edits never trigger a write-back.
    pub fn merge(&mut self, candidate: Self) -> bool {
        let replaces = match candidate.precedence(self) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => candidate.value > self.value,
        };
        if !replaces {
            return false;
        }
        let changed = candidate.value != self.value;
        *self = candidate;
        changed
    }
}
