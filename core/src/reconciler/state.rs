// Per-course reconciliation state
//
// Owned by a single reconciler instance. Nothing here performs I/O; the
// reconciler mutates it between its await points.

use crate::types::{CourseId, SessionId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;

/// The verified live session of one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLiveState {
    pub session_id: SessionId,
    pub topic: String,
    pub last_seen_at: Instant,
}

/// Counters; nothing in here is surfaced as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilerStats {
    pub observed: u64,
    pub malformed: u64,
    pub ignored_blacklisted: u64,
    pub directory_errors: u64,
    pub verification_skipped: u64,
    pub spoof_rejections: u64,
    pub evictions: u64,
}

/// Emitted on every state change that a UI would care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconcilerEvent {
    SessionLive {
        course_id: CourseId,
        session_id: SessionId,
        topic: String,
    },
    SessionReplaced {
        course_id: CourseId,
        previous: SessionId,
        session_id: SessionId,
        topic: String,
    },
    SessionExpired {
        course_id: CourseId,
        session_id: SessionId,
    },
    SpoofRejected {
        course_id: CourseId,
        session_id: SessionId,
        authoritative: Option<SessionId>,
    },
    RegistrationConfirmed {
        course_id: CourseId,
        session_id: SessionId,
    },
}

#[derive(Debug, Default)]
pub(crate) struct ReconcilerState {
    pub live: HashMap<CourseId, CourseLiveState>,
    /// session id -> blacklisted until
    pub blacklist: HashMap<SessionId, Instant>,
    pub registered: HashSet<CourseId>,
    /// Sessions with a directory call in flight
    pub resolving: HashSet<SessionId>,
    pub stats: ReconcilerStats,
}

impl ReconcilerState {
    /// Blacklist lookup with lazy pruning of an expired entry.
    pub fn check_blacklist(&mut self, session_id: &SessionId, now: Instant) -> bool {
        match self.blacklist.get(session_id) {
            Some(until) if *until > now => true,
            Some(_) => {
                self.blacklist.remove(session_id);
                false
            }
            None => false,
        }
    }

    /// Blacklist until `until`, never shortening an existing longer entry.
    pub fn blacklist_until(&mut self, session_id: SessionId, until: Instant) {
        let entry = self.blacklist.entry(session_id).or_insert(until);
        if *entry < until {
            *entry = until;
        }
    }

    pub fn prune_blacklist(&mut self, now: Instant) {
        self.blacklist.retain(|_, until| *until > now);
    }
}
