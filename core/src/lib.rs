// Rollcall core: proximity attendance protocol
#![allow(clippy::empty_line_after_doc_comments)]
//
// An instructor's device advertises the live session id over BLE; student
// devices decode it, cross-check it against the backend's authoritative
// session for the course, and check in.

pub mod beacon;
pub mod directory;
pub mod ledger;
pub mod local;
pub mod reconciler;
pub mod store;
pub mod types;

use thiserror::Error;

pub use beacon::{BeaconBroadcaster, BeaconCodec, BeaconError, BeaconObservation, RadioAdapter, RadioError};
pub use directory::{AttendanceClient, CachedDirectory, DirectoryError, SessionDirectory, SessionInfo};
pub use ledger::{AttendanceLedger, AttendanceRecord, Course, CourseView, LedgerError, Session, SessionUpdate, Student};
pub use local::LocalBackend;
pub use reconciler::{
    AttendanceTracker, BeaconReconciler, CourseLiveState, ObservationOutcome, PresenceError,
    PresenceOutcome, ReconcilerConfig, ReconcilerEvent, ReconcilerStats,
};
pub use store::{MemoryStorage, SledStorage, StorageBackend};
pub use types::{CourseId, SessionId, StudentId};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Umbrella error for callers that touch several layers at once.
#[derive(Debug, Error)]
pub enum RollcallError {
    #[error(transparent)]
    Beacon(#[from] BeaconError),
    #[error(transparent)]
    Radio(#[from] RadioError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Presence(#[from] PresenceError),
    #[error(transparent)]
    Config(#[from] reconciler::ConfigError),
    #[error(transparent)]
    Tracker(#[from] reconciler::TrackerError),
}

/// Open a ledger over a sled database at `path`.
pub fn open_ledger(path: &str) -> Result<AttendanceLedger, RollcallError> {
    let storage = SledStorage::new(path).map_err(LedgerError::Storage)?;
    Ok(AttendanceLedger::new(std::sync::Arc::new(storage)))
}

/// Ledger over volatile memory.
pub fn memory_ledger() -> AttendanceLedger {
    AttendanceLedger::new(std::sync::Arc::new(MemoryStorage::new()))
}
