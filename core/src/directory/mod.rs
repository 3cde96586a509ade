//! Session directory
//!
//! Read-side view of the backend used by the student device: which course a
//! session belongs to, and which session is currently authoritative for a
//! course. [`CachedDirectory`] memoises session → course resolution, which
//! is safe because a session's course never changes after creation.

use crate::ledger::LedgerError;
use crate::types::{CourseId, SessionId, StudentId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Directory unreachable: {0}")]
    Unreachable(String),
}

/// Session as returned by `GET /sessions/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub course_id: CourseId,
    pub topic: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub attendance_records: Vec<StudentId>,
}

/// The part of a resolved session the reconciler keeps around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRoute {
    pub course_id: CourseId,
    pub topic: String,
}

impl From<&SessionInfo> for SessionRoute {
    fn from(info: &SessionInfo) -> Self {
        Self {
            course_id: info.course_id,
            topic: info.topic.clone(),
        }
    }
}

/// Backend read queries used during beacon reconciliation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// Look up a session's owning course and topic
    async fn resolve_session(&self, session_id: SessionId) -> Result<SessionInfo, DirectoryError>;

    /// The authoritative (most recently dated, not closed) session of a course
    async fn active_session_id(
        &self,
        course_id: CourseId,
    ) -> Result<Option<SessionId>, DirectoryError>;

    /// Whether `student_id` already has an attendance record for the session
    async fn is_registered(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<bool, DirectoryError> {
        let info = self.resolve_session(session_id).await?;
        Ok(info.attendance_records.contains(&student_id))
    }
}

/// Write side used by the student device to check in.
#[async_trait]
pub trait AttendanceClient: Send + Sync {
    async fn register_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError>;

    async fn remove_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError>;
}

/// Directory wrapper that caches session → course resolution.
#[derive(Clone)]
pub struct CachedDirectory {
    inner: Arc<dyn SessionDirectory>,
    routes: Arc<RwLock<HashMap<SessionId, SessionRoute>>>,
}

impl CachedDirectory {
    pub fn new(inner: Arc<dyn SessionDirectory>) -> Self {
        Self {
            inner,
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached route for a session, without touching the backend
    pub fn cached(&self, session_id: &SessionId) -> Option<SessionRoute> {
        self.routes.read().get(session_id).cloned()
    }

    /// Cached route, or a backend lookup that populates the cache
    pub async fn route(&self, session_id: SessionId) -> Result<SessionRoute, DirectoryError> {
        if let Some(route) = self.cached(&session_id) {
            return Ok(route);
        }

        let info = self.inner.resolve_session(session_id).await?;
        let route = SessionRoute::from(&info);
        debug!(
            "Resolved session {} -> course {} ({})",
            session_id, route.course_id, route.topic
        );
        self.routes.write().insert(session_id, route.clone());
        Ok(route)
    }

    pub fn evict(&self, session_id: &SessionId) {
        self.routes.write().remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    pub async fn active_session_id(
        &self,
        course_id: CourseId,
    ) -> Result<Option<SessionId>, DirectoryError> {
        self.inner.active_session_id(course_id).await
    }

    pub async fn is_registered(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<bool, DirectoryError> {
        self.inner.is_registered(session_id, student_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(session_id: SessionId, course_id: CourseId) -> SessionInfo {
        SessionInfo {
            id: session_id,
            course_id,
            topic: "Algebra".to_string(),
            date: Utc::now(),
            closed: false,
            attendance_records: vec![],
        }
    }

    #[tokio::test]
    async fn test_route_is_cached_after_first_lookup() {
        let session = SessionId::new_v4();
        let course = CourseId::new_v4();

        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .times(1)
            .returning(move |id| Ok(info(id, course)));

        let directory = CachedDirectory::new(Arc::new(mock));
        let first = directory.route(session).await.unwrap();
        let second = directory.route(session).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.course_id, course);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .times(2)
            .returning(|_| Err(DirectoryError::Unreachable("offline".into())));

        let directory = CachedDirectory::new(Arc::new(mock));
        let session = SessionId::new_v4();

        assert!(directory.route(session).await.is_err());
        assert!(directory.route(session).await.is_err());
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_evict_forces_new_lookup() {
        let course = CourseId::new_v4();
        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .times(2)
            .returning(move |id| Ok(info(id, course)));

        let directory = CachedDirectory::new(Arc::new(mock));
        let session = SessionId::new_v4();

        directory.route(session).await.unwrap();
        directory.evict(&session);
        assert!(directory.cached(&session).is_none());
        directory.route(session).await.unwrap();
    }

    #[test]
    fn test_session_info_wire_format() {
        let json = r#"{
            "id": "6f1c2a3b-4d5e-4f60-8a71-92b3c4d5e6f7",
            "courseId": "0b9f4c52-1d7e-4a3f-9e21-5c6d7e8f9a0b",
            "topic": "Algebra",
            "date": "2026-10-16T09:00:00Z",
            "attendanceRecords": []
        }"#;
        let parsed: SessionInfo = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.topic, "Algebra");
        assert!(!parsed.closed);
    }
}
