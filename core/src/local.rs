// In-process backend: directory and attendance client answered straight
// from an AttendanceLedger. Used by the CLI's offline mode and by tests.

use crate::directory::{AttendanceClient, DirectoryError, SessionDirectory, SessionInfo};
use crate::ledger::{AttendanceLedger, LedgerError};
use crate::types::{CourseId, SessionId, StudentId};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub struct LocalBackend {
    ledger: Arc<AttendanceLedger>,
}

impl LocalBackend {
    pub fn new(ledger: Arc<AttendanceLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<AttendanceLedger> {
        &self.ledger
    }
}

impl From<LedgerError> for DirectoryError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => DirectoryError::NotFound(what),
            other => DirectoryError::Unreachable(other.to_string()),
        }
    }
}

#[async_trait]
impl SessionDirectory for LocalBackend {
    async fn resolve_session(&self, session_id: SessionId) -> Result<SessionInfo, DirectoryError> {
        Ok(self.ledger.session_info(session_id)?)
    }

    async fn active_session_id(
        &self,
        course_id: CourseId,
    ) -> Result<Option<SessionId>, DirectoryError> {
        Ok(self.ledger.active_session_id(course_id)?)
    }

    async fn is_registered(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<bool, DirectoryError> {
        Ok(self.ledger.is_registered(session_id, student_id)?)
    }
}

#[async_trait]
impl AttendanceClient for LocalBackend {
    async fn register_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError> {
        self.ledger
            .register_attendance(session_id, student_id)
            .map(|_| ())
    }

    async fn remove_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError> {
        self.ledger.remove_attendance(session_id, student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use chrono::Utc;

    #[tokio::test]
    async fn test_local_backend_answers_directory_queries() {
        let ledger = Arc::new(AttendanceLedger::new(Arc::new(MemoryStorage::new())));
        let course = ledger.add_course("Physics").unwrap();
        let session = ledger.create_session(course.id, "Optics", Utc::now()).unwrap();
        let backend = LocalBackend::new(ledger);

        let info = backend.resolve_session(session.id).await.unwrap();
        assert_eq!(info.course_id, course.id);
        assert_eq!(
            backend.active_session_id(course.id).await.unwrap(),
            Some(session.id)
        );
    }

    #[tokio::test]
    async fn test_unknown_session_maps_to_not_found() {
        let ledger = Arc::new(AttendanceLedger::new(Arc::new(MemoryStorage::new())));
        let backend = LocalBackend::new(ledger);

        assert!(matches!(
            backend.resolve_session(SessionId::new_v4()).await,
            Err(DirectoryError::NotFound(_))
        ));
    }
}
