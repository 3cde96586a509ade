//! Attendance ledger
//!
//! Server-side record of courses, sessions and attendance. The active session
//! of a course is derived rather than stored: it is the session with the
//! latest `date` (ties broken by id), unless that session has been closed.
//!
//! Registration idempotency rests on a single atomic insert-if-absent of the
//! `(session, student)` attendance key; no check-then-insert window exists.

use crate::directory::SessionInfo;
use crate::store::StorageBackend;
use crate::types::{CourseId, SessionId, StudentId};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const COURSE_PREFIX: &str = "course/";
const STUDENT_PREFIX: &str = "student/";
const ENROLLMENT_PREFIX: &str = "enrollment/";
const SESSION_PREFIX: &str = "session/";
const COURSE_SESSION_PREFIX: &str = "course_session/";
const ATTENDANCE_PREFIX: &str = "attendance/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Student {student_id} is not enrolled in course {course_id}")]
    NotEnrolled {
        student_id: StudentId,
        course_id: CourseId,
    },
    #[error("Student {student_id} is already registered for session {session_id}")]
    AlreadyRegistered {
        session_id: SessionId,
        student_id: StudentId,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),
}

impl LedgerError {
    /// Stable machine-readable kind, used as the `error` field on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NotFound",
            LedgerError::NotEnrolled { .. } => "NotEnrolled",
            LedgerError::AlreadyRegistered { .. } => "AlreadyRegistered",
            LedgerError::InvalidInput(_) => "InvalidInput",
            LedgerError::Storage(_) => "Storage",
            LedgerError::Serialization(_) => "Serialization",
            LedgerError::Unreachable(_) => "Unreachable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Course plus its derived active session, as served by `GET /courses/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub id: CourseId,
    pub name: String,
    pub active_session_id: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub course_id: CourseId,
    pub topic: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub recorded_at: DateTime<Utc>,
}

/// Partial session update (`PATCH /sessions/{id}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub date: Option<DateTime<Utc>>,
    pub topic: Option<String>,
}

pub struct AttendanceLedger {
    backend: Arc<dyn StorageBackend>,
    /// Serialises every write that can move a course's active session.
    session_writes: Mutex<()>,
}

impl AttendanceLedger {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            session_writes: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Courses, students, enrollment
    // ------------------------------------------------------------------

    pub fn add_course(&self, name: &str) -> Result<Course, LedgerError> {
        let course = Course {
            id: CourseId::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store(&course_key(&course.id), &course)?;
        info!("Created course {} ({})", course.id, course.name);
        Ok(course)
    }

    pub fn get_course(&self, course_id: CourseId) -> Result<Course, LedgerError> {
        self.load(&course_key(&course_id))?
            .ok_or_else(|| LedgerError::NotFound(format!("course {}", course_id)))
    }

    pub fn course_view(&self, course_id: CourseId) -> Result<CourseView, LedgerError> {
        let course = self.get_course(course_id)?;
        let active_session_id = self.active_session_id(course_id)?;
        Ok(CourseView {
            id: course.id,
            name: course.name,
            active_session_id,
        })
    }

    pub fn add_student(&self, name: &str) -> Result<Student, LedgerError> {
        let student = Student {
            id: StudentId::new_v4(),
            name: name.to_string(),
        };
        self.store(&student_key(&student.id), &student)?;
        info!("Created student {} ({})", student.id, student.name);
        Ok(student)
    }

    pub fn get_student(&self, student_id: StudentId) -> Result<Student, LedgerError> {
        self.load(&student_key(&student_id))?
            .ok_or_else(|| LedgerError::NotFound(format!("student {}", student_id)))
    }

    /// Enroll a student in a course. Enrolling twice is harmless.
    pub fn enroll(&self, course_id: CourseId, student_id: StudentId) -> Result<(), LedgerError> {
        self.get_course(course_id)?;
        self.get_student(student_id)?;
        self.backend
            .put(enrollment_key(&course_id, &student_id).as_bytes(), b"")
            .map_err(LedgerError::Storage)?;
        info!("Enrolled student {} in course {}", student_id, course_id);
        Ok(())
    }

    pub fn unenroll(&self, course_id: CourseId, student_id: StudentId) -> Result<(), LedgerError> {
        let removed = self
            .backend
            .remove(enrollment_key(&course_id, &student_id).as_bytes())
            .map_err(LedgerError::Storage)?;
        if !removed {
            return Err(LedgerError::NotFound(format!(
                "enrollment of {} in {}",
                student_id, course_id
            )));
        }
        Ok(())
    }

    pub fn is_enrolled(
        &self,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<bool, LedgerError> {
        let value = self
            .backend
            .get(enrollment_key(&course_id, &student_id).as_bytes())
            .map_err(LedgerError::Storage)?;
        Ok(value.is_some())
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    pub fn create_session(
        &self,
        course_id: CourseId,
        topic: &str,
        date: DateTime<Utc>,
    ) -> Result<Session, LedgerError> {
        let _guard = self.session_writes.lock();
        self.get_course(course_id)?;

        let session = Session {
            id: SessionId::new_v4(),
            course_id,
            topic: topic.to_string(),
            date,
            closed: false,
        };
        self.store(&session_key(&session.id), &session)?;
        self.backend
            .put(course_session_key(&course_id, &session.id).as_bytes(), b"")
            .map_err(LedgerError::Storage)?;

        info!(
            "Created session {} for course {} ({})",
            session.id, course_id, session.topic
        );
        Ok(session)
    }

    /// Make a session the active one for its course again.
    ///
    /// The new date is strictly later than every other session of the course,
    /// even if one of them is dated in the future.
    pub fn reopen_session(&self, session_id: SessionId) -> Result<Session, LedgerError> {
        let _guard = self.session_writes.lock();
        let mut session = self.get_session(session_id)?;

        let newest_other = self
            .sessions_for_course(session.course_id)?
            .into_iter()
            .filter(|s| s.id != session_id)
            .map(|s| s.date)
            .max();

        let now = Utc::now();
        session.date = match newest_other {
            Some(newest) if newest >= now => newest + Duration::microseconds(1),
            _ => now,
        };
        session.closed = false;
        self.store(&session_key(&session_id), &session)?;

        info!(
            "Reopened session {} for course {} at {}",
            session_id, session.course_id, session.date
        );
        Ok(session)
    }

    pub fn update_session(
        &self,
        session_id: SessionId,
        update: SessionUpdate,
    ) -> Result<Session, LedgerError> {
        let _guard = self.session_writes.lock();
        let mut session = self.get_session(session_id)?;

        if let Some(date) = update.date {
            session.date = date;
        }
        if let Some(topic) = update.topic {
            session.topic = topic;
        }
        self.store(&session_key(&session_id), &session)?;
        info!("Updated session {}", session_id);
        Ok(session)
    }

    /// Close a session. If it was the course's newest session the course has
    /// no active session until another one is created or reopened.
    pub fn close_session(&self, session_id: SessionId) -> Result<Session, LedgerError> {
        let _guard = self.session_writes.lock();
        let mut session = self.get_session(session_id)?;
        session.closed = true;
        self.store(&session_key(&session_id), &session)?;
        info!("Closed session {}", session_id);
        Ok(session)
    }

    pub fn get_session(&self, session_id: SessionId) -> Result<Session, LedgerError> {
        self.load(&session_key(&session_id))?
            .ok_or_else(|| LedgerError::NotFound(format!("session {}", session_id)))
    }

    /// Session with its attendance roster, as served by `GET /sessions/{id}`
    pub fn session_info(&self, session_id: SessionId) -> Result<SessionInfo, LedgerError> {
        let session = self.get_session(session_id)?;
        let attendance_records = self
            .attendance_for(session_id)?
            .into_iter()
            .map(|r| r.student_id)
            .collect();

        Ok(SessionInfo {
            id: session.id,
            course_id: session.course_id,
            topic: session.topic,
            date: session.date,
            closed: session.closed,
            attendance_records,
        })
    }

    /// All sessions of a course, newest first
    pub fn sessions_for_course(&self, course_id: CourseId) -> Result<Vec<Session>, LedgerError> {
        let prefix = format!("{}{}/", COURSE_SESSION_PREFIX, course_id);
        let entries = self
            .backend
            .scan_prefix(prefix.as_bytes())
            .map_err(LedgerError::Storage)?;

        let mut sessions = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let id = parse_trailing_id::<SessionId>(&key)?;
            if let Some(session) = self.load::<Session>(&session_key(&id))? {
                sessions.push(session);
            }
        }

        sessions.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));
        Ok(sessions)
    }

    /// The authoritative session for a course, or `None` if the course has
    /// never held one or its newest session is closed.
    pub fn active_session_id(&self, course_id: CourseId) -> Result<Option<SessionId>, LedgerError> {
        self.get_course(course_id)?;
        let newest = self.sessions_for_course(course_id)?.into_iter().next();
        Ok(newest.filter(|s| !s.closed).map(|s| s.id))
    }

    // ------------------------------------------------------------------
    // Attendance
    // ------------------------------------------------------------------

    pub fn register_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<AttendanceRecord, LedgerError> {
        let session = self.get_session(session_id)?;
        self.get_student(student_id)?;

        if !self.is_enrolled(session.course_id, student_id)? {
            debug!(
                "Rejecting registration: student {} not enrolled in course {}",
                student_id, session.course_id
            );
            return Err(LedgerError::NotEnrolled {
                student_id,
                course_id: session.course_id,
            });
        }

        let record = AttendanceRecord {
            session_id,
            student_id,
            recorded_at: Utc::now(),
        };
        let value =
            serde_json::to_vec(&record).map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let inserted = self
            .backend
            .insert_if_absent(attendance_key(&session_id, &student_id).as_bytes(), &value)
            .map_err(LedgerError::Storage)?;

        if !inserted {
            debug!(
                "Rejecting registration: student {} already recorded for session {}",
                student_id, session_id
            );
            return Err(LedgerError::AlreadyRegistered {
                session_id,
                student_id,
            });
        }

        info!("Registered student {} for session {}", student_id, session_id);
        Ok(record)
    }

    pub fn remove_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError> {
        let removed = self
            .backend
            .remove(attendance_key(&session_id, &student_id).as_bytes())
            .map_err(LedgerError::Storage)?;

        if !removed {
            return Err(LedgerError::NotFound(format!(
                "attendance of {} in session {}",
                student_id, session_id
            )));
        }
        info!("Removed student {} from session {}", student_id, session_id);
        Ok(())
    }

    pub fn is_registered(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<bool, LedgerError> {
        let value = self
            .backend
            .get(attendance_key(&session_id, &student_id).as_bytes())
            .map_err(LedgerError::Storage)?;
        Ok(value.is_some())
    }

    /// Roster of a session, oldest check-in first
    pub fn attendance_for(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let prefix = format!("{}{}/", ATTENDANCE_PREFIX, session_id);
        let entries = self
            .backend
            .scan_prefix(prefix.as_bytes())
            .map_err(LedgerError::Storage)?;

        let mut records = entries
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_slice::<AttendanceRecord>(&value)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        self.backend.flush().map_err(LedgerError::Storage)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, LedgerError> {
        match self.backend.get(key.as_bytes()).map_err(LedgerError::Storage)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LedgerError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<(), LedgerError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.backend
            .put(key.as_bytes(), &bytes)
            .map_err(LedgerError::Storage)
    }
}

fn course_key(id: &CourseId) -> String {
    format!("{}{}", COURSE_PREFIX, id)
}

fn student_key(id: &StudentId) -> String {
    format!("{}{}", STUDENT_PREFIX, id)
}

fn enrollment_key(course_id: &CourseId, student_id: &StudentId) -> String {
    format!("{}{}/{}", ENROLLMENT_PREFIX, course_id, student_id)
}

fn session_key(id: &SessionId) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

fn course_session_key(course_id: &CourseId, session_id: &SessionId) -> String {
    format!("{}{}/{}", COURSE_SESSION_PREFIX, course_id, session_id)
}

fn attendance_key(session_id: &SessionId, student_id: &StudentId) -> String {
    format!("{}{}/{}", ATTENDANCE_PREFIX, session_id, student_id)
}

fn parse_trailing_id<T: std::str::FromStr>(key: &[u8]) -> Result<T, LedgerError> {
    std::str::from_utf8(key)
        .ok()
        .and_then(|k| k.rsplit('/').next())
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| {
            LedgerError::Serialization(format!("corrupt index key {}", String::from_utf8_lossy(key)))
        })
}
