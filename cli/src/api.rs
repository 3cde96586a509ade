// HTTP client for a running `rollcall serve`
//
// `HttpBackend` is what a student device talks to: it answers the session
// directory queries the reconciler needs and posts check-ins. Error bodies
// are mapped back into the same `LedgerError` variants the server produced.

use crate::server::{ErrorBody, NewAttendance, NewCourse, NewEnrollment, NewSession, NewStudent, STUDENT_HEADER};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyper::client::HttpConnector;
use hyper::{Body, Method, Request, StatusCode, Uri};
use rollcall_core::{
    AttendanceClient, AttendanceRecord, Course, CourseId, CourseView, DirectoryError,
    LedgerError, Session, SessionDirectory, SessionId, SessionInfo, SessionUpdate, Student,
    StudentId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Check if a server is listening behind `base_url`
pub async fn is_api_available(base_url: &str) -> bool {
    let Ok(uri) = base_url.parse::<Uri>() else {
        return false;
    };
    let Some(host) = uri.host() else {
        return false;
    };
    let port = uri.port_u16().unwrap_or(80);
    tokio::net::TcpStream::connect((host, port)).await.is_ok()
}

/// Rebuild the ledger error a server reported.
pub fn ledger_error_from(status: StatusCode, body: &[u8]) -> LedgerError {
    let Ok(err) = serde_json::from_slice::<ErrorBody>(body) else {
        let text = String::from_utf8_lossy(body);
        return LedgerError::Unreachable(format!("HTTP {}: {}", status, text));
    };
    let detail = || err.detail.clone().unwrap_or_else(|| err.message.clone());

    match (err.error.as_str(), err.session_id, err.course_id, err.student_id) {
        ("NotFound", ..) => LedgerError::NotFound(detail()),
        ("NotEnrolled", _, Some(course_id), Some(student_id)) => LedgerError::NotEnrolled {
            student_id,
            course_id,
        },
        ("AlreadyRegistered", Some(session_id), _, Some(student_id)) => {
            LedgerError::AlreadyRegistered {
                session_id,
                student_id,
            }
        }
        ("InvalidInput", ..) => LedgerError::InvalidInput(detail()),
        ("Storage", ..) => LedgerError::Storage(detail()),
        ("Serialization", ..) => LedgerError::Serialization(detail()),
        _ => LedgerError::Unreachable(format!("HTTP {}: {}", status, err.message)),
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: hyper::Client<HttpConnector>,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: hyper::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        student: Option<StudentId>,
    ) -> Result<T, LedgerError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(format!("{}{}", self.base_url, path));
        if let Some(student_id) = student {
            builder = builder.header(STUDENT_HEADER, student_id.to_string());
        }
        let req = match body {
            Some(body) => {
                let json = serde_json::to_string(body)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                builder
                    .header("content-type", "application/json")
                    .body(Body::from(json))
            }
            None => builder.body(Body::empty()),
        }
        .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| LedgerError::Unreachable(e.to_string()))?;
        let status = resp.status();
        let body_bytes = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| LedgerError::Unreachable(e.to_string()))?;
        debug!("{} {} -> {}", method, path, status);

        if !status.is_success() {
            return Err(ledger_error_from(status, &body_bytes));
        }
        serde_json::from_slice(&body_bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
        self.call::<(), T>(Method::GET, path, None, None).await
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub async fn add_course(&self, name: &str) -> Result<Course, LedgerError> {
        let body = NewCourse {
            name: name.to_string(),
        };
        self.call(Method::POST, "/courses", Some(&body), None).await
    }

    pub async fn course_view(&self, course_id: CourseId) -> Result<CourseView, LedgerError> {
        self.get(&format!("/courses/{}", course_id)).await
    }

    pub async fn sessions_for_course(&self, course_id: CourseId) -> Result<Vec<Session>, LedgerError> {
        self.get(&format!("/courses/{}/sessions", course_id)).await
    }

    pub async fn add_student(&self, name: &str) -> Result<Student, LedgerError> {
        let body = NewStudent {
            name: name.to_string(),
        };
        self.call(Method::POST, "/students", Some(&body), None).await
    }

    pub async fn enroll(&self, course_id: CourseId, student_id: StudentId) -> Result<(), LedgerError> {
        let body = NewEnrollment { student_id };
        self.call::<_, serde_json::Value>(
            Method::POST,
            &format!("/courses/{}/enrollments", course_id),
            Some(&body),
            None,
        )
        .await
        .map(|_| ())
    }

    pub async fn create_session(
        &self,
        course_id: CourseId,
        topic: &str,
        date: Option<DateTime<Utc>>,
    ) -> Result<Session, LedgerError> {
        let body = NewSession {
            topic: topic.to_string(),
            date,
            course_id,
        };
        self.call(Method::POST, "/sessions", Some(&body), None).await
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<SessionInfo, LedgerError> {
        self.get(&format!("/sessions/{}", session_id)).await
    }

    pub async fn update_session(
        &self,
        session_id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Session, LedgerError> {
        self.call(
            Method::PATCH,
            &format!("/sessions/{}", session_id),
            Some(update),
            None,
        )
        .await
    }

    pub async fn reopen_session(&self, session_id: SessionId) -> Result<Session, LedgerError> {
        self.call::<(), _>(
            Method::POST,
            &format!("/sessions/{}/reopen", session_id),
            None,
            None,
        )
        .await
    }

    pub async fn close_session(&self, session_id: SessionId) -> Result<Session, LedgerError> {
        self.call::<(), _>(
            Method::POST,
            &format!("/sessions/{}/close", session_id),
            None,
            None,
        )
        .await
    }

    pub async fn attendance_for(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        self.get(&format!("/sessions/{}/attendance", session_id)).await
    }

    pub async fn register(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<AttendanceRecord, LedgerError> {
        let body = NewAttendance {
            student_id: Some(student_id),
        };
        self.call(
            Method::POST,
            &format!("/sessions/{}/attendance", session_id),
            Some(&body),
            Some(student_id),
        )
        .await
    }
}

#[async_trait]
impl SessionDirectory for HttpBackend {
    async fn resolve_session(&self, session_id: SessionId) -> Result<SessionInfo, DirectoryError> {
        Ok(self.get_session(session_id).await?)
    }

    async fn active_session_id(
        &self,
        course_id: CourseId,
    ) -> Result<Option<SessionId>, DirectoryError> {
        Ok(self.course_view(course_id).await?.active_session_id)
    }
}

#[async_trait]
impl AttendanceClient for HttpBackend {
    async fn register_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError> {
        self.register(session_id, student_id).await.map(|_| ())
    }

    async fn remove_attendance(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<(), LedgerError> {
        self.call::<(), serde_json::Value>(
            Method::DELETE,
            &format!("/sessions/{}/attendance/{}", session_id, student_id),
            None,
            None,
        )
        .await
        .map(|_| ())
    }
}
