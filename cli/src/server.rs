// HTTP server for the attendance ledger
//
// Exposes the session directory and attendance ledger over JSON. Every
// ledger failure is answered with `{"error": <kind>, "message": <text>}` so
// clients can show "already registered" and "not enrolled" verbatim.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rollcall_core::{
    AttendanceLedger, CourseId, LedgerError, SessionId, SessionUpdate, StudentId,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Header a student device may use instead of a `studentId` body field
pub const STUDENT_HEADER: &str = "x-student-id";

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// Error payload. The optional fields carry the variant's data so clients
/// can rebuild the exact `LedgerError`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
}

impl From<&LedgerError> for ErrorBody {
    fn from(err: &LedgerError) -> Self {
        let mut body = ErrorBody {
            error: err.kind().to_string(),
            message: err.to_string(),
            ..Default::default()
        };
        match err {
            LedgerError::NotFound(detail)
            | LedgerError::InvalidInput(detail)
            | LedgerError::Storage(detail)
            | LedgerError::Serialization(detail)
            | LedgerError::Unreachable(detail) => body.detail = Some(detail.clone()),
            LedgerError::NotEnrolled {
                student_id,
                course_id,
            } => {
                body.student_id = Some(*student_id);
                body.course_id = Some(*course_id);
            }
            LedgerError::AlreadyRegistered {
                session_id,
                student_id,
            } => {
                body.session_id = Some(*session_id);
                body.student_id = Some(*student_id);
            }
        }
        body
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewCourse {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnrollment {
    pub student_id: StudentId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub topic: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub course_id: CourseId,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    #[serde(default)]
    pub student_id: Option<StudentId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthPayload {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

// ============================================================================
// SERVER START
// ============================================================================

/// Shared state handed to every handler.
pub struct ServerContext {
    pub ledger: Arc<AttendanceLedger>,
    pub start_time: Instant,
}

impl ServerContext {
    pub fn new(ledger: Arc<AttendanceLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            start_time: Instant::now(),
        })
    }
}

pub async fn start(port: u16, ctx: Arc<ServerContext>) -> tokio::task::JoinHandle<()> {
    let routes = routes(ctx);
    tracing::info!("Starting attendance server on 0.0.0.0:{}", port);

    tokio::spawn(async move {
        warp::serve(routes).run(([0, 0, 0, 0], port)).await;
    })
}

pub fn routes(
    ctx: Arc<ServerContext>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let ctx_filter = warp::any().map(move || ctx.clone());

    let health_route = warp::path!("health")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(handle_health)
        .boxed();

    // Courses, students, enrollment

    let add_course_route = warp::path!("courses")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(handle_add_course)
        .boxed();

    let get_course_route = warp::path!("courses" / CourseId)
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(handle_get_course)
        .boxed();

    let course_sessions_route = warp::path!("courses" / CourseId / "sessions")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(handle_course_sessions)
        .boxed();

    let enroll_route = warp::path!("courses" / CourseId / "enrollments")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(handle_enroll)
        .boxed();

    let unenroll_route = warp::path!("courses" / CourseId / "enrollments" / StudentId)
        .and(warp::delete())
        .and(ctx_filter.clone())
        .and_then(handle_unenroll)
        .boxed();

    let add_student_route = warp::path!("students")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(handle_add_student)
        .boxed();

    // Sessions

    let create_session_route = warp::path!("sessions")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(handle_create_session)
        .boxed();

    let get_session_route = warp::path!("sessions" / SessionId)
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(handle_get_session)
        .boxed();

    let update_session_route = warp::path!("sessions" / SessionId)
        .and(warp::patch())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(handle_update_session)
        .boxed();

    let reopen_route = warp::path!("sessions" / SessionId / "reopen")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(handle_reopen_session)
        .boxed();

    let close_route = warp::path!("sessions" / SessionId / "close")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(handle_close_session)
        .boxed();

    // Attendance

    let register_route = warp::path!("sessions" / SessionId / "attendance")
        .and(warp::post())
        .and(warp::header::optional::<StudentId>(STUDENT_HEADER))
        .and(optional_json::<NewAttendance>())
        .and(ctx_filter.clone())
        .and_then(handle_register_attendance)
        .boxed();

    let roster_route = warp::path!("sessions" / SessionId / "attendance")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(handle_roster)
        .boxed();

    let remove_route = warp::path!("sessions" / SessionId / "attendance" / StudentId)
        .and(warp::delete())
        .and(ctx_filter)
        .and_then(handle_remove_attendance)
        .boxed();

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allow_headers(vec!["content-type", STUDENT_HEADER]);

    health_route
        .or(add_course_route)
        .or(get_course_route)
        .or(course_sessions_route)
        .or(enroll_route)
        .or(unenroll_route)
        .or(add_student_route)
        .or(create_session_route)
        .or(get_session_route)
        .or(update_session_route)
        .or(reopen_route)
        .or(close_route)
        .or(register_route)
        .or(roster_route)
        .or(remove_route)
        .with(cors)
        .recover(handle_rejection)
}

/// JSON body that may be absent entirely (empty POST).
fn optional_json<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Default + Send + 'static,
{
    warp::body::bytes().and_then(parse_optional_json::<T>)
}

async fn parse_optional_json<T>(body: Bytes) -> Result<T, Rejection>
where
    T: serde::de::DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&body).map_err(|e| warp::reject::custom(BadBody(e.to_string())))
}

#[derive(Debug)]
struct BadBody(String);

impl warp::reject::Reject for BadBody {}

// ============================================================================
// REPLY HELPERS
// ============================================================================

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::NotEnrolled { .. }
        | LedgerError::AlreadyRegistered { .. }
        | LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LedgerError::Unreachable(_) => StatusCode::BAD_GATEWAY,
        LedgerError::Storage(_) | LedgerError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_reply(kind: &str, message: String, status: StatusCode) -> warp::reply::Response {
    let body = ErrorBody {
        error: kind.to_string(),
        message,
        ..Default::default()
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn ledger_error_reply(err: LedgerError) -> warp::reply::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Ledger failure: {}", err);
    } else {
        debug!("Ledger rejected request: {}", err);
    }
    warp::reply::with_status(warp::reply::json(&ErrorBody::from(&err)), status).into_response()
}

/// Turn a ledger result into a JSON reply with `status` on success.
fn ledger_reply<T: Serialize>(
    result: Result<T, LedgerError>,
    status: StatusCode,
) -> Result<warp::reply::Response, Rejection> {
    Ok(match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), status).into_response(),
        Err(err) => ledger_error_reply(err),
    })
}

async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let reply = if err.is_not_found() {
        error_reply("NotFound", "No such resource".to_string(), StatusCode::NOT_FOUND)
    } else if let Some(BadBody(message)) = err.find::<BadBody>() {
        error_reply("InvalidInput", message.clone(), StatusCode::BAD_REQUEST)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply("InvalidInput", e.to_string(), StatusCode::BAD_REQUEST)
    } else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        error_reply("InvalidInput", e.to_string(), StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(
            "MethodNotAllowed",
            "Method not allowed".to_string(),
            StatusCode::METHOD_NOT_ALLOWED,
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        error_reply(
            "Internal",
            "Internal server error".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    };
    Ok(reply)
}

// ============================================================================
// API HANDLERS
// ============================================================================

async fn handle_health(ctx: Arc<ServerContext>) -> Result<warp::reply::Response, Rejection> {
    let payload = HealthPayload {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: ctx.start_time.elapsed().as_secs(),
    };
    Ok(warp::reply::json(&payload).into_response())
}

async fn handle_add_course(
    body: NewCourse,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.add_course(&body.name), StatusCode::CREATED)
}

async fn handle_get_course(
    course_id: CourseId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.course_view(course_id), StatusCode::OK)
}

async fn handle_course_sessions(
    course_id: CourseId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.sessions_for_course(course_id), StatusCode::OK)
}

async fn handle_enroll(
    course_id: CourseId,
    body: NewEnrollment,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    let result = ctx
        .ledger
        .enroll(course_id, body.student_id)
        .map(|()| serde_json::json!({ "courseId": course_id, "studentId": body.student_id }));
    ledger_reply(result, StatusCode::CREATED)
}

async fn handle_unenroll(
    course_id: CourseId,
    student_id: StudentId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    let result = ctx
        .ledger
        .unenroll(course_id, student_id)
        .map(|()| serde_json::json!({ "courseId": course_id, "studentId": student_id }));
    ledger_reply(result, StatusCode::OK)
}

async fn handle_add_student(
    body: NewStudent,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.add_student(&body.name), StatusCode::CREATED)
}

async fn handle_create_session(
    body: NewSession,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    let date = body.date.unwrap_or_else(Utc::now);
    ledger_reply(
        ctx.ledger.create_session(body.course_id, &body.topic, date),
        StatusCode::CREATED,
    )
}

async fn handle_get_session(
    session_id: SessionId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.session_info(session_id), StatusCode::OK)
}

async fn handle_update_session(
    session_id: SessionId,
    update: SessionUpdate,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    if update.date.is_none() && update.topic.is_none() {
        return Ok(ledger_error_reply(LedgerError::InvalidInput(
            "expected date or topic".to_string(),
        )));
    }
    ledger_reply(ctx.ledger.update_session(session_id, update), StatusCode::OK)
}

async fn handle_reopen_session(
    session_id: SessionId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.reopen_session(session_id), StatusCode::OK)
}

async fn handle_close_session(
    session_id: SessionId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.close_session(session_id), StatusCode::OK)
}

async fn handle_register_attendance(
    session_id: SessionId,
    header_student: Option<StudentId>,
    body: NewAttendance,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    // An explicit body field wins over the caller identity header.
    let Some(student_id) = body.student_id.or(header_student) else {
        return Ok(ledger_error_reply(LedgerError::InvalidInput(
            "studentId is required".to_string(),
        )));
    };
    ledger_reply(
        ctx.ledger.register_attendance(session_id, student_id),
        StatusCode::CREATED,
    )
}

async fn handle_roster(
    session_id: SessionId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    ledger_reply(ctx.ledger.attendance_for(session_id), StatusCode::OK)
}

async fn handle_remove_attendance(
    session_id: SessionId,
    student_id: StudentId,
    ctx: Arc<ServerContext>,
) -> Result<warp::reply::Response, Rejection> {
    let result = ctx
        .ledger
        .remove_attendance(session_id, student_id)
        .map(|()| serde_json::json!({ "sessionId": session_id, "studentId": student_id }));
    ledger_reply(result, StatusCode::OK)
}
