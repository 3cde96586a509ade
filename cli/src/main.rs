// rollcall: proximity attendance from the command line
//
// `serve` runs the attendance ledger over HTTP. Every other command is a
// client of that server, or a local stand-in for the classroom radio.

mod api;
mod config;
mod server;
mod stdin_radio;

use anyhow::{Context, Result};
use api::HttpBackend;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use rollcall_core::{
    AttendanceTracker, BeaconBroadcaster, BeaconCodec, BeaconReconciler, CourseId, LedgerError,
    PresenceError, PresenceOutcome, ReconcilerEvent, SessionId, SessionUpdate, StudentId,
};
use std::sync::Arc;
use std::time::Duration;
use stdin_radio::LineRadio;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Rollcall: BLE proximity attendance", long_about = None)]
#[command(version)]
struct Cli {
    /// Server URL (overrides `api_url` from the config file)
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the attendance server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep the ledger in memory only
        #[arg(long)]
        memory: bool,
    },
    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },
    /// Manage students
    Student {
        #[command(subcommand)]
        action: StudentAction,
    },
    /// Enroll a student in a course
    Enroll { course: CourseId, student: StudentId },
    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Record attendance for a session
    Attend {
        session: SessionId,
        #[arg(short, long)]
        student: Option<StudentId>,
    },
    /// Remove an attendance record
    Unattend {
        session: SessionId,
        #[arg(short, long)]
        student: Option<StudentId>,
    },
    /// Encode or decode beacon payloads
    Beacon {
        #[command(subcommand)]
        action: BeaconAction,
    },
    /// Broadcast a session beacon (hex lines on stdout)
    Advertise { session: SessionId },
    /// Reconcile beacons read from stdin and report live sessions
    Watch {
        #[arg(short, long)]
        student: Option<StudentId>,
        /// Check in automatically when a session goes live
        #[arg(long)]
        auto_register: bool,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CourseAction {
    Add { name: String },
    Show { course: CourseId },
    Sessions { course: CourseId },
}

#[derive(Subcommand)]
enum StudentAction {
    Add { name: String },
}

#[derive(Subcommand)]
enum SessionAction {
    Create {
        course: CourseId,
        topic: String,
        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
    Show { session: SessionId },
    Update {
        session: SessionId,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
    Reopen { session: SessionId },
    Close { session: SessionId },
    Roster { session: SessionId },
}

#[derive(Subcommand)]
enum BeaconAction {
    Encode { session: SessionId },
    Decode { payload: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Commands::Serve { .. } | Commands::Watch { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = config::Config::load()?;
    if let Some(api) = cli.api {
        config.api_url = api.trim_end_matches('/').to_string();
    }

    match cli.command {
        Commands::Serve { port, memory } => cmd_serve(&config, port, memory).await,
        Commands::Course { action } => cmd_course(&config, action).await,
        Commands::Student { action } => cmd_student(&config, action).await,
        Commands::Enroll { course, student } => cmd_enroll(&config, course, student).await,
        Commands::Session { action } => cmd_session(&config, action).await,
        Commands::Attend { session, student } => cmd_attend(&config, session, student).await,
        Commands::Unattend { session, student } => cmd_unattend(&config, session, student).await,
        Commands::Beacon { action } => cmd_beacon(action),
        Commands::Advertise { session } => cmd_advertise(&config, session).await,
        Commands::Watch {
            student,
            auto_register,
        } => cmd_watch(&config, student, auto_register).await,
        Commands::Config { action } => cmd_config(config, action),
    }
}

// ============================================================================
// SERVER
// ============================================================================

async fn cmd_serve(config: &config::Config, port: Option<u16>, memory: bool) -> Result<()> {
    let port = port.unwrap_or(config.listen_port);

    let ledger = if memory {
        rollcall_core::memory_ledger()
    } else {
        let path = config.ledger_path()?;
        let path = path.to_str().context("Ledger path is not valid UTF-8")?;
        rollcall_core::open_ledger(path).context("Failed to open ledger")?
    };
    let ledger = Arc::new(ledger);

    println!("{}", "Rollcall attendance server".bold());
    println!(
        "  {} Storage: {}",
        "✓".green(),
        if memory {
            "memory".to_string()
        } else {
            config.ledger_path()?.display().to_string()
        }
    );
    println!("  {} Listening on 0.0.0.0:{}", "✓".green(), port);
    println!();
    println!("{}", "Press Ctrl-C to stop".dimmed());

    let ctx = server::ServerContext::new(ledger.clone());
    let handle = server::start(port, ctx).await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    handle.abort();
    ledger.flush().context("Failed to flush ledger")?;

    println!();
    println!("{} Server stopped", "✓".green());
    Ok(())
}

// ============================================================================
// CLIENT COMMANDS
// ============================================================================

async fn connect(config: &config::Config) -> Result<HttpBackend> {
    if !api::is_api_available(&config.api_url).await {
        anyhow::bail!(
            "No rollcall server at {} (start one with `rollcall serve`)",
            config.api_url
        );
    }
    Ok(HttpBackend::new(&config.api_url))
}

fn student_or_default(config: &config::Config, student: Option<StudentId>) -> Result<StudentId> {
    student.or(config.student_id).context(
        "No student given; pass --student or run `rollcall config set student_id <id>`",
    )
}

/// Ledger errors are shown as-is so "already registered" stays distinguishable.
fn ledger_failure(err: LedgerError) -> anyhow::Error {
    anyhow::anyhow!("{} ({})", err, err.kind())
}

async fn cmd_course(config: &config::Config, action: CourseAction) -> Result<()> {
    let backend = connect(config).await?;

    match action {
        CourseAction::Add { name } => {
            let course = backend.add_course(&name).await.map_err(ledger_failure)?;
            println!("{} Course added: {}", "✓".green(), course.name.bright_cyan());
            println!("  ID: {}", course.id.to_string().bright_yellow());
        }
        CourseAction::Show { course } => {
            let view = backend.course_view(course).await.map_err(ledger_failure)?;
            println!("{}", "Course".bold());
            println!("  Name:   {}", view.name.bright_cyan());
            println!("  ID:     {}", view.id);
            match view.active_session_id {
                Some(session) => println!("  Active: {}", session.to_string().bright_green()),
                None => println!("  Active: {}", "none".dimmed()),
            }
        }
        CourseAction::Sessions { course } => {
            let sessions = backend
                .sessions_for_course(course)
                .await
                .map_err(ledger_failure)?;
            if sessions.is_empty() {
                println!("{}", "No sessions.".dimmed());
                return Ok(());
            }
            println!("{} ({})", "Sessions".bold(), sessions.len());
            for session in sessions {
                let closed = if session.closed {
                    " [closed]".red().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {} {} {}{}",
                    session.date.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    session.id.to_string().bright_yellow(),
                    session.topic,
                    closed
                );
            }
        }
    }
    Ok(())
}

async fn cmd_student(config: &config::Config, action: StudentAction) -> Result<()> {
    let backend = connect(config).await?;

    match action {
        StudentAction::Add { name } => {
            let student = backend.add_student(&name).await.map_err(ledger_failure)?;
            println!("{} Student added: {}", "✓".green(), student.name.bright_cyan());
            println!("  ID: {}", student.id.to_string().bright_yellow());
        }
    }
    Ok(())
}

async fn cmd_enroll(config: &config::Config, course: CourseId, student: StudentId) -> Result<()> {
    let backend = connect(config).await?;
    backend
        .enroll(course, student)
        .await
        .map_err(ledger_failure)?;
    println!("{} Enrolled {} in {}", "✓".green(), student, course);
    Ok(())
}

async fn cmd_session(config: &config::Config, action: SessionAction) -> Result<()> {
    let backend = connect(config).await?;

    match action {
        SessionAction::Create {
            course,
            topic,
            date,
        } => {
            let session = backend
                .create_session(course, &topic, date)
                .await
                .map_err(ledger_failure)?;
            println!("{} Session created: {}", "✓".green(), session.topic.bright_cyan());
            println!("  ID:   {}", session.id.to_string().bright_yellow());
            println!("  Date: {}", session.date.to_rfc3339());
        }
        SessionAction::Show { session } => {
            let info = backend.get_session(session).await.map_err(ledger_failure)?;
            println!("{}", "Session".bold());
            println!("  Topic:    {}", info.topic.bright_cyan());
            println!("  ID:       {}", info.id);
            println!("  Course:   {}", info.course_id);
            println!("  Date:     {}", info.date.to_rfc3339());
            println!("  Closed:   {}", info.closed);
            println!("  Present:  {}", info.attendance_records.len());
        }
        SessionAction::Update {
            session,
            topic,
            date,
        } => {
            if topic.is_none() && date.is_none() {
                anyhow::bail!("Nothing to update; pass --topic and/or --date");
            }
            let updated = backend
                .update_session(session, &SessionUpdate { date, topic })
                .await
                .map_err(ledger_failure)?;
            println!(
                "{} Session {} updated ({} at {})",
                "✓".green(),
                updated.id,
                updated.topic,
                updated.date.to_rfc3339()
            );
        }
        SessionAction::Reopen { session } => {
            let reopened = backend
                .reopen_session(session)
                .await
                .map_err(ledger_failure)?;
            println!(
                "{} Session {} is active again (dated {})",
                "✓".green(),
                reopened.id,
                reopened.date.to_rfc3339()
            );
        }
        SessionAction::Close { session } => {
            backend
                .close_session(session)
                .await
                .map_err(ledger_failure)?;
            println!("{} Session {} closed", "✓".green(), session);
        }
        SessionAction::Roster { session } => {
            let records = backend
                .attendance_for(session)
                .await
                .map_err(ledger_failure)?;
            if records.is_empty() {
                println!("{}", "Nobody checked in yet.".dimmed());
                return Ok(());
            }
            println!("{} ({})", "Present".bold(), records.len());
            for record in records {
                println!(
                    "  {} {}",
                    record.recorded_at.format("%H:%M:%S").to_string().dimmed(),
                    record.student_id
                );
            }
        }
    }
    Ok(())
}

async fn cmd_attend(
    config: &config::Config,
    session: SessionId,
    student: Option<StudentId>,
) -> Result<()> {
    let student = student_or_default(config, student)?;
    let backend = connect(config).await?;

    match backend.register(session, student).await {
        Ok(record) => {
            println!(
                "{} Checked in at {}",
                "✓".green(),
                record.recorded_at.to_rfc3339()
            );
            Ok(())
        }
        Err(err @ LedgerError::AlreadyRegistered { .. }) => {
            println!("{} {}", "✓".yellow(), err);
            Ok(())
        }
        Err(err) => Err(ledger_failure(err)),
    }
}

async fn cmd_unattend(
    config: &config::Config,
    session: SessionId,
    student: Option<StudentId>,
) -> Result<()> {
    use rollcall_core::AttendanceClient;

    let student = student_or_default(config, student)?;
    let backend = connect(config).await?;
    backend
        .remove_attendance(session, student)
        .await
        .map_err(ledger_failure)?;
    println!("{} Attendance removed", "✓".green());
    Ok(())
}

// ============================================================================
// BEACONS
// ============================================================================

fn cmd_beacon(action: BeaconAction) -> Result<()> {
    let codec = BeaconCodec::default();

    match action {
        BeaconAction::Encode { session } => {
            let payload = codec.encode(&session)?;
            println!("{}", hex::encode(payload));
        }
        BeaconAction::Decode { payload } => {
            let bytes = hex::decode(payload.trim()).context("Payload is not hex")?;
            let session = codec.decode(&bytes)?;
            println!("{}", session);
        }
    }
    Ok(())
}

async fn cmd_advertise(config: &config::Config, session: SessionId) -> Result<()> {
    let radio = Arc::new(LineRadio::new(Duration::from_millis(
        config.advertise_interval_ms.max(1),
    )));
    let mut broadcaster = BeaconBroadcaster::new(radio);
    broadcaster.start(session).await?;
    eprintln!("{} Advertising session {}", "✓".green(), session);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    broadcaster.stop().await?;
    eprintln!("{} Advertising stopped", "✓".green());
    Ok(())
}

async fn cmd_watch(
    config: &config::Config,
    student: Option<StudentId>,
    auto_register: bool,
) -> Result<()> {
    let student = student_or_default(config, student)?;
    let backend = Arc::new(connect(config).await?);

    let reconciler = BeaconReconciler::new(backend.clone(), student, config.reconciler.clone())?;
    let mut events = reconciler.subscribe();
    let radio = Arc::new(LineRadio::new(Duration::from_millis(
        config.advertise_interval_ms.max(1),
    )));
    let tracker = AttendanceTracker::start(reconciler, radio).await?;

    println!("{}", "Watching for session beacons (stdin)".bold());
    println!("{}", "Press Ctrl-C to stop".dimmed());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Dropped {} reconciler events", n);
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                print_event(&event);

                if let ReconcilerEvent::SessionLive { course_id, .. }
                | ReconcilerEvent::SessionReplaced { course_id, .. } = event
                {
                    if auto_register && !tracker.reconciler().is_registered(&course_id) {
                        check_in(tracker.reconciler(), backend.as_ref(), course_id).await;
                    }
                }
            }
        }
    }

    let stats = tracker.reconciler().stats();
    tracker.stop().await?;
    println!();
    println!(
        "{} {} beacons, {} malformed, {} spoofs rejected, {} expiries",
        "✓".green(),
        stats.observed,
        stats.malformed,
        stats.spoof_rejections,
        stats.evictions
    );
    Ok(())
}

async fn check_in(reconciler: &BeaconReconciler, backend: &HttpBackend, course_id: CourseId) {
    match reconciler.register_presence(backend, course_id).await {
        Ok(PresenceOutcome::Registered) => {
            println!("  {} Checked in to course {}", "✓".green(), course_id)
        }
        Ok(PresenceOutcome::AlreadyRegistered) => {
            println!("  {} Already registered for course {}", "✓".yellow(), course_id)
        }
        Err(PresenceError::NotLive(_)) => {}
        Err(PresenceError::Ledger(err)) => {
            println!("  {} {} ({})", "✗".red(), err, err.kind())
        }
    }
}

fn print_event(event: &ReconcilerEvent) {
    match event {
        ReconcilerEvent::SessionLive {
            course_id,
            session_id,
            topic,
        } => println!(
            "{} {} live for course {} ({})",
            "●".green(),
            session_id,
            course_id,
            topic.bright_cyan()
        ),
        ReconcilerEvent::SessionReplaced {
            course_id,
            previous,
            session_id,
            topic,
        } => println!(
            "{} course {} moved {} -> {} ({})",
            "●".bright_blue(),
            course_id,
            previous,
            session_id,
            topic.bright_cyan()
        ),
        ReconcilerEvent::SessionExpired {
            course_id,
            session_id,
        } => println!(
            "{} {} for course {} went silent",
            "○".dimmed(),
            session_id,
            course_id
        ),
        ReconcilerEvent::SpoofRejected {
            course_id,
            session_id,
            authoritative,
        } => println!(
            "{} rejected {} for course {} (active: {})",
            "✗".red(),
            session_id,
            course_id,
            authoritative
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string())
        ),
        ReconcilerEvent::RegistrationConfirmed {
            course_id,
            session_id,
        } => println!(
            "{} registered for {} in course {}",
            "✓".green(),
            session_id,
            course_id
        ),
    }
}

// ============================================================================
// CONFIG
// ============================================================================

fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown or unset config key: {}", key),
        },
        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            for (key, value) in config.list() {
                println!("  {:<24} {}", key.bright_cyan(), value);
            }
            println!();
            println!(
                "  {}",
                format!("File: {}", config::Config::config_file()?.display()).dimmed()
            );
        }
    }
    Ok(())
}
