//! Beacon reconciler
//!
//! Turns a noisy stream of decoded session beacons into a per-course view of
//! which session is live right now. Per session id the lifecycle is
//!
//! ```text
//! Unknown -> Resolving -> Verified(session, topic, last_seen)
//!                     \-> Blacklisted(until)      (authoritative id differs)
//! Verified --(ttl of silence)--> Blacklisted(short cool-down) -> Unknown
//! ```
//!
//! The only suspension points are directory calls. State is never locked
//! across them, so a reconciler can be cloned and queried from other tasks
//! while the driver loop feeds it.
//!
//! Verification fails open: if the authoritative active session cannot be
//! fetched the beacon is accepted. Refusing would deny legitimate attendance
//! whenever the network is degraded.

pub mod config;
pub mod driver;
pub mod state;

pub use config::{ConfigError, ReconcilerConfig};
pub use driver::{AttendanceTracker, TrackerError};
pub use state::{CourseLiveState, ReconcilerEvent, ReconcilerStats};

use crate::beacon::{BeaconCodec, BeaconObservation};
use crate::directory::{AttendanceClient, CachedDirectory, DirectoryError, SessionDirectory};
use crate::ledger::LedgerError;
use crate::types::{CourseId, SessionId, StudentId};
use parking_lot::RwLock;
use state::ReconcilerState;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a single observation did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// Payload failed to decode
    Malformed,
    /// Session is in its cool-down
    Blacklisted,
    /// Another directory call for the same session is still running
    InFlight,
    /// Resolution failed; the next beacon retries
    DirectoryUnavailable,
    /// Authoritative session differs; session blacklisted
    SpoofRejected { course_id: CourseId },
    /// Course's live state now points at this session
    Live {
        course_id: CourseId,
        session_id: SessionId,
        changed: bool,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresenceError {
    #[error("No live session for course {0}")]
    NotLive(CourseId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    Registered,
    AlreadyRegistered,
}

#[derive(Clone)]
pub struct BeaconReconciler {
    directory: CachedDirectory,
    student_id: StudentId,
    config: ReconcilerConfig,
    codec: BeaconCodec,
    state: Arc<RwLock<ReconcilerState>>,
    events: broadcast::Sender<ReconcilerEvent>,
}

impl BeaconReconciler {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        student_id: StudentId,
        config: ReconcilerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            directory: CachedDirectory::new(directory),
            student_id,
            config,
            codec: BeaconCodec::default(),
            state: Arc::new(RwLock::new(ReconcilerState::default())),
            events,
        })
    }

    pub fn with_codec(mut self, codec: BeaconCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconcilerEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Entry point for the radio: decode, then reconcile.
    pub async fn handle_observation(
        &self,
        observation: &BeaconObservation,
        now: Instant,
    ) -> ObservationOutcome {
        match self.codec.decode(&observation.payload) {
            Ok(session_id) => self.observe_session(session_id, now).await,
            Err(e) => {
                self.state.write().stats.malformed += 1;
                debug!("Dropping beacon: {}", e);
                ObservationOutcome::Malformed
            }
        }
    }

    /// Reconcile one decoded session id observed at `now`.
    pub async fn observe_session(&self, session_id: SessionId, now: Instant) -> ObservationOutcome {
        {
            let mut state = self.state.write();
            state.stats.observed += 1;

            if state.check_blacklist(&session_id, now) {
                state.stats.ignored_blacklisted += 1;
                debug!("Ignoring blacklisted session {}", session_id);
                return ObservationOutcome::Blacklisted;
            }
            if !state.resolving.insert(session_id) {
                return ObservationOutcome::InFlight;
            }
        }

        let outcome = self.resolve_and_verify(session_id, now).await;
        self.state.write().resolving.remove(&session_id);
        outcome
    }

    async fn resolve_and_verify(&self, session_id: SessionId, now: Instant) -> ObservationOutcome {
        let route = match self.directory.route(session_id).await {
            Ok(route) => route,
            Err(e) => {
                self.state.write().stats.directory_errors += 1;
                warn!("Could not resolve session {}: {}", session_id, e);
                return ObservationOutcome::DirectoryUnavailable;
            }
        };
        let course_id = route.course_id;

        match self.directory.active_session_id(course_id).await {
            Ok(active) if active != Some(session_id) => {
                self.reject_spoof(course_id, session_id, active, now);
                return ObservationOutcome::SpoofRejected { course_id };
            }
            Ok(_) => {}
            Err(e) => {
                self.state.write().stats.verification_skipped += 1;
                warn!(
                    "Cannot verify session {} for course {} ({}); accepting",
                    session_id, course_id, e
                );
            }
        }

        let changed = self.apply_verified(course_id, session_id, route.topic, now);
        if changed {
            self.check_existing_registration(course_id, session_id).await;
        }

        ObservationOutcome::Live {
            course_id,
            session_id,
            changed,
        }
    }

    fn reject_spoof(
        &self,
        course_id: CourseId,
        session_id: SessionId,
        authoritative: Option<SessionId>,
        now: Instant,
    ) {
        {
            let mut state = self.state.write();
            state.blacklist_until(session_id, now + self.config.spoof_cooldown());
            state.stats.spoof_rejections += 1;
        }
        warn!(
            "Ghost beacon for course {}: observed {}, authoritative {:?}",
            course_id, session_id, authoritative
        );
        let _ = self.events.send(ReconcilerEvent::SpoofRejected {
            course_id,
            session_id,
            authoritative,
        });
    }

    /// Record a verified observation. Returns whether the course's live
    /// session changed.
    fn apply_verified(
        &self,
        course_id: CourseId,
        session_id: SessionId,
        topic: String,
        now: Instant,
    ) -> bool {
        let mut state = self.state.write();

        let previous = state.live.get(&course_id).map(|live| live.session_id);
        match previous {
            Some(current) if current == session_id => {
                if let Some(live) = state.live.get_mut(&course_id) {
                    live.last_seen_at = now;
                }
                false
            }
            _ => {
                state.live.insert(
                    course_id,
                    CourseLiveState {
                        session_id,
                        topic: topic.clone(),
                        last_seen_at: now,
                    },
                );
                state.registered.remove(&course_id);
                drop(state);

                let event = match previous {
                    Some(previous) => {
                        info!(
                            "Course {} moved from session {} to {} ({})",
                            course_id, previous, session_id, topic
                        );
                        ReconcilerEvent::SessionReplaced {
                            course_id,
                            previous,
                            session_id,
                            topic,
                        }
                    }
                    None => {
                        info!("Course {} is live: session {} ({})", course_id, session_id, topic);
                        ReconcilerEvent::SessionLive {
                            course_id,
                            session_id,
                            topic,
                        }
                    }
                };
                let _ = self.events.send(event);
                true
            }
        }
    }

    async fn check_existing_registration(&self, course_id: CourseId, session_id: SessionId) {
        match self.directory.is_registered(session_id, self.student_id).await {
            Ok(true) => self.confirm_registration(course_id, session_id),
            Ok(false) => {}
            Err(e) => debug!("Registration check for session {} failed: {}", session_id, e),
        }
    }

    /// Add the course to the registered set if `session_id` is still live.
    fn confirm_registration(&self, course_id: CourseId, session_id: SessionId) {
        let confirmed = {
            let mut state = self.state.write();
            let still_live = state
                .live
                .get(&course_id)
                .is_some_and(|live| live.session_id == session_id);
            if still_live {
                state.registered.insert(course_id)
            } else {
                false
            }
        };
        if confirmed {
            let _ = self.events.send(ReconcilerEvent::RegistrationConfirmed {
                course_id,
                session_id,
            });
        }
    }

    /// Periodic eviction of silent courses. Returns the evicted courses.
    pub fn sweep(&self, now: Instant) -> Vec<CourseId> {
        let ttl = self.config.ttl();
        let mut expired = Vec::new();
        {
            let mut state = self.state.write();
            let stale: Vec<CourseId> = state
                .live
                .iter()
                .filter(|(_, live)| now.saturating_duration_since(live.last_seen_at) > ttl)
                .map(|(course_id, _)| *course_id)
                .collect();

            for course_id in stale {
                if let Some(live) = state.live.remove(&course_id) {
                    state.registered.remove(&course_id);
                    state.blacklist_until(live.session_id, now + self.config.expiry_cooldown());
                    state.stats.evictions += 1;
                    expired.push((course_id, live.session_id));
                }
            }
            state.prune_blacklist(now);
        }

        for (course_id, session_id) in &expired {
            self.directory.evict(session_id);
            info!("Session {} for course {} expired", session_id, course_id);
            let _ = self.events.send(ReconcilerEvent::SessionExpired {
                course_id: *course_id,
                session_id: *session_id,
            });
        }

        expired.into_iter().map(|(course_id, _)| course_id).collect()
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Check in to the course's live session.
    ///
    /// `AlreadyRegistered` from the ledger counts as confirmation; any other
    /// ledger error is returned unchanged.
    pub async fn register_presence(
        &self,
        client: &dyn AttendanceClient,
        course_id: CourseId,
    ) -> Result<PresenceOutcome, PresenceError> {
        let session_id = self
            .live_session(&course_id)
            .map(|live| live.session_id)
            .ok_or(PresenceError::NotLive(course_id))?;

        let outcome = match client.register_attendance(session_id, self.student_id).await {
            Ok(()) => PresenceOutcome::Registered,
            Err(LedgerError::AlreadyRegistered { .. }) => PresenceOutcome::AlreadyRegistered,
            Err(e) => return Err(e.into()),
        };
        self.confirm_registration(course_id, session_id);
        Ok(outcome)
    }

    /// Re-read whether we are still recorded for the course's live session.
    pub async fn refresh_registration(&self, course_id: CourseId) -> Result<bool, DirectoryError> {
        let Some(session_id) = self.live_session(&course_id).map(|live| live.session_id) else {
            return Ok(false);
        };

        let registered = self.directory.is_registered(session_id, self.student_id).await?;
        if registered {
            self.confirm_registration(course_id, session_id);
        } else {
            self.state.write().registered.remove(&course_id);
        }
        Ok(registered)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn live_sessions(&self) -> HashMap<CourseId, CourseLiveState> {
        self.state.read().live.clone()
    }

    pub fn live_session(&self, course_id: &CourseId) -> Option<CourseLiveState> {
        self.state.read().live.get(course_id).cloned()
    }

    pub fn is_registered(&self, course_id: &CourseId) -> bool {
        self.state.read().registered.contains(course_id)
    }

    pub fn is_blacklisted(&self, session_id: &SessionId, now: Instant) -> bool {
        self.state
            .read()
            .blacklist
            .get(session_id)
            .is_some_and(|until| *until > now)
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.state.read().stats.clone()
    }

    pub fn cached_routes(&self) -> usize {
        self.directory.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::encode;
    use crate::directory::{MockSessionDirectory, SessionInfo};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn info(session_id: SessionId, course_id: CourseId, topic: &str) -> SessionInfo {
        SessionInfo {
            id: session_id,
            course_id,
            topic: topic.to_string(),
            date: Utc::now(),
            closed: false,
            attendance_records: vec![],
        }
    }

    /// Directory where every session belongs to `course` and `active` is authoritative.
    fn directory_for(course: CourseId, active: Arc<Mutex<Option<SessionId>>>) -> MockSessionDirectory {
        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .returning(move |id| Ok(info(id, course, "Algebra")));
        mock.expect_active_session_id()
            .returning(move |_| Ok(*active.lock()));
        mock.expect_is_registered().returning(|_, _| Ok(false));
        mock
    }

    fn reconciler(mock: MockSessionDirectory) -> BeaconReconciler {
        BeaconReconciler::new(
            Arc::new(mock),
            StudentId::new_v4(),
            ReconcilerConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_verified_beacon_becomes_live() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(session)))));
        let mut events = r.subscribe();
        let now = Instant::now();

        let outcome = r.observe_session(session, now).await;

        assert_eq!(
            outcome,
            ObservationOutcome::Live {
                course_id: course,
                session_id: session,
                changed: true
            }
        );
        let live = r.live_session(&course).expect("live");
        assert_eq!(live.session_id, session);
        assert_eq!(live.topic, "Algebra");
        assert_eq!(live.last_seen_at, now);
        assert!(matches!(
            events.try_recv().unwrap(),
            ReconcilerEvent::SessionLive { .. }
        ));
    }

    #[tokio::test]
    async fn test_repeat_observation_refreshes_last_seen() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(session)))));
        let t0 = Instant::now();

        r.observe_session(session, t0).await;
        let later = t0 + Duration::from_secs(3);
        let outcome = r.observe_session(session, later).await;

        assert!(matches!(outcome, ObservationOutcome::Live { changed: false, .. }));
        assert_eq!(r.live_session(&course).unwrap().last_seen_at, later);
    }

    #[tokio::test]
    async fn test_mismatch_blacklists_for_spoof_cooldown() {
        let course = CourseId::new_v4();
        let authoritative = SessionId::new_v4();
        let ghost = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(authoritative)))));
        let now = Instant::now();

        let outcome = r.observe_session(ghost, now).await;

        assert_eq!(outcome, ObservationOutcome::SpoofRejected { course_id: course });
        assert!(r.live_session(&course).is_none());
        assert!(r.is_blacklisted(&ghost, now + Duration::from_secs(59)));
        assert!(!r.is_blacklisted(&ghost, now + Duration::from_secs(60)));
        assert_eq!(
            r.observe_session(ghost, now + Duration::from_secs(30)).await,
            ObservationOutcome::Blacklisted
        );
        assert_eq!(r.stats().spoof_rejections, 1);
    }

    #[tokio::test]
    async fn test_ghost_does_not_disturb_existing_live_state() {
        let course = CourseId::new_v4();
        let real = SessionId::new_v4();
        let ghost = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(real)))));
        let now = Instant::now();

        r.observe_session(real, now).await;
        r.observe_session(ghost, now + Duration::from_secs(1)).await;

        let live = r.live_session(&course).unwrap();
        assert_eq!(live.session_id, real);
        assert_eq!(live.last_seen_at, now);
    }

    #[tokio::test]
    async fn test_course_without_active_session_rejects_beacon() {
        let course = CourseId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(None))));

        let outcome = r.observe_session(SessionId::new_v4(), Instant::now()).await;
        assert_eq!(outcome, ObservationOutcome::SpoofRejected { course_id: course });
    }

    #[tokio::test]
    async fn test_resolution_failure_changes_nothing_and_retries() {
        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .times(2)
            .returning(|_| Err(DirectoryError::Unreachable("offline".into())));
        let r = reconciler(mock);
        let session = SessionId::new_v4();
        let now = Instant::now();

        assert_eq!(
            r.observe_session(session, now).await,
            ObservationOutcome::DirectoryUnavailable
        );
        assert_eq!(
            r.observe_session(session, now).await,
            ObservationOutcome::DirectoryUnavailable
        );
        assert!(r.live_sessions().is_empty());
        assert!(!r.is_blacklisted(&session, now));
        assert_eq!(r.stats().directory_errors, 2);
    }

    #[tokio::test]
    async fn test_verification_failure_fails_open() {
        let course = CourseId::new_v4();
        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .returning(move |id| Ok(info(id, course, "Algebra")));
        mock.expect_active_session_id()
            .returning(|_| Err(DirectoryError::Unreachable("timeout".into())));
        mock.expect_is_registered().returning(|_, _| Ok(false));
        let r = reconciler(mock);
        let session = SessionId::new_v4();

        let outcome = r.observe_session(session, Instant::now()).await;

        assert!(matches!(outcome, ObservationOutcome::Live { .. }));
        assert_eq!(r.live_session(&course).unwrap().session_id, session);
        assert_eq!(r.stats().verification_skipped, 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_counted_and_dropped() {
        let r = reconciler(MockSessionDirectory::new());
        let observation = BeaconObservation::new(vec![0x00, 0x01, 0x02]);

        let outcome = r.handle_observation(&observation, Instant::now()).await;

        assert_eq!(outcome, ObservationOutcome::Malformed);
        assert_eq!(r.stats().malformed, 1);
        assert!(r.live_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_handle_observation_decodes_payload() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(session)))));
        let observation = BeaconObservation::new(encode(&session).unwrap()).with_rssi(-60);

        let outcome = r.handle_observation(&observation, Instant::now()).await;
        assert!(matches!(outcome, ObservationOutcome::Live { .. }));
    }

    #[tokio::test]
    async fn test_ttl_eviction_and_short_cooldown() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(session)))));
        let t0 = Instant::now();

        r.observe_session(session, t0).await;
        assert!(r.sweep(t0 + Duration::from_secs(8)).is_empty());

        let evicted_at = t0 + Duration::from_millis(8_001);
        assert_eq!(r.sweep(evicted_at), vec![course]);
        assert!(r.live_session(&course).is_none());
        assert_eq!(r.cached_routes(), 0);
        assert!(r.is_blacklisted(&session, evicted_at + Duration::from_secs(9)));
        assert!(!r.is_blacklisted(&session, evicted_at + Duration::from_secs(10)));

        // After the cool-down the same beacon is admitted again
        let outcome = r
            .observe_session(session, evicted_at + Duration::from_secs(10))
            .await;
        assert!(matches!(outcome, ObservationOutcome::Live { changed: true, .. }));
    }

    #[tokio::test]
    async fn test_new_session_replaces_and_clears_registration() {
        let course = CourseId::new_v4();
        let first = SessionId::new_v4();
        let second = SessionId::new_v4();
        let active = Arc::new(Mutex::new(Some(first)));

        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .returning(move |id| Ok(info(id, course, "Algebra")));
        let active_clone = active.clone();
        mock.expect_active_session_id()
            .returning(move |_| Ok(*active_clone.lock()));
        mock.expect_is_registered()
            .returning(move |id, _| Ok(id == first));
        let r = reconciler(mock);
        let now = Instant::now();

        r.observe_session(first, now).await;
        assert!(r.is_registered(&course));

        *active.lock() = Some(second);
        let outcome = r.observe_session(second, now + Duration::from_secs(1)).await;

        assert!(matches!(outcome, ObservationOutcome::Live { changed: true, .. }));
        assert_eq!(r.live_session(&course).unwrap().session_id, second);
        assert!(!r.is_registered(&course));
    }

    #[tokio::test]
    async fn test_cached_route_skips_resolution_but_still_verifies() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .times(1)
            .returning(move |id| Ok(info(id, course, "Algebra")));
        mock.expect_active_session_id()
            .times(3)
            .returning(move |_| Ok(Some(session)));
        mock.expect_is_registered().times(1).returning(|_, _| Ok(false));
        let r = reconciler(mock);
        let now = Instant::now();

        for i in 0..3 {
            r.observe_session(session, now + Duration::from_secs(i)).await;
        }
    }

    struct StubClient {
        result: Result<(), LedgerError>,
    }

    #[async_trait]
    impl AttendanceClient for StubClient {
        async fn register_attendance(
            &self,
            _session_id: SessionId,
            _student_id: StudentId,
        ) -> Result<(), LedgerError> {
            self.result.clone()
        }

        async fn remove_attendance(
            &self,
            _session_id: SessionId,
            _student_id: StudentId,
        ) -> Result<(), LedgerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_presence_requires_live_session() {
        let r = reconciler(MockSessionDirectory::new());
        let client = StubClient { result: Ok(()) };
        let course = CourseId::new_v4();

        assert_eq!(
            r.register_presence(&client, course).await,
            Err(PresenceError::NotLive(course))
        );
    }

    #[tokio::test]
    async fn test_register_presence_outcomes() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let r = reconciler(directory_for(course, Arc::new(Mutex::new(Some(session)))));
        r.observe_session(session, Instant::now()).await;

        let ok = StubClient { result: Ok(()) };
        assert_eq!(
            r.register_presence(&ok, course).await,
            Ok(PresenceOutcome::Registered)
        );
        assert!(r.is_registered(&course));

        let already = StubClient {
            result: Err(LedgerError::AlreadyRegistered {
                session_id: session,
                student_id: r.student_id(),
            }),
        };
        assert_eq!(
            r.register_presence(&already, course).await,
            Ok(PresenceOutcome::AlreadyRegistered)
        );

        let not_enrolled = StubClient {
            result: Err(LedgerError::NotEnrolled {
                student_id: r.student_id(),
                course_id: course,
            }),
        };
        assert!(matches!(
            r.register_presence(&not_enrolled, course).await,
            Err(PresenceError::Ledger(LedgerError::NotEnrolled { .. }))
        ));
    }

    #[tokio::test]
    async fn test_refresh_registration_tracks_backend() {
        let course = CourseId::new_v4();
        let session = SessionId::new_v4();
        let recorded = Arc::new(Mutex::new(false));

        let mut mock = MockSessionDirectory::new();
        mock.expect_resolve_session()
            .returning(move |id| Ok(info(id, course, "Algebra")));
        mock.expect_active_session_id()
            .returning(move |_| Ok(Some(session)));
        let recorded_clone = recorded.clone();
        mock.expect_is_registered()
            .returning(move |_, _| Ok(*recorded_clone.lock()));
        let r = reconciler(mock);

        r.observe_session(session, Instant::now()).await;
        assert!(!r.is_registered(&course));

        *recorded.lock() = true;
        assert!(r.refresh_registration(course).await.unwrap());
        assert!(r.is_registered(&course));

        *recorded.lock() = false;
        assert!(!r.refresh_registration(course).await.unwrap());
        assert!(!r.is_registered(&course));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReconcilerConfig {
            ttl_ms: 0,
            ..ReconcilerConfig::default()
        };
        let result = BeaconReconciler::new(
            Arc::new(MockSessionDirectory::new()),
            StudentId::new_v4(),
            config,
        );
        assert!(result.is_err());
    }
}
