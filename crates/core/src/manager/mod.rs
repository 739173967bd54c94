use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    AppConfig, ClientMessage, Clock, ExerciseAnalyzer, ExerciseType, FrameAnalysis, FrameLog,
    FrameRecord, MotionError, Result, ServerMessage, SessionId, SessionStore, SessionSummary,
    Skeleton,
};

/// State owned by one running session. Never shared across sessions.
#[derive(Debug)]
struct ActiveSession {
    patient_id: u64,
    exercise: ExerciseType,
    started_at: f64,
    analyzer: ExerciseAnalyzer,
    log: FrameLog,
}

type SessionSlot = Arc<Mutex<ActiveSession>>;

/// Routes frames to per-session analyzers and drives the persistence
/// lifecycle.
///
/// Each session sits behind its own mutex: frames for one session are
/// processed strictly in order, a reset lands between two frames, and
/// different sessions proceed in parallel.
pub struct SessionManager<S: SessionStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, AppConfig::default())
    }

    pub fn with_config(store: Arc<S>, clock: Arc<dyn Clock>, config: AppConfig) -> Self {
        Self {
            store,
            clock,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Starts a session for `patient_id`. Unknown exercise names are
    /// rejected before anything is persisted.
    pub fn begin(&self, patient_id: u64, exercise_name: &str) -> Result<SessionId> {
        let exercise = exercise_name.parse::<ExerciseType>()?;
        let analyzer = ExerciseAnalyzer::with_config(exercise, &self.config)?;
        let started_at = self.clock.now();
        let id = self.store.begin(patient_id, exercise, started_at)?;

        let session = ActiveSession {
            patient_id,
            exercise,
            started_at,
            analyzer,
            log: FrameLog::new(),
        };
        self.write_sessions()?
            .insert(id, Arc::new(Mutex::new(session)));

        tracing::info!(session = %id, patient_id, %exercise, "session started");
        Ok(id)
    }

    pub fn is_active(&self, id: SessionId) -> Result<bool> {
        Ok(self.read_sessions()?.contains_key(&id))
    }

    pub fn active_sessions(&self) -> Result<usize> {
        Ok(self.read_sessions()?.len())
    }

    /// Exercise and patient of a running session.
    pub fn describe(&self, id: SessionId) -> Result<Option<(ExerciseType, u64)>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let session = lock_session(&slot)?;
        Ok(Some((session.exercise, session.patient_id)))
    }

    /// Handles one decoded client message. Returns `None` when the message
    /// was dropped: an unknown session or an undecodable frame.
    pub fn handle_message(&self, id: SessionId, message: ClientMessage) -> Result<Option<ServerMessage>> {
        match message {
            ClientMessage::Frame {
                timestamp,
                landmarks: None,
            } => {
                if !self.is_active(id)? {
                    tracing::warn!(session = %id, "frame for inactive session ignored");
                    return Ok(None);
                }
                tracing::trace!(session = %id, ?timestamp, "no pose in frame");
                Ok(Some(ServerMessage::Analysis(FrameAnalysis::no_pose())))
            }
            ClientMessage::Frame {
                timestamp,
                landmarks: Some(entries),
            } => {
                let skeleton = match Skeleton::from_entries(&entries) {
                    Ok(skeleton) => skeleton,
                    Err(err) => {
                        tracing::debug!(session = %id, error = %err, "skipping frame");
                        return Ok(None);
                    }
                };
                Ok(self
                    .analyze(id, &skeleton, timestamp)?
                    .map(ServerMessage::Analysis))
            }
            ClientMessage::Reset => Ok(self
                .reset(id)?
                .then_some(ServerMessage::ResetConfirmed)),
        }
    }

    /// Analyses one frame and appends it to the session log.
    pub fn process_frame(
        &self,
        id: SessionId,
        skeleton: &Skeleton,
        timestamp: f64,
    ) -> Result<Option<FrameAnalysis>> {
        self.analyze(id, skeleton, Some(timestamp))
    }

    /// Appends an externally produced frame record to the session log.
    /// Appending to an unknown or finished session is ignored.
    pub fn append_frame(&self, id: SessionId, record: FrameRecord) -> Result<()> {
        let Some(slot) = self.slot(id)? else {
            tracing::warn!(session = %id, "append for inactive session ignored");
            return Ok(());
        };
        let mut session = lock_session(&slot)?;
        if session.log.is_finalized() {
            tracing::warn!(session = %id, "append for finished session ignored");
            return Ok(());
        }
        self.store.append_frame(id, &record)?;
        session.log.append(record)
    }

    /// Clears the session's counter and debounce state. Returns `false`
    /// when no such session is running.
    pub fn reset(&self, id: SessionId) -> Result<bool> {
        let Some(slot) = self.slot(id)? else {
            tracing::warn!(session = %id, "reset for inactive session ignored");
            return Ok(false);
        };
        let mut session = lock_session(&slot)?;
        if session.log.is_finalized() {
            tracing::warn!(session = %id, "reset for finished session ignored");
            return Ok(false);
        }
        session.analyzer.reset();
        tracing::info!(session = %id, "session reset");
        Ok(true)
    }

    /// Ends the session, persists its summary and drops its state. Ending an
    /// unknown or already finished session is a no-op that returns `None`.
    pub fn finalize(&self, id: SessionId) -> Result<Option<SessionSummary>> {
        let Some(slot) = self.write_sessions()?.remove(&id) else {
            tracing::warn!(session = %id, "finalize for inactive session ignored");
            return Ok(None);
        };
        let mut session = lock_session(&slot)?;

        let ended_at = self.clock.now();
        let duration_seconds = (ended_at - session.started_at).max(0.0).floor() as u64;
        let summary = session.log.finalize(duration_seconds)?;
        self.store.finalize(id, &summary, ended_at)?;

        tracing::info!(
            session = %id,
            total_reps = summary.total_reps,
            accuracy = summary.accuracy,
            duration_seconds,
            "session finalized"
        );
        Ok(Some(summary))
    }

    /// Runs one frame against a copy of the analyzer and only keeps the
    /// new analyzer state once the frame is persisted and logged.
    ///
    /// A frame without a timestamp is placed at the session-relative clock
    /// time, but never before the last logged frame.
    fn analyze(
        &self,
        id: SessionId,
        skeleton: &Skeleton,
        timestamp: Option<f64>,
    ) -> Result<Option<FrameAnalysis>> {
        let Some(slot) = self.slot(id)? else {
            tracing::warn!(session = %id, "frame for inactive session ignored");
            return Ok(None);
        };
        let mut session = lock_session(&slot)?;
        if session.log.is_finalized() {
            tracing::warn!(session = %id, "frame for finished session ignored");
            return Ok(None);
        }

        let timestamp = timestamp.unwrap_or_else(|| {
            let elapsed = (self.clock.now() - session.started_at).max(0.0);
            session
                .log
                .latest()
                .map_or(elapsed, |last| elapsed.max(last.timestamp))
        });

        let mut analyzer = session.analyzer.clone();
        let processed = match analyzer.process(skeleton, timestamp) {
            Ok(processed) => processed,
            Err(err) if err.is_recoverable() => {
                tracing::debug!(session = %id, error = %err, "skipping frame");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match self.store.append_frame(id, &processed.record) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                tracing::warn!(session = %id, error = %err, "store rejected frame");
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
        session.log.append(processed.record)?;
        session.analyzer = analyzer;
        Ok(Some(processed.analysis))
    }

    fn slot(&self, id: SessionId) -> Result<Option<SessionSlot>> {
        Ok(self.read_sessions()?.get(&id).cloned())
    }

    fn read_sessions(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionId, SessionSlot>>> {
        self.sessions
            .read()
            .map_err(|_| MotionError::Poisoned("session registry"))
    }

    fn write_sessions(&self) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, SessionSlot>>> {
        self.sessions
            .write()
            .map_err(|_| MotionError::Poisoned("session registry"))
    }
}

fn lock_session(slot: &SessionSlot) -> Result<MutexGuard<'_, ActiveSession>> {
    slot.lock().map_err(|_| MotionError::Poisoned("session"))
}

impl<S: SessionStore> fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.sessions.read().map(|map| map.len()).unwrap_or(0);
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("active_sessions", &active)
            .finish()
    }
}
