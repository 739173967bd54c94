//! Boundary to the persistence collaborator.
//!
//! The engine only needs three lifecycle calls (`begin`, `append_frame`,
//! `finalize`) plus read-side history queries. [`InMemoryStore`] implements
//! them for tests and the command line replay.

use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{ExerciseType, FrameRecord, MotionError, Result, SessionSummary, Severity};

/// Identifier assigned to a session by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: SessionId,
    pub patient_id: u64,
    pub exercise: ExerciseType,
    pub started_at: f64,
    pub ended_at: Option<f64>,
    pub total_reps: u32,
    pub correct_reps: u32,
    pub accuracy: f64,
    pub duration_seconds: u64,
}

/// Persisted per-session error aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub session_id: SessionId,
    pub error_name: String,
    pub count: u32,
    pub severity: Severity,
}

/// Lifecycle calls into the external persistence collaborator.
pub trait SessionStore: Send + Sync {
    /// Creates a session row and returns its id.
    fn begin(&self, patient_id: u64, exercise: ExerciseType, started_at: f64) -> Result<SessionId>;

    /// Records one processed frame.
    fn append_frame(&self, session_id: SessionId, frame: &FrameRecord) -> Result<()>;

    /// Writes the summary onto the session row plus one row per distinct
    /// error name.
    fn finalize(&self, session_id: SessionId, summary: &SessionSummary, ended_at: f64) -> Result<()>;

    /// Sessions of `patient_id`, most recent first, at most `limit` rows.
    fn history(&self, patient_id: u64, limit: usize) -> Result<Vec<SessionRow>>;

    /// Error rows recorded for `session_id`.
    fn errors(&self, session_id: SessionId) -> Result<Vec<ErrorRow>>;
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    sessions: Vec<SessionRow>,
    errors: Vec<ErrorRow>,
    frames: HashMap<SessionId, Vec<FrameRecord>>,
}

/// Thread-safe store kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, session_id: SessionId) -> Result<Option<SessionRow>> {
        let state = self.lock()?;
        Ok(state.sessions.iter().find(|row| row.id == session_id).cloned())
    }

    pub fn frames(&self, session_id: SessionId) -> Result<Vec<FrameRecord>> {
        let state = self.lock()?;
        Ok(state.frames.get(&session_id).cloned().unwrap_or_default())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| MotionError::Poisoned("session store"))
    }
}

impl SessionStore for InMemoryStore {
    fn begin(&self, patient_id: u64, exercise: ExerciseType, started_at: f64) -> Result<SessionId> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = SessionId(state.next_id);
        state.sessions.push(SessionRow {
            id,
            patient_id,
            exercise,
            started_at,
            ended_at: None,
            total_reps: 0,
            correct_reps: 0,
            accuracy: 0.0,
            duration_seconds: 0,
        });
        Ok(id)
    }

    fn append_frame(&self, session_id: SessionId, frame: &FrameRecord) -> Result<()> {
        let mut state = self.lock()?;
        match state.sessions.iter().find(|row| row.id == session_id) {
            None => {
                return Err(MotionError::msg(format!("unknown session {session_id}")));
            }
            Some(row) if row.ended_at.is_some() => return Err(MotionError::SessionFinalized),
            Some(_) => {}
        }
        state.frames.entry(session_id).or_default().push(frame.clone());
        Ok(())
    }

    fn finalize(&self, session_id: SessionId, summary: &SessionSummary, ended_at: f64) -> Result<()> {
        let mut state = self.lock()?;
        let row = state
            .sessions
            .iter_mut()
            .find(|row| row.id == session_id)
            .ok_or_else(|| MotionError::msg(format!("unknown session {session_id}")))?;
        if row.ended_at.is_some() {
            return Err(MotionError::SessionFinalized);
        }

        row.ended_at = Some(ended_at);
        row.total_reps = summary.total_reps;
        row.correct_reps = summary.correct_reps;
        row.accuracy = summary.accuracy;
        row.duration_seconds = summary.duration_seconds;

        let rows = summary.common_errors.iter().map(|stat| ErrorRow {
            session_id,
            error_name: stat.name.clone(),
            count: stat.count,
            severity: stat.severity,
        });
        state.errors.extend(rows);
        Ok(())
    }

    fn history(&self, patient_id: u64, limit: usize) -> Result<Vec<SessionRow>> {
        let state = self.lock()?;
        let mut rows: Vec<SessionRow> = state
            .sessions
            .iter()
            .filter(|row| row.patient_id == patient_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.started_at
                .total_cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    fn errors(&self, session_id: SessionId) -> Result<Vec<ErrorRow>> {
        let state = self.lock()?;
        Ok(state
            .errors
            .iter()
            .filter(|row| row.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AngleSet, ErrorStat};

    fn summary(errors: Vec<ErrorStat>) -> SessionSummary {
        SessionSummary {
            total_reps: 4,
            correct_reps: 3,
            accuracy: 80.0,
            duration_seconds: 60,
            frame_count: 10,
            common_errors: errors,
        }
    }

    #[test]
    fn finalize_writes_session_and_error_rows() {
        let store = InMemoryStore::new();
        let id = store.begin(7, ExerciseType::Squat, 10.0).unwrap();

        let stats = vec![
            ErrorStat {
                name: "Not deep enough".to_string(),
                count: 5,
                severity: Severity::High,
            },
            ErrorStat {
                name: "Not standing straight".to_string(),
                count: 2,
                severity: Severity::Medium,
            },
        ];
        store.finalize(id, &summary(stats), 70.0).unwrap();

        let row = store.session(id).unwrap().unwrap();
        assert_eq!(row.ended_at, Some(70.0));
        assert_eq!(row.total_reps, 4);
        assert_eq!(store.errors(id).unwrap().len(), 2);

        assert!(matches!(
            store.finalize(id, &summary(Vec::new()), 80.0),
            Err(MotionError::SessionFinalized)
        ));
    }

    #[test]
    fn frames_rejected_after_finalize() {
        let store = InMemoryStore::new();
        let id = store.begin(1, ExerciseType::ArmRaise, 0.0).unwrap();
        let frame = FrameRecord {
            timestamp: 0.5,
            rep_count: 0,
            angles: AngleSet::new(),
            errors: Vec::new(),
        };
        store.append_frame(id, &frame).unwrap();
        store.finalize(id, &summary(Vec::new()), 1.0).unwrap();

        assert!(store.append_frame(id, &frame).is_err());
        assert_eq!(store.frames(id).unwrap().len(), 1);
        assert!(store.append_frame(SessionId(99), &frame).is_err());
    }

    #[test]
    fn history_is_most_recent_first_and_limited() {
        let store = InMemoryStore::new();
        let first = store.begin(3, ExerciseType::Squat, 1.0).unwrap();
        let second = store.begin(3, ExerciseType::ArmRaise, 5.0).unwrap();
        let _other_patient = store.begin(4, ExerciseType::Squat, 9.0).unwrap();
        let third = store.begin(3, ExerciseType::SingleLegStand, 3.0).unwrap();

        let ids: Vec<_> = store.history(3, 10).unwrap().iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![second, third, first]);

        assert_eq!(store.history(3, 1).unwrap().len(), 1);
        assert!(store.history(5, 10).unwrap().is_empty());
    }
}
