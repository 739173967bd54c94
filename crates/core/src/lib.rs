//! Core library for the Rehab Motion analysis engine.
//!
//! The crate turns a stream of skeletal landmarks into repetition counts,
//! debounced posture feedback and end-of-session statistics. Each module owns
//! one stage of that pipeline (geometry, counting, posture rules, session
//! aggregation) and the [`SessionManager`] ties them to the persistence
//! collaborator behind [`SessionStore`].

pub mod analyzer;
pub mod angles;
pub mod clock;
pub mod config;
pub mod counter;
pub mod error;
pub mod feedback;
pub mod landmark;
pub mod manager;
pub mod posture;
pub mod profile;
pub mod protocol;
pub mod session;
pub mod store;

pub use analyzer::{
    ExerciseAnalyzer, FrameAnalysis, FrameGate, PoseDetails, ProcessedFrame, SingleLegExtras,
};
pub use angles::{AngleCalculator, AngleSet, ExerciseInfo, ExerciseType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, EngineConfig, ProfileConfig};
pub use counter::{ExerciseState, RaiseLowerCounter, RepCounter, Side, SingleLegCounter};
pub use error::{MotionError, Result};
pub use landmark::{Landmark, LandmarkEntry, PoseLandmark, Skeleton, SKELETON_SIZE};
pub use manager::SessionManager;
pub use posture::{ErrorDetector, ErrorRecord, PostureError, Severity};
pub use profile::{ExerciseProfile, RaiseLowerProfile, SingleLegProfile};
pub use protocol::{decode_client_message, encode_server_message, ClientMessage, ServerMessage};
pub use session::{ErrorStat, FrameLog, FrameRecord, SessionAggregator, SessionSummary};
pub use store::{ErrorRow, InMemoryStore, SessionId, SessionRow, SessionStore};
