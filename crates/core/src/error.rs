/// Result alias that carries the custom [`MotionError`] type.
pub type Result<T> = std::result::Result<T, MotionError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    /// Free-form failure that does not warrant its own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation failures.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The requested exercise has no angle schema, counter or rule table.
    #[error("unsupported exercise `{0}`")]
    UnsupportedExercise(String),
    /// A frame could not be decoded into a usable skeleton.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// Caller supplied a value outside the accepted domain.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The session log was already summarised and no longer accepts writes.
    #[error("session has already been finalized")]
    SessionFinalized,
    /// A shared lock was poisoned by a panicking holder.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
}

impl MotionError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Frame-level errors that only cost the current frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_) | Self::InvalidInput(_) | Self::SessionFinalized
        )
    }
}

impl From<&str> for MotionError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MotionError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
