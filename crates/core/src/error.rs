/// Result alias that carries the custom [`SceneError`] type.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Error type returned by user callbacks and setup functions.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The listener name does not match any recognised event.
    #[error("`{0}` is not a valid event name")]
    UnknownEvent(String),
    /// A listener is already registered for this event.
    #[error("`{0}` is already defined")]
    DuplicateListener(String),
    /// Durations must be finite and non-negative.
    #[error("duration must be a non-negative number of seconds, got {0}")]
    InvalidDuration(f64),
    /// The event slot cannot be filled through configuration.
    #[error("`{0}` cannot be registered as a listener; bind the setup function instead")]
    ReservedEvent(String),
    /// The key was never set on the scene.
    #[error("`{0}` is not in the scene data")]
    KeyNotFound(String),
    /// The key exists but holds a different kind of value.
    #[error("`{key}` holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A shared toolkit resource is already borrowed, typically because
    /// `show()` was called re-entrantly from a callback.
    #[error("{0} is already in use")]
    SurfaceBusy(&'static str),
    /// A user callback or setup function failed; the scene was aborted.
    #[error("`{event}` callback failed: {source}")]
    Callback {
        event: String,
        #[source]
        source: CallbackError,
    },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SceneError {
    /// Returns `true` for errors raised while validating a scene
    /// configuration, before anything is drawn.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownEvent(_)
                | Self::DuplicateListener(_)
                | Self::InvalidDuration(_)
                | Self::ReservedEvent(_)
        )
    }

    pub(crate) fn callback(event: impl ToString, source: CallbackError) -> Self {
        Self::Callback {
            event: event.to_string(),
            source,
        }
    }
}
