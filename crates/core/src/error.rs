/// Result alias that carries the custom [`MidiSyncError`] type.
pub type Result<T> = std::result::Result<T, MidiSyncError>;

/// Common error type for the core crate.
///
/// Nothing in here is fatal for the host: every variant describes a failure
/// the caller can recover from by leaving the port closed.
#[derive(Debug, thiserror::Error)]
pub enum MidiSyncError {
    /// The requested port index is outside the current enumeration.
    #[error("invalid MIDI port {index} (only {count} available)")]
    InvalidPort { index: i32, count: usize },
    /// The platform driver refused to open or close a port.
    #[error("MIDI driver error: {0}")]
    Driver(String),
    /// The native capture capability is not present. Backend selection
    /// consumes this variant and falls back instead of surfacing it.
    #[error("native MIDI capture unavailable: {0}")]
    NoCapability(String),
    /// The active backend does not implement the requested operation.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
    /// Invalid configuration values.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Free-form message for the application layer.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl MidiSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a driver error from anything printable.
    pub fn driver<E: std::fmt::Display>(err: E) -> Self {
        Self::Driver(err.to_string())
    }
}

impl From<&str> for MidiSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MidiSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<serde_json::Error> for MidiSyncError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}
