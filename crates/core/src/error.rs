/// Result alias that carries the custom [`ScrubError`] type.
pub type Result<T> = std::result::Result<T, ScrubError>;

/// Common error type for the core crate.
///
/// Only loading and configuration surface errors to callers. Playback
/// operations on an engine that cannot honour them are logged and ignored.
#[derive(Debug, thiserror::Error)]
pub enum ScrubError {
    /// The audio resource could not be fetched over the network.
    #[error("failed to fetch `{url}`: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered, but not with a success status.
    #[error("fetching `{url}` returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    /// The payload is not audio symphonia can decode.
    #[error("could not decode audio: {0}")]
    Decode(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// An operation was called in a state that cannot honour it.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The audio output device could not be opened or driven.
    #[error("audio output failed: {0}")]
    Output(String),
    /// Free-form error message.
    #[error("{0}")]
    Message(String),
}

impl ScrubError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<symphonia::core::errors::Error> for ScrubError {
    fn from(value: symphonia::core::errors::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<&str> for ScrubError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ScrubError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
