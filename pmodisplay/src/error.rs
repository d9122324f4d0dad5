//! Error types for the display client

/// Result type alias for display operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching the catalog or driving a player
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog server answered with a non-success status
    #[error("Catalog server returned status {0}")]
    Status(u16),

    /// Catalog payload is well-formed JSON but not a valid catalog
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The media player failed
    #[error("Player error: {0}")]
    Player(String),

    /// The media player does not support the operation
    #[error("Operation not supported by player: {0}")]
    Unsupported(&'static str),

    /// No media player is attached
    #[error("No player attached")]
    NoPlayer,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a player error from a string
    pub fn player(msg: impl Into<String>) -> Self {
        Self::Player(msg.into())
    }
}
