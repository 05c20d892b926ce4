use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichError {
    /// Credential exchange failed; the batch never starts.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The catalog service answered with a structured error list.
    #[error("Remote error: {message}")]
    Remote { message: String },

    #[error("No catalog entry found for {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    Parse(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("A batch is already running")]
    BatchInProgress,
}

impl EnrichError {
    /// Short stable label for logs, metrics and events.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichError::Auth(_) => "auth",
            EnrichError::Remote { .. } => "remote",
            EnrichError::NotFound(_) => "not_found",
            EnrichError::Transport(_) => "transport",
            EnrichError::Persistence(_) => "persistence",
            EnrichError::Parse(_) => "parse",
            EnrichError::Json(_) => "json",
            EnrichError::Toml(_) => "toml",
            EnrichError::Io(_) => "io",
            EnrichError::Config(_) => "config",
            EnrichError::Cancelled => "cancelled",
            EnrichError::BatchInProgress => "batch_in_progress",
        }
    }
}

impl From<csv::Error> for EnrichError {
    fn from(e: csv::Error) -> Self {
        EnrichError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;
