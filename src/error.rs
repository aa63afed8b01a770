use thiserror::Error;

/// Failures reported by the browser automation layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("Failed to connect to WebDriver at {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Browser command failed: {0}")]
    Command(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors that abort a run (or, for `Notification`, a single delivery).
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login did not clear the redirect to the login page
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Reading or writing the persisted session artifact
    #[error("Session artifact error at {path}: {message}")]
    Session { path: String, message: String },

    #[error("Notification delivery failed: {0}")]
    Notification(String),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn session(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Session {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
