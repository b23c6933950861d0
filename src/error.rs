use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Generation timed out: {0}")]
    PollTimeout(String),

    #[error("Precondition not met: {0}")]
    Precondition(String),

    #[error("Another generation is already in flight for {0}")]
    Busy(String),

    #[error("Chat protocol error: {0}")]
    Protocol(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error came from the remote gateway rather than local state.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Error::Gateway(_) | Error::Request(_))
    }

    /// The message shown to the user in the transient notification slot.
    pub fn user_message(&self) -> String {
        match self {
            Error::PollTimeout(_) => {
                "Generation is taking longer than expected. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}
