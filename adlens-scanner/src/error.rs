use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed disclosure payload: {0}")]
    Payload(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Payload(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a single candidate did not produce an ad record.
///
/// None of these abort a scan pass; the orchestrator turns them into counts.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractError {
    #[error("Not an ad")]
    NotAnAd,

    #[error("Timeout transitioning states")]
    Timeout,

    #[error("Couldn't find a toggle")]
    NoToggle,

    #[error("Couldn't find the ad's id")]
    NoId,

    #[error("Impossible state, BUG!")]
    Invariant,
}
