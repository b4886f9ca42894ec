use crate::complaint::ComplaintStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed submission. Raised before anything is written.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Status precondition failed: a concurrent mutation won, or the
    /// requested move is not a legal edge of the lifecycle.
    #[error("Invalid transition for complaint {complaint_id}: {from} -> {to}")]
    InvalidTransition {
        complaint_id: String,
        from: ComplaintStatus,
        to: ComplaintStatus,
    },

    #[error("Officer '{officer_id}' cannot manage resources outside city '{city_id}'")]
    OutOfScope { officer_id: String, city_id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Message safe to show a citizen or officer. Backend failures collapse
    /// into one generic line; the detail goes to the log instead.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(_)
            | Self::NotFound { .. }
            | Self::InvalidTransition { .. }
            | Self::OutOfScope { .. } => self.to_string(),
            Self::StoreUnavailable(_) | Self::Serialization(_) | Self::Other(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
