use http::{Method, StatusCode};
use thiserror::Error;

/// Failures of calls against the monitoring API.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{method} {path} failed: {source}")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("decoding response of {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A newer request for the same view started before this one finished.
    #[error("request superseded by a newer one")]
    Superseded,

    #[error("no remediation has been planned yet")]
    NoRemediationPlanned,
}

impl DashboardError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, DashboardError::Superseded)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DashboardError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
