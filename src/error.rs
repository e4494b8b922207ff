use thiserror::Error;

use crate::types::WatchedEntityId;

/// Failure fetching live state for a single fixture. Skips that game only.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request for fixture {fixture_id} failed: {source}")]
    Transport {
        fixture_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fixture {fixture_id}: provider returned HTTP {status}")]
    Status { fixture_id: String, status: u16 },

    #[error("fixture {fixture_id}: malformed payload: {reason}")]
    Malformed { fixture_id: String, reason: String },
}

/// Resource store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("form {0} not found")]
    NotFound(WatchedEntityId),

    #[error("form {form_id} has no game with fixture {fixture_id}")]
    GameNotFound {
        form_id: WatchedEntityId,
        fixture_id: String,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Why a poll cycle did not complete.
#[derive(Error, Debug)]
pub enum CycleError {
    /// The watched form is gone. Terminal for its loop.
    #[error("form {0} no longer exists")]
    EntityGone(WatchedEntityId),

    /// Anything else. The loop sleeps and retries.
    #[error("transient cycle failure: {0}")]
    Transient(#[source] StoreError),
}

impl From<StoreError> for CycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CycleError::EntityGone(id),
            other => CycleError::Transient(other),
        }
    }
}

/// Errors surfaced to callers of the orchestrator.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("invalid form id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("monitor is shut down")]
    ShutDown,
}
