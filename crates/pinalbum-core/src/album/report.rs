use thiserror::Error;

use crate::api::{ApiError, ErrorKind};

/// Where an album session is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LoadingIndex,
    PopulatingPlaceholders,
    FetchingImages,
    Settled,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::LoadingIndex => write!(f, "loading photo list"),
            SessionState::PopulatingPlaceholders => write!(f, "preparing album"),
            SessionState::FetchingImages => write!(f, "downloading photos"),
            SessionState::Settled => write!(f, "settled"),
        }
    }
}

/// Per-image tally for one settled page load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl FetchSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Every dispatched image fetch finished, successfully or not.
    Completed(FetchSummary),
    /// The search returned no photos.
    Empty,
    /// The photo list could not be fetched; the cache was left as it was.
    IndexFailed(ApiError),
    /// A newer load started before this one settled; its results were discarded.
    Superseded,
}

/// Result of one `load_page`/`reset_and_load`/`next_page` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub generation: u64,
    pub page: u32,
    pub outcome: LoadOutcome,
}

impl LoadReport {
    pub fn summary(&self) -> Option<FetchSummary> {
        match self.outcome {
            LoadOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Something the UI should tell the user once a load settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    EmptyResult,
    IndexFailed { kind: ErrorKind, message: String },
}

impl std::fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionNotice::EmptyResult => write!(f, "No images were found"),
            SessionNotice::IndexFailed { kind, message } => write!(f, "{}: {}", kind, message),
        }
    }
}

impl From<&ApiError> for SessionNotice {
    fn from(e: &ApiError) -> Self {
        SessionNotice::IndexFailed {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Album is {0}; photos can only be deleted once it has settled")]
    NotSettled(SessionState),
}
