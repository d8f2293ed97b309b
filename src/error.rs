/// error.rs — Publish failure taxonomy.
use axum::http::StatusCode;
use std::io;

/// Every way a publish attempt can fail. All variants are terminal for the
/// current attempt; there is no partial-success result.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("uploaded file is not a zip archive")]
    NotAnArchive,

    #[error("archive could not be parsed: {0}")]
    MalformedArchive(String),

    #[error("publish target could not be prepared: {source}")]
    PublishTarget { source: io::Error },

    #[error("entry '{entry}' escapes the publish target")]
    PathTraversal { entry: String },

    #[error("no {expected} found in archive")]
    MissingEntryPoint { expected: String },

    #[error("multiple candidate roots for {expected}: {candidates:?}")]
    AmbiguousLayout {
        expected: String,
        candidates: Vec<String>,
    },

    #[error("failed to write '{path}': {source}")]
    Write { path: String, source: io::Error },
}

impl PublishError {
    /// Stable machine-readable code carried in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAnArchive => "NotAnArchive",
            Self::MalformedArchive(_) => "MalformedArchive",
            Self::PublishTarget { .. } => "PublishTargetError",
            Self::PathTraversal { .. } => "PathTraversal",
            Self::MissingEntryPoint { .. } => "MissingEntryPoint",
            Self::AmbiguousLayout { .. } => "AmbiguousLayout",
            Self::Write { .. } => "WriteError",
        }
    }

    /// Client mistakes are 4xx; infrastructure failures are 5xx.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PublishTarget { .. } | Self::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Actionable hint for the uploader, when one exists.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotAnArchive => Some("upload a .zip archive".to_string()),
            Self::MissingEntryPoint { expected } => {
                Some(format!("expected {expected} at archive root"))
            }
            Self::AmbiguousLayout { expected, .. } => Some(format!(
                "keep exactly one {expected} at the shallowest level of the archive"
            )),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
