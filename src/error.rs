use chrono::{DateTime, Utc};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything an engine operation can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input; the caller should correct it and try again.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The candidacy state machine does not allow this action from the current state,
    /// or the caller acted on a stale view.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// The voter's single ballot has already been recorded.
    #[error("Voter {0} has already voted")]
    AlreadyVoted(Id),
    /// The target of a ballot does not exist or is not approved.
    #[error("Candidate {0} cannot receive votes")]
    InvalidCandidate(Id),
    #[error("The election is not open for voting")]
    ElectionClosed,
    #[error("Election window must start before it ends (start {start}, end {end})")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Only raised by the HTTP surface; the engine assumes callers are authorized.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable, machine-readable name of this error's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::NotFound(_) => "not_found",
            Self::AlreadyVoted(_) => "already_voted",
            Self::InvalidCandidate(_) => "invalid_candidate",
            Self::ElectionClosed => "election_closed",
            Self::InvalidRange { .. } => "invalid_range",
            Self::Unauthorized(_) => "unauthorized",
            Self::Db(_) | Self::Storage(_) => "storage_failure",
        }
    }

    /// Should the caller retry (with backoff)? Only infrastructure failures qualify;
    /// every other kind would fail again identically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Db(_) | Self::Storage(_))
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::InvalidRange { .. } => Status::BadRequest,
            Self::InvalidTransition(_) | Self::AlreadyVoted(_) => Status::Conflict,
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidCandidate(_) => Status::UnprocessableEntity,
            Self::ElectionClosed | Self::Unauthorized(_) => Status::Forbidden,
            Self::Db(_) | Self::Storage(_) => Status::InternalServerError,
        }
    }
}

impl From<mongodb::bson::ser::Error> for Error {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::Storage(format!("could not encode document: {err}"))
    }
}

/// Error body sent to HTTP clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = req.local_cache(RequestId::next);
        if status.class() == StatusClass::ServerError {
            error!("req{id} failed: {self}");
        } else {
            debug!("req{id} refused: {self}");
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
