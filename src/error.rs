use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::models::{InvalidTargetError, UnscopedDiscussion};
use crate::repo::RepoError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    #[error("bad request: {0}")] BadRequest(String),
    #[error("{0}")] Unauthorized(&'static str),
    #[error("forbidden")] Forbidden,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::Invalid(msg) => ApiError::BadRequest(msg),
            RepoError::Internal(msg) => {
                log::error!("repository failure: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl From<InvalidTargetError> for ApiError {
    fn from(e: InvalidTargetError) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl From<UnscopedDiscussion> for ApiError {
    fn from(e: UnscopedDiscussion) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}

/// Failures seen by the client core. Apart from `InvalidTarget`, every
/// variant means "the operation did not apply"; nothing is retried.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTargetError),
    #[error("{operation}: network failure: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation}: rejected with status {status}: {message}")]
    Rejected {
        operation: &'static str,
        status: u16,
        message: String,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// True for failures worth a passing notice rather than a form error.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ClientError::InvalidTarget(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            ClientError::Network { source, .. } => source.status().map(|s| s.as_u16()),
            ClientError::InvalidTarget(_) => None,
        }
    }

    /// Short text for a user-visible notice.
    pub fn notice(&self) -> String {
        match self {
            ClientError::InvalidTarget(_) => "Nothing to vote on.".into(),
            ClientError::Rejected { status: 401, .. } => "Please sign in to continue.".into(),
            ClientError::Rejected { status: 403, .. } => "You are not allowed to do that.".into(),
            ClientError::Rejected { status: 404, .. } => "That post no longer exists.".into(),
            ClientError::Rejected { .. } | ClientError::Network { .. } => {
                "Something went wrong, your change was not saved.".into()
            }
        }
    }
}
