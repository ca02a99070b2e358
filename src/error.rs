use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use utoipa::ToSchema;

use crate::bump::BumpError;
use crate::repo::RepoError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] BadRequest(String),
    #[error("not logged in")] Unauthorized,
    #[error("staff only")] Forbidden,
    #[error("{0}")] NotFound(String),
    #[error("conflict")] Conflict,
    #[error("{0}")] Internal(String),
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("not found".into()),
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Internal(cause) => {
                tracing::error!("repository failure: {cause}");
                ApiError::Internal("internal error".into())
            }
        }
    }
}

impl From<BumpError> for ApiError {
    fn from(e: BumpError) -> Self {
        let msg = e.to_string();
        match e {
            BumpError::MissingParameter | BumpError::InvalidParameter(_) => ApiError::BadRequest(msg),
            BumpError::Disabled | BumpError::PostNotFound(_) | BumpError::ThreadNotFound { .. } => ApiError::NotFound(msg),
            BumpError::UpdateFailed { .. } | BumpError::Storage => ApiError::Internal(msg),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}
