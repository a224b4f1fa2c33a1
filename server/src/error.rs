use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::derive::Display;
use serde_json::json;

use crate::auth::jwt::AuthError;

pub type AppResult<T> = Result<T, AppError>;
pub type AppJsonResult<T> = AppResult<Json<T>>;

#[derive(Debug, Display)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
    RequestTimeout,
    TooManyRequests,
    DbError(sea_orm::error::DbErr),
    Unauthorized(String),
    /// The model answered, but not with the JSON shape the prompt asked for
    LlmFormat(String),
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        match error.status() {
            Some(StatusCode::BAD_REQUEST) => AppError::BadRequest(error.to_string()),
            Some(StatusCode::REQUEST_TIMEOUT) => AppError::RequestTimeout,
            Some(StatusCode::TOO_MANY_REQUESTS) => AppError::TooManyRequests,
            _ if error.is_timeout() => AppError::RequestTimeout,
            _ => AppError::Internal(error.into()),
        }
    }
}

impl From<sea_orm::error::DbErr> for AppError {
    fn from(error: sea_orm::error::DbErr) -> Self {
        AppError::DbError(error)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::LlmFormat(error.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenCreation => {
                AppError::Internal(anyhow::anyhow!("Error creating token"))
            }
            AuthError::InvalidToken => AppError::Unauthorized("Invalid Token".to_string()),
            AuthError::MissingCredentials => {
                AppError::Unauthorized("Missing credentials".to_string())
            }
        }
    }
}

fn error_body(code: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        code,
        Json(json!({"error": {
            "code": code.as_u16(),
            "message": message.into()
        }})),
    )
}

// This centralizes all different errors from our app in one place
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::BadRequest(error) => error_body(StatusCode::BAD_REQUEST, error),
            AppError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::RequestTimeout => {
                error_body(StatusCode::REQUEST_TIMEOUT, "Request took too long")
            }
            AppError::TooManyRequests => {
                error_body(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
            }
            AppError::Unauthorized(error) => error_body(StatusCode::UNAUTHORIZED, error),
            AppError::DbError(err) => {
                tracing::error!("Database error: {:?}", err);
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            AppError::LlmFormat(err) => {
                tracing::error!("Malformed LLM answer: {}", err);
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The AI failed to return a proper JSON format",
                )
            }
        };
        tracing::debug!("Error response: {:?}", err.1);

        err.into_response()
    }
}
