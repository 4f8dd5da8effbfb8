use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use sizak_core::error::{ChatError, GuardError, Locale, StoreError};

/// Everything a handler can fail with, already knowing how to render itself.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Chat failures never expose detail; the body is the localized copy.
    #[error("{error}")]
    Chat { error: ChatError, locale: Locale },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn chat(error: impl Into<ChatError>, locale: Locale) -> Self {
        Self::Chat {
            error: error.into(),
            locale,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Chat { error, locale } => {
                error!("Chat request failed: {}", error);
                let message = error.user_message(locale);
                match error {
                    ChatError::Guard(GuardError::RateLimited { retry_after_secs }) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        [(header::RETRY_AFTER, retry_after_secs.to_string())],
                        message,
                    )
                        .into_response(),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
                }
            }
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)).into_response(),
            ApiError::Store(e) => {
                error!("Store query failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.message).into_response()
            }
        }
    }
}
