use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use thiserror::Error;

/// Why a login attempt was refused. The two cases answer with different
/// messages, which tells a caller whether an email is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NotFound,
    BadCredentials,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("Пользователь не найден"),
            Self::BadCredentials => f.write_str("Неверный пароль"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Auth(AuthFailure),

    #[error("Нет токена")]
    MissingToken,

    #[error("Неверный токен")]
    InvalidToken,

    #[error("Доступ запрещен")]
    Forbidden,

    #[error("Книга не найдена")]
    BookNotFound,

    #[error("Книга недоступна для покупки")]
    NotPurchasable,

    #[error("Аренда недоступна для этой книги/периода")]
    NotRentable,

    #[error("Неверный период аренды")]
    InvalidPeriod,

    /// An admin write refused before or by the store.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Store(#[from] rusqlite::Error),

    #[error("{0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Internal(String),
}

/// Which key the JSON error body uses. Both shapes are part of the public
/// contract and clients match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKey {
    Message,
    Error,
}

impl BodyKey {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Error => "error",
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::Auth(_)
            | Self::NotPurchasable
            | Self::NotRentable
            | Self::InvalidPeriod
            | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BookNotFound => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Hash(_) | Self::Token(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body_key(&self) -> BodyKey {
        match self {
            Self::Conflict(_)
            | Self::Rejected(_)
            | Self::Store(_)
            | Self::Hash(_)
            | Self::Token(_)
            | Self::Internal(_) => BodyKey::Error,
            _ => BodyKey::Message,
        }
    }

    /// Store errors raised by an admin write answer 400 rather than 500.
    pub fn into_rejection(self) -> Self {
        match self {
            Self::Store(err) => Self::Rejected(err.to_string()),
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("[api] {}", self);
        }
        let mut body = serde_json::Map::new();
        body.insert(self.body_key().as_str().to_string(), Value::String(self.to_string()));
        (status, Json(Value::Object(body))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_map_to_auth_statuses() {
        assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn login_failures_keep_distinct_messages() {
        assert_eq!(
            AppError::Auth(AuthFailure::NotFound).to_string(),
            "Пользователь не найден"
        );
        assert_eq!(
            AppError::Auth(AuthFailure::BadCredentials).to_string(),
            "Неверный пароль"
        );
    }

    #[test]
    fn body_key_follows_error_kind() {
        assert_eq!(AppError::BookNotFound.body_key(), BodyKey::Message);
        assert_eq!(AppError::Conflict("dup".into()).body_key(), BodyKey::Error);
        let rejected = AppError::Store(rusqlite::Error::QueryReturnedNoRows).into_rejection();
        assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.body_key(), BodyKey::Error);
    }
}
