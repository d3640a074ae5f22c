use actix_web::{HttpResponse, error, http::StatusCode};

use crate::bus::BusError;
use crate::cache::CacheError;
use crate::client::ClientError;
use crate::database::DatabaseError;
use crate::models::responses::{ApiResponse, Empty};
use crate::scheduler::SchedulerError;

/// Top-level error for every booking operation. The first four variants are
/// the user-visible kinds; the rest wrap infrastructure failures and all map
/// to an internal server error.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl BookingError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Short kind tag carried in the response meta.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(err: serde_json::Error) -> Self {
        BookingError::Internal(format!("payload encoding failed: {err}"))
    }
}

impl error::ResponseError for BookingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Upstream details stay in the logs, not in the response body.
        let message = match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::Unauthorized(m) | Self::Internal(m) => {
                m.clone()
            }
            other => {
                tracing::error!("internal error: {other}");
                "internal server error".to_string()
            }
        };

        HttpResponse::build(status).json(ApiResponse::<Empty>::error(
            status.as_u16(),
            self.kind(),
            message,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visible_kinds_map_to_their_status() {
        let cases = [
            (BookingError::bad_request("x"), StatusCode::BAD_REQUEST),
            (BookingError::not_found("x"), StatusCode::NOT_FOUND),
            (BookingError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (
                BookingError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(error::ResponseError::status_code(&err), expected);
        }
    }
}
