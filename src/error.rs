//! Error types.
//!
//! Internal plumbing (serial setup, file I/O, audio device enumeration) uses
//! [`anyhow::Result`] composed with `.context(...)`. The small set of errors
//! that can reach an HTTP caller are [`HouseError`], which serializes to a
//! JSON body via its [`IntoResponse`] impl.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "detail")]
pub enum HouseError {
    #[error("unknown door: {0}")]
    UnknownDoor(String),

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    #[error("house is already active")]
    AlreadyActive,

    #[error("system is not online")]
    NotOnline,
}

impl HouseError {
    fn status(&self) -> StatusCode {
        match self {
            HouseError::UnknownDoor(_) | HouseError::UnknownRoom(_) => StatusCode::BAD_REQUEST,
            HouseError::AlreadyActive | HouseError::NotOnline => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for HouseError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_door_is_bad_request() {
        let e = HouseError::UnknownDoor("Door9".into());
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn already_active_is_conflict() {
        assert_eq!(HouseError::AlreadyActive.status(), StatusCode::CONFLICT);
    }
}
