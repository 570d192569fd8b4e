//! HTTP handlers. Each one unpacks the request, calls a service, and maps the
//! result; status codes come from [`crate::error::Error`].

pub mod health;
pub mod jwks;
pub mod notifications;
pub mod permissions;
pub mod recovery;
pub mod token;
pub mod users;

use crate::error::{Error, Result};
use axum::Json;

/// Unwrap an optional JSON body, rejecting requests that sent none.
pub(crate) fn require_payload<T>(payload: Option<Json<T>>) -> Result<T> {
    payload
        .map(|Json(payload)| payload)
        .ok_or_else(|| Error::validation("Missing payload"))
}
