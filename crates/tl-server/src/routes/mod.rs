//! Route handlers for the HTTP API.

pub mod admin;
pub mod health;
pub mod progress;
pub mod uploads;

use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Attach the request id to an error on its way out.
pub(crate) fn reject(request_id: &RequestId) -> impl Fn(tl_core::Error) -> AppError + '_ {
    move |e| AppError::new(e).with_request_id(request_id.0.clone())
}
