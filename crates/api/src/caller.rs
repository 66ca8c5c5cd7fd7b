//! Caller identity extractor.
//!
//! The upstream auth layer resolves the session and forwards the caller as
//! `x-caller-role` / `x-caller-id` headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use domain::{CallerContext, CallerRole};

use crate::error::ApiError;

pub const ROLE_HEADER: &str = "x-caller-role";
pub const ID_HEADER: &str = "x-caller-id";

/// The authenticated caller of a request.
///
/// A missing role header means a customer; staff roles must carry an ID.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerContext);

impl Caller {
    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let header = |name: &str| -> Result<Option<String>, ApiError> {
            headers
                .get(name)
                .map(|v| {
                    v.to_str()
                        .map(|s| s.trim().to_string())
                        .map_err(|_| ApiError::BadRequest(format!("{name} header is not valid text")))
                })
                .transpose()
        };

        let role = match header(ROLE_HEADER)? {
            Some(label) => CallerRole::from_label(&label)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown caller role: {label}")))?,
            None => CallerRole::Customer,
        };
        let id = header(ID_HEADER)?.filter(|id| !id.is_empty());

        let id = match (role, id) {
            (_, Some(id)) => id,
            (CallerRole::Customer, None) => String::new(),
            (_, None) => {
                return Err(ApiError::BadRequest(format!(
                    "{ID_HEADER} header is required for staff callers"
                )));
            }
        };

        Ok(Caller(CallerContext::new(role, id)))
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}
