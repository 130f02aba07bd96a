//! Custom Axum extractors.
//!
//! - `AuthenticatedOperator`: the back-office operator behind a privileged
//!   request, taken from headers set by the authenticating proxy

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use eventpass_core::{Operator, OperatorId};

/// Header carrying the operator id.
pub const OPERATOR_ID_HEADER: &str = "X-Operator-Id";

/// Header carrying the operator email.
pub const OPERATOR_EMAIL_HEADER: &str = "X-Operator-Email";

/// Operator identity for privileged handlers.
///
/// Rejects with 401 when either header is missing or empty.
#[derive(Debug, Clone)]
pub struct AuthenticatedOperator(pub Operator);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedOperator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(&parts.headers, OPERATOR_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized("Operator identity required"))?;
        let email = header(&parts.headers, OPERATOR_EMAIL_HEADER)
            .ok_or_else(|| AppError::unauthorized("Operator email required"))?;

        Ok(Self(Operator {
            id: OperatorId(id),
            email,
        }))
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
