//! Venue check-in endpoints:
//! - POST /scan/:qr - Scan a QR token at the door
//! - GET /validate?invitee_id=&signature= - Validate an explicit signature

use crate::error::AppError;
use crate::http::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use eventpass_core::providers::{CheckInPublisher, DedupGate, TicketRepository};
use eventpass_core::{ScanOutcome, Ticket, TicketId, Verdict};
use serde::Deserialize;

/// Query parameters for validation.
#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    /// Ticket id
    pub invitee_id: i64,
    /// Hex signature presented with it
    pub signature: String,
}

/// Scan a QR token.
///
/// `200` with the checked-in ticket; every rejection maps to its own
/// status so door scanners can tell a duplicate tap from a forged code.
///
/// # Errors
///
/// `404` unknown token, `409` gift already claimed, `429` repeated scan
/// inside the dedup window, `401` invalid signature, `403` denied,
/// `410` expired, `503` if the cache or database is unavailable.
pub async fn scan<R, G, P, C>(
    State(state): State<AppState<R, G, P, C>>,
    Path(qr): Path<String>,
) -> Result<Json<Ticket>, AppError>
where
    R: TicketRepository,
    G: DedupGate,
    P: CheckInPublisher,
{
    match state.machine.scan(&qr).await? {
        ScanOutcome::CheckedIn(ticket) => Ok(Json(ticket)),
        ScanOutcome::NotFound => Err(AppError::new(
            StatusCode::NOT_FOUND,
            "No invitee for this QR code".to_string(),
            "NOT_FOUND",
        )),
        ScanOutcome::AlreadyClaimed(ticket) => Err(AppError::conflict(format!(
            "Invitee {} already checked in",
            ticket.id
        ))),
        ScanOutcome::TooManyRequests => Err(AppError::too_many_requests(
            "Scan already in progress for this QR code",
        )),
        ScanOutcome::InvalidSignature => Err(AppError::unauthorized("Invalid QR signature")),
        ScanOutcome::Denied(ticket) => Err(AppError::forbidden(format!(
            "Invitee {} was denied",
            ticket.id
        ))),
        ScanOutcome::Expired(ticket) => {
            Err(AppError::gone(format!("Invitee {} has expired", ticket.id)))
        }
    }
}

/// Validate a `(ticket id, signature)` pair.
///
/// # Errors
///
/// `401` signature rejected (the ticket is now denied), `409` ticket
/// already finalized, `404` unknown id, `410` expired, `503` if the
/// database is unavailable.
pub async fn validate<R, G, P, C>(
    State(state): State<AppState<R, G, P, C>>,
    Query(query): Query<ValidateQuery>,
) -> Result<Json<Ticket>, AppError>
where
    R: TicketRepository,
    G: DedupGate,
    P: CheckInPublisher,
{
    let id = TicketId(query.invitee_id);

    match state.machine.validate_signature(id, &query.signature).await? {
        Verdict::Ok(ticket) => Ok(Json(ticket)),
        Verdict::Denied(_) => Err(AppError::unauthorized("Invalid signature, invitee denied")),
        Verdict::AlreadyFinalized(ticket) => Err(AppError::conflict(format!(
            "Invitee {} already {}",
            ticket.id,
            ticket.state.as_str()
        ))),
        Verdict::Expired(ticket) => {
            Err(AppError::gone(format!("Invitee {} has expired", ticket.id)))
        }
        Verdict::NotFound => Err(AppError::not_found("Invitee", id)),
    }
}
