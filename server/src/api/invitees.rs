//! Back-office invitee endpoints (operator headers required):
//! - POST /invitees - Issue a signed ticket
//! - POST /invitees/:id/reprint - Re-issue a lost ticket

use crate::error::AppError;
use crate::extractors::AuthenticatedOperator;
use crate::http::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use eventpass_core::providers::{CheckInPublisher, DedupGate, TicketRepository};
use eventpass_core::{Ticket, TicketId};
use serde::Deserialize;

/// Request to issue a ticket.
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Owning event
    pub event_id: i64,
    /// Recipient email
    pub email: String,
}

/// Issue a signed ticket.
///
/// # Errors
///
/// `422` for a malformed email, `401` without operator headers, `503`
/// if the database is unavailable.
pub async fn issue<R, G, P, C>(
    State(state): State<AppState<R, G, P, C>>,
    AuthenticatedOperator(operator): AuthenticatedOperator,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<Ticket>), AppError>
where
    R: TicketRepository,
    G: DedupGate,
    P: CheckInPublisher,
{
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }

    let ticket = state.issuer.issue(request.event_id, email).await?;

    tracing::info!(
        ticket_id = %ticket.id,
        operator = %operator.email,
        "Invitee issued by operator"
    );

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Re-issue a ticket and record who asked for it.
///
/// # Errors
///
/// `404` unknown ticket, `401` without operator headers, `503` if the
/// database is unavailable.
pub async fn reprint<R, G, P, C>(
    State(state): State<AppState<R, G, P, C>>,
    AuthenticatedOperator(operator): AuthenticatedOperator,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, AppError>
where
    R: TicketRepository,
    G: DedupGate,
    P: CheckInPublisher,
{
    let id = TicketId(id);
    state
        .issuer
        .reprint(id, &operator)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Invitee", id))
}
