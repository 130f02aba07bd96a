//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{checkin, invitees};
use axum::{
    Router,
    routing::{get, post},
};
use eventpass_core::providers::{CheckInPublisher, DedupGate, TicketRepository};
use eventpass_postgres::HealthProbe;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - Health checks: `/health`, `/ready`
/// - Door: `/scan/:qr`, `/validate`
/// - Back office: `/invitees`, `/invitees/:id/reprint`
pub fn build_router<R, G, P, C>(state: AppState<R, G, P, C>) -> Router
where
    R: TicketRepository + 'static,
    G: DedupGate + 'static,
    P: CheckInPublisher + 'static,
    C: HealthProbe,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<R, G, P, C>))
        .route("/scan/:qr", post(checkin::scan::<R, G, P, C>))
        .route("/validate", get(checkin::validate::<R, G, P, C>))
        .route("/invitees", post(invitees::issue::<R, G, P, C>))
        .route("/invitees/:id/reprint", post(invitees::reprint::<R, G, P, C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::extractors::{OPERATOR_EMAIL_HEADER, OPERATOR_ID_HEADER};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use eventpass_core::mocks::{FixedClock, MockCheckInPublisher, MockDedupGate, MockRepository};
    use eventpass_core::{
        CheckInConfig, CheckInStateMachine, HmacSecret, SignatureCodec, Ticket, TicketIssuer,
        ValidationState,
    };
    use eventpass_postgres::{FailoverConfig, FailoverMode, FailoverStore, Role, StoreError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    /// Database stand-in for readiness.
    #[derive(Debug, Clone)]
    struct StubDb(Arc<AtomicBool>);

    impl HealthProbe for StubDb {
        async fn probe(&self) -> Result<(), StoreError> {
            if self.0.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(StoreError::Unavailable("stub down".into()))
            }
        }
    }

    type TestState = AppState<MockRepository, MockDedupGate, MockCheckInPublisher, StubDb>;

    struct Harness {
        app: Router,
        state: TestState,
        repository: Arc<MockRepository>,
        publisher: Arc<MockCheckInPublisher>,
        db_up: Arc<AtomicBool>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(MockRepository::new());
        let publisher = Arc::new(MockCheckInPublisher::new());
        let codec = Arc::new(SignatureCodec::new(HmacSecret::new("route-secret")).unwrap());
        let clock = Arc::new(FixedClock::new(Utc::now()));

        let machine = Arc::new(CheckInStateMachine::new(
            repository.clone(),
            Arc::new(MockDedupGate::new()),
            publisher.clone(),
            codec.clone(),
            clock.clone(),
            CheckInConfig::default(),
        ));
        let issuer = Arc::new(TicketIssuer::new(repository.clone(), codec, clock));

        let db_up = Arc::new(AtomicBool::new(true));
        let store = Arc::new(FailoverStore::new(
            FailoverMode::ColdFallback {
                active: StubDb(db_up.clone()),
                role: Role::Primary,
            },
            FailoverConfig::default(),
        ));

        let state = AppState::new(machine, issuer, store);
        Harness {
            app: build_router(state.clone()),
            state,
            repository,
            publisher,
            db_up,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn as_operator(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder
            .header(OPERATOR_ID_HEADER, "op-1")
            .header(OPERATOR_EMAIL_HEADER, "desk@example.com")
    }

    async fn issue(h: &Harness) -> Ticket {
        h.state.issuer.issue(7, "guest@example.com").await.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let (status, body) = send(&h.app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_reports_role_and_database() {
        let h = harness();

        let (status, body) = send(&h.app, get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "primary");
        assert_eq!(body["ready"], true);

        h.db_up.store(false, Ordering::SeqCst);
        let (status, body) = send(&h.app, get("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], false);
    }

    #[tokio::test]
    async fn test_scan_then_rescan() {
        let h = harness();
        let ticket = issue(&h).await;
        let uri = format!("/scan/{}", ticket.signature.clone().unwrap());

        let (status, body) = send(&h.app, post(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], ticket.id.0);
        assert_eq!(body["state"], "checked_in");
        assert_eq!(h.publisher.published(), vec![ticket.id]);

        let (status, body) = send(&h.app, post(&uri)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "TOO_MANY_REQUESTS");
    }

    #[tokio::test]
    async fn test_scan_unknown_token() {
        let h = harness();
        let (status, body) = send(&h.app, post("/scan/deadbeef")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_scan_storage_failure_is_unavailable() {
        let h = harness();
        let ticket = issue(&h).await;
        h.repository.fail_next_write();

        let uri = format!("/scan/{}", ticket.signature.unwrap());
        let (status, body) = send(&h.app, post(&uri)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body["message"].as_str().unwrap().contains("injected"));
    }

    #[tokio::test]
    async fn test_validate_wrong_signature_denies_once() {
        let h = harness();
        let ticket = issue(&h).await;
        let uri = format!("/validate?invitee_id={}&signature=00ff", ticket.id);

        let (status, _) = send(&h.app, get(&uri)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&h.app, get(&uri)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        assert_eq!(h.repository.denial_writes(ticket.id), 1);
        let stored = h.repository.get_ticket(ticket.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ValidationState::Denied);
    }

    #[tokio::test]
    async fn test_validate_ok_and_unknown() {
        let h = harness();
        let ticket = issue(&h).await;

        let uri = format!(
            "/validate?invitee_id={}&signature={}",
            ticket.id,
            ticket.signature.unwrap()
        );
        let (status, body) = send(&h.app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "checked_in");

        let (status, _) = send(&h.app, get("/validate?invitee_id=999&signature=00")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_issue_requires_operator() {
        let h = harness();
        let request = Request::post("/invitees")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"event_id":7,"email":"guest@example.com"}"#))
            .unwrap();

        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_issue_returns_signed_ticket() {
        let h = harness();
        let request = as_operator(Request::post("/invitees"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"event_id":7,"email":"guest@example.com"}"#))
            .unwrap();

        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["event_id"], 7);
        assert_eq!(body["state"], "pending");
        assert_eq!(body["signature"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_email() {
        let h = harness();
        let request = as_operator(Request::post("/invitees"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"event_id":7,"email":"nobody"}"#))
            .unwrap();

        let (status, _) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_reprint_records_operator() {
        let h = harness();
        let ticket = issue(&h).await;

        let request = as_operator(Request::post(format!("/invitees/{}/reprint", ticket.id)))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signature"], ticket.signature.unwrap());

        let reprints = h.repository.reprints();
        assert_eq!(reprints.len(), 1);
        assert_eq!(reprints[0].requested_by.0, "op-1");
    }

    #[tokio::test]
    async fn test_reprint_unknown_ticket() {
        let h = harness();
        let request = as_operator(Request::post("/invitees/404/reprint"))
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(h.repository.reprints().is_empty());
    }
}
