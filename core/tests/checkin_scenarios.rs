//! End-to-end check-in scenarios against the in-memory providers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{Duration as ChronoDuration, Utc};
use eventpass_core::checkin::{CheckInConfig, CheckInOutcome, CheckInStateMachine, ScanOutcome};
use eventpass_core::environment::Clock;
use eventpass_core::mocks::{FixedClock, MockCheckInPublisher, MockDedupGate, MockRepository};
use eventpass_core::providers::TicketRepository;
use eventpass_core::{
    ExpirySweeper, HmacSecret, SignatureCodec, SweeperConfig, TicketId, TicketIssuer,
    TicketStatus, ValidationState, Verdict,
};
use std::sync::Arc;
use std::time::Duration;

type Machine = CheckInStateMachine<MockRepository, MockDedupGate, MockCheckInPublisher>;

struct Venue {
    repository: Arc<MockRepository>,
    publisher: Arc<MockCheckInPublisher>,
    clock: FixedClock,
    issuer: TicketIssuer<MockRepository>,
    machine: Arc<Machine>,
}

fn venue(secret: &str, first_ticket_id: i64) -> Venue {
    let repository = Arc::new(MockRepository::starting_at(first_ticket_id));
    let publisher = Arc::new(MockCheckInPublisher::new());
    let clock = FixedClock::new(Utc::now());
    let codec = Arc::new(SignatureCodec::new(HmacSecret::new(secret)).unwrap());

    let issuer = TicketIssuer::new(repository.clone(), codec.clone(), Arc::new(clock.clone()));
    let machine = Arc::new(CheckInStateMachine::new(
        repository.clone(),
        Arc::new(MockDedupGate::new()),
        publisher.clone(),
        codec,
        Arc::new(clock.clone()),
        CheckInConfig::default().with_dedup_ttl(Duration::from_secs(5)),
    ));

    Venue {
        repository,
        publisher,
        clock,
        issuer,
        machine,
    }
}

#[tokio::test(start_paused = true)]
async fn test_ticket_42_scanned_three_times() {
    let venue = venue("k", 42);
    let ticket = venue.issuer.issue(1, "guest@example.com").await.unwrap();

    assert_eq!(ticket.id, TicketId(42));
    let signature = ticket.signature.clone().unwrap();
    assert_eq!(
        signature,
        "7955074f51169f1f64053d8b2c403d7f41ee7ca4f3f9fe1c7b84f91083f2c50a"
    );

    // First scan admits and hands out the gift.
    let first = venue.machine.scan(&signature).await.unwrap();
    let ScanOutcome::CheckedIn(admitted) = first else {
        panic!("expected check-in, got {first:?}");
    };
    assert_eq!(admitted.state, ValidationState::CheckedIn);
    assert!(admitted.gift_claimed());

    // Immediate rescan is collapsed by the gate.
    let second = venue.machine.scan(&signature).await.unwrap();
    assert_eq!(second, ScanOutcome::TooManyRequests);

    // After the window the scan reaches the ticket, which is valid but used.
    tokio::time::advance(Duration::from_secs(6)).await;
    let third = venue.machine.scan(&signature).await.unwrap();
    assert!(matches!(third, ScanOutcome::AlreadyClaimed(ref t) if t.state == ValidationState::CheckedIn));

    assert_eq!(venue.publisher.published(), vec![TicketId(42)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_check_ins_admit_exactly_once() {
    const M: usize = 64;
    let venue = venue("k", 1);
    let ticket = venue.issuer.issue(1, "guest@example.com").await.unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(M));
    let handles: Vec<_> = (0..M)
        .map(|_| {
            let machine = venue.machine.clone();
            let ticket = ticket.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                machine.check_in(&ticket).await.unwrap()
            })
        })
        .collect();

    let mut admitted = Vec::new();
    let mut already_claimed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CheckInOutcome::CheckedIn(t) => admitted.push(t),
            CheckInOutcome::AlreadyClaimed(_) => already_claimed += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(admitted.len(), 1);
    assert_eq!(already_claimed, M - 1);
    assert_eq!(venue.repository.gift_claim_writes(ticket.id), 1);

    let stored = venue.repository.get_ticket(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.gift_claimed_at, admitted[0].gift_claimed_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_scans_of_one_token_pass_the_gate_once() {
    const N: usize = 32;
    let venue = venue("k", 1);
    let ticket = venue.issuer.issue(1, "guest@example.com").await.unwrap();
    let token = ticket.signature.clone().unwrap();

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let machine = venue.machine.clone();
            let token = token.clone();
            tokio::spawn(async move { machine.scan(&token).await.unwrap() })
        })
        .collect();

    let mut checked_in = 0;
    let mut throttled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ScanOutcome::CheckedIn(_) => checked_in += 1,
            ScanOutcome::TooManyRequests => throttled += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(checked_in, 1);
    assert_eq!(throttled, N - 1);
    assert_eq!(venue.publisher.published().len(), 1);
}

#[tokio::test]
async fn test_repeated_wrong_signature_denies_once() {
    let venue = venue("k", 1);
    let ticket = venue.issuer.issue(1, "guest@example.com").await.unwrap();

    let first = venue.machine.validate_signature(ticket.id, "forged").await.unwrap();
    let second = venue.machine.validate_signature(ticket.id, "forged").await.unwrap();

    assert!(matches!(first, Verdict::Denied(_)));
    assert!(matches!(second, Verdict::AlreadyFinalized(_)));
    assert_eq!(venue.repository.denial_writes(ticket.id), 1);
}

#[tokio::test]
async fn test_sweeper_leaves_checked_in_tickets_alone() {
    let venue = venue("k", 1);
    let used = venue.issuer.issue(1, "early@example.com").await.unwrap();
    let unused = venue.issuer.issue(1, "no-show@example.com").await.unwrap();
    venue.machine.scan(used.signature.as_deref().unwrap()).await.unwrap();

    // Past the 24 hour horizon.
    venue.clock.advance(ChronoDuration::hours(25));
    let sweeper = ExpirySweeper::new(
        venue.repository.clone(),
        venue.repository.clone(),
        Arc::new(venue.clock.clone()),
        SweeperConfig::default(),
    );
    let report = sweeper.sweep_once().await;

    assert_eq!(report.tickets_expired, 1);
    let used = venue.repository.get_ticket(used.id).await.unwrap().unwrap();
    let unused = venue.repository.get_ticket(unused.id).await.unwrap().unwrap();
    assert_eq!(used.status, TicketStatus::Pending);
    assert_eq!(used.state, ValidationState::CheckedIn);
    assert_eq!(unused.status, TicketStatus::Expired);

    // An expired ticket can no longer be admitted.
    let late = venue
        .machine
        .scan(unused.signature.as_deref().unwrap())
        .await
        .unwrap();
    assert!(matches!(late, ScanOutcome::Expired(_)));
    assert!(venue.clock.now() > unused.expires_at);
}

#[tokio::test]
async fn test_door_check_in_during_sweep_keeps_the_ticket() {
    let venue = venue("k", 1);
    let ticket = venue.issuer.issue(1, "late@example.com").await.unwrap();
    venue.clock.advance(ChronoDuration::hours(25));

    // The sweeper has listed the ticket but not yet expired it.
    let listed = venue.repository.expired_tickets(venue.clock.now()).await.unwrap();
    assert_eq!(listed, vec![ticket.id]);
    venue
        .repository
        .claim_gift(ticket.id, venue.clock.now())
        .await
        .unwrap()
        .unwrap();

    assert!(!venue.repository.expire_ticket(ticket.id).await.unwrap());
    let stored = venue.repository.get_ticket(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.state, ValidationState::CheckedIn);
    assert_eq!(stored.status, TicketStatus::Pending);
}
