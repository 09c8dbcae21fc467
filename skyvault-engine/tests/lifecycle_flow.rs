use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use skyvault_core::{TicketFields, TicketFilter, TicketId, TicketState};
use skyvault_engine::{summarize, BulkBooking, LifecycleEngine};
use skyvault_store::{AttachmentStore, DbClient};

fn booking(passenger: &str, code: &str, cost: i64, date: NaiveDate) -> TicketFields {
    TicketFields {
        passenger: passenger.to_string(),
        origin: "MEX".to_string(),
        destination: "CDG".to_string(),
        airline: "Air France".to_string(),
        reservation_code: code.to_string(),
        cost: Decimal::new(cost, 0),
        travel_date: date,
        recorded_by: "ADMIN".to_string(),
        recorded_at: Utc::now(),
        ..TicketFields::default()
    }
}

fn may(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

async fn open_engine(db: &DbClient, attachments: &std::path::Path) -> LifecycleEngine {
    LifecycleEngine::open(Arc::new(db.tickets()), AttachmentStore::new(attachments))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_open_credit_is_redeemed_once() {
    let db = DbClient::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&db, dir.path()).await;

    let credit = engine
        .create(booking("SARAH JENKINS", "FR-112", 1800, may(15)), TicketState::Open)
        .await
        .unwrap();
    assert_eq!(credit, TicketId(1));

    let redeemed = engine
        .exchange(credit, booking("X", "NX-001", 900, may(20)), TicketState::Active)
        .await
        .unwrap();
    assert_eq!(redeemed, TicketId(2));

    let snapshot = engine.cache().snapshot();
    let source = snapshot.iter().find(|t| t.id == credit).unwrap();
    let new_ticket = snapshot.iter().find(|t| t.id == redeemed).unwrap();
    assert_eq!(source.state, TicketState::Exchanged);
    assert_eq!(new_ticket.linked_ticket_code.as_deref(), Some("FR-112"));
}

#[tokio::test]
async fn test_full_lifecycle_feeds_summary() {
    let db = DbClient::in_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&db, dir.path()).await;

    let round_trip = engine
        .create(booking("ALEXANDER PIERCE", "XP-992", 2450, may(10)), TicketState::Active)
        .await
        .unwrap();
    let return_leg = engine.split(round_trip).await.unwrap();

    let group = engine
        .bulk_create(BulkBooking {
            fields: booking("", "GRP-7", 0, may(12)),
            passengers: "Ana, Bea".to_string(),
            total_cost: Decimal::new(1225, 0),
            state: TicketState::Active,
            source: Some(return_leg),
        })
        .await
        .unwrap();
    assert_eq!(group.len(), 2);

    let cancelled = engine
        .create(booking("CRIS", "CX-1", 300, may(30)), TicketState::Active)
        .await
        .unwrap();
    engine.transition(cancelled, TicketState::Cancelled).await.unwrap();

    let summary = summarize(&engine.cache().snapshot(), None);
    assert_eq!(summary.ticket_count, 5);
    assert_eq!(summary.by_state.get(TicketState::Completed), 1);
    assert_eq!(summary.by_state.get(TicketState::Exchanged), 1);
    assert_eq!(summary.by_state.get(TicketState::Active), 2);
    assert_eq!(summary.by_state.get(TicketState::Cancelled), 1);
    assert_eq!(summary.open_cost, Decimal::ZERO);

    engine.soft_delete(cancelled).await.unwrap();
    let summary = summarize(&engine.cache().snapshot(), None);
    assert_eq!(summary.ticket_count, 4);
    assert_eq!(summary.total_cost, Decimal::new(2450 + 1225, 0));
}

#[tokio::test]
async fn test_committed_changes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("tickets.db").display());

    let (credit, redeemed) = {
        let db = DbClient::new(&url, 1).await.unwrap();
        db.migrate().await.unwrap();
        let engine = open_engine(&db, dir.path()).await;

        let credit = engine
            .create(booking("SARAH JENKINS", "FR-112", 1800, may(15)), TicketState::Open)
            .await
            .unwrap();
        let redeemed = engine
            .exchange(credit, booking("X", "NX-001", 900, may(20)), TicketState::Active)
            .await
            .unwrap();
        db.pool.close().await;
        (credit, redeemed)
    };

    let db = DbClient::new(&url, 1).await.unwrap();
    db.migrate().await.unwrap();
    let engine = open_engine(&db, dir.path()).await;

    assert_eq!(engine.cache().len(), 2);
    assert_eq!(engine.get(credit).await.unwrap().state, TicketState::Exchanged);
    assert_eq!(
        engine.get(redeemed).await.unwrap().linked_ticket_code.as_deref(),
        Some("FR-112")
    );

    let next = engine
        .create(booking("NEW", "N-1", 10, may(21)), TicketState::Active)
        .await
        .unwrap();
    assert!(next > redeemed);
    assert_eq!(
        engine
            .list(&TicketFilter::new().with_state(TicketState::Active))
            .await
            .unwrap()
            .len(),
        2
    );
}
