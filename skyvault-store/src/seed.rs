use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use skyvault_core::{BaggageType, ChangeSet, TicketFields, TicketFilter, TicketRepository, TicketResult, TicketState};
use tracing::info;

/// Sample bookings so a fresh install does not start blank.
pub fn demo_tickets() -> Vec<(TicketFields, TicketState)> {
    let now = Utc::now();
    vec![
        (
            TicketFields {
                passenger: "ALEXANDER PIERCE".to_string(),
                origin: "JFK".to_string(),
                destination: "LHR".to_string(),
                cost: Decimal::new(2450, 0),
                reservation_code: "XP-992".to_string(),
                baggage: BaggageType::Full,
                extras: false,
                travel_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap_or_default(),
                recorded_by: "ADMIN".to_string(),
                recorded_at: now,
                ..TicketFields::default()
            },
            TicketState::Active,
        ),
        (
            TicketFields {
                passenger: "SARAH JENKINS".to_string(),
                origin: "MEX".to_string(),
                destination: "CDG".to_string(),
                cost: Decimal::new(1800, 0),
                reservation_code: "FR-112".to_string(),
                baggage: BaggageType::CarryOn,
                extras: true,
                travel_date: NaiveDate::from_ymd_opt(2024, 5, 15).unwrap_or_default(),
                recorded_by: "ADMIN".to_string(),
                recorded_at: now,
                ..TicketFields::default()
            },
            TicketState::Open,
        ),
    ]
}

/// Inserts [`demo_tickets`] only when the table has never held a row.
/// Returns how many rows were inserted.
pub async fn seed_demo_if_empty(repo: &dyn TicketRepository) -> TicketResult<usize> {
    if !repo.list(&TicketFilter::new().including_deleted()).await?.is_empty() {
        return Ok(0);
    }

    let changes = demo_tickets()
        .into_iter()
        .fold(ChangeSet::new(), |changes, (fields, state)| changes.insert(fields, state, None));
    let outcome = repo.commit(changes).await?;

    info!("Seeded {} demo tickets", outcome.inserted.len());
    Ok(outcome.inserted.len())
}
