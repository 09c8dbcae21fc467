//! Portfolio aggregates computed over a snapshot of live tickets.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use skyvault_core::{Ticket, TicketState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub active: usize,
    pub open: usize,
    pub cancelled: usize,
    pub completed: usize,
    pub exchanged: usize,
}

impl StateCounts {
    pub fn get(&self, state: TicketState) -> usize {
        match state {
            TicketState::Active => self.active,
            TicketState::Open => self.open,
            TicketState::Cancelled => self.cancelled,
            TicketState::Completed => self.completed,
            TicketState::Exchanged => self.exchanged,
        }
    }

    fn bump(&mut self, state: TicketState) {
        let slot = match state {
            TicketState::Active => &mut self.active,
            TicketState::Open => &mut self.open,
            TicketState::Cancelled => &mut self.cancelled,
            TicketState::Completed => &mut self.completed,
            TicketState::Exchanged => &mut self.exchanged,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub ticket_count: usize,
    pub by_state: StateCounts,
    pub total_cost: Decimal,
    /// Value still sitting in Open tickets.
    pub open_cost: Decimal,
    /// `open_cost` as a percentage of `total_cost`, two decimals.
    pub open_cost_pct: Decimal,
}

/// Summarizes tickets, optionally limited to an inclusive travel-date range.
pub fn summarize(tickets: &[Ticket], range: Option<(NaiveDate, NaiveDate)>) -> PortfolioSummary {
    let mut by_state = StateCounts::default();
    let mut total_cost = Decimal::ZERO;
    let mut open_cost = Decimal::ZERO;
    let mut ticket_count = 0;

    let in_range = |t: &&Ticket| match range {
        Some((from, to)) => t.fields.travel_date >= from && t.fields.travel_date <= to,
        None => true,
    };

    for ticket in tickets.iter().filter(in_range) {
        ticket_count += 1;
        by_state.bump(ticket.state);
        total_cost = total_cost.saturating_add(ticket.fields.cost);
        if ticket.state == TicketState::Open {
            open_cost = open_cost.saturating_add(ticket.fields.cost);
        }
    }

    let open_cost_pct = if total_cost.is_zero() {
        Decimal::ZERO
    } else {
        // open_cost <= total_cost, so the ratio stays within [0, 1] before scaling.
        (open_cost / total_cost * Decimal::ONE_HUNDRED).round_dp(2)
    };

    PortfolioSummary {
        ticket_count,
        by_state,
        total_cost,
        open_cost,
        open_cost_pct,
    }
}

pub fn cost_in_year(tickets: &[Ticket], year: i32) -> Decimal {
    total_cost_of(tickets.iter().filter(|t| t.fields.travel_date.year() == year))
}

pub fn cost_in_month(tickets: &[Ticket], year: i32, month: u32) -> Decimal {
    total_cost_of(
        tickets
            .iter()
            .filter(|t| t.fields.travel_date.year() == year && t.fields.travel_date.month() == month),
    )
}

/// Sums costs, clamping at `Decimal::MAX` instead of overflowing.
fn total_cost_of<'a>(tickets: impl Iterator<Item = &'a Ticket>) -> Decimal {
    tickets.fold(Decimal::ZERO, |sum, t| sum.saturating_add(t.fields.cost))
}

/// Flights on or after `today`, soonest first.
pub fn upcoming(tickets: &[Ticket], today: NaiveDate, limit: usize) -> Vec<Ticket> {
    let mut upcoming: Vec<Ticket> = tickets
        .iter()
        .filter(|t| t.fields.travel_date >= today)
        .cloned()
        .collect();
    upcoming.sort_by(|a, b| a.fields.travel_date.cmp(&b.fields.travel_date).then(a.id.cmp(&b.id)));
    upcoming.truncate(limit);
    upcoming
}

/// Open tickets, most valuable first.
pub fn open_by_value(tickets: &[Ticket], limit: usize) -> Vec<Ticket> {
    let mut open: Vec<Ticket> = tickets
        .iter()
        .filter(|t| t.state == TicketState::Open)
        .cloned()
        .collect();
    open.sort_by(|a, b| b.fields.cost.cmp(&a.fields.cost).then(a.id.cmp(&b.id)));
    open.truncate(limit);
    open
}

/// Ticket count per destination, busiest first.
pub fn flights_per_destination(tickets: &[Ticket]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for ticket in tickets {
        *counts.entry(ticket.fields.destination.as_str()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(destination, count)| (destination.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyvault_core::{TicketFields, TicketId};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ticket(id: i64, dest: &str, cost: i64, date: NaiveDate, state: TicketState) -> Ticket {
        Ticket {
            id: TicketId(id),
            fields: TicketFields {
                passenger: format!("PAX {}", id),
                reservation_code: format!("R-{}", id),
                destination: dest.to_string(),
                cost: Decimal::new(cost, 0),
                travel_date: date,
                ..TicketFields::default()
            },
            state,
            linked_ticket_code: None,
            deleted_at: None,
        }
    }

    fn portfolio() -> Vec<Ticket> {
        vec![
            ticket(1, "LHR", 2450, day(2024, 5, 10), TicketState::Active),
            ticket(2, "CDG", 1800, day(2024, 5, 15), TicketState::Open),
            ticket(3, "CDG", 200, day(2025, 2, 1), TicketState::Open),
            ticket(4, "MAD", 550, day(2025, 2, 20), TicketState::Cancelled),
        ]
    }

    #[test]
    fn test_summarize_counts_and_risk() {
        let summary = summarize(&portfolio(), None);

        assert_eq!(summary.ticket_count, 4);
        assert_eq!(summary.by_state.get(TicketState::Open), 2);
        assert_eq!(summary.by_state.get(TicketState::Exchanged), 0);
        assert_eq!(summary.total_cost, Decimal::new(5000, 0));
        assert_eq!(summary.open_cost, Decimal::new(2000, 0));
        assert_eq!(summary.open_cost_pct, Decimal::new(40, 0));
    }

    #[test]
    fn test_summarize_respects_range() {
        let summary = summarize(&portfolio(), Some((day(2025, 1, 1), day(2025, 12, 31))));
        assert_eq!(summary.ticket_count, 2);
        assert_eq!(summary.total_cost, Decimal::new(750, 0));
        assert_eq!(summary.open_cost_pct, Decimal::new(2667, 2));
    }

    #[test]
    fn test_empty_portfolio_has_zero_risk() {
        let summary = summarize(&[], None);
        assert_eq!(summary.open_cost_pct, Decimal::ZERO);
        assert_eq!(summary.ticket_count, 0);
    }

    #[test]
    fn test_huge_costs_do_not_overflow() {
        let huge = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        let mut whale = ticket(1, "LHR", 0, day(2024, 5, 10), TicketState::Open);
        whale.fields.cost = huge;
        assert!(whale.fields.validate().is_ok());

        let summary = summarize(std::slice::from_ref(&whale), None);
        assert_eq!(summary.open_cost, huge);
        assert_eq!(summary.open_cost_pct, Decimal::ONE_HUNDRED);

        let mut whales = Vec::new();
        for id in 1..=100 {
            let mut t = whale.clone();
            t.id = TicketId(id);
            whales.push(t);
        }
        let summary = summarize(&whales, None);
        assert_eq!(summary.total_cost, Decimal::MAX);
        assert_eq!(summary.open_cost_pct, Decimal::ONE_HUNDRED);
        assert_eq!(cost_in_year(&whales, 2024), Decimal::MAX);
    }

    #[test]
    fn test_cost_by_period() {
        let tickets = portfolio();
        assert_eq!(cost_in_year(&tickets, 2024), Decimal::new(4250, 0));
        assert_eq!(cost_in_month(&tickets, 2025, 2), Decimal::new(750, 0));
        assert_eq!(cost_in_month(&tickets, 2025, 3), Decimal::ZERO);
    }

    #[test]
    fn test_upcoming_and_open_ordering() {
        let tickets = portfolio();

        let next: Vec<TicketId> = upcoming(&tickets, day(2024, 5, 15), 2).iter().map(|t| t.id).collect();
        assert_eq!(next, vec![TicketId(2), TicketId(3)]);

        let open: Vec<TicketId> = open_by_value(&tickets, 5).iter().map(|t| t.id).collect();
        assert_eq!(open, vec![TicketId(2), TicketId(3)]);
    }

    #[test]
    fn test_flights_per_destination() {
        let counts = flights_per_destination(&portfolio());
        assert_eq!(
            counts,
            vec![
                ("CDG".to_string(), 2),
                ("LHR".to_string(), 1),
                ("MAD".to_string(), 1)
            ]
        );
    }
}
