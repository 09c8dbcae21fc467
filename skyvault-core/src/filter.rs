use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ticket::{Ticket, TicketState};

/// Search criteria for listing tickets. The default matches every live ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketFilter {
    /// Inclusive lower bound on travel date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on travel date.
    pub to: Option<NaiveDate>,
    pub state: Option<TicketState>,
    /// Case-insensitive substring over passenger, reservation code, airline
    /// and flight number.
    pub text: Option<String>,
    pub include_deleted: bool,
}

impl TicketFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_state(mut self, state: TicketState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if !self.include_deleted && ticket.is_deleted() {
            return false;
        }
        if let Some(state) = self.state {
            if ticket.state != state {
                return false;
            }
        }
        let date = ticket.fields.travel_date;
        if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
            return false;
        }
        self.matches_text(ticket)
    }

    pub fn matches_text(&self, ticket: &Ticket) -> bool {
        let needle = match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_lowercase(),
            _ => return true,
        };
        let f = &ticket.fields;
        [&f.passenger, &f.reservation_code, &f.airline, &f.flight_number]
            .iter()
            .any(|haystack| haystack.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{TicketFields, TicketId};
    use chrono::Utc;

    fn ticket(passenger: &str, code: &str, date: NaiveDate, state: TicketState) -> Ticket {
        Ticket {
            id: TicketId(1),
            fields: TicketFields {
                passenger: passenger.to_string(),
                reservation_code: code.to_string(),
                airline: "Iberia".to_string(),
                flight_number: "IB6402".to_string(),
                travel_date: date,
                ..TicketFields::default()
            },
            state,
            linked_ticket_code: None,
            deleted_at: None,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_filter_hides_deleted() {
        let mut t = ticket("ANA", "XP-992", day(2024, 5, 10), TicketState::Active);
        assert!(TicketFilter::new().matches(&t));

        t.deleted_at = Some(Utc::now());
        assert!(!TicketFilter::new().matches(&t));
        assert!(TicketFilter::new().including_deleted().matches(&t));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let t = ticket("ANA", "XP-992", day(2024, 5, 10), TicketState::Active);
        assert!(TicketFilter::new().between(day(2024, 5, 10), day(2024, 5, 10)).matches(&t));
        assert!(!TicketFilter::new().between(day(2024, 5, 11), day(2024, 6, 1)).matches(&t));
    }

    #[test]
    fn test_text_search_is_case_insensitive() {
        let t = ticket("Alexander Pierce", "XP-992", day(2024, 5, 10), TicketState::Open);
        assert!(TicketFilter::new().with_text("pierce").matches(&t));
        assert!(TicketFilter::new().with_text("xp-9").matches(&t));
        assert!(TicketFilter::new().with_text("iberia").matches(&t));
        assert!(TicketFilter::new().with_text("ib64").matches(&t));
        assert!(!TicketFilter::new().with_text("jenkins").matches(&t));
        assert!(TicketFilter::new().with_text("   ").matches(&t));
    }

    #[test]
    fn test_state_filter() {
        let t = ticket("ANA", "XP-992", day(2024, 5, 10), TicketState::Open);
        assert!(TicketFilter::new().with_state(TicketState::Open).matches(&t));
        assert!(!TicketFilter::new().with_state(TicketState::Active).matches(&t));
    }
}
