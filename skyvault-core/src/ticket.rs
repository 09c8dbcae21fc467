use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{TicketError, TicketResult};

/// Store-assigned identity of a ticket row. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub i64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketState {
    Active,
    /// Unused purchased value, redeemable against a future booking.
    Open,
    Cancelled,
    Completed,
    Exchanged,
}

impl TicketState {
    pub const ALL: [TicketState; 5] = [
        TicketState::Active,
        TicketState::Open,
        TicketState::Cancelled,
        TicketState::Completed,
        TicketState::Exchanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::Active => "ACTIVE",
            TicketState::Open => "OPEN",
            TicketState::Cancelled => "CANCELLED",
            TicketState::Completed => "COMPLETED",
            TicketState::Exchanged => "EXCHANGED",
        }
    }

    /// States a ticket may be created in.
    pub fn is_initial(&self) -> bool {
        matches!(self, TicketState::Active | TicketState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketState::Cancelled | TicketState::Completed | TicketState::Exchanged
        )
    }

    /// Edges reachable through the plain status setter.
    ///
    /// `Open -> Exchanged` is absent: it only happens together with the
    /// creation of the redeeming ticket.
    pub fn can_transition_to(&self, to: TicketState) -> bool {
        use TicketState::*;
        matches!(
            (*self, to),
            (Active, Completed)
                | (Active, Cancelled)
                | (Active, Open)
                | (Open, Active)
                | (Open, Completed)
                | (Open, Cancelled)
        )
    }

    pub fn ensure_transition(&self, to: TicketState) -> TicketResult<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(TicketError::InvalidTransition { from: *self, to })
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketState {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TicketError::validation(format!("unknown ticket state '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaggageType {
    #[default]
    CarryOn,
    Checked,
    Full,
}

impl BaggageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaggageType::CarryOn => "CARRY_ON",
            BaggageType::Checked => "CHECKED",
            BaggageType::Full => "FULL",
        }
    }
}

impl FromStr for BaggageType {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CARRY_ON" => Ok(BaggageType::CarryOn),
            "CHECKED" => Ok(BaggageType::Checked),
            "FULL" => Ok(BaggageType::Full),
            other => Err(TicketError::validation(format!("unknown baggage type '{}'", other))),
        }
    }
}

/// Opaque identifier of a supporting document written by the attachment store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Every descriptive field of a ticket.
///
/// State, linkage and the deletion marker are not here: they change only
/// through lifecycle operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketFields {
    pub passenger: String,
    pub origin: String,
    pub destination: String,
    pub country: String,
    pub airline: String,
    pub flight_number: String,
    pub travel_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub cost: Decimal,
    pub reservation_code: String,
    pub baggage: BaggageType,
    pub extras: bool,
    pub purpose: String,
    pub approver: String,
    pub contact_phone: String,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
    /// Upload order is preserved.
    pub documents: Vec<DocumentRef>,
}

impl TicketFields {
    /// Collects every failed field so the caller can fix them in one pass.
    pub fn validate(&self) -> TicketResult<()> {
        let mut problems = Vec::new();
        if self.passenger.trim().is_empty() {
            problems.push("passenger is required".to_string());
        }
        if self.reservation_code.trim().is_empty() {
            problems.push("reservation_code is required".to_string());
        }
        if self.cost < Decimal::ZERO {
            problems.push(format!("cost must not be negative (got {})", self.cost));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(TicketError::Validation(problems))
        }
    }

    /// Trims free text and upper-cases codes the way bookings are keyed.
    pub fn normalized(mut self) -> Self {
        self.passenger = self.passenger.trim().to_string();
        self.reservation_code = self.reservation_code.trim().to_uppercase();
        self.origin = self.origin.trim().to_uppercase();
        self.destination = self.destination.trim().to_uppercase();
        self.flight_number = self.flight_number.trim().to_uppercase();
        self
    }
}

/// A stored ticket row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    #[serde(flatten)]
    pub fields: TicketFields,
    pub state: TicketState,
    /// Reservation code of the Open ticket whose value funded this one.
    pub linked_ticket_code: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
