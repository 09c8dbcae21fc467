pub mod filter;
pub mod repository;
pub mod ticket;

pub use filter::TicketFilter;
pub use repository::{ChangeSet, CommitOutcome, RowOp, TicketRepository};
pub use ticket::{BaggageType, DocumentRef, Ticket, TicketFields, TicketId, TicketState};

/// Errors surfaced by every ticket operation, from validation down to storage.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: TicketState,
        to: TicketState,
    },
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl TicketError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

pub type TicketResult<T> = Result<T, TicketError>;
