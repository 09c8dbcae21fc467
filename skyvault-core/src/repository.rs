use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::filter::TicketFilter;
use crate::ticket::{Ticket, TicketFields, TicketId, TicketState};
use crate::TicketResult;

/// One row mutation inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowOp {
    Insert {
        fields: TicketFields,
        state: TicketState,
        linked_ticket_code: Option<String>,
    },
    /// Overwrite the descriptive fields of a live ticket.
    Replace { id: TicketId, fields: TicketFields },
    /// Compare-and-set on the state column. Fails when the stored state is no
    /// longer `from`.
    SetState {
        id: TicketId,
        from: TicketState,
        to: TicketState,
    },
    SoftDelete { id: TicketId, at: DateTime<Utc> },
}

/// Row mutations that commit or roll back together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub ops: Vec<RowOp>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, fields: TicketFields, state: TicketState, linked_ticket_code: Option<String>) -> Self {
        self.ops.push(RowOp::Insert {
            fields,
            state,
            linked_ticket_code,
        });
        self
    }

    pub fn replace(mut self, id: TicketId, fields: TicketFields) -> Self {
        self.ops.push(RowOp::Replace { id, fields });
        self
    }

    pub fn set_state(mut self, id: TicketId, from: TicketState, to: TicketState) -> Self {
        self.ops.push(RowOp::SetState { id, from, to });
        self
    }

    pub fn soft_delete(mut self, id: TicketId, at: DateTime<Utc>) -> Self {
        self.ops.push(RowOp::SoftDelete { id, at });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// What a committed [`ChangeSet`] produced.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    /// Ids of inserted rows, in the order of their `Insert` ops.
    pub inserted: Vec<TicketId>,
    /// Every live ticket, read inside the committing transaction.
    pub live: Vec<Ticket>,
}

/// Repository trait for ticket persistence
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn create(&self, fields: &TicketFields, state: TicketState) -> TicketResult<TicketId>;

    async fn update(&self, id: TicketId, fields: &TicketFields) -> TicketResult<()>;

    /// Live tickets only; soft-deleted rows report `NotFound`.
    async fn get(&self, id: TicketId) -> TicketResult<Ticket>;

    async fn get_including_deleted(&self, id: TicketId) -> TicketResult<Ticket>;

    async fn list(&self, filter: &TicketFilter) -> TicketResult<Vec<Ticket>>;

    /// Re-deleting an already deleted row is a no-op.
    async fn soft_delete(&self, id: TicketId, at: DateTime<Utc>) -> TicketResult<()>;

    async fn commit(&self, changes: ChangeSet) -> TicketResult<CommitOutcome>;
}
