use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use skyvault_core::{
    ChangeSet, DocumentRef, Ticket, TicketError, TicketFields, TicketFilter, TicketId,
    TicketRepository, TicketResult, TicketState,
};
use skyvault_store::AttachmentStore;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::shares::{divide_evenly, parse_passengers};
use crate::snapshot::SnapshotCache;

const OUTBOUND_SUFFIX: &str = "(outbound)";
const RETURN_SUFFIX: &str = "(return)";

/// Several passengers booked under one reservation.
#[derive(Debug, Clone)]
pub struct BulkBooking {
    /// Shared route, reservation code and documents. `passenger` and `cost`
    /// are overwritten per passenger.
    pub fields: TicketFields,
    /// Comma-separated passenger names.
    pub passengers: String,
    pub total_cost: Decimal,
    pub state: TicketState,
    /// Open ticket whose value funds the whole batch.
    pub source: Option<TicketId>,
}

/// Applies state transitions, splits and exchanges against the ticket store.
///
/// Every mutating operation runs under a single writer lock, commits through
/// one store transaction and refreshes the snapshot cache before returning.
pub struct LifecycleEngine {
    repo: Arc<dyn TicketRepository>,
    attachments: AttachmentStore,
    cache: SnapshotCache,
    writer: Mutex<()>,
}

impl LifecycleEngine {
    /// Builds the engine and primes the snapshot cache from the store.
    pub async fn open(repo: Arc<dyn TicketRepository>, attachments: AttachmentStore) -> TicketResult<Self> {
        let cache = SnapshotCache::new();
        cache.replace(repo.list(&TicketFilter::default()).await?);
        info!("Lifecycle engine ready with {} live tickets", cache.len());
        Ok(Self {
            repo,
            attachments,
            cache,
            writer: Mutex::new(()),
        })
    }

    /// Handle for reporting collaborators. Clones observe every refresh.
    pub fn cache(&self) -> SnapshotCache {
        self.cache.clone()
    }

    pub async fn get(&self, id: TicketId) -> TicketResult<Ticket> {
        self.repo.get(id).await
    }

    pub async fn list(&self, filter: &TicketFilter) -> TicketResult<Vec<Ticket>> {
        self.repo.list(filter).await
    }

    /// Audit read: returns soft-deleted tickets too, with `deleted_at` set.
    pub async fn get_including_deleted(&self, id: TicketId) -> TicketResult<Ticket> {
        self.repo.get_including_deleted(id).await
    }

    pub async fn create(&self, fields: TicketFields, initial: TicketState) -> TicketResult<TicketId> {
        match self.try_create(fields, initial).await {
            Ok(id) => {
                info!("Ticket {} created as {}", id, initial);
                Ok(id)
            }
            Err(err) => {
                warn!("Create rejected: {}", err);
                Err(err)
            }
        }
    }

    /// Full-row edit of the descriptive fields. State and linkage are untouched.
    pub async fn update(&self, id: TicketId, fields: TicketFields) -> TicketResult<()> {
        self.try_update(id, fields)
            .await
            .inspect(|_| info!("Ticket {} updated", id))
            .inspect_err(|err| warn!("Update of ticket {} rejected: {}", id, err))
    }

    /// Quick status change along the permitted edges.
    pub async fn transition(&self, id: TicketId, to: TicketState) -> TicketResult<()> {
        match self.try_transition(id, to).await {
            Ok(from) => {
                info!("Ticket {} moved {} -> {}", id, from, to);
                Ok(())
            }
            Err(err) => {
                warn!("Transition of ticket {} to {} rejected: {}", id, to, err);
                Err(err)
            }
        }
    }

    /// Consumes one leg of a round trip.
    ///
    /// The original becomes the Completed outbound leg at half the cost; a new
    /// Open ticket with the route reversed keeps the other half as credit.
    /// Returns the id of the new return-leg ticket.
    pub async fn split(&self, id: TicketId) -> TicketResult<TicketId> {
        self.try_split(id)
            .await
            .inspect(|return_leg| info!("Ticket {} split, return leg is ticket {}", id, return_leg))
            .inspect_err(|err| warn!("Split of ticket {} rejected: {}", id, err))
    }

    /// Redeems an Open ticket's value into a new booking.
    pub async fn exchange(
        &self,
        source_id: TicketId,
        fields: TicketFields,
        state: TicketState,
    ) -> TicketResult<TicketId> {
        self.try_exchange(source_id, fields, state)
            .await
            .inspect(|new_id| info!("Ticket {} exchanged into ticket {}", source_id, new_id))
            .inspect_err(|err| warn!("Exchange of ticket {} rejected: {}", source_id, err))
    }

    /// One ticket per passenger, sharing reservation, route and documents.
    ///
    /// With a source, the batch is linked to it and the source flips to
    /// Exchanged exactly once, in the same transaction.
    pub async fn bulk_create(&self, booking: BulkBooking) -> TicketResult<Vec<TicketId>> {
        let source = booking.source;
        self.try_bulk_create(booking)
            .await
            .inspect(|ids| info!("Bulk booking created {} tickets (source: {:?})", ids.len(), source))
            .inspect_err(|err| warn!("Bulk booking rejected: {}", err))
    }

    pub async fn soft_delete(&self, id: TicketId) -> TicketResult<()> {
        let _guard = self.writer.lock().await;
        self.apply(ChangeSet::new().soft_delete(id, Utc::now()))
            .await
            .map(|_| info!("Ticket {} soft-deleted", id))
            .inspect_err(|err| warn!("Soft delete of ticket {} rejected: {}", id, err))
    }

    /// Stores a supporting document, then appends it to the ticket.
    ///
    /// The file is written before the ticket row is touched; if the write
    /// fails no database work happens.
    pub async fn attach_document(&self, id: TicketId, name: &str, bytes: &[u8]) -> TicketResult<DocumentRef> {
        self.try_attach_document(id, name, bytes)
            .await
            .inspect(|doc| info!("Document {} attached to ticket {}", doc.as_str(), id))
            .inspect_err(|err| warn!("Attaching document to ticket {} rejected: {}", id, err))
    }

    async fn try_create(&self, fields: TicketFields, initial: TicketState) -> TicketResult<TicketId> {
        ensure_initial(initial)?;
        let fields = fields.normalized();
        fields.validate()?;

        let _guard = self.writer.lock().await;
        let ids = self.apply(ChangeSet::new().insert(fields, initial, None)).await?;
        first_id(&ids)
    }

    async fn try_update(&self, id: TicketId, fields: TicketFields) -> TicketResult<()> {
        let fields = fields.normalized();
        fields.validate()?;

        let _guard = self.writer.lock().await;
        self.apply(ChangeSet::new().replace(id, fields)).await?;
        Ok(())
    }

    async fn try_transition(&self, id: TicketId, to: TicketState) -> TicketResult<TicketState> {
        let _guard = self.writer.lock().await;
        let current = self.repo.get(id).await?;
        current.state.ensure_transition(to)?;
        self.apply(ChangeSet::new().set_state(id, current.state, to)).await?;
        Ok(current.state)
    }

    async fn try_split(&self, id: TicketId) -> TicketResult<TicketId> {
        let _guard = self.writer.lock().await;
        let original = self.repo.get(id).await?;
        original.state.ensure_transition(TicketState::Completed)?;
        if original.fields.cost <= Decimal::ZERO {
            return Err(TicketError::validation(format!("ticket {} has no value to split", id)));
        }

        let half = original.fields.cost / Decimal::from(2);

        let mut outbound = original.fields.clone();
        outbound.cost = half;
        outbound.passenger = format!("{} {}", original.fields.passenger, OUTBOUND_SUFFIX);

        let mut inbound = original.fields.clone();
        inbound.cost = half;
        inbound.passenger = format!("{} {}", original.fields.passenger, RETURN_SUFFIX);
        std::mem::swap(&mut inbound.origin, &mut inbound.destination);

        let changes = ChangeSet::new()
            .replace(id, outbound)
            .set_state(id, original.state, TicketState::Completed)
            .insert(inbound, TicketState::Open, original.linked_ticket_code.clone());
        let ids = self.apply(changes).await?;
        first_id(&ids)
    }

    async fn try_exchange(
        &self,
        source_id: TicketId,
        fields: TicketFields,
        state: TicketState,
    ) -> TicketResult<TicketId> {
        ensure_initial(state)?;
        let fields = fields.normalized();
        fields.validate()?;

        let _guard = self.writer.lock().await;
        let source = self.open_source(source_id).await?;
        let changes = ChangeSet::new()
            .insert(fields, state, Some(source.fields.reservation_code))
            .set_state(source_id, TicketState::Open, TicketState::Exchanged);
        let ids = self.apply(changes).await?;
        first_id(&ids)
    }

    async fn try_bulk_create(&self, booking: BulkBooking) -> TicketResult<Vec<TicketId>> {
        ensure_initial(booking.state)?;
        let names = parse_passengers(&booking.passengers)?;
        let shares = divide_evenly(booking.total_cost, names.len());
        let template = booking.fields.normalized();

        let mut tickets = Vec::with_capacity(names.len());
        for (name, cost) in names.into_iter().zip(shares) {
            let fields = TicketFields {
                passenger: name,
                cost,
                ..template.clone()
            };
            fields.validate()?;
            tickets.push(fields);
        }

        let _guard = self.writer.lock().await;
        let link = match booking.source {
            Some(id) => Some(self.open_source(id).await?.fields.reservation_code),
            None => None,
        };

        let mut changes = tickets.into_iter().fold(ChangeSet::new(), |changes, fields| {
            changes.insert(fields, booking.state, link.clone())
        });
        if let Some(id) = booking.source {
            changes = changes.set_state(id, TicketState::Open, TicketState::Exchanged);
        }
        self.apply(changes).await
    }

    async fn try_attach_document(&self, id: TicketId, name: &str, bytes: &[u8]) -> TicketResult<DocumentRef> {
        self.repo.get(id).await?;
        let document = self.attachments.save(name, bytes).await?;

        let _guard = self.writer.lock().await;
        let mut fields = self.repo.get(id).await?.fields;
        fields.documents.push(document.clone());
        self.apply(ChangeSet::new().replace(id, fields)).await?;
        Ok(document)
    }

    async fn open_source(&self, id: TicketId) -> TicketResult<Ticket> {
        let source = self.repo.get(id).await?;
        if source.state != TicketState::Open {
            return Err(TicketError::InvalidTransition {
                from: source.state,
                to: TicketState::Exchanged,
            });
        }
        Ok(source)
    }

    /// Commits and swaps the snapshot. Callers must hold the writer lock.
    async fn apply(&self, changes: ChangeSet) -> TicketResult<Vec<TicketId>> {
        let outcome = self.repo.commit(changes).await?;
        self.cache.replace(outcome.live);
        Ok(outcome.inserted)
    }
}

fn ensure_initial(state: TicketState) -> TicketResult<()> {
    if state.is_initial() {
        Ok(())
    } else {
        Err(TicketError::validation(format!(
            "tickets start as ACTIVE or OPEN, not {}",
            state
        )))
    }
}

fn first_id(ids: &[TicketId]) -> TicketResult<TicketId> {
    ids.first()
        .copied()
        .ok_or_else(|| TicketError::Persistence("commit returned no inserted id".to_string()))
}
