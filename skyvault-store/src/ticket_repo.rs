use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use skyvault_core::{
    BaggageType, ChangeSet, CommitOutcome, DocumentRef, RowOp, Ticket, TicketError, TicketFields,
    TicketFilter, TicketId, TicketRepository, TicketResult, TicketState,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::database::db_error;

const TICKET_COLUMNS: &str = "id, passenger, origin, destination, country, airline, flight_number, \
     travel_date, return_date, cost, reservation_code, baggage, extras, purpose, approver, \
     contact_phone, recorded_by, recorded_at, documents, state, linked_ticket_code, deleted_at";

pub struct SqliteTicketRepository {
    pool: SqlitePool,
}

impl SqliteTicketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    passenger: String,
    origin: String,
    destination: String,
    country: String,
    airline: String,
    flight_number: String,
    travel_date: NaiveDate,
    return_date: Option<NaiveDate>,
    cost: String,
    reservation_code: String,
    baggage: String,
    extras: bool,
    purpose: String,
    approver: String,
    contact_phone: String,
    recorded_by: String,
    recorded_at: DateTime<Utc>,
    documents: String,
    state: String,
    linked_ticket_code: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = TicketError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let corrupt = |column: &str, detail: String| {
            TicketError::Persistence(format!("ticket {} has corrupt {}: {}", row.id, column, detail))
        };
        let cost = Decimal::from_str(&row.cost).map_err(|e| corrupt("cost", e.to_string()))?;
        let documents: Vec<DocumentRef> =
            serde_json::from_str(&row.documents).map_err(|e| corrupt("documents", e.to_string()))?;
        let state = TicketState::from_str(&row.state).map_err(|e| corrupt("state", e.to_string()))?;
        let baggage = BaggageType::from_str(&row.baggage).map_err(|e| corrupt("baggage", e.to_string()))?;

        Ok(Ticket {
            id: TicketId(row.id),
            fields: TicketFields {
                passenger: row.passenger,
                origin: row.origin,
                destination: row.destination,
                country: row.country,
                airline: row.airline,
                flight_number: row.flight_number,
                travel_date: row.travel_date,
                return_date: row.return_date,
                cost,
                reservation_code: row.reservation_code,
                baggage,
                extras: row.extras,
                purpose: row.purpose,
                approver: row.approver,
                contact_phone: row.contact_phone,
                recorded_by: row.recorded_by,
                recorded_at: row.recorded_at,
                documents,
            },
            state,
            linked_ticket_code: row.linked_ticket_code,
            deleted_at: row.deleted_at,
        })
    }
}

fn encode_documents(documents: &[DocumentRef]) -> TicketResult<String> {
    serde_json::to_string(documents).map_err(|e| TicketError::Persistence(e.to_string()))
}

async fn fetch_row(conn: &mut SqliteConnection, id: TicketId) -> TicketResult<Option<Ticket>> {
    let sql = format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS);
    let row = sqlx::query_as::<_, TicketRow>(&sql)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(Ticket::try_from).transpose()
}

async fn fetch_filtered(conn: &mut SqliteConnection, filter: &TicketFilter) -> TicketResult<Vec<Ticket>> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM tickets WHERE 1 = 1", TICKET_COLUMNS));
    if !filter.include_deleted {
        query.push(" AND deleted_at IS NULL");
    }
    if let Some(state) = filter.state {
        query.push(" AND state = ").push_bind(state.as_str());
    }
    if let Some(from) = filter.from {
        query.push(" AND travel_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND travel_date <= ").push_bind(to);
    }
    query.push(" ORDER BY travel_date ASC, id ASC");

    let rows = query
        .build_query_as::<TicketRow>()
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

    let mut tickets = Vec::with_capacity(rows.len());
    for row in rows {
        let ticket = Ticket::try_from(row)?;
        // SQLite's lower() only folds ASCII, so text matching happens here.
        if filter.matches_text(&ticket) {
            tickets.push(ticket);
        }
    }
    Ok(tickets)
}

async fn insert_row(
    conn: &mut SqliteConnection,
    fields: &TicketFields,
    state: TicketState,
    linked_ticket_code: Option<&str>,
) -> TicketResult<TicketId> {
    let result = sqlx::query(
        r#"
        INSERT INTO tickets (passenger, origin, destination, country, airline, flight_number,
            travel_date, return_date, cost, reservation_code, baggage, extras, purpose, approver,
            contact_phone, recorded_by, recorded_at, documents, state, linked_ticket_code)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fields.passenger)
    .bind(&fields.origin)
    .bind(&fields.destination)
    .bind(&fields.country)
    .bind(&fields.airline)
    .bind(&fields.flight_number)
    .bind(fields.travel_date)
    .bind(fields.return_date)
    .bind(fields.cost.to_string())
    .bind(&fields.reservation_code)
    .bind(fields.baggage.as_str())
    .bind(fields.extras)
    .bind(&fields.purpose)
    .bind(&fields.approver)
    .bind(&fields.contact_phone)
    .bind(&fields.recorded_by)
    .bind(fields.recorded_at)
    .bind(encode_documents(&fields.documents)?)
    .bind(state.as_str())
    .bind(linked_ticket_code)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(TicketId(result.last_insert_rowid()))
}

async fn replace_row(conn: &mut SqliteConnection, id: TicketId, fields: &TicketFields) -> TicketResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE tickets SET passenger = ?, origin = ?, destination = ?, country = ?, airline = ?,
            flight_number = ?, travel_date = ?, return_date = ?, cost = ?, reservation_code = ?,
            baggage = ?, extras = ?, purpose = ?, approver = ?, contact_phone = ?, recorded_by = ?,
            recorded_at = ?, documents = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&fields.passenger)
    .bind(&fields.origin)
    .bind(&fields.destination)
    .bind(&fields.country)
    .bind(&fields.airline)
    .bind(&fields.flight_number)
    .bind(fields.travel_date)
    .bind(fields.return_date)
    .bind(fields.cost.to_string())
    .bind(&fields.reservation_code)
    .bind(fields.baggage.as_str())
    .bind(fields.extras)
    .bind(&fields.purpose)
    .bind(&fields.approver)
    .bind(&fields.contact_phone)
    .bind(&fields.recorded_by)
    .bind(fields.recorded_at)
    .bind(encode_documents(&fields.documents)?)
    .bind(id.0)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(TicketError::NotFound(id));
    }
    Ok(())
}

async fn set_state(
    conn: &mut SqliteConnection,
    id: TicketId,
    from: TicketState,
    to: TicketState,
) -> TicketResult<()> {
    let result = sqlx::query("UPDATE tickets SET state = ? WHERE id = ? AND state = ? AND deleted_at IS NULL")
        .bind(to.as_str())
        .bind(id.0)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 1 {
        return Ok(());
    }
    match fetch_row(conn, id).await? {
        Some(current) if !current.is_deleted() => Err(TicketError::InvalidTransition {
            from: current.state,
            to,
        }),
        _ => Err(TicketError::NotFound(id)),
    }
}

async fn soft_delete_row(conn: &mut SqliteConnection, id: TicketId, at: DateTime<Utc>) -> TicketResult<()> {
    let result = sqlx::query("UPDATE tickets SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(at)
        .bind(id.0)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 && fetch_row(conn, id).await?.is_none() {
        return Err(TicketError::NotFound(id));
    }
    Ok(())
}

#[async_trait]
impl TicketRepository for SqliteTicketRepository {
    async fn create(&self, fields: &TicketFields, state: TicketState) -> TicketResult<TicketId> {
        fields.validate()?;
        let outcome = self
            .commit(ChangeSet::new().insert(fields.clone(), state, None))
            .await?;
        outcome
            .inserted
            .first()
            .copied()
            .ok_or_else(|| TicketError::Persistence("insert returned no id".to_string()))
    }

    async fn update(&self, id: TicketId, fields: &TicketFields) -> TicketResult<()> {
        fields.validate()?;
        self.commit(ChangeSet::new().replace(id, fields.clone())).await?;
        Ok(())
    }

    async fn get(&self, id: TicketId) -> TicketResult<Ticket> {
        let ticket = self.get_including_deleted(id).await?;
        if ticket.is_deleted() {
            return Err(TicketError::NotFound(id));
        }
        Ok(ticket)
    }

    async fn get_including_deleted(&self, id: TicketId) -> TicketResult<Ticket> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_row(&mut conn, id).await?.ok_or(TicketError::NotFound(id))
    }

    async fn list(&self, filter: &TicketFilter) -> TicketResult<Vec<Ticket>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_filtered(&mut conn, filter).await
    }

    async fn soft_delete(&self, id: TicketId, at: DateTime<Utc>) -> TicketResult<()> {
        self.commit(ChangeSet::new().soft_delete(id, at)).await?;
        Ok(())
    }

    async fn commit(&self, changes: ChangeSet) -> TicketResult<CommitOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut inserted = Vec::new();

        // An early return drops `tx`, which rolls every op back.
        for op in &changes.ops {
            match op {
                RowOp::Insert {
                    fields,
                    state,
                    linked_ticket_code,
                } => {
                    let id = insert_row(&mut tx, fields, *state, linked_ticket_code.as_deref()).await?;
                    inserted.push(id);
                }
                RowOp::Replace { id, fields } => replace_row(&mut tx, *id, fields).await?,
                RowOp::SetState { id, from, to } => set_state(&mut tx, *id, *from, *to).await?,
                RowOp::SoftDelete { id, at } => soft_delete_row(&mut tx, *id, *at).await?,
            }
        }

        let live = fetch_filtered(&mut tx, &TicketFilter::default()).await?;
        tx.commit().await.map_err(db_error)?;

        debug!("Committed {} ticket ops, {} inserted", changes.ops.len(), inserted.len());
        Ok(CommitOutcome { inserted, live })
    }
}
