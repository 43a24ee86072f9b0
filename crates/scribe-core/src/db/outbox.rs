//! Outbox (sync queue) repository implementation

use crate::error::{Error, Result};
use crate::models::{NewOperation, NoteId, NotePayload, OperationKind, PendingOperation};
use crate::util::now_millis;
use libsql::{Connection, Value};

/// Trait for the pending-operation outbox (async)
#[allow(async_fn_in_trait)]
pub trait OutboxRepository {
    /// Append an operation, stamped with the current time
    async fn add(&self, operation: &NewOperation) -> Result<PendingOperation>;

    /// All pending operations in FIFO order
    async fn list(&self) -> Result<Vec<PendingOperation>>;

    /// Remove an operation after successful replay
    async fn remove(&self, id: i64) -> Result<()>;

    /// Number of pending operations
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `OutboxRepository`
pub struct LibSqlOutbox<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOutbox<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_operation(row: &libsql::Row) -> Result<PendingOperation> {
        let kind: String = row.get(1)?;
        let note_id: String = row.get(2)?;
        let id: i64 = row.get(0)?;
        let kind = match kind.parse() {
            Ok(kind) => kind,
            Err(_) => {
                tracing::warn!("Outbox entry {id} has an unrecognized kind {kind:?}");
                OperationKind::Unknown
            }
        };
        let data = match row.get_value(3)? {
            // A corrupt payload is surfaced as a missing one; replay treats it as a failure
            Value::Text(raw) => match serde_json::from_str::<NotePayload>(&raw) {
                Ok(payload) => Some(payload),
                Err(error) => {
                    tracing::warn!("Outbox entry {id} has an unreadable payload: {error}");
                    None
                }
            },
            Value::Null => None,
            other => {
                return Err(Error::Database(format!(
                    "unexpected outbox payload value: {other:?}"
                )))
            }
        };

        Ok(PendingOperation {
            id,
            kind,
            note_id: NoteId::new(note_id),
            data,
            timestamp: row.get(4)?,
        })
    }
}

impl OutboxRepository for LibSqlOutbox<'_> {
    async fn add(&self, operation: &NewOperation) -> Result<PendingOperation> {
        let timestamp = now_millis();
        let payload = match &operation.data {
            Some(data) => Value::Text(serde_json::to_string(data)?),
            None => Value::Null,
        };

        let mut rows = self
            .conn
            .query(
                "INSERT INTO sync_queue (kind, note_id, payload, timestamp)
                 VALUES (?, ?, ?, ?)
                 RETURNING id",
                libsql::params![
                    operation.kind.as_str(),
                    operation.note_id.as_str(),
                    payload,
                    timestamp
                ],
            )
            .await?;

        let id: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(Error::Database("outbox insert returned no id".into())),
        };

        Ok(PendingOperation {
            id,
            kind: operation.kind,
            note_id: operation.note_id.clone(),
            data: operation.data.clone(),
            timestamp,
        })
    }

    async fn list(&self) -> Result<Vec<PendingOperation>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, note_id, payload, timestamp
                 FROM sync_queue
                 ORDER BY id ASC",
                (),
            )
            .await?;

        let mut operations = Vec::new();
        while let Some(row) = rows.next().await? {
            operations.push(Self::parse_operation(&row)?);
        }
        Ok(operations)
    }

    async fn remove(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE id = ?", libsql::params![id])
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid count {count}")))
    }
}
