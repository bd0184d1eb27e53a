use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use supportdesk_core::domain::conversation::ChatMessage;
use supportdesk_core::domain::escalation::{
    Escalation, EscalationAction, EscalationId, EscalationStatus, NewEscalation,
};
use supportdesk_core::domain::order::OrderId;

use super::{EscalationStore, RepositoryError};
use crate::repositories::order::parse_timestamp;
use crate::DbPool;

pub struct SqlEscalationStore {
    pool: DbPool,
}

impl SqlEscalationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EscalationStore for SqlEscalationStore {
    async fn create(&self, escalation: NewEscalation) -> Result<Escalation, RepositoryError> {
        let action_json = serde_json::to_string(&escalation.action)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;
        let context_json = serde_json::to_string(&escalation.context)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO escalations (session_id, order_id, action_json, conversation_context,
                                      status, created_at)
             VALUES (?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&escalation.session_id)
        .bind(escalation.order_id.as_ref().map(|id| id.0.clone()))
        .bind(action_json)
        .bind(context_json)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Escalation {
            id: EscalationId(result.last_insert_rowid()),
            session_id: escalation.session_id,
            order_id: escalation.order_id,
            action: escalation.action,
            context: escalation.context,
            status: EscalationStatus::Pending,
            created_at,
            resolved_at: None,
        })
    }

    async fn find_by_id(&self, id: EscalationId) -> Result<Option<Escalation>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    async fn list_pending(&self) -> Result<Vec<Escalation>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, session_id, order_id, action_json, conversation_context, status,
                    created_at, resolved_at
             FROM escalations
             WHERE status = 'pending'
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_escalation).collect::<Result<Vec<_>, _>>()
    }
}

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    id: EscalationId,
) -> Result<Option<Escalation>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, session_id, order_id, action_json, conversation_context, status,
                created_at, resolved_at
         FROM escalations WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(conn)
    .await?;

    match row {
        Some(ref r) => Ok(Some(row_to_escalation(r)?)),
        None => Ok(None),
    }
}

pub(crate) async fn persist_resolution(
    conn: &mut SqliteConnection,
    id: EscalationId,
    status: EscalationStatus,
    resolved_at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE escalations SET status = ?, resolved_at = ? WHERE id = ?")
        .bind(status_as_str(status))
        .bind(resolved_at.to_rfc3339())
        .bind(id.0)
        .execute(conn)
        .await?;
    Ok(())
}

fn status_as_str(status: EscalationStatus) -> &'static str {
    match status {
        EscalationStatus::Pending => "pending",
        EscalationStatus::Approved => "approved",
        EscalationStatus::Rejected => "rejected",
    }
}

fn parse_status(value: &str) -> Result<EscalationStatus, RepositoryError> {
    match value {
        "pending" => Ok(EscalationStatus::Pending),
        "approved" => Ok(EscalationStatus::Approved),
        "rejected" => Ok(EscalationStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown escalation status `{other}`"))),
    }
}

fn row_to_escalation(row: &sqlx::sqlite::SqliteRow) -> Result<Escalation, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: String =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let order_id: Option<String> =
        row.try_get("order_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action_json: String =
        row.try_get("action_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let context_json: String =
        row.try_get("conversation_context").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resolved_at_str: Option<String> =
        row.try_get("resolved_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let action: EscalationAction = serde_json::from_str(&action_json)
        .map_err(|error| RepositoryError::Decode(format!("action payload: {error}")))?;
    let context: Vec<ChatMessage> = serde_json::from_str(&context_json)
        .map_err(|error| RepositoryError::Decode(format!("context payload: {error}")))?;
    let resolved_at = resolved_at_str.as_deref().map(parse_timestamp).transpose()?;

    Ok(Escalation {
        id: EscalationId(id),
        session_id,
        order_id: order_id.map(OrderId),
        action,
        context,
        status: parse_status(&status_str)?,
        created_at: parse_timestamp(&created_at_str)?,
        resolved_at,
    })
}
