use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use supportdesk_core::domain::conversation::{
    ActionVariant, AgentDecision, ConversationTurn, NewConversationTurn, StructuredResponse,
};
use supportdesk_core::pii::mask_email;

use super::{ConversationLog, RepositoryError};
use crate::repositories::order::parse_timestamp;
use crate::DbPool;

pub struct SqlConversationLog {
    pool: DbPool,
}

impl SqlConversationLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationLog for SqlConversationLog {
    async fn append(&self, turn: NewConversationTurn) -> Result<i64, RepositoryError> {
        let masked_email = turn.user_email.as_deref().map(mask_email);
        let messages_json = encode(&turn.messages)?;
        let response_json = encode(&turn.response)?;

        // Suggested actions are recorded separately only when the model
        // actually proposed one.
        let suggested: Vec<&ActionVariant> = turn
            .response
            .actions
            .iter()
            .filter(|action| !matches!(action, ActionVariant::None))
            .collect();
        let actions_json = if suggested.is_empty() {
            None
        } else {
            Some(encode(&turn.response.actions)?)
        };

        let result = sqlx::query(
            "INSERT INTO conversations (session_id, masked_user_email, messages_json,
                                        response_json, actions_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&turn.session_id)
        .bind(&masked_email)
        .bind(messages_json)
        .bind(response_json)
        .bind(actions_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, session_id, masked_user_email, messages_json, response_json,
                    actions_json, agent_decision_json, created_at
             FROM conversations
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_turn).collect::<Result<Vec<_>, _>>()
    }
}

/// Attach an agent decision to every turn of the originating session.
/// Intentionally session-wide: the wire contract carries no per-turn id, and
/// over-attributing the decision widens the audit trail rather than losing it.
pub(crate) async fn persist_decision(
    conn: &mut SqliteConnection,
    session_id: &str,
    decision: &AgentDecision,
) -> Result<u64, RepositoryError> {
    let decision_json = encode(decision)?;

    let result = sqlx::query(
        "UPDATE conversations SET agent_decision_json = ? WHERE session_id = ?",
    )
    .bind(decision_json)
    .bind(session_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| RepositoryError::Encode(error.to_string()))
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: String =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let masked_user_email: Option<String> =
        row.try_get("masked_user_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let messages_json: String =
        row.try_get("messages_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response_json: String =
        row.try_get("response_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actions_json: Option<String> =
        row.try_get("actions_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agent_decision_json: Option<String> =
        row.try_get("agent_decision_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let messages = serde_json::from_str(&messages_json)
        .map_err(|error| RepositoryError::Decode(format!("messages payload: {error}")))?;
    let response: StructuredResponse = serde_json::from_str(&response_json)
        .map_err(|error| RepositoryError::Decode(format!("response payload: {error}")))?;
    let suggested_actions = actions_json
        .as_deref()
        .map(serde_json::from_str::<Vec<ActionVariant>>)
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("actions payload: {error}")))?;
    let agent_decision = agent_decision_json
        .as_deref()
        .map(serde_json::from_str::<AgentDecision>)
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("decision payload: {error}")))?;

    Ok(ConversationTurn {
        id,
        session_id,
        masked_user_email,
        messages,
        response,
        suggested_actions,
        agent_decision,
        created_at: parse_timestamp(&created_at_str)?,
    })
}
