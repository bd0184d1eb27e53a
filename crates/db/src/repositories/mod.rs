use async_trait::async_trait;
use thiserror::Error;

use supportdesk_core::domain::conversation::{ConversationTurn, NewConversationTurn};
use supportdesk_core::domain::escalation::{Escalation, EscalationId, NewEscalation};
use supportdesk_core::domain::order::{Order, OrderId};
use supportdesk_core::errors::ApplicationError;

pub mod conversation;
pub mod escalation;
pub mod memory;
pub mod order;

pub use conversation::SqlConversationLog;
pub use escalation::SqlEscalationStore;
pub use memory::{InMemoryConversationLog, InMemoryOrderStore};
pub use order::SqlOrderLedger;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
}

/// Append-only audit trail of conversation turns. `append` masks the email
/// before anything touches storage; rows are never deleted.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(&self, turn: NewConversationTurn) -> Result<i64, RepositoryError>;
    async fn recent(&self, limit: u32) -> Result<Vec<ConversationTurn>, RepositoryError>;
}

#[async_trait]
pub trait EscalationStore: Send + Sync {
    async fn create(&self, escalation: NewEscalation) -> Result<Escalation, RepositoryError>;
    async fn find_by_id(&self, id: EscalationId) -> Result<Option<Escalation>, RepositoryError>;
    async fn list_pending(&self) -> Result<Vec<Escalation>, RepositoryError>;
}
