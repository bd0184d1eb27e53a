use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use supportdesk_core::domain::conversation::{ConversationTurn, NewConversationTurn};
use supportdesk_core::domain::order::{Order, OrderId};
use supportdesk_core::pii::mask_email;

use super::{ConversationLog, OrderStore, RepositoryError};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConversationLog {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl InMemoryConversationLog {
    pub async fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn append(&self, turn: NewConversationTurn) -> Result<i64, RepositoryError> {
        let mut turns = self.turns.write().await;
        let id = turns.len() as i64 + 1;
        turns.push(ConversationTurn {
            id,
            session_id: turn.session_id,
            masked_user_email: turn.user_email.as_deref().map(mask_email),
            messages: turn.messages,
            response: turn.response,
            suggested_actions: None,
            agent_decision: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let turns = self.turns.read().await;
        Ok(turns.iter().rev().take(limit as usize).cloned().collect())
    }
}
