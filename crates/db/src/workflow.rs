use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use supportdesk_core::domain::conversation::AgentDecision;
use supportdesk_core::domain::escalation::{
    Escalation, EscalationAction, EscalationId, EscalationStatus, NewEscalation,
    ResolutionDecision,
};
use supportdesk_core::domain::order::{OrderId, OrderStatus, RefundStatus};
use supportdesk_core::domain::returns::ReturnStatus;
use supportdesk_core::errors::ApplicationError;

use crate::repositories::{conversation, escalation, order, EscalationStore, SqlEscalationStore};
use crate::DbPool;

/// Human-approval workflow over customer-impacting actions. Creation records
/// a pending request with a verbatim context snapshot; resolution executes
/// the approved action and the status update as one atomic unit.
pub struct EscalationWorkflow {
    pool: DbPool,
    store: SqlEscalationStore,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub escalation_id: EscalationId,
    pub status: EscalationStatus,
    pub message: String,
}

impl EscalationWorkflow {
    pub fn new(pool: DbPool) -> Self {
        let store = SqlEscalationStore::new(pool.clone());
        Self { pool, store }
    }

    pub async fn create(&self, escalation: NewEscalation) -> Result<Escalation, ApplicationError> {
        let created = self.store.create(escalation).await.map_err(ApplicationError::from)?;

        info!(
            event_name = "escalation.created",
            escalation_id = created.id.0,
            session_id = %created.session_id,
            "escalation recorded as pending"
        );
        Ok(created)
    }

    pub async fn list_pending(&self) -> Result<Vec<Escalation>, ApplicationError> {
        self.store.list_pending().await.map_err(ApplicationError::from)
    }

    /// Resolve a pending escalation exactly once. The action side effect, the
    /// escalation status update, and the audit decision attachment share one
    /// transaction: either all of them land or none do.
    pub async fn resolve(
        &self,
        id: EscalationId,
        decision: ResolutionDecision,
        notes: Option<String>,
    ) -> Result<ResolutionOutcome, ApplicationError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let escalation = escalation::fetch(&mut tx, id)
            .await
            .map_err(ApplicationError::from)?
            .ok_or_else(|| ApplicationError::not_found("escalation", id.0.to_string()))?;
        escalation.ensure_pending()?;

        let message = match decision {
            ResolutionDecision::Approve => execute_action(&mut tx, &escalation.action).await?,
            ResolutionDecision::Reject => {
                "Escalation rejected; no action was taken.".to_string()
            }
        };

        let status = decision.resolved_status();
        escalation::persist_resolution(&mut tx, id, status, Utc::now())
            .await
            .map_err(ApplicationError::from)?;

        let agent_decision =
            AgentDecision { decision, notes, outcome: message.clone() };
        conversation::persist_decision(&mut tx, &escalation.session_id, &agent_decision)
            .await
            .map_err(ApplicationError::from)?;

        tx.commit().await.map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        info!(
            event_name = "escalation.resolved",
            escalation_id = id.0,
            session_id = %escalation.session_id,
            decision = ?decision,
            "escalation resolved"
        );
        Ok(ResolutionOutcome { escalation_id: id, status, message })
    }
}

async fn execute_action(
    conn: &mut SqliteConnection,
    action: &EscalationAction,
) -> Result<String, ApplicationError> {
    match action {
        EscalationAction::CancelOrder { order_id, .. } => {
            let mut order = load_order(conn, order_id).await?;
            order.transition_to(OrderStatus::Cancelled)?;
            order::persist_status(conn, order_id, order.status)
                .await
                .map_err(ApplicationError::from)?;
            Ok(format!("Order {} has been cancelled", order_id.0))
        }
        EscalationAction::RequestReturn { order_id, reason } => {
            // Status starts at `approved`: the human sign-off this workflow
            // exists for already happened.
            load_order(conn, order_id).await?;
            sqlx::query(
                "INSERT INTO returns (order_id, reason, status, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&order_id.0)
            .bind(reason)
            .bind(return_status_as_str(ReturnStatus::Approved))
            .bind(Utc::now().to_rfc3339())
            .execute(conn)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
            Ok(format!("Return request approved for order {}", order_id.0))
        }
        EscalationAction::ProcessRefund { order_id } => {
            let mut order = load_order(conn, order_id).await?;
            order.transition_refund(RefundStatus::Processing)?;
            order::persist_refund_status(conn, order_id, order.refund_status)
                .await
                .map_err(ApplicationError::from)?;
            Ok(format!("Refund processing initiated for order {}", order_id.0))
        }
        EscalationAction::None => Ok("No customer-impacting action was required.".to_string()),
    }
}

async fn load_order(
    conn: &mut SqliteConnection,
    order_id: &OrderId,
) -> Result<supportdesk_core::domain::order::Order, ApplicationError> {
    order::fetch(conn, order_id)
        .await
        .map_err(ApplicationError::from)?
        .ok_or_else(|| ApplicationError::not_found("order", order_id.0.clone()))
}

fn return_status_as_str(status: ReturnStatus) -> &'static str {
    match status {
        ReturnStatus::Requested => "requested",
        ReturnStatus::Approved => "approved",
        ReturnStatus::Processing => "processing",
        ReturnStatus::Completed => "completed",
    }
}
