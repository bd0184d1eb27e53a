use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ChatMessage;
use crate::domain::order::OrderId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationId(pub i64);

/// Closed set of customer-impacting actions a human agent can approve.
/// Validated at the system boundary; unknown `type` tags are rejected there
/// rather than carried as free-form payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationAction {
    CancelOrder { order_id: OrderId, reason: String },
    RequestReturn { order_id: OrderId, reason: String },
    ProcessRefund { order_id: OrderId },
    None,
}

impl EscalationAction {
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::CancelOrder { order_id, .. }
            | Self::RequestReturn { order_id, .. }
            | Self::ProcessRefund { order_id } => Some(order_id),
            Self::None => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionDecision {
    Approve,
    Reject,
}

impl ResolutionDecision {
    pub fn resolved_status(self) -> EscalationStatus {
        match self {
            Self::Approve => EscalationStatus::Approved,
            Self::Reject => EscalationStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: EscalationId,
    pub session_id: String,
    pub order_id: Option<OrderId>,
    pub action: EscalationAction,
    /// Verbatim snapshot of the conversation at creation time. Resolution
    /// never re-reads live history.
    pub context: Vec<ChatMessage>,
    pub status: EscalationStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input to `EscalationStore::create`; the store assigns the id and stamps
/// the creation time.
#[derive(Clone, Debug, PartialEq)]
pub struct NewEscalation {
    pub session_id: String,
    pub order_id: Option<OrderId>,
    pub action: EscalationAction,
    pub context: Vec<ChatMessage>,
}

impl Escalation {
    /// Resolution happens exactly once. A second attempt on a terminal
    /// escalation fails before any side effect is planned.
    pub fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status == EscalationStatus::Pending {
            return Ok(());
        }

        Err(DomainError::AlreadyResolved(self.id.0))
    }
}
