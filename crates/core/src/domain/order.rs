use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    None,
    Requested,
    Processing,
    Completed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl RefundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Requested => "requested",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    fn stage(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Requested => 1,
            Self::Processing => 2,
            Self::Completed => 3,
        }
    }

    /// Forward-only, one stage at a time. `None -> Processing` is the one
    /// permitted skip: refund processing approved through the escalation
    /// workflow never passes through `Requested`.
    pub fn can_advance_to(self, next: RefundStatus) -> bool {
        next.stage() == self.stage() + 1
            || matches!((self, next), (Self::None, Self::Processing))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_email: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub refund_status: RefundStatus,
}

impl Order {
    /// The only status transition this service performs itself. Shipping and
    /// delivery are driven by external fulfilment systems.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!((self.status, next), (OrderStatus::Placed, OrderStatus::Cancelled))
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    pub fn transition_refund(&mut self, next: RefundStatus) -> Result<(), DomainError> {
        if self.refund_status.can_advance_to(next) {
            self.refund_status = next;
            return Ok(());
        }

        Err(DomainError::InvalidRefundTransition { from: self.refund_status, to: next })
    }
}
