use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use supportdesk_core::domain::order::{Order, OrderId, OrderItem, OrderStatus, RefundStatus};

use crate::repositories::{OrderStore, SqlOrderLedger};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: bool,
}

/// Load the demo order dataset. Idempotent: an already-populated orders table
/// is left untouched.
pub async fn seed_orders(pool: &DbPool) -> Result<SeedReport, sqlx::Error> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(pool).await?;
    if existing > 0 {
        info!(
            event_name = "fixtures.seed_skipped",
            existing_orders = existing,
            "orders already present, seed skipped"
        );
        return Ok(SeedReport { inserted: 0, skipped: true });
    }

    let ledger = SqlOrderLedger::new(pool.clone());
    let orders = demo_orders();
    let inserted = orders.len();
    for order in orders {
        ledger
            .save(order)
            .await
            .map_err(|error| sqlx::Error::Protocol(error.to_string()))?;
    }

    info!(event_name = "fixtures.seed_applied", inserted, "demo orders seeded");
    Ok(SeedReport { inserted, skipped: false })
}

fn demo_orders() -> Vec<Order> {
    [
        ("ORD-1001", "alice@example.com", OrderStatus::Placed, "TSHIRT-RED", 1, 2999, None, "2025-09-01T10:00:00Z", RefundStatus::None),
        ("ORD-1002", "bob@example.com", OrderStatus::Shipped, "MUG-BLUE", 2, 1599, Some("TN-12345"), "2025-08-28T09:00:00Z", RefundStatus::None),
        ("ORD-1003", "carol@example.com", OrderStatus::Delivered, "HOODIE-BLACK", 1, 4999, Some("TN-12346"), "2025-08-20T14:30:00Z", RefundStatus::None),
        ("ORD-1004", "david@example.com", OrderStatus::Placed, "SHOES-WHITE", 1, 8999, None, "2025-09-15T11:15:00Z", RefundStatus::None),
        ("ORD-1005", "eve@example.com", OrderStatus::Shipped, "JACKET-NAVY", 1, 7999, Some("TN-12347"), "2025-09-10T16:45:00Z", RefundStatus::Requested),
        ("ORD-1006", "frank@example.com", OrderStatus::Delivered, "HAT-RED", 2, 1999, Some("TN-12348"), "2025-08-15T08:20:00Z", RefundStatus::Completed),
        ("ORD-1007", "grace@example.com", OrderStatus::Placed, "DRESS-BLUE", 1, 6999, None, "2025-09-16T13:10:00Z", RefundStatus::None),
        ("ORD-1008", "henry@example.com", OrderStatus::Delivered, "PANTS-BLACK", 2, 3999, Some("TN-12349"), "2025-08-25T10:30:00Z", RefundStatus::None),
    ]
    .into_iter()
    .map(|(id, email, status, sku, quantity, price_cents, tracking, created_at, refund_status)| {
        Order {
            id: OrderId(id.to_string()),
            user_email: email.to_string(),
            status,
            items: vec![OrderItem {
                sku: sku.to_string(),
                quantity,
                unit_price: Decimal::new(price_cents, 2),
            }],
            tracking_number: tracking.map(str::to_string),
            created_at: DateTime::parse_from_rfc3339(created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            refund_status,
        }
    })
    .collect()
}
