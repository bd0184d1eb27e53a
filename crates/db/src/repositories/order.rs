use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use supportdesk_core::domain::order::{Order, OrderId, OrderItem, OrderStatus, RefundStatus};
use supportdesk_core::errors::ApplicationError;

use super::{OrderStore, RepositoryError};
use crate::DbPool;

pub struct SqlOrderLedger {
    pool: DbPool,
}

impl SqlOrderLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Only `placed -> cancelled` is performed by this service; the legality
    /// check lives on the domain type.
    pub async fn transition_status(
        &self,
        id: &OrderId,
        target: OrderStatus,
    ) -> Result<Order, ApplicationError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let mut order = fetch(&mut tx, id)
            .await
            .map_err(ApplicationError::from)?
            .ok_or_else(|| ApplicationError::not_found("order", id.0.clone()))?;
        order.transition_to(target)?;
        persist_status(&mut tx, id, order.status).await.map_err(ApplicationError::from)?;

        tx.commit().await.map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(order)
    }

    /// Forward-only refund advancement; `none -> processing` is the single
    /// permitted hop (refund processing approved through escalation).
    pub async fn transition_refund(
        &self,
        id: &OrderId,
        target: RefundStatus,
    ) -> Result<Order, ApplicationError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        let mut order = fetch(&mut tx, id)
            .await
            .map_err(ApplicationError::from)?
            .ok_or_else(|| ApplicationError::not_found("order", id.0.clone()))?;
        order.transition_refund(target)?;
        persist_refund_status(&mut tx, id, order.refund_status)
            .await
            .map_err(ApplicationError::from)?;

        tx.commit().await.map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(order)
    }
}

#[async_trait::async_trait]
impl OrderStore for SqlOrderLedger {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let items_json = serde_json::to_string(&order.items)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO orders (order_id, user_email, status, items_json, tracking_number,
                                 created_at, refund_status)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(order_id) DO UPDATE SET
                 user_email = excluded.user_email,
                 status = excluded.status,
                 items_json = excluded.items_json,
                 tracking_number = excluded.tracking_number,
                 refund_status = excluded.refund_status",
        )
        .bind(&order.id.0)
        .bind(&order.user_email)
        .bind(order.status.as_str())
        .bind(items_json)
        .bind(&order.tracking_number)
        .bind(order.created_at.to_rfc3339())
        .bind(order.refund_status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    id: &OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query(
        "SELECT order_id, user_email, status, items_json, tracking_number, created_at,
                refund_status
         FROM orders WHERE order_id = ?",
    )
    .bind(&id.0)
    .fetch_optional(conn)
    .await?;

    match row {
        Some(ref r) => Ok(Some(row_to_order(r)?)),
        None => Ok(None),
    }
}

pub(crate) async fn persist_status(
    conn: &mut SqliteConnection,
    id: &OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET status = ? WHERE order_id = ?")
        .bind(status.as_str())
        .bind(&id.0)
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn persist_refund_status(
    conn: &mut SqliteConnection,
    id: &OrderId,
    refund_status: RefundStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET refund_status = ? WHERE order_id = ?")
        .bind(refund_status.as_str())
        .bind(&id.0)
        .execute(conn)
        .await?;
    Ok(())
}

fn parse_order_status(value: &str) -> Result<OrderStatus, RepositoryError> {
    match value {
        "placed" => Ok(OrderStatus::Placed),
        "shipped" => Ok(OrderStatus::Shipped),
        "delivered" => Ok(OrderStatus::Delivered),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(RepositoryError::Decode(format!("unknown order status `{other}`"))),
    }
}

fn parse_refund_status(value: &str) -> Result<RefundStatus, RepositoryError> {
    match value {
        "none" => Ok(RefundStatus::None),
        "requested" => Ok(RefundStatus::Requested),
        "processing" => Ok(RefundStatus::Processing),
        "completed" => Ok(RefundStatus::Completed),
        other => Err(RepositoryError::Decode(format!("unknown refund status `{other}`"))),
    }
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let id: String =
        row.try_get("order_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_email: String =
        row.try_get("user_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let items_json: String =
        row.try_get("items_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tracking_number: Option<String> =
        row.try_get("tracking_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let refund_status_str: String =
        row.try_get("refund_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let items: Vec<OrderItem> = serde_json::from_str(&items_json)
        .map_err(|error| RepositoryError::Decode(format!("items payload: {error}")))?;

    Ok(Order {
        id: OrderId(id),
        user_email,
        status: parse_order_status(&status_str)?,
        items,
        tracking_number,
        created_at: parse_timestamp(&created_at_str)?,
        refund_status: parse_refund_status(&refund_status_str)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use supportdesk_core::domain::order::{Order, OrderId, OrderItem, OrderStatus, RefundStatus};
    use supportdesk_core::errors::{ApplicationError, DomainError};

    use super::SqlOrderLedger;
    use crate::repositories::OrderStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: OrderId(id.to_string()),
            user_email: "alice@example.com".to_string(),
            status,
            items: vec![
                OrderItem {
                    sku: "TSHIRT-RED".to_string(),
                    quantity: 1,
                    unit_price: Decimal::new(2999, 2),
                },
                OrderItem {
                    sku: "MUG-BLUE".to_string(),
                    quantity: 2,
                    unit_price: Decimal::new(1599, 2),
                },
            ],
            tracking_number: None,
            created_at: Utc::now(),
            refund_status: RefundStatus::None,
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trips_the_item_list() {
        let ledger = SqlOrderLedger::new(setup().await);
        let order = sample_order("ORD-1001", OrderStatus::Placed);

        ledger.save(order.clone()).await.expect("save");
        let found = ledger
            .get(&OrderId("ORD-1001".to_string()))
            .await
            .expect("get")
            .expect("should exist");

        assert_eq!(found.items, order.items);
        assert_eq!(found.status, OrderStatus::Placed);
        assert_eq!(found.user_email, "alice@example.com");
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_order() {
        let ledger = SqlOrderLedger::new(setup().await);
        let found = ledger.get(&OrderId("ORD-9999".to_string())).await.expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn placed_order_transitions_to_cancelled() {
        let ledger = SqlOrderLedger::new(setup().await);
        ledger.save(sample_order("ORD-1001", OrderStatus::Placed)).await.expect("save");

        let cancelled = ledger
            .transition_status(&OrderId("ORD-1001".to_string()), OrderStatus::Cancelled)
            .await
            .expect("placed -> cancelled");
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let stored = ledger
            .get(&OrderId("ORD-1001".to_string()))
            .await
            .expect("get")
            .expect("should exist");
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn shipped_order_cancellation_fails_and_leaves_the_row_unchanged() {
        let ledger = SqlOrderLedger::new(setup().await);
        let mut order = sample_order("ORD-1002", OrderStatus::Shipped);
        order.tracking_number = Some("TN-12345".to_string());
        ledger.save(order.clone()).await.expect("save");

        let error = ledger
            .transition_status(&OrderId("ORD-1002".to_string()), OrderStatus::Cancelled)
            .await
            .expect_err("shipped -> cancelled should fail");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidOrderTransition { .. })
        ));

        let stored = ledger
            .get(&OrderId("ORD-1002".to_string()))
            .await
            .expect("get")
            .expect("should exist");
        // Bitwise unchanged apart from timestamp precision in storage.
        assert_eq!(stored.status, order.status);
        assert_eq!(stored.items, order.items);
        assert_eq!(stored.tracking_number, order.tracking_number);
        assert_eq!(stored.refund_status, order.refund_status);
    }

    #[tokio::test]
    async fn refund_advances_from_none_to_processing() {
        let ledger = SqlOrderLedger::new(setup().await);
        ledger.save(sample_order("ORD-1003", OrderStatus::Delivered)).await.expect("save");

        let updated = ledger
            .transition_refund(&OrderId("ORD-1003".to_string()), RefundStatus::Processing)
            .await
            .expect("none -> processing");
        assert_eq!(updated.refund_status, RefundStatus::Processing);

        let error = ledger
            .transition_refund(&OrderId("ORD-1003".to_string()), RefundStatus::Processing)
            .await
            .expect_err("processing -> processing should fail");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidRefundTransition { .. })
        ));
    }

    #[tokio::test]
    async fn transition_on_missing_order_is_not_found() {
        let ledger = SqlOrderLedger::new(setup().await);
        let error = ledger
            .transition_status(&OrderId("ORD-0000".to_string()), OrderStatus::Cancelled)
            .await
            .expect_err("missing order");
        assert!(matches!(error, ApplicationError::NotFound { .. }));
    }
}
