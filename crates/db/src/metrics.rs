use serde::Serialize;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Counters derived from the audit trail and the escalation store. The
/// containment rate is the fraction of logged turns no human agent touched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_chats: i64,
    pub total_escalations: i64,
    pub containment_rate: f64,
}

pub struct MetricsAggregator {
    pool: DbPool,
}

impl MetricsAggregator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn snapshot(&self) -> Result<MetricsSnapshot, RepositoryError> {
        let total_chats: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        let total_escalations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM escalations")
            .fetch_one(&self.pool)
            .await?;
        let contained: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversations WHERE agent_decision_json IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let containment_rate = if total_chats > 0 {
            contained as f64 / total_chats as f64
        } else {
            0.0
        };

        Ok(MetricsSnapshot { total_chats, total_escalations, containment_rate })
    }
}
