//! JSON API routes.
//!
//! - `POST /api/chat`               — grounded chat turn
//! - `GET  /api/orders/{order_id}`  — order with expanded items
//! - `POST /api/escalate`           — create a pending escalation
//! - `GET  /api/agent/pending`      — pending escalations (agent secret)
//! - `POST /api/agent/approve`      — resolve an escalation (agent secret)
//! - `GET  /admin/audit`            — recent audit trail (admin secret, query)
//! - `GET  /metrics`                — counters and containment estimate

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use supportdesk_agent::runtime::{ChatRequest, ConversationOrchestrator};
use supportdesk_core::config::AuthConfig;
use supportdesk_core::domain::conversation::{ChatMessage, ConversationTurn, StructuredResponse};
use supportdesk_core::domain::escalation::{
    Escalation, EscalationAction, EscalationId, NewEscalation, ResolutionDecision,
};
use supportdesk_core::domain::order::{Order, OrderId};
use supportdesk_core::errors::{ApplicationError, InterfaceError};
use supportdesk_db::repositories::{ConversationLog, OrderStore, SqlConversationLog, SqlOrderLedger};
use supportdesk_db::{EscalationWorkflow, MetricsAggregator};

const AUDIT_QUERY_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct ApiState {
    orchestrator: Arc<ConversationOrchestrator>,
    ledger: Arc<SqlOrderLedger>,
    workflow: Arc<EscalationWorkflow>,
    audit: Arc<SqlConversationLog>,
    metrics: Arc<MetricsAggregator>,
    auth: AuthConfig,
}

impl ApiState {
    pub fn new(
        orchestrator: Arc<ConversationOrchestrator>,
        ledger: Arc<SqlOrderLedger>,
        workflow: Arc<EscalationWorkflow>,
        audit: Arc<SqlConversationLog>,
        metrics: Arc<MetricsAggregator>,
        auth: AuthConfig,
    ) -> Self {
        Self { orchestrator, ledger, workflow, audit, metrics, auth }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/orders/{order_id}", get(get_order))
        .route("/api/escalate", post(escalate))
        .route("/api/agent/pending", get(agent_pending))
        .route("/api/agent/approve", post(agent_approve))
        .route("/admin/audit", get(admin_audit))
        .route("/metrics", get(metrics))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    pub order_id: Option<String>,
    pub user_email: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalateBody {
    pub session_id: String,
    pub order_id: Option<String>,
    pub action: EscalationAction,
    #[serde(default)]
    pub conversation_context: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct EscalateResponse {
    pub escalation_id: i64,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub escalation_id: i64,
    pub decision: ResolutionDecision,
    pub agent_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub success: bool,
    pub result: ResolutionResult,
}

#[derive(Debug, Serialize)]
pub struct ResolutionResult {
    pub status: supportdesk_core::domain::escalation::EscalationStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub total_chats: i64,
    pub total_escalations: i64,
    pub bot_containment_estimate: f64,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map an application error onto a status code and a user-safe body. The
/// detailed message is logged, never returned.
fn error_response(error: ApplicationError) -> (StatusCode, Json<ErrorBody>) {
    let correlation_id = Uuid::new_v4().to_string();
    error!(
        event_name = "api.request_failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );

    let interface = error.into_interface(correlation_id.clone());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorBody { error: interface.user_message().to_string(), correlation_id }))
}

// ---------------------------------------------------------------------------
// Credential gates
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Shared-secret check. An unconfigured secret fails closed.
fn require_secret(
    configured: Option<&secrecy::SecretString>,
    supplied: Option<&str>,
    surface: &'static str,
) -> Result<(), ApplicationError> {
    let Some(expected) = configured else {
        return Err(ApplicationError::Unauthorized(surface));
    };
    match supplied {
        Some(token) if token == expected.expose_secret() => Ok(()),
        _ => Err(ApplicationError::Unauthorized(surface)),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<StructuredResponse>, (StatusCode, Json<ErrorBody>)> {
    let session_id = body.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let response = state
        .orchestrator
        .handle(ChatRequest {
            message: body.message,
            order_id: body.order_id.map(OrderId),
            user_email: body.user_email,
            session_id,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(response))
}

async fn get_order(
    State(state): State<ApiState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, (StatusCode, Json<ErrorBody>)> {
    let order = state
        .ledger
        .get(&OrderId(order_id.clone()))
        .await
        .map_err(|error| error_response(ApplicationError::from(error)))?
        .ok_or_else(|| error_response(ApplicationError::not_found("order", order_id)))?;

    Ok(Json(order))
}

async fn escalate(
    State(state): State<ApiState>,
    Json(body): Json<EscalateBody>,
) -> Result<Json<EscalateResponse>, (StatusCode, Json<ErrorBody>)> {
    let escalation = state
        .workflow
        .create(NewEscalation {
            session_id: body.session_id,
            order_id: body.order_id.map(OrderId),
            action: body.action,
            context: body.conversation_context,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(EscalateResponse {
        escalation_id: escalation.id.0,
        status: "pending",
        message: "Your request has been escalated to our support team for review.",
    }))
}

async fn agent_pending(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Escalation>>, (StatusCode, Json<ErrorBody>)> {
    require_secret(state.auth.agent_secret.as_ref(), bearer_token(&headers), "agent")
        .map_err(error_response)?;

    let pending = state.workflow.list_pending().await.map_err(error_response)?;
    Ok(Json(pending))
}

async fn agent_approve(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ApproveBody>,
) -> Result<Json<ApproveResponse>, (StatusCode, Json<ErrorBody>)> {
    require_secret(state.auth.agent_secret.as_ref(), bearer_token(&headers), "agent")
        .map_err(error_response)?;

    let outcome = state
        .workflow
        .resolve(EscalationId(body.escalation_id), body.decision, body.agent_notes)
        .await
        .map_err(error_response)?;

    Ok(Json(ApproveResponse {
        success: true,
        result: ResolutionResult { status: outcome.status, message: outcome.message },
    }))
}

async fn admin_audit(
    State(state): State<ApiState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<ConversationTurn>>, (StatusCode, Json<ErrorBody>)> {
    require_secret(state.auth.admin_secret.as_ref(), query.token.as_deref(), "admin")
        .map_err(error_response)?;

    let turns = state
        .audit
        .recent(AUDIT_QUERY_LIMIT)
        .await
        .map_err(|error| error_response(ApplicationError::from(error)))?;
    Ok(Json(turns))
}

async fn metrics(
    State(state): State<ApiState>,
) -> Result<Json<MetricsResponse>, (StatusCode, Json<ErrorBody>)> {
    let snapshot = state
        .metrics
        .snapshot()
        .await
        .map_err(|error| error_response(ApplicationError::from(error)))?;

    Ok(Json(MetricsResponse {
        total_chats: snapshot.total_chats,
        total_escalations: snapshot.total_escalations,
        bot_containment_estimate: snapshot.containment_rate,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use supportdesk_agent::retriever::{KnowledgeIndex, KnowledgeRetriever};
    use supportdesk_agent::runtime::ConversationOrchestrator;
    use supportdesk_core::config::AuthConfig;
    use supportdesk_core::domain::kb::builtin_knowledge_base;
    use supportdesk_core::domain::order::{Order, OrderId, OrderItem, OrderStatus, RefundStatus};
    use supportdesk_db::repositories::{OrderStore, SqlConversationLog, SqlOrderLedger};
    use supportdesk_db::{connect_with_settings, migrations, EscalationWorkflow, MetricsAggregator};

    use super::{router, ApiState};

    async fn test_router() -> (axum::Router, sqlx::SqlitePool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let index = Arc::new(KnowledgeIndex::without_embeddings(builtin_knowledge_base()));
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            KnowledgeRetriever::new(index, None),
            None,
            Arc::new(SqlOrderLedger::new(pool.clone())),
            Arc::new(SqlConversationLog::new(pool.clone())),
            Duration::from_secs(5),
        ));

        let state = ApiState::new(
            orchestrator,
            Arc::new(SqlOrderLedger::new(pool.clone())),
            Arc::new(EscalationWorkflow::new(pool.clone())),
            Arc::new(SqlConversationLog::new(pool.clone())),
            Arc::new(MetricsAggregator::new(pool.clone())),
            AuthConfig {
                agent_secret: Some("agent-pass".to_string().into()),
                admin_secret: Some("admin-pass".to_string().into()),
            },
        );

        (router(state), pool)
    }

    async fn insert_order(pool: &sqlx::SqlitePool, id: &str, status: OrderStatus) {
        SqlOrderLedger::new(pool.clone())
            .save(Order {
                id: OrderId(id.to_string()),
                user_email: "alice@example.com".to_string(),
                status,
                items: vec![OrderItem {
                    sku: "TSHIRT-RED".to_string(),
                    quantity: 1,
                    unit_price: Decimal::new(2999, 2),
                }],
                tracking_number: None,
                created_at: Utc::now(),
                refund_status: RefundStatus::None,
            })
            .await
            .expect("insert order");
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn chat_returns_the_degraded_response_and_logs_one_turn() {
        let (app, pool) = test_router().await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({"message": "Where is my order?", "user_email": "alice@example.com"}),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["intent"], "fallback");
        assert_eq!(payload["confidence"], 0.5);
        assert_eq!(payload["actions"][0]["type"], "none");

        let logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(logged, 1);
    }

    #[tokio::test]
    async fn chat_rejects_an_empty_message() {
        let (app, _pool) = test_router().await;

        let response = app
            .oneshot(json_request("POST", "/api/chat", serde_json::json!({"message": "  "})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_order_expands_items_and_misses_with_404() {
        let (app, pool) = test_router().await;
        insert_order(&pool, "ORD-1001", OrderStatus::Placed).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/orders/ORD-1001").body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["id"], "ORD-1001");
        assert_eq!(payload["items"][0]["sku"], "TSHIRT-RED");

        let missing = app
            .oneshot(Request::builder().uri("/api/orders/ORD-9999").body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn escalate_creates_a_pending_escalation() {
        let (app, pool) = test_router().await;
        insert_order(&pool, "ORD-1001", OrderStatus::Placed).await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/escalate",
                serde_json::json!({
                    "session_id": "sess-1",
                    "order_id": "ORD-1001",
                    "action": {"type": "cancel_order", "order_id": "ORD-1001", "reason": "mistake"},
                    "conversation_context": [{"role": "user", "content": "cancel please"}]
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["status"], "pending");
        assert!(payload["escalation_id"].as_i64().expect("id") > 0);
        assert!(payload["message"].as_str().expect("message").contains("escalated"));
    }

    #[tokio::test]
    async fn escalate_rejects_unknown_action_types() {
        let (app, _pool) = test_router().await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/escalate",
                serde_json::json!({
                    "session_id": "sess-1",
                    "action": {"type": "delete_account"}
                }),
            ))
            .await
            .expect("response");

        // Rejected by the boundary deserializer before any side effect.
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn agent_surfaces_require_the_agent_secret() {
        let (app, _pool) = test_router().await;

        let unauthenticated = app
            .clone()
            .oneshot(Request::builder().uri("/api/agent/pending").body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/agent/pending")
                    .header(header::AUTHORIZATION, "Bearer wrong-pass")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let authorized = app
            .oneshot(
                Request::builder()
                    .uri("/api/agent/pending")
                    .header(header::AUTHORIZATION, "Bearer agent-pass")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(authorized.status(), StatusCode::OK);
        let payload = body_json(authorized).await;
        assert_eq!(payload, serde_json::json!([]));
    }

    #[tokio::test]
    async fn approve_executes_once_and_conflicts_on_the_second_attempt() {
        let (app, pool) = test_router().await;
        insert_order(&pool, "ORD-1001", OrderStatus::Placed).await;

        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/escalate",
                serde_json::json!({
                    "session_id": "sess-1",
                    "order_id": "ORD-1001",
                    "action": {"type": "cancel_order", "order_id": "ORD-1001", "reason": "mistake"}
                }),
            ))
            .await
            .expect("response");
        let escalation_id = body_json(created).await["escalation_id"].as_i64().expect("id");

        let approve_body = serde_json::json!({
            "escalation_id": escalation_id,
            "decision": "approve",
            "agent_notes": "confirmed with customer"
        });

        let approved = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/agent/approve")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, "Bearer agent-pass")
                    .body(Body::from(approve_body.to_string()))
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(approved.status(), StatusCode::OK);
        let payload = body_json(approved).await;
        assert_eq!(payload["success"], true);
        assert!(payload["result"]["message"].as_str().expect("message").contains("cancelled"));

        let status: String =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = 'ORD-1001'")
                .fetch_one(&pool)
                .await
                .expect("order status");
        assert_eq!(status, "cancelled");

        let duplicate = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/agent/approve")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, "Bearer agent-pass")
                    .body(Body::from(approve_body.to_string()))
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn admin_audit_requires_the_query_credential() {
        let (app, _pool) = test_router().await;

        let unauthenticated = app
            .clone()
            .oneshot(Request::builder().uri("/admin/audit").body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

        let authorized = app
            .oneshot(
                Request::builder()
                    .uri("/admin/audit?token=admin-pass")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(authorized.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_reports_counts_and_containment() {
        let (app, _pool) = test_router().await;

        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({"message": "hello there"}),
            ))
            .await
            .expect("chat");

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["total_chats"], 1);
        assert_eq!(payload["total_escalations"], 0);
        assert_eq!(payload["bot_containment_estimate"], 1.0);
    }
}
