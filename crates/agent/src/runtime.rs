use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use supportdesk_core::domain::conversation::{
    ChatMessage, NewConversationTurn, StructuredResponse,
};
use supportdesk_core::domain::kb::KbCitation;
use supportdesk_core::domain::order::{Order, OrderId};
use supportdesk_core::errors::ApplicationError;
use supportdesk_db::repositories::{ConversationLog, OrderStore};

use crate::llm::LlmClient;
use crate::prompt::grounded_prompt;
use crate::retriever::KnowledgeRetriever;

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub message: String,
    pub order_id: Option<OrderId>,
    pub user_email: Option<String>,
    pub session_id: String,
}

/// Top of the conversation pipeline: retrieval, grounding, completion,
/// contract validation, and the audit append. Provider trouble never
/// surfaces to the caller; it degrades into the fixed fallback responses.
pub struct ConversationOrchestrator {
    retriever: KnowledgeRetriever,
    llm: Option<Arc<dyn LlmClient>>,
    orders: Arc<dyn OrderStore>,
    audit: Arc<dyn ConversationLog>,
    llm_timeout: Duration,
}

impl ConversationOrchestrator {
    pub fn new(
        retriever: KnowledgeRetriever,
        llm: Option<Arc<dyn LlmClient>>,
        orders: Arc<dyn OrderStore>,
        audit: Arc<dyn ConversationLog>,
        llm_timeout: Duration,
    ) -> Self {
        Self { retriever, llm, orders, audit, llm_timeout }
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<StructuredResponse, ApplicationError> {
        if request.message.trim().is_empty() {
            return Err(ApplicationError::Validation("message must not be empty".to_string()));
        }

        let kb_matches = self.retriever.search(&request.message).await;
        let citations: Vec<KbCitation> = kb_matches.iter().map(KbCitation::from).collect();

        let order = self.resolve_order(request.order_id.as_ref()).await;
        let response = self
            .complete(&request.message, &kb_matches, order.as_ref())
            .await
            .with_kb_matches(citations);

        // Exactly one audit append per invocation, degraded paths included.
        self.audit
            .append(NewConversationTurn {
                session_id: request.session_id.clone(),
                user_email: request.user_email.clone(),
                messages: vec![ChatMessage::user(request.message.as_str())],
                response: response.clone(),
            })
            .await
            .map_err(ApplicationError::from)?;

        info!(
            event_name = "chat.turn_completed",
            session_id = %request.session_id,
            intent = %response.intent,
            "conversation turn appended to audit log"
        );
        Ok(response)
    }

    /// Order context is best-effort grounding: a read failure downgrades to
    /// an ungrounded prompt instead of failing the chat.
    async fn resolve_order(&self, order_id: Option<&OrderId>) -> Option<Order> {
        let order_id = order_id?;
        match self.orders.get(order_id).await {
            Ok(order) => order,
            Err(error) => {
                warn!(
                    event_name = "chat.order_lookup_failed",
                    order_id = %order_id.0,
                    error = %error,
                    "order context omitted from prompt"
                );
                None
            }
        }
    }

    async fn complete(
        &self,
        message: &str,
        kb_matches: &[supportdesk_core::domain::kb::KbEntry],
        order: Option<&Order>,
    ) -> StructuredResponse {
        let Some(client) = &self.llm else {
            return StructuredResponse::fallback();
        };

        let system_prompt = grounded_prompt(kb_matches, order);
        let completion =
            tokio::time::timeout(self.llm_timeout, client.complete(&system_prompt, message)).await;

        let raw = match completion {
            Err(_elapsed) => {
                warn!(
                    event_name = "chat.provider_timeout",
                    timeout_secs = self.llm_timeout.as_secs(),
                    "model call timed out, returning degraded response"
                );
                return StructuredResponse::fallback();
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "chat.provider_failed",
                    error = %error,
                    "model call failed, returning degraded response"
                );
                return StructuredResponse::fallback();
            }
            Ok(Ok(raw)) => raw,
        };

        match StructuredResponse::parse_contract(&raw) {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    event_name = "chat.contract_violation",
                    error = %error,
                    "model payload failed contract validation"
                );
                StructuredResponse::parse_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use supportdesk_core::domain::kb::builtin_knowledge_base;
    use supportdesk_core::errors::ApplicationError;
    use supportdesk_db::repositories::{InMemoryConversationLog, InMemoryOrderStore};

    use super::{ChatRequest, ConversationOrchestrator};
    use crate::llm::LlmClient;
    use crate::retriever::{KnowledgeIndex, KnowledgeRetriever};

    struct StubLlm {
        payload: String,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ApplicationError> {
            Ok(self.payload.clone())
        }
    }

    struct UnreachableLlm;

    #[async_trait]
    impl LlmClient for UnreachableLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ApplicationError> {
            Err(ApplicationError::Provider("connection refused".to_string()))
        }
    }

    struct SlowLlm;

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ApplicationError> {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok("{}".to_string())
        }
    }

    fn orchestrator(
        llm: Option<Arc<dyn LlmClient>>,
        audit: Arc<InMemoryConversationLog>,
    ) -> ConversationOrchestrator {
        let index = Arc::new(KnowledgeIndex::without_embeddings(builtin_knowledge_base()));
        ConversationOrchestrator::new(
            KnowledgeRetriever::new(index, None),
            llm,
            Arc::new(InMemoryOrderStore::default()),
            audit,
            Duration::from_millis(50),
        )
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            order_id: None,
            user_email: Some("alice@example.com".to_string()),
            session_id: "sess-1".to_string(),
        }
    }

    #[tokio::test]
    async fn provider_outage_returns_the_degraded_response_and_one_audit_row() {
        let audit = Arc::new(InMemoryConversationLog::default());
        let orchestrator = orchestrator(Some(Arc::new(UnreachableLlm)), audit.clone());

        let response =
            orchestrator.handle(request("Where is my order?")).await.expect("handle");

        assert_eq!(response.intent, "fallback");
        assert_eq!(response.confidence, 0.5);
        assert_eq!(
            response.actions,
            vec![supportdesk_core::domain::conversation::ActionVariant::None]
        );

        let turns = audit.turns().await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].masked_user_email.as_deref(), Some("a***e@example.com"));
        assert_eq!(turns[0].response.intent, "fallback");
    }

    #[tokio::test]
    async fn disabled_provider_behaves_like_an_outage() {
        let audit = Arc::new(InMemoryConversationLog::default());
        let orchestrator = orchestrator(None, audit.clone());

        let response = orchestrator.handle(request("hello")).await.expect("handle");
        assert_eq!(response.intent, "fallback");
        assert_eq!(audit.turns().await.len(), 1);
    }

    #[tokio::test]
    async fn timed_out_provider_is_treated_as_unavailable() {
        let audit = Arc::new(InMemoryConversationLog::default());
        let orchestrator = orchestrator(Some(Arc::new(SlowLlm)), audit.clone());

        let response = orchestrator.handle(request("hello")).await.expect("handle");
        assert_eq!(response.intent, "fallback");
        assert_eq!(audit.turns().await.len(), 1);
    }

    #[tokio::test]
    async fn off_contract_payload_returns_the_parse_error_response() {
        let audit = Arc::new(InMemoryConversationLog::default());
        let orchestrator = orchestrator(
            Some(Arc::new(StubLlm { payload: "Sure, done!".to_string() })),
            audit.clone(),
        );

        let response = orchestrator.handle(request("cancel it")).await.expect("handle");
        assert_eq!(response.intent, "parse_error");
        assert_eq!(response.confidence, 0.1);
        assert_eq!(audit.turns().await.len(), 1);
    }

    #[tokio::test]
    async fn successful_completion_carries_the_kb_citations() {
        let audit = Arc::new(InMemoryConversationLog::default());
        let payload = r#"{
            "intent": "shipping_question",
            "confidence": 0.9,
            "response_text": "Standard shipping takes 3-5 business days (Shipping Policy).",
            "actions": [{"type": "none"}]
        }"#;
        let orchestrator =
            orchestrator(Some(Arc::new(StubLlm { payload: payload.to_string() })), audit.clone());

        let response = orchestrator.handle(request("shipping")).await.expect("handle");

        assert_eq!(response.intent, "shipping_question");
        assert!(!response.kb_matches.is_empty());
        assert_eq!(response.kb_matches[0].id, "shipping-policy");

        let turns = audit.turns().await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].response, response);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_the_pipeline_runs() {
        let audit = Arc::new(InMemoryConversationLog::default());
        let orchestrator = orchestrator(None, audit.clone());

        let error = orchestrator.handle(request("   ")).await.expect_err("validation");
        assert!(matches!(error, ApplicationError::Validation(_)));
        assert!(audit.turns().await.is_empty());
    }
}
