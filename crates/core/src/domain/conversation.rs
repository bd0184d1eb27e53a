use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::escalation::ResolutionDecision;
use crate::domain::kb::KbCitation;
use crate::domain::order::OrderId;
use crate::errors::ApplicationError;

pub const FALLBACK_RESPONSE_TEXT: &str = "I apologize, but our AI system is currently \
     unavailable. Please contact our human support team for assistance.";

pub const PARSE_ERROR_RESPONSE_TEXT: &str = "I apologize, but I encountered an issue \
     processing your request. Could you please rephrase your question?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// Actions the model may offer in a response. A separate, narrower set
/// (`EscalationAction`) is what an agent can actually approve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionVariant {
    None,
    CancelOrder { order_id: OrderId, reason: String },
    RequestReturn { order_id: OrderId, reason: String },
    CheckRefund { order_id: OrderId },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub intent: String,
    pub confidence: f64,
    pub response_text: String,
    pub actions: Vec<ActionVariant>,
    #[serde(default)]
    pub kb_matches: Vec<KbCitation>,
}

impl StructuredResponse {
    /// Parse a raw model payload against the output contract. A payload that
    /// does not decode is a `ProviderParse` failure; a numeric-but-out-of-range
    /// confidence is clamped rather than rejected.
    pub fn parse_contract(raw: &str) -> Result<Self, ApplicationError> {
        let mut response: StructuredResponse = serde_json::from_str(raw)
            .map_err(|error| ApplicationError::ProviderParse(error.to_string()))?;

        if !response.confidence.is_finite() {
            return Err(ApplicationError::ProviderParse(
                "confidence is not a finite number".to_string(),
            ));
        }
        response.confidence = response.confidence.clamp(0.0, 1.0);

        if response.actions.is_empty() {
            response.actions.push(ActionVariant::None);
        }

        Ok(response)
    }

    /// Fixed degraded response for an unreachable or timed-out provider.
    pub fn fallback() -> Self {
        Self {
            intent: "fallback".to_string(),
            confidence: 0.5,
            response_text: FALLBACK_RESPONSE_TEXT.to_string(),
            actions: vec![ActionVariant::None],
            kb_matches: Vec::new(),
        }
    }

    /// Fixed response for a provider payload that failed contract validation.
    pub fn parse_error() -> Self {
        Self {
            intent: "parse_error".to_string(),
            confidence: 0.1,
            response_text: PARSE_ERROR_RESPONSE_TEXT.to_string(),
            actions: vec![ActionVariant::None],
            kb_matches: Vec::new(),
        }
    }

    pub fn with_kb_matches(mut self, kb_matches: Vec<KbCitation>) -> Self {
        self.kb_matches = kb_matches;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub decision: ResolutionDecision,
    pub notes: Option<String>,
    pub outcome: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub session_id: String,
    pub masked_user_email: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub response: StructuredResponse,
    pub suggested_actions: Option<Vec<ActionVariant>>,
    pub agent_decision: Option<AgentDecision>,
    pub created_at: DateTime<Utc>,
}

/// Input to the audit log. The email arrives unmasked and is masked by the
/// log before it is stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewConversationTurn {
    pub session_id: String,
    pub user_email: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub response: StructuredResponse,
}
