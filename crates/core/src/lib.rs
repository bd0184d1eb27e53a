pub mod config;
pub mod domain;
pub mod errors;
pub mod pii;

pub use domain::conversation::{
    ActionVariant, AgentDecision, ChatMessage, ChatRole, ConversationTurn, NewConversationTurn,
    StructuredResponse,
};
pub use domain::escalation::{
    Escalation, EscalationAction, EscalationId, EscalationStatus, NewEscalation,
    ResolutionDecision,
};
pub use domain::kb::{builtin_knowledge_base, cosine_similarity, keyword_score, KbCitation, KbEntry};
pub use domain::order::{Order, OrderId, OrderItem, OrderStatus, RefundStatus};
pub use domain::returns::{ReturnRecord, ReturnStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pii::mask_email;
