//! Conversation pipeline - retrieval-grounded LLM orchestration
//!
//! This crate is the "front of house" of supportdesk: it takes a raw customer
//! message and produces a structured, auditable response:
//!
//! 1. **Retrieval** (`retriever`) - rank knowledge-base entries against the
//!    message (embedding similarity, keyword fallback)
//! 2. **Grounding** (`prompt`) - build the system prompt from the KB matches
//!    and the order summary
//! 3. **Completion** (`llm`) - call the model under a strict JSON output
//!    contract
//! 4. **Validation** (`runtime`) - validate the payload, degrade
//!    deterministically when the provider is down or off-contract, and append
//!    exactly one audit record
//!
//! # Safety Principle
//!
//! The LLM is strictly a drafting layer. It NEVER mutates order state. Every
//! customer-impacting action it proposes goes through the human-approved
//! escalation workflow before anything executes.

pub mod llm;
pub mod prompt;
pub mod retriever;
pub mod runtime;

pub use llm::{EmbeddingClient, LlmClient, OpenAiClient};
pub use retriever::{KnowledgeIndex, KnowledgeRetriever};
pub use runtime::{ChatRequest, ConversationOrchestrator};
