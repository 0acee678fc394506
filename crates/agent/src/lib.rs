//! Turn pipeline - per-message orchestration for the sales assistant
//!
//! This crate is the "brain" of shopmate: for every inbound shopper message
//! it rebuilds session state, classifies intent and sentiment, retrieves
//! catalog knowledge, drives the completion provider through a
//! function-calling protocol, and applies the enhancement policy that
//! decides which products, coupons, and end-of-conversation signals ride
//! along with the reply.
//!
//! # Architecture
//!
//! One turn flows through a fixed sequence:
//! 1. **Context** (`context`) - read-through session state from the TTL cache
//! 2. **Classification** (`classifier`) - model JSON with a deterministic fallback
//! 3. **Retrieval** (`retrieval`) - fingerprint-cached catalog knowledge
//! 4. **Generation** (`prompt` + `invoker`) - prompt assembly and action dispatch
//! 5. **Enhancement** (`enhance`) - product/coupon attachment and termination
//! 6. **Boundary** (`pipeline`) - the always-reply guarantee
//!
//! # Degradation principle
//!
//! Every subsystem here degrades instead of failing the turn: a dead cache
//! means a fresh context, a dead catalog means an empty knowledge list, a
//! malformed classification means the regex fallback. The single exception
//! is the completion provider - without a generation there is nothing safe
//! to say, so that error escalates to the fallback boundary, which still
//! returns a well-formed response.

pub mod classifier;
pub mod context;
pub mod enhance;
pub mod invoker;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;

pub use classifier::MessageClassifier;
pub use context::SessionContextStore;
pub use enhance::EnhancementPolicy;
pub use invoker::{CompletionInvoker, GeneratedReply};
pub use llm::{ChatCompletion, ChatModel, ChatRequest, ChatTurn, FunctionInvocation};
pub use pipeline::{SalesPipeline, TurnRequest};
pub use retrieval::KnowledgeRetriever;
