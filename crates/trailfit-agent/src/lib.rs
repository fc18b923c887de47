//! Request orchestration for the trailfit recommender.
//!
//! A request flows through intent classification, user identification,
//! preference snapshotting, query rewriting, and dispatch to the
//! [`HybridEngine`](trailfit_retrieval::HybridEngine). The [`Orchestrator`]
//! is shared across sessions; each conversation owns a [`Session`].

pub mod climate;
pub mod context;
pub mod error;
pub mod intent;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod styling;
pub mod tools;

mod messages;

pub use context::{AppliedContext, PreferenceSnapshot, Rewrite};
pub use error::{AgentError, LlmError};
pub use intent::{classify, Intent};
pub use llm::{ChatMessage, LanguageModel, LlmReply, OpenAiClient, Role, ToolDefinition};
pub use orchestrator::{Notice, Orchestrator, OrchestratorConfig, Payload, Request, Response};
pub use session::Session;
pub use styling::{Activity, OutfitPiece, OutfitPlan, Weather};
pub use tools::ToolInvocation;
