//! articlegen-core: transcript → research article with three LLM agents.
//!
//! - [`prompts`]: the editable planner/writer/editor configuration
//! - [`store`]: JSON persistence for that configuration
//! - [`session`]: per-session working copy and form edits
//! - [`llm`]: Azure OpenAI chat client
//! - [`crew`]: agent/task descriptors and the sequential engine
//! - [`invoker`]: validate → probe → run, with error classification

pub mod crew;
pub mod input;
pub mod invoker;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod store;

pub use crew::{AgentDescriptor, Crew, Engine, SequentialEngine, TaskDescriptor};
pub use input::{Temperature, TemperatureError, Transcript, TranscriptError};
pub use invoker::{InvokeError, Invoker, Phase};
pub use llm::{AzureClient, AzureProvider, AzureSettings, ChatModel, LlmError, ModelProvider};
pub use prompts::{AgentPrompt, PromptSet, Role, SchemaError, Step, TaskPrompts};
pub use session::{PromptForm, PromptSession};
pub use store::{ConfigStore, StoreError};
