//! LLM extraction client for the TutorDex pipeline (C5): prompt assembly,
//! an OpenAI-compatible chat-completions call, JSON repair, and a
//! process-wide circuit breaker.

pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod prompt;
pub mod repair;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::LlmClient;
pub use error::LlmError;
pub use prompt::{AssembledPrompt, PromptLibrary, GENERAL_EXAMPLE_SET};
