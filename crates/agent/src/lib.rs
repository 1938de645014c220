//! Oracle adapters and the autonomous tool-calling runtime.
//!
//! This crate is the bridge between the deterministic core and the LLM:
//!
//! 1. **Prompt profiles** (`prompt`) - per-organization templates behind a
//!    registry with a default implementation
//! 2. **LLM transport** (`llm`) - pluggable `LlmClient` with an HTTP
//!    adapter for openai/anthropic/ollama endpoints
//! 3. **Oracle adapter** (`extraction`) - implements the core's
//!    `ExtractionOracle` port by prompting and parsing JSON
//! 4. **Tool runtime** (`runtime`, `tools`) - the alternate architecture: a
//!    bounded loop where the model invokes ledger tools directly
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator and classifier. It never touches the
//! ledger except through `OrderMutationPort`, and nothing it returns is
//! trusted to uphold ledger invariants - the diff engine and resolution
//! engine enforce those deterministically.

pub mod extraction;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use extraction::LlmOracle;
pub use llm::{HttpLlmClient, LlmClient};
pub use prompt::{DefaultProfile, ExtractionProfile, ProfileRegistry};
pub use runtime::{AgentOutcome, AgentRuntime, AgentStep};
pub use tools::{mutation_tools, Tool, ToolRegistry};
