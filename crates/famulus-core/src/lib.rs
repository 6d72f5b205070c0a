//! Command-dispatch and persistence core for the Famulus desk agent.

mod agent;
mod error;
mod llm;
mod memory;
pub mod ops;
mod router;

pub use agent::{Agent, ShelfLife};
pub use error::CoreError;
pub use llm::{HttpLlmClient, LanguageModel};
pub use memory::{LearnSample, MemoryConfig, MemoryService};
pub use router::{DeskAgent, DeskAgentConfig};

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
