// crates/core/src/lib.rs
pub mod agent;
pub mod analysis;
pub mod analyzer;
pub mod artifacts;
pub mod cancel;
pub mod llm;
pub mod normalize;
pub mod prompts;
pub mod reinterleave;
pub mod telemetry;

pub use agent::*;
pub use analysis::{parse_analysis, ParsedAnalysis};
pub use analyzer::*;
pub use artifacts::*;
pub use cancel::CancelFlag;
pub use normalize::normalize;
pub use prompts::{PromptError, PromptLibrary};
pub use reinterleave::*;
pub use telemetry::*;
