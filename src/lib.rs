// DataChat - conversational data-analysis assistant: chat with tabular
// data, get textual answers plus generated charts

pub mod chart;
pub mod config;
pub mod dataset;
pub mod directive;
pub mod export;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use dataset::Dataset;
pub use orchestrator::Orchestrator;
pub use session::Session;
