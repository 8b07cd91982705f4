pub mod aggregator;
pub mod config;
pub mod extractor;
pub mod llm;
pub mod normalizer;
pub mod processor;
pub mod server;
pub mod sources;
pub mod store;
pub mod types;

pub use aggregator::SourceAggregator;
pub use config::AppConfig;
pub use extractor::PolicyExtractor;
pub use llm::{LanguageModel, MockLanguageModel, OpenAiModel};
pub use normalizer::normalize_record;
pub use processor::PolicyProcessor;
pub use store::{MemoryPolicyStore, PgPolicyStore, PolicyStore};
pub use types::*;
