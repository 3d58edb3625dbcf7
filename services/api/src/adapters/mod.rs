pub mod db;
pub mod export;
pub mod generation_llm;
pub mod ingestion;

pub use db::DbAdapter;
pub use export::MarkdownAssembler;
pub use generation_llm::OpenAiGenerationAdapter;
pub use ingestion::HttpIngestionAdapter;
