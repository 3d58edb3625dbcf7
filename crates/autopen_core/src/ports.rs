//! crates/autopen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    AnalyzedContent, BrainDump, BrainDumpFile, BrainDumpLink, BrainDumpStatus, Chapter,
    ChapterStatus, Ebook, EbookStatus, Idea, Project, ProjectStatus, TranscriptState,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for entity-store operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failure classes for the generation service.
///
/// The workflow treats these differently: `Auth` is fatal to the calling
/// step, `Transient` and `Empty` are recoverable (retried or replaced with
/// synthesized content).
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// API key invalid or missing. Fatal to the calling workflow step.
    #[error("Generation service authentication failed: {0}")]
    Auth(String),
    /// Network/service hiccup. Retryable on the next action.
    #[error("Generation service temporarily unavailable: {0}")]
    Transient(String),
    /// The service returned no usable content.
    #[error("Generation service returned an empty result")]
    Empty,
}

/// Failure classes for the ingestion helper.
///
/// The contract requires the helper to return within its timeout and to
/// never panic on a malformed or unsupported URL.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported input: {0}")]
    Unsupported(String),
    #[error("Extraction timed out")]
    TimedOut,
    #[error("Extraction failed: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export format {0:?} has no in-tree renderer")]
    UnsupportedFormat(ExportFormat),
    #[error("Export failed: {0}")]
    Failed(String),
}

//=========================================================================================
// Entity Store
//=========================================================================================

/// Partial-field update for a brain dump. `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct BrainDumpPatch {
    pub raw_content: Option<String>,
    pub analyzed_content: Option<Option<AnalyzedContent>>,
    pub status: Option<BrainDumpStatus>,
}

/// Partial-field update for a chapter. `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub status: Option<ChapterStatus>,
}

/// Persistence port for all wizard entities.
///
/// One method per entity and operation, so every call site is typed and
/// exhaustive; there is no runtime dispatch on an entity-kind string.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // --- Projects ---
    async fn create_project(&self, project: &Project) -> PortResult<()>;
    async fn get_project(&self, project_id: Uuid) -> PortResult<Project>;
    async fn update_project_status(&self, project_id: Uuid, status: ProjectStatus)
        -> PortResult<()>;

    // --- Brain dumps ---
    async fn create_brain_dump(&self, dump: &BrainDump) -> PortResult<()>;
    async fn find_brain_dump_for_project(&self, project_id: Uuid)
        -> PortResult<Option<BrainDump>>;
    async fn update_brain_dump(&self, dump_id: Uuid, patch: BrainDumpPatch) -> PortResult<()>;

    // --- Brain dump attachments ---
    async fn create_file(&self, file: &BrainDumpFile) -> PortResult<()>;
    async fn delete_file(&self, file_id: Uuid) -> PortResult<()>;
    async fn list_files(&self, brain_dump_id: Uuid) -> PortResult<Vec<BrainDumpFile>>;

    async fn create_link(&self, link: &BrainDumpLink) -> PortResult<()>;
    async fn update_link_transcript(
        &self,
        link_id: Uuid,
        transcript: TranscriptState,
    ) -> PortResult<()>;
    async fn delete_link(&self, link_id: Uuid) -> PortResult<()>;
    async fn list_links(&self, brain_dump_id: Uuid) -> PortResult<Vec<BrainDumpLink>>;

    // --- Ideas ---
    async fn create_ideas(&self, ideas: &[Idea]) -> PortResult<()>;
    async fn list_ideas(&self, project_id: Uuid) -> PortResult<Vec<Idea>>;

    // --- Ebooks ---
    async fn create_ebook(&self, ebook: &Ebook) -> PortResult<()>;
    async fn find_ebook_for_project(&self, project_id: Uuid) -> PortResult<Option<Ebook>>;
    async fn update_ebook_status(&self, ebook_id: Uuid, status: EbookStatus) -> PortResult<()>;

    // --- Chapters ---
    async fn create_chapter(&self, chapter: &Chapter) -> PortResult<()>;
    async fn update_chapter(&self, chapter_id: Uuid, patch: ChapterPatch) -> PortResult<()>;
    async fn delete_chapter(&self, chapter_id: Uuid) -> PortResult<()>;
    /// Chapters for an ebook, ascending `order_index`.
    async fn list_chapters(&self, ebook_id: Uuid) -> PortResult<Vec<Chapter>>;
}

//=========================================================================================
// Generation Service
//=========================================================================================

/// The assembled context for one generation call.
///
/// Prompt text itself is the adapter's concern; the core hands over the
/// structured inputs and receives plain text back.
#[derive(Debug, Clone)]
pub enum PromptContext {
    /// Turn a brain dump (raw text + extracted file texts + transcripts)
    /// into structured topics and points.
    AnalyzeBrainDump {
        raw_text: String,
        file_texts: Vec<String>,
        transcripts: Vec<String>,
    },
    /// Propose ebook ideas from analyzed content.
    ProposeIdeas {
        analysis: AnalyzedContent,
        count: usize,
    },
    /// Write one chapter, given the chapters already written before it.
    WriteChapter {
        ebook_title: String,
        ebook_description: String,
        chapter_title: String,
        /// `(title, content)` of previously generated chapters, in reading
        /// order, for narrative coherence.
        prior_chapters: Vec<(String, String)>,
    },
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Sends an assembled prompt context to the completion API and returns
    /// the generated text.
    async fn complete(&self, context: &PromptContext) -> Result<String, GenerationError>;
}

//=========================================================================================
// Ingestion Helper
//=========================================================================================

/// Successful transcript extraction; `warning` is set when a fallback
/// strategy or synthetic placeholder produced the text.
#[derive(Debug, Clone)]
pub struct TranscriptFetch {
    pub text: String,
    pub warning: Option<String>,
}

#[async_trait]
pub trait IngestionService: Send + Sync {
    /// Extracts text from an uploaded file.
    async fn extract_file_text(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, IngestError>;

    /// Extracts a transcript for a link. Must always return within its
    /// timeout and must never panic for a malformed/unsupported URL.
    async fn extract_link_transcript(&self, url: &str) -> Result<TranscriptFetch, IngestError>;
}

//=========================================================================================
// Export Assembler
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Markdown,
    Pdf,
    Epub,
}

/// Combines finalized chapters into a single document.
///
/// Invoked only after all chapters are generated; format selection does
/// not affect orchestrator state.
pub trait ExportAssembler: Send + Sync {
    fn assemble(
        &self,
        ebook: &Ebook,
        chapters: &[Chapter],
        format: ExportFormat,
    ) -> Result<Vec<u8>, ExportError>;
}
