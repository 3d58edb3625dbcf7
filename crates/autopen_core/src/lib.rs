pub mod chapters;
pub mod domain;
pub mod links;
pub mod pacing;
pub mod ports;
pub mod steps;
pub mod workflow;

pub use chapters::{AddChapterMode, BatchFailure, ChapterProgress};
pub use domain::{
    AnalyzedContent, BrainDump, BrainDumpFile, BrainDumpLink, BrainDumpStatus, Chapter,
    ChapterStatus, Ebook, EbookStatus, FileKind, Idea, LinkKind, Project, ProjectStatus, Topic,
    TranscriptState,
};
pub use links::{detect_link, DetectedLink, TranscriptHub};
pub use pacing::{Clock, PacePhase, PacingPolicy, SystemClock};
pub use ports::{
    BrainDumpPatch, ChapterPatch, EntityStore, ExportAssembler, ExportError, ExportFormat,
    GenerationError, GenerationService, IngestError, IngestionService, PortError, PortResult,
    PromptContext, TranscriptFetch,
};
pub use steps::{resolve_resume, ResumeAction, StoredPayload, WizardStep};
pub use workflow::{IdeaChoice, Wizard, WizardDeps, WorkflowError};
