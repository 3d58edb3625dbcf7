//! services/api/src/web/dto.rs
//!
//! Request and response payloads for the REST surface. The wizard state
//! response is a flat snapshot the UI re-renders from after every
//! operation; progress figures are derived, never stored.

use autopen_core::domain::{
    BrainDump, BrainDumpFile, BrainDumpLink, Chapter, Ebook, Idea, Project, TranscriptState,
};
use autopen_core::ports::ExportFormat;
use autopen_core::steps::StoredPayload;
use autopen_core::workflow::Wizard;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request payloads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: Option<String>,
}

/// Wire form of the short-lived client-side storage payload.
#[derive(Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredPayloadDto {
    Resume { step: String, project_id: Uuid },
    NewProject {
        title: String,
        description: Option<String>,
    },
}

impl From<StoredPayloadDto> for StoredPayload {
    fn from(dto: StoredPayloadDto) -> Self {
        match dto {
            StoredPayloadDto::Resume { step, project_id } => {
                StoredPayload::Resume { step, project_id }
            }
            StoredPayloadDto::NewProject { title, description } => {
                StoredPayload::NewProject { title, description }
            }
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ResumeRequest {
    pub payload: Option<StoredPayloadDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveBrainDumpRequest {
    pub raw_content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddLinkRequest {
    pub url: String,
}

/// Either `idea_id` for a generated idea, or `title` + `description` for
/// a custom one.
#[derive(Deserialize, ToSchema)]
pub struct SelectIdeaRequest {
    pub idea_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct GoToStepRequest {
    pub step: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddChapterRequest {
    pub title: String,
    /// `manual` or `ai`.
    pub mode: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EditChapterRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: ExportFormat,
}

//=========================================================================================
// Response payloads
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProjectDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
}

impl From<&Project> for ProjectDto {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id,
            title: p.title.clone(),
            description: p.description.clone(),
            status: p.status.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TopicDto {
    pub name: String,
    pub points: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BrainDumpDto {
    pub id: Uuid,
    pub raw_content: String,
    pub word_count: usize,
    pub status: String,
    pub topics: Vec<TopicDto>,
    /// True when analysis was force-completed with placeholder content.
    pub degraded: bool,
}

impl From<&BrainDump> for BrainDumpDto {
    fn from(d: &BrainDump) -> Self {
        let (topics, degraded) = match &d.analyzed_content {
            Some(analysis) => (
                analysis
                    .topics
                    .iter()
                    .map(|t| TopicDto {
                        name: t.name.clone(),
                        points: t.points.clone(),
                    })
                    .collect(),
                analysis.degraded,
            ),
            None => (Vec::new(), false),
        };
        Self {
            id: d.id,
            raw_content: d.raw_content.clone(),
            word_count: d.word_count(),
            status: d.status.as_str().to_string(),
            topics,
            degraded,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FileDto {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub kind: String,
    pub has_text: bool,
}

impl From<&BrainDumpFile> for FileDto {
    fn from(f: &BrainDumpFile) -> Self {
        Self {
            id: f.id,
            file_name: f.file_name.clone(),
            file_size: f.file_size,
            kind: f.kind.as_str().to_string(),
            has_text: f.extracted_text.is_some(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LinkDto {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub link_type: String,
    pub thumbnail: Option<String>,
    /// `loading`, `ready`, or `failed`.
    pub transcript_state: String,
    pub transcript_warning: Option<String>,
    pub transcript_error: Option<String>,
}

impl From<&BrainDumpLink> for LinkDto {
    fn from(l: &BrainDumpLink) -> Self {
        let (state, warning, error) = match &l.transcript {
            TranscriptState::Loading => ("loading", None, None),
            TranscriptState::Ready { warning, .. } => ("ready", warning.clone(), None),
            TranscriptState::Failed { reason } => ("failed", None, Some(reason.clone())),
        };
        Self {
            id: l.id,
            url: l.url.clone(),
            title: l.title.clone(),
            link_type: l.link_type.as_str().to_string(),
            thumbnail: l.thumbnail.clone(),
            transcript_state: state.to_string(),
            transcript_warning: warning,
            transcript_error: error,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct IdeaDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
}

impl From<&Idea> for IdeaDto {
    fn from(i: &Idea) -> Self {
        Self {
            id: i.id,
            title: i.title.clone(),
            description: i.description.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EbookDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub cover_image_url: Option<String>,
}

impl From<&Ebook> for EbookDto {
    fn from(e: &Ebook) -> Self {
        Self {
            id: e.id,
            title: e.title.clone(),
            description: e.description.clone(),
            status: e.status.as_str().to_string(),
            cover_image_url: e.cover_image_url.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChapterDto {
    pub id: Uuid,
    pub title: String,
    pub order_index: u32,
    pub status: String,
    pub content: Option<String>,
}

impl From<&Chapter> for ChapterDto {
    fn from(c: &Chapter) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            order_index: c.order_index,
            status: c.status.as_str().to_string(),
            content: c.content.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProgressDto {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub all_generated: bool,
}

/// The full wizard snapshot returned by every handler.
#[derive(Serialize, ToSchema)]
pub struct WizardStateResponse {
    /// Current step slug.
    pub step: String,
    pub step_ordinal: u8,
    pub project: ProjectDto,
    pub brain_dump: BrainDumpDto,
    pub files: Vec<FileDto>,
    pub links: Vec<LinkDto>,
    pub ideas: Vec<IdeaDto>,
    pub ebook: Option<EbookDto>,
    pub chapters: Vec<ChapterDto>,
    pub progress: ProgressDto,
}

impl WizardStateResponse {
    pub fn from_wizard(wizard: &Wizard) -> Self {
        let progress = wizard.progress();
        Self {
            step: wizard.current_step().as_slug().to_string(),
            step_ordinal: wizard.current_step().ordinal(),
            project: wizard.project().into(),
            brain_dump: wizard.brain_dump().into(),
            files: wizard.files().iter().map(Into::into).collect(),
            links: wizard.links().iter().map(Into::into).collect(),
            ideas: wizard.ideas().iter().map(Into::into).collect(),
            ebook: wizard.ebook().map(Into::into),
            chapters: wizard.chapters().iter().map(Into::into).collect(),
            progress: ProgressDto {
                completed: progress.completed,
                total: progress.total,
                percent: progress.percent(),
                all_generated: progress.all_generated(),
            },
        }
    }
}
