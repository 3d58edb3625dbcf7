//! crates/autopen_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ports::PortError;

/// Root of one content-creation session.
///
/// A project has at most one active brain dump and at most one active
/// ebook at a time.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    InProgress,
    Complete,
}

impl ProjectStatus {
    /// Parse a status string from the database.
    pub fn from_str_db(s: &str) -> Result<Self, PortError> {
        match s {
            "draft" => Ok(Self::Draft),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            _ => Err(PortError::Unexpected(format!(
                "Invalid project status '{s}'. Must be one of: draft, in_progress, complete"
            ))),
        }
    }

    /// Convert to a database-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

/// The raw, unstructured input stage the user supplies before structured
/// content generation.
#[derive(Debug, Clone)]
pub struct BrainDump {
    pub id: Uuid,
    pub project_id: Uuid,
    pub raw_content: String,
    /// Non-null exactly when `status == Analyzed`.
    pub analyzed_content: Option<AnalyzedContent>,
    pub status: BrainDumpStatus,
}

impl BrainDump {
    /// Number of whitespace-separated words in the raw content.
    pub fn word_count(&self) -> usize {
        self.raw_content.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrainDumpStatus {
    Empty,
    Saved,
    Analyzing,
    Analyzed,
}

impl BrainDumpStatus {
    pub fn from_str_db(s: &str) -> Result<Self, PortError> {
        match s {
            "empty" => Ok(Self::Empty),
            "saved" => Ok(Self::Saved),
            "analyzing" => Ok(Self::Analyzing),
            "analyzed" => Ok(Self::Analyzed),
            _ => Err(PortError::Unexpected(format!(
                "Invalid brain dump status '{s}'. Must be one of: empty, saved, analyzing, analyzed"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Saved => "saved",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
        }
    }
}

/// Structured topics-and-points produced by analyzing a brain dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedContent {
    pub topics: Vec<Topic>,
    /// Set when the analysis was force-completed by the pacing policy
    /// instead of finishing normally.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub points: Vec<String>,
}

/// A file attached to a brain dump. Many per brain dump, unordered.
#[derive(Debug, Clone)]
pub struct BrainDumpFile {
    pub id: Uuid,
    pub brain_dump_id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub kind: FileKind,
    pub preview: Option<String>,
    /// Text pulled out of the file by the ingestion helper, if extraction
    /// succeeded. Included in the analysis context.
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Document,
    Image,
}

impl FileKind {
    pub fn from_str_db(s: &str) -> Result<Self, PortError> {
        match s {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            _ => Err(PortError::Unexpected(format!(
                "Invalid file kind '{s}'. Must be one of: document, image"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
        }
    }
}

/// A link attached to a brain dump.
///
/// The transcript lifecycle is a sum type: a link is created `Loading` and
/// transitions exactly once to `Ready` or `Failed`. The three arms are
/// mutually exclusive by construction.
#[derive(Debug, Clone)]
pub struct BrainDumpLink {
    pub id: Uuid,
    pub brain_dump_id: Uuid,
    pub url: String,
    pub title: String,
    pub link_type: LinkKind,
    pub thumbnail: Option<String>,
    pub transcript: TranscriptState,
}

impl BrainDumpLink {
    /// The transcript text, when extraction has completed successfully.
    pub fn transcript_text(&self) -> Option<&str> {
        match &self.transcript {
            TranscriptState::Ready { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.transcript, TranscriptState::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Webpage,
    Youtube,
}

impl LinkKind {
    pub fn from_str_db(s: &str) -> Result<Self, PortError> {
        match s {
            "webpage" => Ok(Self::Webpage),
            "youtube" => Ok(Self::Youtube),
            _ => Err(PortError::Unexpected(format!(
                "Invalid link kind '{s}'. Must be one of: webpage, youtube"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webpage => "webpage",
            Self::Youtube => "youtube",
        }
    }
}

/// Transcript extraction state for a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TranscriptState {
    /// Extraction is in flight. Resolves within the fetch timeout.
    Loading,
    /// Extraction produced text; `warning` is set when a fallback strategy
    /// or placeholder was used.
    Ready {
        text: String,
        warning: Option<String>,
    },
    /// Extraction failed terminally (including by timeout).
    Failed { reason: String },
}

/// A generated (or custom) title+description candidate for the ebook's
/// subject. Immutable once generated.
#[derive(Debug, Clone)]
pub struct Idea {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub source_data: Option<String>,
}

/// The ebook under construction. Owns an ordered list of chapters.
#[derive(Debug, Clone)]
pub struct Ebook {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: EbookStatus,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EbookStatus {
    Draft,
    InProgress,
    Complete,
}

impl EbookStatus {
    pub fn from_str_db(s: &str) -> Result<Self, PortError> {
        match s {
            "draft" => Ok(Self::Draft),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            _ => Err(PortError::Unexpected(format!(
                "Invalid ebook status '{s}'. Must be one of: draft, in_progress, complete"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }
}

/// One ordered unit of the ebook's body content.
///
/// `order_index` values are dense at creation time; deletes may leave gaps.
/// Reading and generation order is ascending `order_index`.
#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: Uuid,
    pub ebook_id: Uuid,
    pub title: String,
    pub order_index: u32,
    /// Non-null exactly when `status == Generated`.
    pub content: Option<String>,
    pub status: ChapterStatus,
}

impl Chapter {
    /// A fresh pending chapter with no content.
    pub fn pending(ebook_id: Uuid, title: impl Into<String>, order_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            ebook_id,
            title: title.into(),
            order_index,
            content: None,
            status: ChapterStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Pending,
    Generating,
    Generated,
}

impl ChapterStatus {
    pub fn from_str_db(s: &str) -> Result<Self, PortError> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "generated" => Ok(Self::Generated),
            _ => Err(PortError::Unexpected(format!(
                "Invalid chapter status '{s}'. Must be one of: pending, generating, generated"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Generated => "generated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_slugs_roundtrip() {
        for status in [
            BrainDumpStatus::Empty,
            BrainDumpStatus::Saved,
            BrainDumpStatus::Analyzing,
            BrainDumpStatus::Analyzed,
        ] {
            assert_eq!(BrainDumpStatus::from_str_db(status.as_str()).unwrap(), status);
        }
        for status in [
            ChapterStatus::Pending,
            ChapterStatus::Generating,
            ChapterStatus::Generated,
        ] {
            assert_eq!(ChapterStatus::from_str_db(status.as_str()).unwrap(), status);
        }
        for status in [EbookStatus::Draft, EbookStatus::InProgress, EbookStatus::Complete] {
            assert_eq!(EbookStatus::from_str_db(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn invalid_slugs_are_rejected() {
        assert!(BrainDumpStatus::from_str_db("done").is_err());
        assert!(ChapterStatus::from_str_db("").is_err());
        assert!(LinkKind::from_str_db("video").is_err());
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        let dump = BrainDump {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            raw_content: "one two\tthree\nfour  five".to_string(),
            analyzed_content: None,
            status: BrainDumpStatus::Saved,
        };
        assert_eq!(dump.word_count(), 5);
    }

    #[test]
    fn transcript_text_only_when_ready() {
        let mut link = BrainDumpLink {
            id: Uuid::new_v4(),
            brain_dump_id: Uuid::new_v4(),
            url: "https://example.com".to_string(),
            title: "example.com".to_string(),
            link_type: LinkKind::Webpage,
            thumbnail: None,
            transcript: TranscriptState::Loading,
        };
        assert!(link.is_loading());
        assert_eq!(link.transcript_text(), None);

        link.transcript = TranscriptState::Ready {
            text: "hello".to_string(),
            warning: None,
        };
        assert!(!link.is_loading());
        assert_eq!(link.transcript_text(), Some("hello"));

        link.transcript = TranscriptState::Failed {
            reason: "timed out".to_string(),
        };
        assert_eq!(link.transcript_text(), None);
    }
}
