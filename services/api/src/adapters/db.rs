//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `EntityStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use autopen_core::domain::{
    AnalyzedContent, BrainDump, BrainDumpFile, BrainDumpLink, BrainDumpStatus, Chapter,
    ChapterStatus, Ebook, EbookStatus, FileKind, Idea, LinkKind, Project, ProjectStatus,
    TranscriptState,
};
use autopen_core::ports::{
    BrainDumpPatch, ChapterPatch, EntityStore, PortError, PortResult,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `EntityStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProjectRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    fn to_domain(self) -> PortResult<Project> {
        Ok(Project {
            id: self.id,
            title: self.title,
            description: self.description,
            status: ProjectStatus::from_str_db(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct BrainDumpRecord {
    id: Uuid,
    project_id: Uuid,
    raw_content: String,
    analyzed_content: Option<String>,
    status: String,
}

impl BrainDumpRecord {
    fn to_domain(self) -> PortResult<BrainDump> {
        let analyzed_content = self
            .analyzed_content
            .map(|json| {
                serde_json::from_str::<AnalyzedContent>(&json).map_err(|e| {
                    PortError::Unexpected(format!("Corrupt analyzed_content payload: {e}"))
                })
            })
            .transpose()?;
        Ok(BrainDump {
            id: self.id,
            project_id: self.project_id,
            raw_content: self.raw_content,
            analyzed_content,
            status: BrainDumpStatus::from_str_db(&self.status)?,
        })
    }
}

#[derive(FromRow)]
struct FileRecord {
    id: Uuid,
    brain_dump_id: Uuid,
    file_name: String,
    file_size: i64,
    kind: String,
    preview: Option<String>,
    extracted_text: Option<String>,
}

impl FileRecord {
    fn to_domain(self) -> PortResult<BrainDumpFile> {
        Ok(BrainDumpFile {
            id: self.id,
            brain_dump_id: self.brain_dump_id,
            file_name: self.file_name,
            file_size: self.file_size.max(0) as u64,
            kind: FileKind::from_str_db(&self.kind)?,
            preview: self.preview,
            extracted_text: self.extracted_text,
        })
    }
}

#[derive(FromRow)]
struct LinkRecord {
    id: Uuid,
    brain_dump_id: Uuid,
    url: String,
    title: String,
    link_type: String,
    thumbnail: Option<String>,
    transcript: String,
}

impl LinkRecord {
    fn to_domain(self) -> PortResult<BrainDumpLink> {
        let transcript = serde_json::from_str::<TranscriptState>(&self.transcript)
            .map_err(|e| PortError::Unexpected(format!("Corrupt transcript payload: {e}")))?;
        Ok(BrainDumpLink {
            id: self.id,
            brain_dump_id: self.brain_dump_id,
            url: self.url,
            title: self.title,
            link_type: LinkKind::from_str_db(&self.link_type)?,
            thumbnail: self.thumbnail,
            transcript,
        })
    }
}

#[derive(FromRow)]
struct IdeaRecord {
    id: Uuid,
    project_id: Uuid,
    title: String,
    description: String,
    source_data: Option<String>,
}

impl IdeaRecord {
    fn to_domain(self) -> Idea {
        Idea {
            id: self.id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            source_data: self.source_data,
        }
    }
}

#[derive(FromRow)]
struct EbookRecord {
    id: Uuid,
    project_id: Uuid,
    title: String,
    description: String,
    status: String,
    cover_image_url: Option<String>,
}

impl EbookRecord {
    fn to_domain(self) -> PortResult<Ebook> {
        Ok(Ebook {
            id: self.id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            status: EbookStatus::from_str_db(&self.status)?,
            cover_image_url: self.cover_image_url,
        })
    }
}

#[derive(FromRow)]
struct ChapterRecord {
    id: Uuid,
    ebook_id: Uuid,
    title: String,
    order_index: i32,
    content: Option<String>,
    status: String,
}

impl ChapterRecord {
    fn to_domain(self) -> PortResult<Chapter> {
        Ok(Chapter {
            id: self.id,
            ebook_id: self.ebook_id,
            title: self.title,
            order_index: self.order_index.max(0) as u32,
            content: self.content,
            status: ChapterStatus::from_str_db(&self.status)?,
        })
    }
}

fn encode_analyzed(content: &AnalyzedContent) -> PortResult<String> {
    serde_json::to_string(content)
        .map_err(|e| PortError::Unexpected(format!("Failed to encode analyzed content: {e}")))
}

fn encode_transcript(state: &TranscriptState) -> PortResult<String> {
    serde_json::to_string(state)
        .map_err(|e| PortError::Unexpected(format!("Failed to encode transcript state: {e}")))
}

//=========================================================================================
// `EntityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl EntityStore for DbAdapter {
    async fn create_project(&self, project: &Project) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO projects (id, title, description, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(project.id)
        .bind(&project.title)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_project(&self, project_id: Uuid) -> PortResult<Project> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "SELECT id, title, description, status, created_at, updated_at \
             FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or(e, || format!("Project {} not found", project_id)))?;
        record.to_domain()
    }

    async fn update_project_status(
        &self,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> PortResult<()> {
        sqlx::query("UPDATE projects SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_brain_dump(&self, dump: &BrainDump) -> PortResult<()> {
        let analyzed = dump
            .analyzed_content
            .as_ref()
            .map(encode_analyzed)
            .transpose()?;
        sqlx::query(
            "INSERT INTO brain_dumps (id, project_id, raw_content, analyzed_content, status) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(dump.id)
        .bind(dump.project_id)
        .bind(&dump.raw_content)
        .bind(analyzed)
        .bind(dump.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_brain_dump_for_project(
        &self,
        project_id: Uuid,
    ) -> PortResult<Option<BrainDump>> {
        let record = sqlx::query_as::<_, BrainDumpRecord>(
            "SELECT id, project_id, raw_content, analyzed_content, status \
             FROM brain_dumps WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(BrainDumpRecord::to_domain).transpose()
    }

    async fn update_brain_dump(&self, dump_id: Uuid, patch: BrainDumpPatch) -> PortResult<()> {
        // COALESCE-style partial update: untouched fields keep their value.
        if let Some(raw_content) = patch.raw_content {
            sqlx::query("UPDATE brain_dumps SET raw_content = $1 WHERE id = $2")
                .bind(raw_content)
                .bind(dump_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        }
        if let Some(analyzed_content) = patch.analyzed_content {
            let encoded = analyzed_content.as_ref().map(encode_analyzed).transpose()?;
            sqlx::query("UPDATE brain_dumps SET analyzed_content = $1 WHERE id = $2")
                .bind(encoded)
                .bind(dump_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        }
        if let Some(status) = patch.status {
            sqlx::query("UPDATE brain_dumps SET status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(dump_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        }
        Ok(())
    }

    async fn create_file(&self, file: &BrainDumpFile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO brain_dump_files \
             (id, brain_dump_id, file_name, file_size, kind, preview, extracted_text) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(file.id)
        .bind(file.brain_dump_id)
        .bind(&file.file_name)
        .bind(file.file_size as i64)
        .bind(file.kind.as_str())
        .bind(&file.preview)
        .bind(&file.extracted_text)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_file(&self, file_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM brain_dump_files WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_files(&self, brain_dump_id: Uuid) -> PortResult<Vec<BrainDumpFile>> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT id, brain_dump_id, file_name, file_size, kind, preview, extracted_text \
             FROM brain_dump_files WHERE brain_dump_id = $1",
        )
        .bind(brain_dump_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(FileRecord::to_domain).collect()
    }

    async fn create_link(&self, link: &BrainDumpLink) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO brain_dump_links \
             (id, brain_dump_id, url, title, link_type, thumbnail, transcript) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(link.id)
        .bind(link.brain_dump_id)
        .bind(&link.url)
        .bind(&link.title)
        .bind(link.link_type.as_str())
        .bind(&link.thumbnail)
        .bind(encode_transcript(&link.transcript)?)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_link_transcript(
        &self,
        link_id: Uuid,
        transcript: TranscriptState,
    ) -> PortResult<()> {
        sqlx::query("UPDATE brain_dump_links SET transcript = $1 WHERE id = $2")
            .bind(encode_transcript(&transcript)?)
            .bind(link_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_link(&self, link_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM brain_dump_links WHERE id = $1")
            .bind(link_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_links(&self, brain_dump_id: Uuid) -> PortResult<Vec<BrainDumpLink>> {
        let records = sqlx::query_as::<_, LinkRecord>(
            "SELECT id, brain_dump_id, url, title, link_type, thumbnail, transcript \
             FROM brain_dump_links WHERE brain_dump_id = $1",
        )
        .bind(brain_dump_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(LinkRecord::to_domain).collect()
    }

    async fn create_ideas(&self, ideas: &[Idea]) -> PortResult<()> {
        // Idea batches are small (a handful per analysis), so row-at-a-time
        // inserts are fine here.
        for idea in ideas {
            sqlx::query(
                "INSERT INTO ideas (id, project_id, title, description, source_data) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(idea.id)
            .bind(idea.project_id)
            .bind(&idea.title)
            .bind(&idea.description)
            .bind(&idea.source_data)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        }
        Ok(())
    }

    async fn list_ideas(&self, project_id: Uuid) -> PortResult<Vec<Idea>> {
        let records = sqlx::query_as::<_, IdeaRecord>(
            "SELECT id, project_id, title, description, source_data \
             FROM ideas WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(IdeaRecord::to_domain).collect())
    }

    async fn create_ebook(&self, ebook: &Ebook) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO ebooks (id, project_id, title, description, status, cover_image_url) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(ebook.id)
        .bind(ebook.project_id)
        .bind(&ebook.title)
        .bind(&ebook.description)
        .bind(ebook.status.as_str())
        .bind(&ebook.cover_image_url)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_ebook_for_project(&self, project_id: Uuid) -> PortResult<Option<Ebook>> {
        let record = sqlx::query_as::<_, EbookRecord>(
            "SELECT id, project_id, title, description, status, cover_image_url \
             FROM ebooks WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(EbookRecord::to_domain).transpose()
    }

    async fn update_ebook_status(&self, ebook_id: Uuid, status: EbookStatus) -> PortResult<()> {
        sqlx::query("UPDATE ebooks SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(ebook_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_chapter(&self, chapter: &Chapter) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chapters (id, ebook_id, title, order_index, content, status) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(chapter.id)
        .bind(chapter.ebook_id)
        .bind(&chapter.title)
        .bind(chapter.order_index as i32)
        .bind(&chapter.content)
        .bind(chapter.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update_chapter(&self, chapter_id: Uuid, patch: ChapterPatch) -> PortResult<()> {
        if let Some(title) = patch.title {
            sqlx::query("UPDATE chapters SET title = $1 WHERE id = $2")
                .bind(title)
                .bind(chapter_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        }
        if let Some(content) = patch.content {
            sqlx::query("UPDATE chapters SET content = $1 WHERE id = $2")
                .bind(content)
                .bind(chapter_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        }
        if let Some(status) = patch.status {
            sqlx::query("UPDATE chapters SET status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(chapter_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        }
        Ok(())
    }

    async fn delete_chapter(&self, chapter_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(chapter_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_chapters(&self, ebook_id: Uuid) -> PortResult<Vec<Chapter>> {
        let records = sqlx::query_as::<_, ChapterRecord>(
            "SELECT id, ebook_id, title, order_index, content, status \
             FROM chapters WHERE ebook_id = $1 ORDER BY order_index ASC",
        )
        .bind(ebook_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ChapterRecord::to_domain).collect()
    }
}
