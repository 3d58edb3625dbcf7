//! In-memory fakes of the service ports, shared by the integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use autopen_core::domain::{
    BrainDump, BrainDumpFile, BrainDumpLink, Chapter, Ebook, EbookStatus, Idea, Project,
    ProjectStatus, TranscriptState,
};
use autopen_core::links::TranscriptHub;
use autopen_core::pacing::PacingPolicy;
use autopen_core::ports::{
    BrainDumpPatch, ChapterPatch, EntityStore, GenerationError, GenerationService, IngestError,
    IngestionService, PortError, PortResult, PromptContext, TranscriptFetch,
};
use autopen_core::workflow::WizardDeps;

//=========================================================================================
// MemoryStore
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    projects: Mutex<HashMap<Uuid, Project>>,
    dumps: Mutex<HashMap<Uuid, BrainDump>>,
    files: Mutex<HashMap<Uuid, BrainDumpFile>>,
    links: Mutex<HashMap<Uuid, BrainDumpLink>>,
    ideas: Mutex<HashMap<Uuid, Idea>>,
    ebooks: Mutex<HashMap<Uuid, Ebook>>,
    chapters: Mutex<HashMap<Uuid, Chapter>>,
    /// When true, every operation fails, for store-failure tests.
    pub fail: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn check(&self) -> PortResult<()> {
        if *self.fail.lock().unwrap() {
            Err(PortError::Unexpected("store down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_project(&self, project: &Project) -> PortResult<()> {
        self.check()?;
        self.projects
            .lock()
            .unwrap()
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, project_id: Uuid) -> PortResult<Project> {
        self.check()?;
        self.projects
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id}")))
    }

    async fn update_project_status(
        &self,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> PortResult<()> {
        self.check()?;
        let mut projects = self.projects.lock().unwrap();
        let project = projects
            .get_mut(&project_id)
            .ok_or_else(|| PortError::NotFound(format!("Project {project_id}")))?;
        project.status = status;
        Ok(())
    }

    async fn create_brain_dump(&self, dump: &BrainDump) -> PortResult<()> {
        self.check()?;
        self.dumps.lock().unwrap().insert(dump.id, dump.clone());
        Ok(())
    }

    async fn find_brain_dump_for_project(
        &self,
        project_id: Uuid,
    ) -> PortResult<Option<BrainDump>> {
        self.check()?;
        Ok(self
            .dumps
            .lock()
            .unwrap()
            .values()
            .find(|d| d.project_id == project_id)
            .cloned())
    }

    async fn update_brain_dump(&self, dump_id: Uuid, patch: BrainDumpPatch) -> PortResult<()> {
        self.check()?;
        let mut dumps = self.dumps.lock().unwrap();
        let dump = dumps
            .get_mut(&dump_id)
            .ok_or_else(|| PortError::NotFound(format!("BrainDump {dump_id}")))?;
        if let Some(raw) = patch.raw_content {
            dump.raw_content = raw;
        }
        if let Some(analyzed) = patch.analyzed_content {
            dump.analyzed_content = analyzed;
        }
        if let Some(status) = patch.status {
            dump.status = status;
        }
        Ok(())
    }

    async fn create_file(&self, file: &BrainDumpFile) -> PortResult<()> {
        self.check()?;
        self.files.lock().unwrap().insert(file.id, file.clone());
        Ok(())
    }

    async fn delete_file(&self, file_id: Uuid) -> PortResult<()> {
        self.check()?;
        self.files.lock().unwrap().remove(&file_id);
        Ok(())
    }

    async fn list_files(&self, brain_dump_id: Uuid) -> PortResult<Vec<BrainDumpFile>> {
        self.check()?;
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.brain_dump_id == brain_dump_id)
            .cloned()
            .collect())
    }

    async fn create_link(&self, link: &BrainDumpLink) -> PortResult<()> {
        self.check()?;
        self.links.lock().unwrap().insert(link.id, link.clone());
        Ok(())
    }

    async fn update_link_transcript(
        &self,
        link_id: Uuid,
        transcript: TranscriptState,
    ) -> PortResult<()> {
        self.check()?;
        let mut links = self.links.lock().unwrap();
        let link = links
            .get_mut(&link_id)
            .ok_or_else(|| PortError::NotFound(format!("Link {link_id}")))?;
        link.transcript = transcript;
        Ok(())
    }

    async fn delete_link(&self, link_id: Uuid) -> PortResult<()> {
        self.check()?;
        self.links.lock().unwrap().remove(&link_id);
        Ok(())
    }

    async fn list_links(&self, brain_dump_id: Uuid) -> PortResult<Vec<BrainDumpLink>> {
        self.check()?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.brain_dump_id == brain_dump_id)
            .cloned()
            .collect())
    }

    async fn create_ideas(&self, ideas: &[Idea]) -> PortResult<()> {
        self.check()?;
        let mut map = self.ideas.lock().unwrap();
        for idea in ideas {
            map.insert(idea.id, idea.clone());
        }
        Ok(())
    }

    async fn list_ideas(&self, project_id: Uuid) -> PortResult<Vec<Idea>> {
        self.check()?;
        Ok(self
            .ideas
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create_ebook(&self, ebook: &Ebook) -> PortResult<()> {
        self.check()?;
        self.ebooks.lock().unwrap().insert(ebook.id, ebook.clone());
        Ok(())
    }

    async fn find_ebook_for_project(&self, project_id: Uuid) -> PortResult<Option<Ebook>> {
        self.check()?;
        Ok(self
            .ebooks
            .lock()
            .unwrap()
            .values()
            .find(|e| e.project_id == project_id)
            .cloned())
    }

    async fn update_ebook_status(&self, ebook_id: Uuid, status: EbookStatus) -> PortResult<()> {
        self.check()?;
        let mut ebooks = self.ebooks.lock().unwrap();
        let ebook = ebooks
            .get_mut(&ebook_id)
            .ok_or_else(|| PortError::NotFound(format!("Ebook {ebook_id}")))?;
        ebook.status = status;
        Ok(())
    }

    async fn create_chapter(&self, chapter: &Chapter) -> PortResult<()> {
        self.check()?;
        self.chapters
            .lock()
            .unwrap()
            .insert(chapter.id, chapter.clone());
        Ok(())
    }

    async fn update_chapter(&self, chapter_id: Uuid, patch: ChapterPatch) -> PortResult<()> {
        self.check()?;
        let mut chapters = self.chapters.lock().unwrap();
        let chapter = chapters
            .get_mut(&chapter_id)
            .ok_or_else(|| PortError::NotFound(format!("Chapter {chapter_id}")))?;
        if let Some(title) = patch.title {
            chapter.title = title;
        }
        if let Some(content) = patch.content {
            chapter.content = content;
        }
        if let Some(status) = patch.status {
            chapter.status = status;
        }
        Ok(())
    }

    async fn delete_chapter(&self, chapter_id: Uuid) -> PortResult<()> {
        self.check()?;
        self.chapters.lock().unwrap().remove(&chapter_id);
        Ok(())
    }

    async fn list_chapters(&self, ebook_id: Uuid) -> PortResult<Vec<Chapter>> {
        self.check()?;
        let mut chapters: Vec<Chapter> = self
            .chapters
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.ebook_id == ebook_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.order_index);
        Ok(chapters)
    }
}

//=========================================================================================
// ScriptedGenerator
//=========================================================================================

/// Generation service fake with per-operation response queues. When a
/// queue is empty a generic success is returned.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<&'static str, VecDeque<Result<String, GenerationError>>>>,
    pub chapter_calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, kind: &'static str, response: Result<String, GenerationError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(response);
    }

    fn pop(&self, kind: &'static str) -> Option<Result<String, GenerationError>> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(kind)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn complete(&self, context: &PromptContext) -> Result<String, GenerationError> {
        let kind = match context {
            PromptContext::AnalyzeBrainDump { .. } => "analyze",
            PromptContext::ProposeIdeas { .. } => "ideas",
            PromptContext::WriteChapter { .. } => "chapter",
        };
        if kind == "chapter" {
            self.chapter_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.pop(kind)
            .unwrap_or_else(|| Ok(format!("Generated text for {kind}")))
    }
}

//=========================================================================================
// StubIngestion
//=========================================================================================

#[derive(Default)]
pub struct StubIngestion {
    pub transcript_calls: AtomicUsize,
}

impl StubIngestion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl IngestionService for StubIngestion {
    async fn extract_file_text(&self, _name: &str, bytes: &[u8]) -> Result<String, IngestError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| IngestError::Unsupported("binary file".to_string()))
    }

    async fn extract_link_transcript(&self, url: &str) -> Result<TranscriptFetch, IngestError> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TranscriptFetch {
            text: format!("transcript of {url}"),
            warning: None,
        })
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

pub fn deps_with(
    store: Arc<MemoryStore>,
    generator: Arc<ScriptedGenerator>,
    ingestion: Arc<StubIngestion>,
) -> WizardDeps {
    WizardDeps {
        store,
        generator,
        ingestion: ingestion.clone(),
        transcripts: Arc::new(TranscriptHub::new(ingestion, Duration::from_secs(30))),
        analysis_pacing: PacingPolicy::new(Duration::from_secs(20), Duration::from_secs(75)),
    }
}

pub fn default_deps() -> WizardDeps {
    deps_with(MemoryStore::new(), ScriptedGenerator::new(), StubIngestion::new())
}

/// Sixty words of filler, enough to pass the minimum-content check.
pub fn sixty_words() -> String {
    std::iter::repeat("word").take(60).collect::<Vec<_>>().join(" ")
}
