//! crates/autopen_core/src/workflow.rs
//!
//! The wizard workflow state machine. A `Wizard` owns the in-memory entity
//! set for one content-creation session and mediates every mutation; step
//! transitions, auto-advance, resumption, and the analyze operation all
//! live here. Chapter operations are in the `chapters` module.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    AnalyzedContent, BrainDump, BrainDumpFile, BrainDumpLink, BrainDumpStatus, Chapter, Ebook,
    EbookStatus, FileKind, Idea, Project, ProjectStatus, Topic, TranscriptState,
};
use crate::links::{detect_link, TranscriptHub};
use crate::pacing::{run_paced, PacedOutcome, PacingPolicy};
use crate::ports::{
    BrainDumpPatch, EntityStore, GenerationError, GenerationService, IngestionService, PortError,
    PromptContext,
};
use crate::steps::WizardStep;

/// How many ideas to ask the generation service for.
const IDEA_COUNT: usize = 3;

/// Cap on chapters derived from analyzed topics.
const MAX_OUTLINE_TOPICS: usize = 10;

/// Minimum words of raw text when no files or links are attached.
pub const MIN_BRAIN_DUMP_WORDS: usize = 50;

/// Minimum length of a custom idea title.
pub const MIN_CUSTOM_TITLE_CHARS: usize = 5;

/// Minimum length of a custom idea description.
pub const MIN_CUSTOM_DESCRIPTION_CHARS: usize = 20;

//=========================================================================================
// Errors
//=========================================================================================

/// Typed outcome for every workflow operation. No raw adapter failure
/// crosses into transition logic uncaught.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Bad input; blocks the current transition, recoverable by correcting it.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The named entity does not exist in this session.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The operation would violate a structural invariant.
    #[error("Rejected: {0}")]
    Invariant(String),
    /// The requested step transition is not legal right now.
    #[error("Step transition rejected: {0}")]
    Blocked(String),
    /// Entity-store failure; the step does not advance.
    #[error("Store error: {0}")]
    Store(#[from] PortError),
    /// Generation-service failure, classified by the port.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

//=========================================================================================
// Dependencies
//=========================================================================================

/// The explicit context handed to the wizard: every external collaborator
/// the workflow talks to, plus policy knobs. There is no ambient state.
#[derive(Clone)]
pub struct WizardDeps {
    pub store: Arc<dyn EntityStore>,
    pub generator: Arc<dyn GenerationService>,
    pub ingestion: Arc<dyn IngestionService>,
    pub transcripts: Arc<TranscriptHub>,
    pub analysis_pacing: PacingPolicy,
}

impl std::fmt::Debug for WizardDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardDeps").finish_non_exhaustive()
    }
}

//=========================================================================================
// Wizard
//=========================================================================================

/// One content-creation session.
///
/// The entity set is owned exclusively by this struct for the duration of
/// the session; callers read through accessors and mutate only through
/// the operations below, which keeps the domain invariants local.
#[derive(Debug)]
pub struct Wizard {
    deps: WizardDeps,
    step: WizardStep,
    project: Project,
    brain_dump: BrainDump,
    files: Vec<BrainDumpFile>,
    links: Vec<BrainDumpLink>,
    ideas: Vec<Idea>,
    ebook: Option<Ebook>,
    pub(crate) chapters: Vec<Chapter>,
}

impl Wizard {
    /// Create a new project (wizard entry). The title is required.
    pub async fn create(
        deps: WizardDeps,
        title: &str,
        description: Option<String>,
    ) -> Result<Self, WorkflowError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WorkflowError::Validation(
                "Project title must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description,
            status: ProjectStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        deps.store.create_project(&project).await?;

        // The brain dump record exists from the start so attachments have
        // something to hang off.
        let brain_dump = BrainDump {
            id: Uuid::new_v4(),
            project_id: project.id,
            raw_content: String::new(),
            analyzed_content: None,
            status: BrainDumpStatus::Empty,
        };
        deps.store.create_brain_dump(&brain_dump).await?;

        info!(project_id = %project.id, "project created");
        Ok(Self {
            deps,
            step: WizardStep::BrainDump,
            project,
            brain_dump,
            files: Vec::new(),
            links: Vec::new(),
            ideas: Vec::new(),
            ebook: None,
            chapters: Vec::new(),
        })
    }

    /// Load an existing session from the entity store and derive the
    /// correct step from persisted state.
    pub async fn load(deps: WizardDeps, project_id: Uuid) -> Result<Self, WorkflowError> {
        Self::load_at(deps, project_id, None).await
    }

    /// Load an existing session, entering at `requested` (e.g. from a
    /// resume token). Auto-advance still corrects a stale step.
    pub async fn load_at(
        deps: WizardDeps,
        project_id: Uuid,
        requested: Option<WizardStep>,
    ) -> Result<Self, WorkflowError> {
        let project = deps.store.get_project(project_id).await?;
        let brain_dump = deps
            .store
            .find_brain_dump_for_project(project_id)
            .await?
            .ok_or_else(|| {
                PortError::Unexpected(format!("Project {project_id} has no brain dump"))
            })?;
        let files = deps.store.list_files(brain_dump.id).await?;
        let links = deps.store.list_links(brain_dump.id).await?;
        let ideas = deps.store.list_ideas(project_id).await?;
        let ebook = deps.store.find_ebook_for_project(project_id).await?;
        let chapters = match &ebook {
            Some(ebook) => deps.store.list_chapters(ebook.id).await?,
            None => Vec::new(),
        };

        let mut wizard = Self {
            deps,
            step: WizardStep::BrainDump,
            project,
            brain_dump,
            files,
            links,
            ideas,
            ebook,
            chapters,
        };
        let base = requested
            .map(WizardStep::normalized)
            .unwrap_or_else(|| wizard.derived_step());
        wizard.step = wizard.auto_advanced(base);
        wizard.apply_finished_fetches().await?;
        Ok(wizard)
    }

    // --- Accessors -----------------------------------------------------------------

    pub fn current_step(&self) -> WizardStep {
        self.step
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn brain_dump(&self) -> &BrainDump {
        &self.brain_dump
    }

    pub fn files(&self) -> &[BrainDumpFile] {
        &self.files
    }

    pub fn links(&self) -> &[BrainDumpLink] {
        &self.links
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    pub fn ebook(&self) -> Option<&Ebook> {
        self.ebook.as_ref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    // --- Step derivation and navigation --------------------------------------------

    /// The step implied by persisted entity state alone.
    fn derived_step(&self) -> WizardStep {
        match &self.ebook {
            Some(ebook) if ebook.status == EbookStatus::Complete => WizardStep::Completed,
            Some(_) => WizardStep::EbookWriting,
            None if !self.ideas.is_empty() => WizardStep::IdeaSelection,
            None => WizardStep::BrainDump,
        }
    }

    /// Apply the auto-advance rules to `step` until they settle. Makes the
    /// machine idempotent under reload: a stale client step is corrected
    /// from entity state.
    fn auto_advanced(&self, step: WizardStep) -> WizardStep {
        let mut step = step.normalized();
        loop {
            let next = match step {
                WizardStep::BrainDump
                    if self.brain_dump.status == BrainDumpStatus::Analyzed
                        && !self.ideas.is_empty() =>
                {
                    WizardStep::IdeaSelection
                }
                WizardStep::IdeaSelection if self.ebook.is_some() => WizardStep::EbookWriting,
                WizardStep::EbookPreview
                    if self
                        .ebook
                        .as_ref()
                        .is_some_and(|e| e.status == EbookStatus::Complete) =>
                {
                    WizardStep::Completed
                }
                other => other,
            };
            if next == step {
                return step;
            }
            step = next;
        }
    }

    /// Explicit navigation. Backward is always permitted and never mutates
    /// entities; forward is only permitted where the entity state already
    /// supports it, and advancing into the preview requires every chapter
    /// to be generated.
    pub fn go_to_step(&mut self, requested: WizardStep) -> Result<WizardStep, WorkflowError> {
        let requested = requested.normalized();
        if requested <= self.step {
            self.step = requested;
            return Ok(self.step);
        }

        let reachable = self.auto_advanced(self.step);
        if requested <= reachable {
            self.step = requested;
            return Ok(self.step);
        }

        if requested == WizardStep::EbookPreview && self.step == WizardStep::EbookWriting {
            let progress = self.progress();
            if !progress.all_generated() {
                return Err(WorkflowError::Blocked(format!(
                    "{} of {} chapters are not generated yet",
                    progress.total - progress.completed,
                    progress.total
                )));
            }
            self.step = WizardStep::EbookPreview;
            return Ok(self.step);
        }

        if requested == WizardStep::Completed {
            return Err(WorkflowError::Blocked(
                "Completion requires the finalize operation".to_string(),
            ));
        }

        Err(WorkflowError::Blocked(format!(
            "Cannot move from '{}' to '{}'",
            self.step.as_slug(),
            requested.as_slug()
        )))
    }

    fn ensure_not_finalized(&self) -> Result<(), WorkflowError> {
        if self
            .ebook
            .as_ref()
            .is_some_and(|e| e.status == EbookStatus::Complete)
        {
            return Err(WorkflowError::Blocked(
                "The ebook has been finalized".to_string(),
            ));
        }
        Ok(())
    }

    // --- Brain dump operations ------------------------------------------------------

    /// Save (replace) the brain dump's raw text.
    pub async fn save_brain_dump(&mut self, raw_content: &str) -> Result<(), WorkflowError> {
        self.ensure_not_finalized()?;
        let status = if raw_content.trim().is_empty() {
            BrainDumpStatus::Empty
        } else {
            BrainDumpStatus::Saved
        };
        self.deps
            .store
            .update_brain_dump(
                self.brain_dump.id,
                BrainDumpPatch {
                    raw_content: Some(raw_content.to_string()),
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        self.brain_dump.raw_content = raw_content.to_string();
        self.brain_dump.status = status;
        Ok(())
    }

    /// Attach a file. Text extraction failure is non-fatal: the file is
    /// kept with no extracted text and a warning is logged.
    pub async fn attach_file(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        kind: FileKind,
    ) -> Result<Uuid, WorkflowError> {
        self.ensure_not_finalized()?;
        let extracted_text = match kind {
            FileKind::Image => None,
            FileKind::Document => {
                match self.deps.ingestion.extract_file_text(file_name, bytes).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(file_name, error = %e, "file text extraction failed; keeping file without text");
                        None
                    }
                }
            }
        };

        let file = BrainDumpFile {
            id: Uuid::new_v4(),
            brain_dump_id: self.brain_dump.id,
            file_name: file_name.to_string(),
            file_size: bytes.len() as u64,
            kind,
            preview: None,
            extracted_text,
        };
        self.deps.store.create_file(&file).await?;
        let file_id = file.id;
        self.files.push(file);
        Ok(file_id)
    }

    pub async fn remove_file(&mut self, file_id: Uuid) -> Result<(), WorkflowError> {
        self.ensure_not_finalized()?;
        let idx = self
            .files
            .iter()
            .position(|f| f.id == file_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("File {file_id}")))?;
        self.deps.store.delete_file(file_id).await?;
        self.files.remove(idx);
        Ok(())
    }

    /// Attach a link and start its transcript fetch.
    ///
    /// A second submission of the same content (e.g. paste-detection plus
    /// an explicit add) returns the existing link and does not start a
    /// second fetch.
    pub async fn add_link(&mut self, url: &str) -> Result<Uuid, WorkflowError> {
        self.ensure_not_finalized()?;
        let url = url.trim();
        if url.is_empty() {
            return Err(WorkflowError::Validation("Link URL must not be empty".to_string()));
        }

        let detected = detect_link(url);
        if let Some(existing) = self
            .links
            .iter()
            .find(|l| detect_link(&l.url).content_key == detected.content_key)
        {
            info!(content_key = %detected.content_key, "link already attached");
            return Ok(existing.id);
        }

        let link = BrainDumpLink {
            id: Uuid::new_v4(),
            brain_dump_id: self.brain_dump.id,
            url: url.to_string(),
            title: detected.title.clone(),
            link_type: detected.kind,
            thumbnail: detected.thumbnail.clone(),
            transcript: TranscriptState::Loading,
        };
        let link_id = link.id;
        self.deps.store.create_link(&link).await?;
        self.links.push(link);

        self.deps
            .transcripts
            .begin_fetch(&detected.content_key, url)
            .await;
        Ok(link_id)
    }

    /// Remove a link, cancelling any in-flight transcript fetch for it.
    pub async fn remove_link(&mut self, link_id: Uuid) -> Result<(), WorkflowError> {
        self.ensure_not_finalized()?;
        let idx = self
            .links
            .iter()
            .position(|l| l.id == link_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("Link {link_id}")))?;
        let content_key = detect_link(&self.links[idx].url).content_key;
        self.deps.transcripts.cancel(&content_key).await;
        self.deps.store.delete_link(link_id).await?;
        self.links.remove(idx);
        Ok(())
    }

    /// Apply the outcome of any transcript fetch that has already finished,
    /// without waiting for the ones still in flight. A loading link with no
    /// registered fetch (left over from a previous process) gets a fresh
    /// fetch, so no link stays ambiguous forever.
    pub async fn apply_finished_fetches(&mut self) -> Result<(), WorkflowError> {
        for idx in 0..self.links.len() {
            if !self.links[idx].is_loading() {
                continue;
            }
            let content_key = detect_link(&self.links[idx].url).content_key;
            match self.deps.transcripts.try_join(&content_key).await {
                Some(outcome) => self.resolve_link(idx, outcome).await?,
                None => {
                    if !self.deps.transcripts.is_in_flight(&content_key).await {
                        let url = self.links[idx].url.clone();
                        self.deps.transcripts.begin_fetch(&content_key, &url).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn resolve_link(
        &mut self,
        idx: usize,
        outcome: Result<crate::ports::TranscriptFetch, crate::ports::IngestError>,
    ) -> Result<(), WorkflowError> {
        let state = match outcome {
            Ok(fetch) => TranscriptState::Ready {
                text: fetch.text,
                warning: fetch.warning,
            },
            Err(e) => TranscriptState::Failed {
                reason: e.to_string(),
            },
        };
        let link_id = self.links[idx].id;
        self.deps
            .store
            .update_link_transcript(link_id, state.clone())
            .await?;
        self.links[idx].transcript = state;
        Ok(())
    }

    // --- Analysis -------------------------------------------------------------------

    /// Analyze the brain dump and propose ideas, advancing to idea
    /// selection on success.
    ///
    /// The minimum-content check blocks analysis of a dump that is empty,
    /// or that has fewer than [`MIN_BRAIN_DUMP_WORDS`] words and no
    /// attachments. A generation-service authentication failure is fatal
    /// to this step; other generation failures degrade to synthesized
    /// content so the flow keeps moving.
    pub async fn analyze(&mut self) -> Result<AnalyzedContent, WorkflowError> {
        self.ensure_not_finalized()?;
        self.check_minimum_content()?;

        // Entering `Analyzing` clears any previous analysis, keeping the
        // analyzed-content/status invariant true during re-analysis.
        self.deps
            .store
            .update_brain_dump(
                self.brain_dump.id,
                BrainDumpPatch {
                    analyzed_content: Some(None),
                    status: Some(BrainDumpStatus::Analyzing),
                    ..Default::default()
                },
            )
            .await?;
        self.brain_dump.analyzed_content = None;
        self.brain_dump.status = BrainDumpStatus::Analyzing;

        // Join outstanding transcript fetches before building the context;
        // each fetch is individually bounded, so this wait is too.
        let loading_keys: Vec<String> = self
            .links
            .iter()
            .filter(|l| l.is_loading())
            .map(|l| detect_link(&l.url).content_key)
            .collect();
        let outcomes = self.deps.transcripts.join_all(&loading_keys).await;
        for (key, outcome) in outcomes {
            if let Some(idx) = self
                .links
                .iter()
                .position(|l| l.is_loading() && detect_link(&l.url).content_key == key)
            {
                self.resolve_link(idx, outcome).await?;
            }
        }

        let context = PromptContext::AnalyzeBrainDump {
            raw_text: self.brain_dump.raw_content.clone(),
            file_texts: self
                .files
                .iter()
                .filter_map(|f| f.extracted_text.clone())
                .collect(),
            transcripts: self
                .links
                .iter()
                .filter_map(|l| l.transcript_text().map(str::to_string))
                .collect(),
        };

        let generator = self.deps.generator.clone();
        let project_id = self.project.id;
        let outcome = run_paced(
            self.deps.analysis_pacing,
            async { generator.complete(&context).await },
            || warn!(project_id = %project_id, "analysis still running past soft timeout"),
        )
        .await;

        let analysis = match outcome {
            PacedOutcome::Completed { value: Ok(text), degraded } => {
                let mut analysis = parse_analysis(&text);
                analysis.degraded = degraded;
                if analysis.topics.is_empty() {
                    analysis = self.fallback_analysis(degraded);
                }
                analysis
            }
            PacedOutcome::Completed { value: Err(GenerationError::Auth(reason)), .. } => {
                // No usable content can exist without the service; the
                // step does not advance.
                self.set_brain_dump_status(BrainDumpStatus::Saved).await?;
                return Err(GenerationError::Auth(reason).into());
            }
            PacedOutcome::Completed { value: Err(e), .. } => {
                warn!(error = %e, "analysis generation failed; using synthesized topics");
                self.fallback_analysis(true)
            }
            PacedOutcome::Forced => {
                warn!("analysis hit the hard ceiling; forcing completion");
                self.fallback_analysis(true)
            }
        };

        self.deps
            .store
            .update_brain_dump(
                self.brain_dump.id,
                BrainDumpPatch {
                    analyzed_content: Some(Some(analysis.clone())),
                    status: Some(BrainDumpStatus::Analyzed),
                    ..Default::default()
                },
            )
            .await?;
        self.brain_dump.analyzed_content = Some(analysis.clone());
        self.brain_dump.status = BrainDumpStatus::Analyzed;

        self.propose_ideas(&analysis).await?;
        self.step = WizardStep::IdeaSelection;
        Ok(analysis)
    }

    fn check_minimum_content(&self) -> Result<(), WorkflowError> {
        if self.brain_dump.raw_content.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "Add some content before analyzing".to_string(),
            ));
        }
        let has_attachments = !self.files.is_empty() || !self.links.is_empty();
        let words = self.brain_dump.word_count();
        if !has_attachments && words < MIN_BRAIN_DUMP_WORDS {
            return Err(WorkflowError::Validation(format!(
                "Add at least {MIN_BRAIN_DUMP_WORDS} words (currently {words}) or attach a file or link"
            )));
        }
        Ok(())
    }

    async fn set_brain_dump_status(&mut self, status: BrainDumpStatus) -> Result<(), WorkflowError> {
        self.deps
            .store
            .update_brain_dump(
                self.brain_dump.id,
                BrainDumpPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        self.brain_dump.status = status;
        Ok(())
    }

    /// Topics synthesized from the raw text, used when generation cannot
    /// provide real analysis but the flow must keep moving.
    fn fallback_analysis(&self, degraded: bool) -> AnalyzedContent {
        let excerpt: Vec<String> = self
            .brain_dump
            .raw_content
            .split_whitespace()
            .take(12)
            .map(str::to_string)
            .collect();
        AnalyzedContent {
            topics: vec![Topic {
                name: self.project.title.clone(),
                points: vec![excerpt.join(" ")],
            }],
            degraded,
        }
    }

    /// Ask the generation service for ideas; fall back to synthesizing
    /// them from the analysis so idea selection is never empty.
    async fn propose_ideas(&mut self, analysis: &AnalyzedContent) -> Result<(), WorkflowError> {
        let context = PromptContext::ProposeIdeas {
            analysis: analysis.clone(),
            count: IDEA_COUNT,
        };
        let ideas = match self.deps.generator.complete(&context).await {
            Ok(text) => {
                let parsed = parse_ideas(&text, self.project.id);
                if parsed.is_empty() {
                    self.synthesized_ideas(analysis)
                } else {
                    parsed
                }
            }
            Err(GenerationError::Auth(reason)) => {
                return Err(GenerationError::Auth(reason).into());
            }
            Err(e) => {
                warn!(error = %e, "idea generation failed; synthesizing from topics");
                self.synthesized_ideas(analysis)
            }
        };

        self.deps.store.create_ideas(&ideas).await?;
        self.ideas = ideas;
        Ok(())
    }

    fn synthesized_ideas(&self, analysis: &AnalyzedContent) -> Vec<Idea> {
        let mut ideas: Vec<Idea> = analysis
            .topics
            .iter()
            .take(IDEA_COUNT)
            .map(|topic| Idea {
                id: Uuid::new_v4(),
                project_id: self.project.id,
                title: topic.name.clone(),
                description: if topic.points.is_empty() {
                    format!("An ebook exploring {}", topic.name)
                } else {
                    topic.points.join(" ")
                },
                source_data: None,
            })
            .collect();
        if ideas.is_empty() {
            ideas.push(Idea {
                id: Uuid::new_v4(),
                project_id: self.project.id,
                title: self.project.title.clone(),
                description: format!("An ebook based on the notes for {}", self.project.title),
                source_data: None,
            });
        }
        ideas
    }

    // --- Idea selection -------------------------------------------------------------

    /// Commit an idea (generated or custom), creating the ebook and its
    /// initial chapter set, and advance to writing.
    pub async fn select_idea(&mut self, choice: IdeaChoice) -> Result<(), WorkflowError> {
        if self.ebook.is_some() {
            return Err(WorkflowError::Invariant(
                "This project already has an ebook".to_string(),
            ));
        }

        let (title, description) = match choice {
            IdeaChoice::Existing(idea_id) => {
                let idea = self
                    .ideas
                    .iter()
                    .find(|i| i.id == idea_id)
                    .ok_or_else(|| WorkflowError::NotFound(format!("Idea {idea_id}")))?;
                (idea.title.clone(), idea.description.clone())
            }
            IdeaChoice::Custom { title, description } => {
                let title = title.trim().to_string();
                let description = description.trim().to_string();
                if title.chars().count() < MIN_CUSTOM_TITLE_CHARS {
                    return Err(WorkflowError::Validation(format!(
                        "Custom title must be at least {MIN_CUSTOM_TITLE_CHARS} characters"
                    )));
                }
                if description.chars().count() < MIN_CUSTOM_DESCRIPTION_CHARS {
                    return Err(WorkflowError::Validation(format!(
                        "Custom description must be at least {MIN_CUSTOM_DESCRIPTION_CHARS} characters"
                    )));
                }
                (title, description)
            }
        };

        let ebook = Ebook {
            id: Uuid::new_v4(),
            project_id: self.project.id,
            title,
            description,
            status: EbookStatus::Draft,
            cover_image_url: None,
        };
        self.deps.store.create_ebook(&ebook).await?;

        let chapters = self.initial_outline(ebook.id);
        for chapter in &chapters {
            self.deps.store.create_chapter(chapter).await?;
        }

        self.deps
            .store
            .update_project_status(self.project.id, ProjectStatus::InProgress)
            .await?;
        self.project.status = ProjectStatus::InProgress;

        info!(ebook_id = %ebook.id, chapters = chapters.len(), "ebook created");
        self.ebook = Some(ebook);
        self.chapters = chapters;

        // The structure step is transient: entering it immediately and
        // unconditionally advances to writing.
        self.step = WizardStep::EbookStructure.normalized();
        Ok(())
    }

    /// Chapter titles for a fresh ebook, derived from the analyzed topics
    /// when there are any.
    fn initial_outline(&self, ebook_id: Uuid) -> Vec<Chapter> {
        let topic_titles: Vec<String> = self
            .brain_dump
            .analyzed_content
            .as_ref()
            .map(|a| {
                a.topics
                    .iter()
                    .take(MAX_OUTLINE_TOPICS)
                    .map(|t| t.name.clone())
                    .collect()
            })
            .unwrap_or_default();

        let titles: Vec<String> = if topic_titles.is_empty() {
            ["Introduction", "Background", "Core Concepts", "Putting It Into Practice", "Conclusion"]
                .into_iter()
                .map(str::to_string)
                .collect()
        } else {
            let mut titles = Vec::with_capacity(topic_titles.len() + 2);
            titles.push("Introduction".to_string());
            titles.extend(topic_titles);
            titles.push("Conclusion".to_string());
            titles
        };

        titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| Chapter::pending(ebook_id, title, i as u32))
            .collect()
    }

    // --- Finalize -------------------------------------------------------------------

    /// Mark the ebook complete. Only enabled once every chapter is
    /// generated; calling it again after completion is a no-op.
    pub async fn finalize(&mut self) -> Result<(), WorkflowError> {
        let ebook = self
            .ebook
            .as_mut()
            .ok_or_else(|| WorkflowError::Blocked("There is no ebook to finalize".to_string()))?;

        if ebook.status == EbookStatus::Complete {
            self.step = WizardStep::Completed;
            return Ok(());
        }

        let progress = crate::chapters::ChapterProgress::of(&self.chapters);
        if self.chapters.is_empty() || !progress.all_generated() {
            return Err(WorkflowError::Blocked(format!(
                "{} of {} chapters are not generated yet",
                progress.total - progress.completed,
                progress.total
            )));
        }

        self.deps
            .store
            .update_ebook_status(ebook.id, EbookStatus::Complete)
            .await?;
        ebook.status = EbookStatus::Complete;
        self.deps
            .store
            .update_project_status(self.project.id, ProjectStatus::Complete)
            .await?;
        self.project.status = ProjectStatus::Complete;
        self.step = WizardStep::Completed;
        info!(project_id = %self.project.id, "ebook finalized");
        Ok(())
    }

    pub(crate) fn deps(&self) -> &WizardDeps {
        &self.deps
    }

    pub(crate) fn ebook_mut(&mut self) -> Option<&mut Ebook> {
        self.ebook.as_mut()
    }
}

/// The user's choice at the idea-selection step.
#[derive(Debug, Clone)]
pub enum IdeaChoice {
    Existing(Uuid),
    Custom { title: String, description: String },
}

//=========================================================================================
// Generation-output parsing
//=========================================================================================

/// Parse analysis text into topics and points. Lines starting with a
/// bullet are points under the most recent topic; other non-empty lines
/// start a topic.
fn parse_analysis(text: &str) -> AnalyzedContent {
    let mut topics: Vec<Topic> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(point) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            if let Some(topic) = topics.last_mut() {
                topic.points.push(point.trim().to_string());
            }
        } else {
            let name = line.trim_start_matches('#').trim_end_matches(':').trim();
            if !name.is_empty() {
                topics.push(Topic {
                    name: name.to_string(),
                    points: Vec::new(),
                });
            }
        }
    }
    AnalyzedContent {
        topics,
        degraded: false,
    }
}

/// Parse idea proposals of the form `Title: description`, one per line.
/// Leading list markers (`1.`, `-`) are tolerated.
fn parse_ideas(text: &str, project_id: Uuid) -> Vec<Idea> {
    text.lines()
        .filter_map(|line| {
            let line = line
                .trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-')
                .trim();
            let (title, description) = line.split_once(':')?;
            let title = title.trim();
            let description = description.trim();
            if title.is_empty() || description.is_empty() {
                return None;
            }
            Some(Idea {
                id: Uuid::new_v4(),
                project_id,
                title: title.to_string(),
                description: description.to_string(),
                source_data: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_analysis_collects_topics_and_points() {
        let text = "# Getting Started\n- set goals\n- gather notes\n\nAudience:\n* who reads this\n";
        let analysis = parse_analysis(text);
        assert_eq!(analysis.topics.len(), 2);
        assert_eq!(analysis.topics[0].name, "Getting Started");
        assert_eq!(analysis.topics[0].points, vec!["set goals", "gather notes"]);
        assert_eq!(analysis.topics[1].name, "Audience");
        assert_eq!(analysis.topics[1].points, vec!["who reads this"]);
        assert!(!analysis.degraded);
    }

    #[test]
    fn parse_analysis_ignores_orphan_points() {
        let analysis = parse_analysis("- floating point\n");
        assert!(analysis.topics.is_empty());
    }

    #[test]
    fn parse_ideas_reads_numbered_lines() {
        let project_id = Uuid::new_v4();
        let ideas = parse_ideas(
            "1. Marathon Basics: A beginner's guide to distance running\n2) Run Far: Training plans that actually stick\nno separator here\n",
            project_id,
        );
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas[0].title, "Marathon Basics");
        assert_eq!(ideas[1].title, "Run Far");
        assert!(ideas.iter().all(|i| i.project_id == project_id));
    }

    #[test]
    fn parse_ideas_skips_empty_parts() {
        assert!(parse_ideas(": description only\n", Uuid::new_v4()).is_empty());
        assert!(parse_ideas("Title only:\n", Uuid::new_v4()).is_empty());
    }
}
