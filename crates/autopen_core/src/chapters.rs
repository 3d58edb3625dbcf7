//! crates/autopen_core/src/chapters.rs
//!
//! The chapter generation sub-workflow: per-chapter content generation
//! with sequencing, manual edits, and structural mutation of the ordered
//! chapter collection. Progress figures are derived on every read and
//! never stored.

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{Chapter, ChapterStatus, EbookStatus};
use crate::ports::{ChapterPatch, GenerationError, PromptContext};
use crate::workflow::{Wizard, WorkflowError};

/// Placeholder content for a chapter added in manual mode, pending a
/// human edit.
const MANUAL_STUB: &str =
    "Write this chapter in your own words. Replace this placeholder with your content.";

/// How a newly added chapter gets its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddChapterMode {
    /// Boilerplate stub, immediately treated as generated pending an edit.
    Manual,
    /// Generate content right after insertion.
    Ai,
}

/// Derived progress over the chapter collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterProgress {
    pub completed: usize,
    pub total: usize,
}

impl ChapterProgress {
    pub fn of(chapters: &[Chapter]) -> Self {
        Self {
            completed: chapters
                .iter()
                .filter(|c| c.status == ChapterStatus::Generated)
                .count(),
            total: chapters.len(),
        }
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((100.0 * self.completed as f64 / self.total as f64).round()) as u8
    }

    pub fn all_generated(&self) -> bool {
        self.completed == self.total && self.total > 0
    }
}

/// A batch generation run stopped at a failing chapter. Chapters generated
/// before the failure keep their content.
#[derive(Debug, thiserror::Error)]
#[error("Chapter '{title}' failed to generate: {source}")]
pub struct BatchFailure {
    pub chapter_id: Uuid,
    pub title: String,
    #[source]
    pub source: WorkflowError,
}

impl Wizard {
    /// Derived progress for the current chapter set.
    pub fn progress(&self) -> ChapterProgress {
        ChapterProgress::of(&self.chapters)
    }

    fn chapter_position(&self, chapter_id: Uuid) -> Result<usize, WorkflowError> {
        self.chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("Chapter {chapter_id}")))
    }

    fn ensure_ebook_editable(&self) -> Result<(), WorkflowError> {
        match self.ebook() {
            None => Err(WorkflowError::Blocked(
                "No ebook exists yet".to_string(),
            )),
            Some(ebook) if ebook.status == EbookStatus::Complete => Err(WorkflowError::Blocked(
                "The ebook has been finalized".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Generate content for one chapter.
    ///
    /// The prompt context carries the content of previously generated
    /// chapters (ascending order) for narrative coherence. On failure the
    /// chapter returns to `Pending` (never left `Generating`) and the
    /// error is surfaced without touching its content.
    pub async fn generate_chapter(&mut self, chapter_id: Uuid) -> Result<(), WorkflowError> {
        self.ensure_ebook_editable()?;
        let idx = self.chapter_position(chapter_id)?;
        if self.chapters[idx].status == ChapterStatus::Generating {
            return Err(WorkflowError::Blocked(format!(
                "Chapter '{}' is already generating",
                self.chapters[idx].title
            )));
        }

        self.set_chapter_status(idx, ChapterStatus::Generating).await?;
        self.mark_ebook_in_progress().await?;

        let target = &self.chapters[idx];
        let prior_chapters: Vec<(String, String)> = self
            .chapters
            .iter()
            .filter(|c| c.order_index < target.order_index)
            .filter_map(|c| {
                c.content
                    .as_ref()
                    .map(|content| (c.title.clone(), content.clone()))
            })
            .collect();
        let ebook = self
            .ebook()
            .ok_or_else(|| WorkflowError::Blocked("No ebook exists yet".to_string()))?;
        let context = PromptContext::WriteChapter {
            ebook_title: ebook.title.clone(),
            ebook_description: ebook.description.clone(),
            chapter_title: target.title.clone(),
            prior_chapters,
        };

        let generated = match self.deps().generator.complete(&context).await {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(GenerationError::Empty),
            Err(e) => Err(e),
        };

        match generated {
            Ok(content) => {
                self.deps()
                    .store
                    .update_chapter(
                        chapter_id,
                        ChapterPatch {
                            content: Some(Some(content.clone())),
                            status: Some(ChapterStatus::Generated),
                            ..Default::default()
                        },
                    )
                    .await?;
                let chapter = &mut self.chapters[idx];
                chapter.content = Some(content);
                chapter.status = ChapterStatus::Generated;
                info!(%chapter_id, "chapter generated");
                Ok(())
            }
            Err(e) => {
                // Back to pending so the chapter is retryable, then surface
                // the failure.
                self.set_chapter_status(idx, ChapterStatus::Pending).await?;
                error!(%chapter_id, error = %e, "chapter generation failed");
                Err(e.into())
            }
        }
    }

    /// Generate every pending chapter, one at a time in ascending
    /// `order_index`. Stops at the first failure, reporting which chapter
    /// failed; already-generated chapters are untouched.
    pub async fn generate_all_pending(&mut self) -> Result<usize, BatchFailure> {
        let mut queue: Vec<(Uuid, String, u32)> = self
            .chapters
            .iter()
            .filter(|c| c.status == ChapterStatus::Pending)
            .map(|c| (c.id, c.title.clone(), c.order_index))
            .collect();
        queue.sort_by_key(|(_, _, order)| *order);

        let mut generated = 0usize;
        for (chapter_id, title, _) in queue {
            if let Err(source) = self.generate_chapter(chapter_id).await {
                return Err(BatchFailure {
                    chapter_id,
                    title,
                    source,
                });
            }
            generated += 1;
        }
        Ok(generated)
    }

    /// Replace a chapter's content verbatim. Manual edits bypass the
    /// generation service and always leave the chapter `Generated`; the
    /// new content may be empty.
    pub async fn edit_chapter(
        &mut self,
        chapter_id: Uuid,
        new_content: &str,
    ) -> Result<(), WorkflowError> {
        self.ensure_ebook_editable()?;
        let idx = self.chapter_position(chapter_id)?;
        if self.chapters[idx].status == ChapterStatus::Generating {
            return Err(WorkflowError::Blocked(format!(
                "Chapter '{}' is currently generating",
                self.chapters[idx].title
            )));
        }

        self.deps()
            .store
            .update_chapter(
                chapter_id,
                ChapterPatch {
                    content: Some(Some(new_content.to_string())),
                    status: Some(ChapterStatus::Generated),
                    ..Default::default()
                },
            )
            .await?;
        let chapter = &mut self.chapters[idx];
        chapter.content = Some(new_content.to_string());
        chapter.status = ChapterStatus::Generated;
        Ok(())
    }

    /// Append a chapter after the current last one.
    pub async fn add_chapter(
        &mut self,
        title: &str,
        mode: AddChapterMode,
    ) -> Result<Uuid, WorkflowError> {
        self.ensure_ebook_editable()?;
        let title = title.trim();
        if title.is_empty() {
            return Err(WorkflowError::Validation(
                "Chapter title must not be empty".to_string(),
            ));
        }

        let ebook_id = self
            .ebook()
            .ok_or_else(|| WorkflowError::Blocked("No ebook exists yet".to_string()))?
            .id;
        let order_index = self
            .chapters
            .iter()
            .map(|c| c.order_index)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        let mut chapter = Chapter::pending(ebook_id, title, order_index);
        if mode == AddChapterMode::Manual {
            chapter.content = Some(MANUAL_STUB.to_string());
            chapter.status = ChapterStatus::Generated;
        }
        let chapter_id = chapter.id;
        self.deps().store.create_chapter(&chapter).await?;
        self.chapters.push(chapter);

        if mode == AddChapterMode::Ai {
            self.generate_chapter(chapter_id).await?;
        }
        Ok(chapter_id)
    }

    /// Remove a chapter. An ebook always keeps at least one chapter, and
    /// survivors keep their `order_index` values (gaps are fine; ordering
    /// is by relative value).
    pub async fn delete_chapter(&mut self, chapter_id: Uuid) -> Result<(), WorkflowError> {
        self.ensure_ebook_editable()?;
        let idx = self.chapter_position(chapter_id)?;
        if self.chapters.len() == 1 {
            return Err(WorkflowError::Invariant(
                "An ebook must keep at least one chapter".to_string(),
            ));
        }
        self.deps().store.delete_chapter(chapter_id).await?;
        self.chapters.remove(idx);
        Ok(())
    }

    async fn set_chapter_status(
        &mut self,
        idx: usize,
        status: ChapterStatus,
    ) -> Result<(), WorkflowError> {
        let chapter_id = self.chapters[idx].id;
        self.deps()
            .store
            .update_chapter(
                chapter_id,
                ChapterPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        self.chapters[idx].status = status;
        Ok(())
    }

    async fn mark_ebook_in_progress(&mut self) -> Result<(), WorkflowError> {
        let (ebook_id, is_draft) = match self.ebook() {
            Some(ebook) => (ebook.id, ebook.status == EbookStatus::Draft),
            None => return Ok(()),
        };
        if is_draft {
            self.deps()
                .store
                .update_ebook_status(ebook_id, EbookStatus::InProgress)
                .await?;
            if let Some(ebook) = self.ebook_mut() {
                ebook.status = EbookStatus::InProgress;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(status: ChapterStatus) -> Chapter {
        let mut c = Chapter::pending(Uuid::new_v4(), "t", 0);
        if status == ChapterStatus::Generated {
            c.content = Some("body".to_string());
        }
        c.status = status;
        c
    }

    #[test]
    fn progress_is_derived_from_statuses() {
        let chapters = vec![
            chapter(ChapterStatus::Generated),
            chapter(ChapterStatus::Pending),
            chapter(ChapterStatus::Generated),
            chapter(ChapterStatus::Generating),
        ];
        let progress = ChapterProgress::of(&chapters);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percent(), 50);
        assert!(!progress.all_generated());
    }

    #[test]
    fn progress_percent_rounds() {
        let chapters = vec![
            chapter(ChapterStatus::Generated),
            chapter(ChapterStatus::Pending),
            chapter(ChapterStatus::Pending),
        ];
        assert_eq!(ChapterProgress::of(&chapters).percent(), 33);
    }

    #[test]
    fn empty_collection_is_not_all_generated() {
        let progress = ChapterProgress::of(&[]);
        assert_eq!(progress.percent(), 0);
        assert!(!progress.all_generated());
    }

    #[test]
    fn all_generated_when_every_status_matches() {
        let chapters = vec![
            chapter(ChapterStatus::Generated),
            chapter(ChapterStatus::Generated),
        ];
        assert!(ChapterProgress::of(&chapters).all_generated());
    }
}
