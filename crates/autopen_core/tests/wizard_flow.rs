//! End-to-end tests for the wizard workflow over in-memory ports.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use autopen_core::chapters::AddChapterMode;
use autopen_core::domain::{BrainDumpStatus, ChapterStatus, EbookStatus};
use autopen_core::ports::GenerationError;
use autopen_core::steps::WizardStep;
use autopen_core::workflow::{IdeaChoice, Wizard, WorkflowError};

use common::{default_deps, deps_with, sixty_words, MemoryStore, ScriptedGenerator, StubIngestion};

/// `content` must be non-null exactly when the status is `Generated`.
fn assert_content_invariant(wizard: &Wizard) {
    for chapter in wizard.chapters() {
        assert_eq!(
            chapter.content.is_some(),
            chapter.status == ChapterStatus::Generated,
            "chapter '{}' violates the content/status invariant",
            chapter.title
        );
    }
}

/// Drive a fresh wizard to the writing step with `topics` analyzed topics
/// (the outline adds an introduction and a conclusion around them).
async fn wizard_at_writing(
    generator: &std::sync::Arc<ScriptedGenerator>,
    deps: autopen_core::workflow::WizardDeps,
    topics: usize,
) -> Wizard {
    let analysis = (0..topics)
        .map(|i| format!("Topic {i}:\n- point about topic {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    generator.push("analyze", Ok(analysis));
    generator.push(
        "ideas",
        Ok("1. First Idea: An ebook about the first angle\n\
            2. Second Idea: An ebook about the second angle\n\
            3. Third Idea: An ebook about the third angle"
            .to_string()),
    );

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    wizard.save_brain_dump(&sixty_words()).await.unwrap();
    wizard.analyze().await.unwrap();
    let idea = wizard.ideas()[1].id;
    wizard.select_idea(IdeaChoice::Existing(idea)).await.unwrap();
    wizard
}

#[tokio::test]
async fn scenario_a_full_path_to_writing() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    generator.push("analyze", Ok("Pacing:\n- long runs\nFueling:\n- gels".to_string()));
    generator.push(
        "ideas",
        Ok("1. Couch To Marathon: Getting from zero to the start line\n\
            2. Race Day Ready: Preparation that survives contact with race day\n\
            3. Run Forever: Staying injury free for decades"
            .to_string()),
    );
    let deps = deps_with(store, generator, ingestion);

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    assert_eq!(wizard.current_step(), WizardStep::BrainDump);

    wizard.save_brain_dump(&sixty_words()).await.unwrap();
    assert_eq!(wizard.brain_dump().status, BrainDumpStatus::Saved);

    wizard.analyze().await.unwrap();
    assert_eq!(wizard.current_step(), WizardStep::IdeaSelection);
    assert_eq!(wizard.brain_dump().status, BrainDumpStatus::Analyzed);
    assert_eq!(wizard.ideas().len(), 3);

    let second = &wizard.ideas()[1];
    let (second_id, second_title) = (second.id, second.title.clone());
    wizard.select_idea(IdeaChoice::Existing(second_id)).await.unwrap();

    assert_eq!(wizard.current_step(), WizardStep::EbookWriting);
    let ebook = wizard.ebook().unwrap();
    assert_eq!(ebook.title, second_title);

    let chapters = wizard.chapters();
    assert!(!chapters.is_empty());
    for (i, chapter) in chapters.iter().enumerate() {
        assert_eq!(chapter.order_index, i as u32);
        assert_eq!(chapter.status, ChapterStatus::Pending);
    }
    assert_content_invariant(&wizard);
}

#[tokio::test]
async fn scenario_b_thin_content_is_rejected() {
    let mut wizard = Wizard::create(default_deps(), "My Guide", None).await.unwrap();
    wizard
        .save_brain_dump("just ten words of text not nearly enough content")
        .await
        .unwrap();

    let result = wizard.analyze().await;
    assert_matches!(result, Err(WorkflowError::Validation(_)));
    assert_eq!(wizard.current_step(), WizardStep::BrainDump);
    assert_eq!(wizard.brain_dump().status, BrainDumpStatus::Saved);
    assert!(wizard.ideas().is_empty());
}

#[tokio::test]
async fn thin_content_with_attachment_passes_the_check() {
    let mut wizard = Wizard::create(default_deps(), "My Guide", None).await.unwrap();
    wizard.save_brain_dump("short text").await.unwrap();
    wizard
        .attach_file("notes.txt", b"some extracted notes", autopen_core::domain::FileKind::Document)
        .await
        .unwrap();

    assert!(wizard.analyze().await.is_ok());
    assert_eq!(wizard.current_step(), WizardStep::IdeaSelection);
}

#[tokio::test]
async fn scenario_c_batch_stops_at_failing_chapter() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    // One analyzed topic gives a three-chapter outline.
    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    assert_eq!(wizard.chapters().len(), 3);

    generator.push("chapter", Ok("Chapter zero content".to_string()));
    generator.push(
        "chapter",
        Err(GenerationError::Auth("invalid api key".to_string())),
    );

    let calls_before = generator.chapter_calls.load(Ordering::SeqCst);
    let failure = wizard.generate_all_pending().await.unwrap_err();

    let chapters = wizard.chapters();
    assert_eq!(failure.chapter_id, chapters[1].id);
    assert_eq!(chapters[0].status, ChapterStatus::Generated);
    assert_eq!(chapters[1].status, ChapterStatus::Pending);
    assert_eq!(chapters[2].status, ChapterStatus::Pending);
    // The third chapter was never attempted.
    assert_eq!(
        generator.chapter_calls.load(Ordering::SeqCst) - calls_before,
        2
    );
    assert_content_invariant(&wizard);
}

#[tokio::test]
async fn scenario_d_duplicate_link_starts_one_fetch() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator, ingestion.clone());

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    wizard.add_link("https://youtu.be/abc123").await.unwrap();
    wizard
        .add_link("https://www.youtube.com/watch?v=abc123")
        .await
        .unwrap();

    assert_eq!(wizard.links().len(), 1);
    assert_eq!(ingestion.transcript_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_e_preview_requires_all_chapters_generated() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    // Three topics give a five-chapter outline; generate three of five.
    let mut wizard = wizard_at_writing(&generator, deps, 3).await;
    assert_eq!(wizard.chapters().len(), 5);
    for chapter_id in wizard.chapters()[..3].iter().map(|c| c.id).collect::<Vec<_>>() {
        wizard.generate_chapter(chapter_id).await.unwrap();
    }

    let result = wizard.go_to_step(WizardStep::EbookPreview);
    assert_matches!(result, Err(WorkflowError::Blocked(_)));
    assert_eq!(wizard.current_step(), WizardStep::EbookWriting);
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    wizard.generate_all_pending().await.unwrap();
    wizard.go_to_step(WizardStep::EbookPreview).unwrap();

    wizard.finalize().await.unwrap();
    assert_eq!(wizard.current_step(), WizardStep::Completed);
    assert_eq!(wizard.ebook().unwrap().status, EbookStatus::Complete);

    // Second call is a no-op, not an error.
    wizard.finalize().await.unwrap();
    assert_eq!(wizard.ebook().unwrap().status, EbookStatus::Complete);
}

#[tokio::test]
async fn finalize_before_generation_is_blocked() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    assert_matches!(wizard.finalize().await, Err(WorkflowError::Blocked(_)));
    assert_ne!(wizard.current_step(), WizardStep::Completed);
}

#[tokio::test]
async fn last_chapter_cannot_be_deleted() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    let ids: Vec<_> = wizard.chapters().iter().map(|c| c.id).collect();
    for chapter_id in &ids[..ids.len() - 1] {
        wizard.delete_chapter(*chapter_id).await.unwrap();
    }
    assert_eq!(wizard.chapters().len(), 1);

    let result = wizard.delete_chapter(ids[ids.len() - 1]).await;
    assert_matches!(result, Err(WorkflowError::Invariant(_)));
    assert_eq!(wizard.chapters().len(), 1);
}

#[tokio::test]
async fn deleting_keeps_surviving_order_indexes() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    let middle = wizard.chapters()[1].id;
    wizard.delete_chapter(middle).await.unwrap();

    let indexes: Vec<u32> = wizard.chapters().iter().map(|c| c.order_index).collect();
    assert_eq!(indexes, vec![0, 2]);

    // A new chapter appends past the existing maximum.
    wizard.add_chapter("Appendix", AddChapterMode::Manual).await.unwrap();
    let indexes: Vec<u32> = wizard.chapters().iter().map(|c| c.order_index).collect();
    assert_eq!(indexes, vec![0, 2, 3]);
}

#[tokio::test]
async fn manual_chapter_is_generated_immediately() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    let chapter_id = wizard
        .add_chapter("Reader Notes", AddChapterMode::Manual)
        .await
        .unwrap();

    let chapter = wizard
        .chapters()
        .iter()
        .find(|c| c.id == chapter_id)
        .unwrap();
    assert_eq!(chapter.status, ChapterStatus::Generated);
    assert!(chapter.content.is_some());
    assert_content_invariant(&wizard);
}

#[tokio::test]
async fn edits_keep_chapters_generated() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    let chapter_id = wizard.chapters()[0].id;
    wizard.generate_chapter(chapter_id).await.unwrap();

    wizard.edit_chapter(chapter_id, "my own words").await.unwrap();
    let chapter = &wizard.chapters()[0];
    assert_eq!(chapter.status, ChapterStatus::Generated);
    assert_eq!(chapter.content.as_deref(), Some("my own words"));

    // An empty edit is allowed and still counts as generated.
    wizard.edit_chapter(chapter_id, "").await.unwrap();
    assert_eq!(wizard.chapters()[0].status, ChapterStatus::Generated);
    assert_content_invariant(&wizard);
}

#[tokio::test]
async fn failed_generation_returns_chapter_to_pending() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    let chapter_id = wizard.chapters()[0].id;
    generator.push(
        "chapter",
        Err(GenerationError::Transient("connection reset".to_string())),
    );

    let result = wizard.generate_chapter(chapter_id).await;
    assert_matches!(result, Err(WorkflowError::Generation(_)));
    assert_eq!(wizard.chapters()[0].status, ChapterStatus::Pending);
    assert!(wizard.chapters()[0].content.is_none());

    // Retry on the next action succeeds.
    wizard.generate_chapter(chapter_id).await.unwrap();
    assert_eq!(wizard.chapters()[0].status, ChapterStatus::Generated);
}

#[tokio::test]
async fn auth_failure_during_analysis_is_fatal_to_the_step() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    generator.push(
        "analyze",
        Err(GenerationError::Auth("invalid api key".to_string())),
    );
    let deps = deps_with(store, generator, ingestion);

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    wizard.save_brain_dump(&sixty_words()).await.unwrap();

    let result = wizard.analyze().await;
    assert_matches!(
        result,
        Err(WorkflowError::Generation(GenerationError::Auth(_)))
    );
    assert_eq!(wizard.current_step(), WizardStep::BrainDump);
    // Not stuck in `Analyzing`; the user can fix the key and retry.
    assert_eq!(wizard.brain_dump().status, BrainDumpStatus::Saved);
}

#[tokio::test]
async fn transient_idea_failure_synthesizes_ideas() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    generator.push("analyze", Ok("Training:\n- consistency".to_string()));
    generator.push(
        "ideas",
        Err(GenerationError::Transient("upstream 503".to_string())),
    );
    let deps = deps_with(store, generator, ingestion);

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    wizard.save_brain_dump(&sixty_words()).await.unwrap();
    wizard.analyze().await.unwrap();

    // Idea selection is never empty: synthesized from the analyzed topics.
    assert_eq!(wizard.current_step(), WizardStep::IdeaSelection);
    assert!(!wizard.ideas().is_empty());
}

#[tokio::test]
async fn resumption_corrects_a_stale_step() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store.clone(), generator.clone(), ingestion.clone());

    let mut wizard = Wizard::create(deps.clone(), "My Guide", None).await.unwrap();
    wizard.save_brain_dump(&sixty_words()).await.unwrap();
    wizard.analyze().await.unwrap();
    let project_id = wizard.project().id;
    drop(wizard);

    // Mount with a stale `brain-dump` step: the analyzed dump and existing
    // ideas auto-correct it.
    let remounted = Wizard::load_at(deps, project_id, Some(WizardStep::BrainDump))
        .await
        .unwrap();
    assert_eq!(remounted.current_step(), WizardStep::IdeaSelection);
}

#[tokio::test]
async fn reload_after_finalize_lands_on_completed() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps.clone(), 1).await;
    let project_id = wizard.project().id;
    wizard.generate_all_pending().await.unwrap();
    wizard.go_to_step(WizardStep::EbookPreview).unwrap();
    wizard.finalize().await.unwrap();
    drop(wizard);

    let remounted = Wizard::load_at(deps, project_id, Some(WizardStep::EbookPreview))
        .await
        .unwrap();
    assert_eq!(remounted.current_step(), WizardStep::Completed);
}

#[tokio::test]
async fn back_navigation_never_mutates_entities() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator.clone(), ingestion);

    let mut wizard = wizard_at_writing(&generator, deps, 1).await;
    let ideas_before = wizard.ideas().len();
    let chapters_before = wizard.chapters().len();

    wizard.go_to_step(WizardStep::BrainDump).unwrap();
    assert_eq!(wizard.current_step(), WizardStep::BrainDump);
    assert_eq!(wizard.ideas().len(), ideas_before);
    assert_eq!(wizard.chapters().len(), chapters_before);
    assert_eq!(wizard.brain_dump().status, BrainDumpStatus::Analyzed);

    // Forward again is allowed because the entity state supports it.
    wizard.go_to_step(WizardStep::EbookWriting).unwrap();
    assert_eq!(wizard.current_step(), WizardStep::EbookWriting);
}

#[tokio::test]
async fn store_failure_does_not_advance_the_step() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store.clone(), generator, ingestion);

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    wizard.save_brain_dump(&sixty_words()).await.unwrap();

    *store.fail.lock().unwrap() = true;
    let result = wizard.analyze().await;
    assert_matches!(result, Err(WorkflowError::Store(_)));
    assert_eq!(wizard.current_step(), WizardStep::BrainDump);

    // Retry once the store recovers.
    *store.fail.lock().unwrap() = false;
    wizard.analyze().await.unwrap();
    assert_eq!(wizard.current_step(), WizardStep::IdeaSelection);
}

#[tokio::test]
async fn custom_idea_is_validated() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::new();
    let ingestion = StubIngestion::new();
    let deps = deps_with(store, generator, ingestion);

    let mut wizard = Wizard::create(deps, "My Guide", None).await.unwrap();
    wizard.save_brain_dump(&sixty_words()).await.unwrap();
    wizard.analyze().await.unwrap();

    let short_title = wizard
        .select_idea(IdeaChoice::Custom {
            title: "Hi".to_string(),
            description: "A long enough description of the idea".to_string(),
        })
        .await;
    assert_matches!(short_title, Err(WorkflowError::Validation(_)));

    let short_description = wizard
        .select_idea(IdeaChoice::Custom {
            title: "Proper Title".to_string(),
            description: "too short".to_string(),
        })
        .await;
    assert_matches!(short_description, Err(WorkflowError::Validation(_)));
    assert!(wizard.ebook().is_none());

    wizard
        .select_idea(IdeaChoice::Custom {
            title: "Proper Title".to_string(),
            description: "A description that is comfortably long enough".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(wizard.current_step(), WizardStep::EbookWriting);
    assert_eq!(wizard.ebook().unwrap().title, "Proper Title");
}

#[tokio::test]
async fn empty_project_title_is_rejected() {
    let result = Wizard::create(default_deps(), "   ", None).await;
    assert_matches!(result, Err(WorkflowError::Validation(_)));
}
