//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use autopen_core::links::TranscriptHub;
use autopen_core::pacing::PacingPolicy;
use autopen_core::ports::{EntityStore, ExportAssembler, GenerationService, IngestionService};
use autopen_core::steps::WizardStep;
use autopen_core::workflow::{Wizard, WizardDeps, WorkflowError};
use std::sync::Arc;
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The transcript hub lives here because in-flight fetches must survive
/// across requests: a link added in one request is joined during the
/// analyze call of a later one.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub generator: Arc<dyn GenerationService>,
    pub ingestion: Arc<dyn IngestionService>,
    pub transcripts: Arc<TranscriptHub>,
    pub assembler: Arc<dyn ExportAssembler>,
    pub config: Arc<Config>,
}

impl AppState {
    /// The explicit dependency bundle handed to every wizard instance.
    pub fn wizard_deps(&self) -> WizardDeps {
        WizardDeps {
            store: self.store.clone(),
            generator: self.generator.clone(),
            ingestion: self.ingestion.clone(),
            transcripts: self.transcripts.clone(),
            analysis_pacing: PacingPolicy::new(
                self.config.analysis_soft_timeout,
                self.config.analysis_hard_timeout,
            ),
        }
    }

    /// Rehydrate the wizard for a project from the entity store.
    pub async fn load_wizard(&self, project_id: Uuid) -> Result<Wizard, WorkflowError> {
        Wizard::load(self.wizard_deps(), project_id).await
    }

    /// Rehydrate the wizard, entering at a client-requested step.
    pub async fn load_wizard_at(
        &self,
        project_id: Uuid,
        step: WizardStep,
    ) -> Result<Wizard, WorkflowError> {
        Wizard::load_at(self.wizard_deps(), project_id, Some(step)).await
    }
}
