//! crates/autopen_core/src/steps.rs
//!
//! The wizard step enumeration, slug round-trip used by resume tokens and
//! the HTTP surface, and resolution of the stored resumption payload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowError;

/// The steps of the content-creation wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
    Creator,
    BrainDump,
    IdeaSelection,
    /// Transient, non-interactive step: entering it immediately advances
    /// to `EbookWriting`. It exists to show a fixed ordinal to the user.
    EbookStructure,
    EbookWriting,
    EbookPreview,
    Completed,
}

impl WizardStep {
    /// Parse a step slug, e.g. from a resume token. Unknown slugs are
    /// rejected rather than applied.
    pub fn from_slug(s: &str) -> Result<Self, WorkflowError> {
        match s {
            "creator" => Ok(Self::Creator),
            "brain-dump" => Ok(Self::BrainDump),
            "idea-selection" => Ok(Self::IdeaSelection),
            "ebook-structure" => Ok(Self::EbookStructure),
            "ebook-writing" => Ok(Self::EbookWriting),
            "ebook-preview" => Ok(Self::EbookPreview),
            "completed" => Ok(Self::Completed),
            _ => Err(WorkflowError::Validation(format!(
                "Unrecognized wizard step '{s}'"
            ))),
        }
    }

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::BrainDump => "brain-dump",
            Self::IdeaSelection => "idea-selection",
            Self::EbookStructure => "ebook-structure",
            Self::EbookWriting => "ebook-writing",
            Self::EbookPreview => "ebook-preview",
            Self::Completed => "completed",
        }
    }

    /// Zero-based position in the wizard, for display.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Creator => 0,
            Self::BrainDump => 1,
            Self::IdeaSelection => 2,
            Self::EbookStructure => 3,
            Self::EbookWriting => 4,
            Self::EbookPreview => 5,
            Self::Completed => 6,
        }
    }

    /// Collapse the transient structure step into the step that actually
    /// renders. Applied whenever a step value enters the machine.
    pub fn normalized(self) -> Self {
        match self {
            Self::EbookStructure => Self::EbookWriting,
            other => other,
        }
    }
}

//=========================================================================================
// Resumption protocol
//=========================================================================================

/// A payload persisted in short-lived client-side storage across an
/// authentication redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredPayload {
    /// Re-enter an in-progress session at a specific step.
    Resume { step: String, project_id: Uuid },
    /// Project details captured before the redirect; the project does not
    /// exist yet.
    NewProject {
        title: String,
        description: Option<String>,
    },
}

/// What the orchestrator should do on mount, given the stored payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    /// Load the named project and enter at the named step.
    Enter { project_id: Uuid, step: WizardStep },
    /// Create a project from the captured details, then navigate to it.
    CreateProject {
        title: String,
        description: Option<String>,
    },
    /// Nothing to resume; go to the entry step.
    RedirectToEntry,
}

/// Resolve the stored payload into a mount action.
///
/// The step slug inside a resume token is validated against the step
/// enumeration before being trusted; an unrecognized slug is an error,
/// not a silent redirect, so the caller can surface it.
pub fn resolve_resume(payload: Option<StoredPayload>) -> Result<ResumeAction, WorkflowError> {
    match payload {
        None => Ok(ResumeAction::RedirectToEntry),
        Some(StoredPayload::Resume { step, project_id }) => {
            let step = WizardStep::from_slug(&step)?.normalized();
            Ok(ResumeAction::Enter { project_id, step })
        }
        Some(StoredPayload::NewProject { title, description }) => {
            if title.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "Project title must not be empty".to_string(),
                ));
            }
            Ok(ResumeAction::CreateProject { title, description })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn slug_roundtrip() {
        for step in [
            WizardStep::Creator,
            WizardStep::BrainDump,
            WizardStep::IdeaSelection,
            WizardStep::EbookStructure,
            WizardStep::EbookWriting,
            WizardStep::EbookPreview,
            WizardStep::Completed,
        ] {
            assert_eq!(WizardStep::from_slug(step.as_slug()).unwrap(), step);
        }
    }

    #[test]
    fn unknown_slug_is_rejected() {
        assert!(WizardStep::from_slug("ebook_writing").is_err());
        assert!(WizardStep::from_slug("").is_err());
        assert!(WizardStep::from_slug("Creator").is_err());
    }

    #[test]
    fn steps_are_ordered() {
        assert!(WizardStep::Creator < WizardStep::BrainDump);
        assert!(WizardStep::EbookWriting < WizardStep::EbookPreview);
        assert!(WizardStep::EbookPreview < WizardStep::Completed);
    }

    #[test]
    fn structure_step_normalizes_to_writing() {
        assert_eq!(
            WizardStep::EbookStructure.normalized(),
            WizardStep::EbookWriting
        );
        assert_eq!(WizardStep::BrainDump.normalized(), WizardStep::BrainDump);
    }

    #[test]
    fn resume_with_no_payload_redirects() {
        assert_matches!(resolve_resume(None), Ok(ResumeAction::RedirectToEntry));
    }

    #[test]
    fn resume_token_enters_at_named_step() {
        let project_id = Uuid::new_v4();
        let action = resolve_resume(Some(StoredPayload::Resume {
            step: "ebook-writing".to_string(),
            project_id,
        }))
        .unwrap();
        assert_eq!(
            action,
            ResumeAction::Enter {
                project_id,
                step: WizardStep::EbookWriting
            }
        );
    }

    #[test]
    fn resume_token_normalizes_structure_step() {
        let project_id = Uuid::new_v4();
        let action = resolve_resume(Some(StoredPayload::Resume {
            step: "ebook-structure".to_string(),
            project_id,
        }))
        .unwrap();
        assert_matches!(
            action,
            ResumeAction::Enter {
                step: WizardStep::EbookWriting,
                ..
            }
        );
    }

    #[test]
    fn resume_token_with_bad_slug_is_rejected() {
        let result = resolve_resume(Some(StoredPayload::Resume {
            step: "not-a-step".to_string(),
            project_id: Uuid::new_v4(),
        }));
        assert!(result.is_err());
    }

    #[test]
    fn new_project_payload_creates() {
        let action = resolve_resume(Some(StoredPayload::NewProject {
            title: "My Guide".to_string(),
            description: None,
        }))
        .unwrap();
        assert_matches!(action, ResumeAction::CreateProject { .. });
    }

    #[test]
    fn new_project_payload_requires_title() {
        let result = resolve_resume(Some(StoredPayload::NewProject {
            title: "   ".to_string(),
            description: None,
        }));
        assert!(result.is_err());
    }
}
