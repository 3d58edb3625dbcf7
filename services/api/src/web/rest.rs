//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Every mutating handler
//! rehydrates the wizard from the entity store, applies one operation, and
//! returns the full wizard state for the UI to re-render from.

use crate::web::dto::{
    AddChapterRequest, AddLinkRequest, CreateProjectRequest, EditChapterRequest, ExportQuery,
    GoToStepRequest, ResumeRequest, SaveBrainDumpRequest, SelectIdeaRequest, WizardStateResponse,
};
use crate::web::state::AppState;
use autopen_core::chapters::AddChapterMode;
use autopen_core::domain::FileKind;
use autopen_core::ports::ExportError;
use autopen_core::steps::{resolve_resume, ResumeAction, WizardStep};
use autopen_core::workflow::{IdeaChoice, Wizard, WorkflowError};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_project_handler,
        resume_handler,
        wizard_state_handler,
        save_brain_dump_handler,
        upload_file_handler,
        delete_file_handler,
        add_link_handler,
        delete_link_handler,
        analyze_handler,
        select_idea_handler,
        go_to_step_handler,
        add_chapter_handler,
        generate_chapter_handler,
        generate_all_handler,
        edit_chapter_handler,
        delete_chapter_handler,
        finalize_handler,
        export_handler,
    ),
    components(schemas(
        CreateProjectRequest,
        ResumeRequest,
        crate::web::dto::StoredPayloadDto,
        SaveBrainDumpRequest,
        AddLinkRequest,
        SelectIdeaRequest,
        GoToStepRequest,
        AddChapterRequest,
        EditChapterRequest,
        WizardStateResponse,
        crate::web::dto::ProjectDto,
        crate::web::dto::BrainDumpDto,
        crate::web::dto::TopicDto,
        crate::web::dto::FileDto,
        crate::web::dto::LinkDto,
        crate::web::dto::IdeaDto,
        crate::web::dto::EbookDto,
        crate::web::dto::ChapterDto,
        crate::web::dto::ProgressDto,
    )),
    tags(
        (name = "AutoPen API", description = "API endpoints for the ebook creation wizard.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

/// Map a workflow failure to an HTTP status, preserving its class.
fn workflow_error(e: WorkflowError) -> HandlerError {
    let status = match &e {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Invariant(_) | WorkflowError::Blocked(_) => StatusCode::CONFLICT,
        WorkflowError::Generation(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("workflow operation failed: {e}");
    }
    (status, e.to_string())
}

fn state_json(wizard: &Wizard) -> Json<WizardStateResponse> {
    Json(WizardStateResponse::from_wizard(wizard))
}

//=========================================================================================
// Project / resumption handlers
//=========================================================================================

/// Create a new project and enter the wizard at the brain dump step.
#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = WizardStateResponse),
        (status = 422, description = "Missing or empty title")
    )
)]
pub async fn create_project_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let wizard = Wizard::create(app_state.wizard_deps(), &req.title, req.description)
        .await
        .map_err(workflow_error)?;
    Ok((StatusCode::CREATED, state_json(&wizard)))
}

/// Resolve a stored resumption payload into a wizard session.
///
/// A `resume` payload re-enters an existing project at a validated step; a
/// `new_project` payload (captured before an authentication redirect)
/// creates the project now. With no payload the client is told to start
/// at the entry step.
#[utoipa::path(
    post,
    path = "/wizard/resume",
    request_body = ResumeRequest,
    responses(
        (status = 200, description = "Session resumed or entry step returned", body = WizardStateResponse),
        (status = 422, description = "Unrecognized step slug in the resume token")
    )
)]
pub async fn resume_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<ResumeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    match resolve_resume(req.payload.map(Into::into)).map_err(workflow_error)? {
        ResumeAction::Enter { project_id, step } => {
            let wizard = app_state
                .load_wizard_at(project_id, step)
                .await
                .map_err(workflow_error)?;
            Ok((StatusCode::OK, state_json(&wizard)).into_response())
        }
        ResumeAction::CreateProject { title, description } => {
            let wizard = Wizard::create(app_state.wizard_deps(), &title, description)
                .await
                .map_err(workflow_error)?;
            Ok((StatusCode::OK, state_json(&wizard)).into_response())
        }
        ResumeAction::RedirectToEntry => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "step": WizardStep::Creator.as_slug() })),
        )
            .into_response()),
    }
}

/// Read the current wizard state for a project.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/wizard",
    params(("project_id" = Uuid, Path, description = "The project to inspect.")),
    responses(
        (status = 200, description = "Current wizard state", body = WizardStateResponse),
        (status = 404, description = "Unknown project")
    )
)]
pub async fn wizard_state_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

//=========================================================================================
// Brain dump handlers
//=========================================================================================

/// Save the brain dump's raw text.
#[utoipa::path(
    put,
    path = "/projects/{project_id}/brain-dump",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    request_body = SaveBrainDumpRequest,
    responses((status = 200, description = "Brain dump saved", body = WizardStateResponse))
)]
pub async fn save_brain_dump_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<SaveBrainDumpRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard
        .save_brain_dump(&req.raw_content)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Attach a file to the brain dump.
///
/// Accepts a multipart/form-data request with a single file part. Text is
/// extracted when the file type supports it; extraction failure keeps the
/// file without text.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/files",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    request_body(content_type = "multipart/form-data", description = "The file to attach."),
    responses(
        (status = 200, description = "File attached", body = WizardStateResponse),
        (status = 400, description = "Multipart form did not include a file")
    )
)]
pub async fn upload_file_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let (file_name, data) = if let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.file_name().unwrap_or("untitled.txt").to_string();
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        (name, data)
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let kind = match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ["png", "jpg", "jpeg", "gif", "webp"].contains(&ext.as_str()) => {
            FileKind::Image
        }
        _ => FileKind::Document,
    };

    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard
        .attach_file(&file_name, &data, kind)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Detach a file from the brain dump.
#[utoipa::path(
    delete,
    path = "/projects/{project_id}/files/{file_id}",
    params(
        ("project_id" = Uuid, Path, description = "The owning project."),
        ("file_id" = Uuid, Path, description = "The file to remove.")
    ),
    responses((status = 200, description = "File removed", body = WizardStateResponse))
)]
pub async fn delete_file_handler(
    State(app_state): State<Arc<AppState>>,
    Path((project_id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.remove_file(file_id).await.map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Attach a link and start its transcript fetch.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/links",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    request_body = AddLinkRequest,
    responses((status = 200, description = "Link attached (or already present)", body = WizardStateResponse))
)]
pub async fn add_link_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddLinkRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.add_link(&req.url).await.map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Remove a link, cancelling its in-flight transcript fetch.
#[utoipa::path(
    delete,
    path = "/projects/{project_id}/links/{link_id}",
    params(
        ("project_id" = Uuid, Path, description = "The owning project."),
        ("link_id" = Uuid, Path, description = "The link to remove.")
    ),
    responses((status = 200, description = "Link removed", body = WizardStateResponse))
)]
pub async fn delete_link_handler(
    State(app_state): State<Arc<AppState>>,
    Path((project_id, link_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.remove_link(link_id).await.map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Analyze the brain dump and propose ideas.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/analyze",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    responses(
        (status = 200, description = "Analysis complete, ideas proposed", body = WizardStateResponse),
        (status = 422, description = "Minimum-content check failed"),
        (status = 502, description = "Generation service authentication failed")
    )
)]
pub async fn analyze_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.analyze().await.map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

//=========================================================================================
// Idea and navigation handlers
//=========================================================================================

/// Commit an idea (generated or custom) and create the ebook.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/idea",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    request_body = SelectIdeaRequest,
    responses(
        (status = 200, description = "Ebook created, wizard at the writing step", body = WizardStateResponse),
        (status = 422, description = "Custom idea fields failed validation")
    )
)]
pub async fn select_idea_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<SelectIdeaRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let choice = match (req.idea_id, req.title, req.description) {
        (Some(idea_id), _, _) => IdeaChoice::Existing(idea_id),
        (None, Some(title), Some(description)) => IdeaChoice::Custom { title, description },
        _ => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                "Provide either idea_id or both title and description".to_string(),
            ))
        }
    };

    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.select_idea(choice).await.map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Navigate to a wizard step. Backward is always allowed; forward only
/// when the entity state supports it.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/step",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    request_body = GoToStepRequest,
    responses(
        (status = 200, description = "Step changed", body = WizardStateResponse),
        (status = 409, description = "Transition rejected")
    )
)]
pub async fn go_to_step_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<GoToStepRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let step = WizardStep::from_slug(&req.step).map_err(workflow_error)?;
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.go_to_step(step).map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

//=========================================================================================
// Chapter handlers
//=========================================================================================

/// Append a chapter in manual or AI mode.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/chapters",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    request_body = AddChapterRequest,
    responses((status = 200, description = "Chapter added", body = WizardStateResponse))
)]
pub async fn add_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddChapterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mode = match req.mode.as_str() {
        "manual" => AddChapterMode::Manual,
        "ai" => AddChapterMode::Ai,
        other => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Unknown chapter mode '{other}'; use 'manual' or 'ai'"),
            ))
        }
    };
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard
        .add_chapter(&req.title, mode)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Generate content for one chapter.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/chapters/{chapter_id}/generate",
    params(
        ("project_id" = Uuid, Path, description = "The owning project."),
        ("chapter_id" = Uuid, Path, description = "The chapter to generate.")
    ),
    responses(
        (status = 200, description = "Chapter generated", body = WizardStateResponse),
        (status = 409, description = "Chapter is already generating"),
        (status = 502, description = "Generation failed; chapter back to pending")
    )
)]
pub async fn generate_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path((project_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard
        .generate_chapter(chapter_id)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Generate every pending chapter in reading order, stopping at the first
/// failure.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/chapters/generate-all",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    responses(
        (status = 200, description = "All pending chapters generated", body = WizardStateResponse),
        (status = 502, description = "Batch stopped at a failing chapter")
    )
)]
pub async fn generate_all_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    if let Err(failure) = wizard.generate_all_pending().await {
        return Err((StatusCode::BAD_GATEWAY, failure.to_string()));
    }
    Ok(state_json(&wizard))
}

/// Replace a chapter's content verbatim (manual edit).
#[utoipa::path(
    put,
    path = "/projects/{project_id}/chapters/{chapter_id}",
    params(
        ("project_id" = Uuid, Path, description = "The owning project."),
        ("chapter_id" = Uuid, Path, description = "The chapter to edit.")
    ),
    request_body = EditChapterRequest,
    responses((status = 200, description = "Chapter updated", body = WizardStateResponse))
)]
pub async fn edit_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path((project_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<EditChapterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard
        .edit_chapter(chapter_id, &req.content)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Delete a chapter. An ebook always keeps at least one.
#[utoipa::path(
    delete,
    path = "/projects/{project_id}/chapters/{chapter_id}",
    params(
        ("project_id" = Uuid, Path, description = "The owning project."),
        ("chapter_id" = Uuid, Path, description = "The chapter to delete.")
    ),
    responses(
        (status = 200, description = "Chapter deleted", body = WizardStateResponse),
        (status = 409, description = "Refused: this is the last chapter")
    )
)]
pub async fn delete_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path((project_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard
        .delete_chapter(chapter_id)
        .await
        .map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

//=========================================================================================
// Finalize and export handlers
//=========================================================================================

/// Finalize the ebook. Idempotent once complete.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/finalize",
    params(("project_id" = Uuid, Path, description = "The owning project.")),
    responses(
        (status = 200, description = "Ebook complete", body = WizardStateResponse),
        (status = 409, description = "Not every chapter is generated yet")
    )
)]
pub async fn finalize_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let mut wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    wizard.finalize().await.map_err(workflow_error)?;
    Ok(state_json(&wizard))
}

/// Export the assembled document. Available once every chapter is
/// generated; the format choice does not affect wizard state.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/export",
    params(
        ("project_id" = Uuid, Path, description = "The owning project."),
        ("format" = String, Query, description = "markdown, pdf, or epub")
    ),
    responses(
        (status = 200, description = "The assembled document"),
        (status = 409, description = "Chapters are not all generated"),
        (status = 501, description = "No in-tree renderer for this format")
    )
)]
pub async fn export_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let wizard = app_state
        .load_wizard(project_id)
        .await
        .map_err(workflow_error)?;
    let ebook = wizard.ebook().ok_or((
        StatusCode::CONFLICT,
        "There is no ebook to export".to_string(),
    ))?;
    if !wizard.progress().all_generated() {
        return Err((
            StatusCode::CONFLICT,
            "Export requires every chapter to be generated".to_string(),
        ));
    }

    let bytes = app_state
        .assembler
        .assemble(ebook, wizard.chapters(), query.format)
        .map_err(|e| match e {
            ExportError::UnsupportedFormat(_) => (StatusCode::NOT_IMPLEMENTED, e.to_string()),
            ExportError::Failed(_) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        bytes,
    ))
}
