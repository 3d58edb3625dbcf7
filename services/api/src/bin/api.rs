//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, HttpIngestionAdapter, MarkdownAssembler, OpenAiGenerationAdapter},
    config::Config,
    error::ApiError,
    web::{
        add_chapter_handler, add_link_handler, analyze_handler, create_project_handler,
        delete_chapter_handler, delete_file_handler, delete_link_handler, edit_chapter_handler,
        export_handler, finalize_handler, generate_all_handler, generate_chapter_handler,
        go_to_step_handler, resume_handler, save_brain_dump_handler, select_idea_handler,
        upload_file_handler, wizard_state_handler, ApiDoc, AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use autopen_core::links::TranscriptHub;
use autopen_core::ports::IngestionService;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let generation_adapter = Arc::new(OpenAiGenerationAdapter::new(
        openai_client.clone(),
        config.analysis_model.clone(),
        config.idea_model.clone(),
        config.chapter_model.clone(),
    ));

    let ingestion_adapter: Arc<dyn IngestionService> = Arc::new(
        HttpIngestionAdapter::new(config.transcript_timeout)
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {e}")))?,
    );
    let transcripts = Arc::new(TranscriptHub::new(
        ingestion_adapter.clone(),
        config.transcript_timeout,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store: db_adapter,
        generator: generation_adapter,
        ingestion: ingestion_adapter,
        transcripts,
        assembler: Arc::new(MarkdownAssembler::new()),
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/projects", post(create_project_handler))
        .route("/wizard/resume", post(resume_handler))
        .route("/projects/{project_id}/wizard", get(wizard_state_handler))
        .route("/projects/{project_id}/brain-dump", put(save_brain_dump_handler))
        .route("/projects/{project_id}/files", post(upload_file_handler))
        .route("/projects/{project_id}/files/{file_id}", axum::routing::delete(delete_file_handler))
        .route("/projects/{project_id}/links", post(add_link_handler))
        .route("/projects/{project_id}/links/{link_id}", axum::routing::delete(delete_link_handler))
        .route("/projects/{project_id}/analyze", post(analyze_handler))
        .route("/projects/{project_id}/idea", post(select_idea_handler))
        .route("/projects/{project_id}/step", post(go_to_step_handler))
        .route("/projects/{project_id}/chapters", post(add_chapter_handler))
        .route(
            "/projects/{project_id}/chapters/generate-all",
            post(generate_all_handler),
        )
        .route(
            "/projects/{project_id}/chapters/{chapter_id}/generate",
            post(generate_chapter_handler),
        )
        .route(
            "/projects/{project_id}/chapters/{chapter_id}",
            put(edit_chapter_handler).delete(delete_chapter_handler),
        )
        .route("/projects/{project_id}/finalize", post(finalize_handler))
        .route("/projects/{project_id}/export", get(export_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
