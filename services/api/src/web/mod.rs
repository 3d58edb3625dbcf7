pub mod dto;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary
// that builds the web server router.
pub use rest::{
    add_chapter_handler, add_link_handler, analyze_handler, create_project_handler,
    delete_chapter_handler, delete_file_handler, delete_link_handler, edit_chapter_handler,
    export_handler, finalize_handler, generate_all_handler, generate_chapter_handler,
    go_to_step_handler, resume_handler, save_brain_dump_handler, select_idea_handler,
    upload_file_handler, wizard_state_handler, ApiDoc,
};
pub use state::AppState;
