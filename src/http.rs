//! HTTP surface: uploads, project runs, result browsing and byte range fetches

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::config::WorkingDirectory;
use crate::db::Store;
use crate::submit::orchestrator::Orchestrator;
use crate::tree::TreeLimits;

/// API error type and its HTTP mapping
pub mod error;
/// Request handlers
pub mod handlers;

/// Largest chunk accepted in one PATCH
const MAX_CHUNK_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub orchestrator: Arc<Orchestrator>,
    pub wd: WorkingDirectory,
    pub upload_tmp: PathBuf,
    pub tree_limits: TreeLimits,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/uploads", post(handlers::begin_upload))
        .route(
            "/uploads/{transfer_id}",
            patch(handlers::append_chunk).layer(DefaultBodyLimit::max(MAX_CHUNK_BYTES)),
        )
        .route("/uploads/{transfer_id}/complete", post(handlers::complete_upload))
        .route("/files/{file_id}", delete(handlers::delete_file))
        .route("/projects", post(handlers::create_project))
        .route("/projects/{project_id}", delete(handlers::delete_project))
        .route("/projects/{project_id}/rerun", post(handlers::rerun_project))
        .route("/projects/{project_id}/status", get(handlers::project_status))
        .route("/projects/{project_id}/tree", get(handlers::project_tree))
        .route("/users/{user_id}/actions", get(handlers::user_actions_log))
        .route("/alignments/{*path}", get(handlers::fetch_range))
        .route("/data/{*path}", get(handlers::fetch_range))
        .with_state(state)
}
