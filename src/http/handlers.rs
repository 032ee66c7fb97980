use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use crate::db::action::{record_action, user_actions};
use crate::db::file::delete_file as delete_file_record;
use crate::db::project::{delete_project as delete_project_record, insert_project, load_project};
use crate::http::error::{ApiError, ApiResult};
use crate::http::AppState;
use crate::range::open_range;
use crate::record::action::{Action, RecordKind};
use crate::record::file::FileRecord;
use crate::record::project::{JobHandle, NewProject, Project};
use crate::tree::{build_tree, DirectoryTree};
use crate::upload::chunk::{append_chunk as append_to_upload, begin_upload as begin_transfer, BeginUpload, ChunkProgress};
use crate::upload::finalize::finalize;
use crate::worker::TaskStatus;

const UPLOAD_OFFSET: &str = "upload-offset";

/// Run blocking filesystem and database work off the async executor
async fn blocking<T, E>(f: impl FnOnce() -> Result<T, E> + Send + 'static) -> ApiResult<T>
where
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(Into::into)
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn begin_upload(
    State(state): State<AppState>,
    Json(request): Json<BeginUpload>,
) -> ApiResult<(StatusCode, Json<FileRecord>)> {
    let store = state.store.clone();
    let tmp = state.upload_tmp.clone();
    let file = blocking(move || begin_transfer(&store, &tmp, &request)).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

pub async fn append_chunk(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let offset = headers
        .get(UPLOAD_OFFSET)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or_else(|| ApiError::BadRequest("missing or malformed Upload-Offset header".to_string()))?;

    let store = state.store.clone();
    let progress: ChunkProgress =
        blocking(move || append_to_upload(&store, &transfer_id, offset, &body)).await?;

    Ok((
        StatusCode::OK,
        [(UPLOAD_OFFSET, progress.offset.to_string())],
        Json(progress),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CompleteUpload {
    pub name: String,
}

pub async fn complete_upload(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    Json(request): Json<CompleteUpload>,
) -> ApiResult<Json<FileRecord>> {
    let store = state.store.clone();
    let wd = state.wd.clone();
    let file = blocking(move || finalize(&store, &wd, &transfer_id, &request.name)).await?;
    Ok(Json(file))
}

pub async fn delete_file(State(state): State<AppState>, Path(file_id): Path<i64>) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    let removed = blocking(move || store.with(|conn| delete_file_record(conn, file_id))).await?;
    match removed {
        Some(file) => {
            info!("Deleted file {} ({})", file.id, file.name);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound(format!("file {file_id}"))),
    }
}

/// Create a project and hand it to the orchestrator in the background
///
/// The response carries the project as created; its status moves on as the submission runs.
pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let store = state.store.clone();
    let project = blocking(move || {
        store.with(|conn| {
            let project = insert_project(conn, &request)?;
            record_action(conn, project.user_id, RecordKind::Project, &project.name)?;
            Ok(project)
        })
    })
    .await?;
    info!("Created project {} ({}) for user {}", project.id, project.name, project.user_id);

    let orchestrator = state.orchestrator.clone();
    let project_id = project.id;
    tokio::spawn(async move {
        if let Err(err) = orchestrator.submit(project_id).await {
            warn!("Background submission of project {} failed: {}", project_id, err);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(project)))
}

pub async fn delete_project(State(state): State<AppState>, Path(project_id): Path<i64>) -> ApiResult<StatusCode> {
    let store = state.store.clone();
    let deleted = blocking(move || store.with(|conn| delete_project_record(conn, project_id))).await?;
    match deleted {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound(format!("project {project_id}"))),
    }
}

pub async fn rerun_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<JobHandle>)> {
    let handle = state.orchestrator.rerun(project_id).await?;
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

pub async fn project_status(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<TaskStatus>> {
    Ok(Json(state.orchestrator.refresh(project_id).await?))
}

pub async fn project_tree(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> ApiResult<Json<DirectoryTree>> {
    let store = state.store.clone();
    let project = blocking(move || store.with(|conn| load_project(conn, project_id)))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))?;

    let root = state.wd.project_dir(project.user_id, project.id, &project.name);
    let storage_root = state.wd.path.clone();
    let limits = state.tree_limits;
    let tree = blocking(move || build_tree(&root, &project.name, &storage_root, limits)).await?;
    tree.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("results of project {project_id}")))
}

pub async fn user_actions_log(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<Action>>> {
    let store = state.store.clone();
    let actions = blocking(move || store.with(|conn| user_actions(conn, user_id))).await?;
    Ok(Json(actions))
}

/// Serve a stored file, or the part of it named by the `Range` header
pub async fn fetch_range(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = state
        .wd
        .resolve(&path)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid path {path:?}")))?;
    let range = match headers.get(RANGE) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest("Range header is not ASCII".to_string()))?,
        ),
        None => None,
    };

    let reply = open_range(&path, range).await?;
    let status = match reply.is_partial() {
        true => StatusCode::PARTIAL_CONTENT,
        false => StatusCode::OK,
    };

    let mut response = axum::http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, reply.content_length())
        .header(ACCEPT_RANGES, "bytes");
    if let Some(content_range) = reply.content_range() {
        response = response.header(CONTENT_RANGE, content_range);
    }
    response
        .body(Body::from_stream(ReaderStream::new(reply.body)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
