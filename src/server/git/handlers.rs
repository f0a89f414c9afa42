use std::sync::Arc;

use async_compression::tokio::bufread::GzipDecoder;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::auth::{GitAuthError, authorize_git_access, extract_git_actor};
use super::ensure_repository;
use super::process::{GitService, format_pkt_line_header, repo_path, run_git_command};
use crate::hooks::{ENV_PRINCIPAL_ID, ENV_REPO_ID};
use crate::server::AppState;
use crate::types::{Actor, Repo};

const INFO_REFS_SUFFIX: &str = "/info/refs";

#[derive(Deserialize)]
pub struct InfoRefsQuery {
    service: Option<String>,
}

fn git_error_response(err: GitAuthError) -> Response {
    let mut response = (err.status_code(), err.message()).into_response();

    if err.requires_auth_header() {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"gatehouse\""),
        );
    }

    response
}

fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

fn build_git_response(body: Vec<u8>, content_type: &'static str) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn internal_error(message: &'static str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

/// Environment that lets the hooks identify the push.
fn hook_env(actor: &Actor, repo: &Repo) -> Vec<(&'static str, String)> {
    let mut env = vec![(ENV_REPO_ID, repo.id.to_string())];
    if let Some(principal) = actor.principal() {
        env.push((ENV_PRINCIPAL_ID, principal.id.clone()));
    }
    env
}

async fn prepare(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    repo_ref: &str,
    is_write: bool,
) -> Result<(Actor, Repo, std::path::PathBuf), Response> {
    let actor = extract_git_actor(headers, state).map_err(git_error_response)?;
    let repo = authorize_git_access(state, &actor, strip_git_suffix(repo_ref), is_write)
        .map_err(git_error_response)?;

    let path = repo_path(&state.data_dir, repo.id);
    if let Err(e) = ensure_repository(state, &repo).await {
        warn!("Failed to prepare repository {}: {e}", repo.path);
        return Err(internal_error("Failed to initialize repository"));
    }

    Ok((actor, repo, path))
}

pub async fn info_refs(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<InfoRefsQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(repo_ref) = path.strip_suffix(INFO_REFS_SUFFIX) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let service = match query.service.as_deref().and_then(GitService::from_str) {
        Some(s) => s,
        None => return (StatusCode::BAD_REQUEST, "Invalid service").into_response(),
    };

    let (actor, repo, path) = match prepare(&state, &headers, repo_ref, service.is_write()).await {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    let env = hook_env(&actor, &repo);
    let output = match run_git_command(&path, service, true, None, &env).await {
        Ok(o) => o,
        Err(e) => {
            warn!("Git command failed: {e}");
            return internal_error("Git command failed");
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("Git command failed: {stderr}");
        return internal_error("Git command failed");
    }

    let mut body = format_pkt_line_header(service);
    body.extend_from_slice(&output.stdout);

    build_git_response(body, service.advertisement_content_type())
}

/// Handles `POST .../git-upload-pack` and `POST .../git-receive-pack`.
pub async fn service_rpc(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((repo_ref, service_name)) = path.rsplit_once('/') else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(service) = GitService::from_str(service_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (actor, repo, path) = match prepare(&state, &headers, repo_ref, service.is_write()).await {
        Ok(prepared) => prepared,
        Err(response) => return response,
    };

    let input = match decompress_if_gzip(&headers, body).await {
        Ok(data) => data,
        Err(e) => return e,
    };

    let env = hook_env(&actor, &repo);
    let output = match run_git_command(&path, service, false, Some(&input), &env).await {
        Ok(o) => o,
        Err(e) => {
            warn!("{} failed: {e}", service.command_name());
            return internal_error("Git command failed");
        }
    };

    build_git_response(output.stdout, service.content_type())
}

async fn decompress_if_gzip(headers: &HeaderMap, body: Bytes) -> Result<Vec<u8>, Response> {
    let content_encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok());

    if content_encoding == Some("gzip") {
        let reader = std::io::Cursor::new(body);
        let mut decoder = GzipDecoder::new(tokio::io::BufReader::new(reader));
        let mut decompressed = Vec::new();

        decoder
            .read_to_end(&mut decompressed)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid gzip body").into_response())?;

        Ok(decompressed)
    } else {
        Ok(body.to_vec())
    }
}
