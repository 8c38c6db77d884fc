use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::Error;
use crate::hash::Hash;
use crate::store::{ListOptions, PutOptions};

use super::params::{BranchParams, EntryParams, ListParams, MergeParams};
use super::AppState;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.to_string()).into_response()
    }
}

type HandlerResult<T> = Result<T, Error>;

fn parse_commit(params_commit_sha: &Option<String>) -> HandlerResult<Option<Hash>> {
    params_commit_sha.as_deref().map(Hash::from_hex).transpose()
}

/// run a synchronous `Store` operation on the blocking pool so one slow store
/// can't stall the single-threaded request executor.
async fn blocking<F, T>(f: F) -> HandlerResult<T>
where
    F: FnOnce() -> HandlerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| Error::TaskJoin(e.to_string()))?
}

pub async fn list_stores(State(state): State<AppState>) -> HandlerResult<Json<Value>> {
    let registry = state.registry.clone();
    let stores = blocking(move || registry.list_on_disk()).await?;
    Ok(Json(json!({ "stores": stores })))
}

pub async fn create_store(
    State(state): State<AppState>,
    Path(store): Path<String>,
) -> HandlerResult<Json<Value>> {
    let registry = state.registry.clone();
    let head = blocking(move || {
        let s = registry.get_or_create(&store)?;
        s.branch_head(crate::store::DEFAULT_BRANCH)
    })
    .await?;
    Ok(Json(json!({ "sha": head.to_hex() })))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let (requests, hits, misses) = state.cache.stats();
    Json(json!({ "requests": requests, "hits": hits, "misses": misses, "size": state.cache.size() }))
}

pub async fn reset_cache_stats(State(state): State<AppState>) -> Json<Value> {
    state.cache.reset_stats();
    Json(json!({ "ok": true }))
}

pub async fn thread_dump() -> Json<Value> {
    // no green-thread stacks exist in a tokio runtime; report what is
    // actually observable instead: the current task's worker thread count.
    Json(json!({
        "runtime": "tokio",
        "active_worker_threads": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    }))
}

pub async fn get_branch(
    State(state): State<AppState>,
    Path((store, branch)): Path<(String, String)>,
) -> HandlerResult<Json<Value>> {
    let registry = state.registry.clone();
    let branch_for_blocking = branch.clone();
    let head = blocking(move || {
        let s = registry.get_or_create(&store)?;
        s.branch_head(&branch_for_blocking)
    })
    .await?;
    Ok(Json(json!({ "branch": branch, "sha": head.to_hex() })))
}

pub async fn create_branch(
    State(state): State<AppState>,
    Path((store, branch)): Path<(String, String)>,
    Query(params): Query<BranchParams>,
) -> HandlerResult<Json<Value>> {
    let registry = state.registry.clone();
    let source = params.parent.clone().unwrap_or_else(|| crate::store::DEFAULT_BRANCH.to_string());
    let head = blocking(move || {
        let s = registry.get_or_create(&store)?;
        s.create_branch(&branch, &source)
    })
    .await?;
    Ok(Json(json!({ "sha": head.to_hex() })))
}

pub async fn merge(
    State(state): State<AppState>,
    Path((store, source)): Path<(String, String)>,
    Query(params): Query<MergeParams>,
) -> HandlerResult<Json<Value>> {
    let registry = state.registry.clone();
    let target = params.target.clone().unwrap_or_else(|| crate::store::DEFAULT_BRANCH.to_string());
    let sha = blocking(move || {
        let s = registry.get_or_create(&store)?;
        s.merge(&source, &target)
    })
    .await?;
    Ok(Json(json!({ "sha": sha.to_hex() })))
}

async fn get_entry_at(state: AppState, store: String, path: String, params: EntryParams) -> HandlerResult<Json<Value>> {
    let commit = parse_commit(&params.commit_sha)?;
    // shallow realizes exactly two levels of nested children (spec.md §4.1.1)
    let max_depth = params.shallow.filter(|&v| v != 0).map(|_| 2);
    let registry = state.registry.clone();
    let cache = state.cache.clone();

    let value = blocking(move || {
        let s = registry.get_or_create(&store)?;

        if commit.is_some() {
            s.get(&path, params.branch.as_deref(), commit.as_ref(), max_depth)
        } else {
            let branch = params.branch.clone().unwrap_or_else(|| crate::store::DEFAULT_BRANCH.to_string());
            let commit_for_cache = if branch == crate::store::DEFAULT_BRANCH {
                s.branch_head(&branch).ok()
            } else {
                None
            };
            cache.get_or_compute(
                "get",
                commit_for_cache.as_ref(),
                &(path.clone(), branch.clone(), max_depth),
                || s.get(&path, Some(&branch), None, max_depth),
            )
        }
    })
    .await?;
    Ok(Json(value))
}

pub async fn get_entry_root(State(state): State<AppState>, Path(store): Path<String>, Query(params): Query<EntryParams>) -> HandlerResult<Json<Value>> {
    get_entry_at(state, store, String::new(), params).await
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path((store, path)): Path<(String, String)>,
    Query(params): Query<EntryParams>,
) -> HandlerResult<Json<Value>> {
    get_entry_at(state, store, path, params).await
}

async fn put_entry_at(
    state: AppState,
    store: String,
    path: String,
    params: EntryParams,
    body: Option<Json<Value>>,
) -> Response {
    let Some(Json(value)) = body else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let registry = state.registry.clone();
    let result: HandlerResult<Json<Value>> = blocking(move || {
        let s = registry.get_or_create(&store)?;
        let opts = PutOptions {
            branch: params.branch.clone().unwrap_or_else(|| crate::store::DEFAULT_BRANCH.to_string()),
            flatten_keys: params.flatten_keys,
            overwrite: params.overwrite,
        };
        let sha = s.put(&path, value, &opts)?;
        Ok(Json(json!({ "sha": sha.to_hex() })))
    })
    .await;
    match result {
        Ok(r) => r.into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn put_entry_root(
    State(state): State<AppState>,
    Path(store): Path<String>,
    Query(params): Query<EntryParams>,
    body: Option<Json<Value>>,
) -> Response {
    put_entry_at(state, store, String::new(), params, body).await
}

pub async fn put_entry(
    State(state): State<AppState>,
    Path((store, path)): Path<(String, String)>,
    Query(params): Query<EntryParams>,
    body: Option<Json<Value>>,
) -> Response {
    put_entry_at(state, store, path, params, body).await
}

async fn delete_entry_at(state: AppState, store: String, path: String, params: EntryParams) -> HandlerResult<Json<Value>> {
    let registry = state.registry.clone();
    let sha = blocking(move || {
        let s = registry.get_or_create(&store)?;
        let branch = params.branch.clone().unwrap_or_else(|| crate::store::DEFAULT_BRANCH.to_string());
        s.delete(&path, &branch)
    })
    .await?;
    Ok(Json(json!({ "sha": sha.to_hex() })))
}

pub async fn delete_entry_root(State(state): State<AppState>, Path(store): Path<String>, Query(params): Query<EntryParams>) -> HandlerResult<Json<Value>> {
    delete_entry_at(state, store, String::new(), params).await
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path((store, path)): Path<(String, String)>,
    Query(params): Query<EntryParams>,
) -> HandlerResult<Json<Value>> {
    delete_entry_at(state, store, path, params).await
}

fn list_options(params: &ListParams) -> HandlerResult<ListOptions> {
    Ok(ListOptions {
        branch: params.branch.clone(),
        commit: parse_commit(&params.commit_sha)?,
        pattern: params.pattern.clone(),
        min_level: params.min_level,
        max_level: params.max_level,
        depth_first: params.depth_first,
        filter_by: params.filter_by(),
    })
}

async fn keys_at(state: AppState, store: String, path: String, params: ListParams) -> HandlerResult<Json<Value>> {
    let s = state.registry.get_or_create(&store)?;
    let opts = list_options(&params)?;
    let keys = s.keys(&path, &opts).await?;
    Ok(Json(json!({ "keys": keys })))
}

pub async fn keys_root(State(state): State<AppState>, Path(store): Path<String>, Query(params): Query<ListParams>) -> HandlerResult<Json<Value>> {
    keys_at(state, store, String::new(), params).await
}

pub async fn keys(
    State(state): State<AppState>,
    Path((store, path)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> HandlerResult<Json<Value>> {
    keys_at(state, store, path, params).await
}

async fn entries_at(state: AppState, store: String, path: String, params: ListParams) -> HandlerResult<Json<Value>> {
    let s = state.registry.get_or_create(&store)?;
    let opts = list_options(&params)?;
    let entries = s.entries(&path, &opts).await?;
    Ok(Json(json!({ "entries": entries })))
}

pub async fn entries_root(State(state): State<AppState>, Path(store): Path<String>, Query(params): Query<ListParams>) -> HandlerResult<Json<Value>> {
    entries_at(state, store, String::new(), params).await
}

pub async fn entries(
    State(state): State<AppState>,
    Path((store, path)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> HandlerResult<Json<Value>> {
    entries_at(state, store, path, params).await
}

async fn trees_at(state: AppState, store: String, path: String, params: ListParams) -> HandlerResult<Json<Value>> {
    let commit = parse_commit(&params.commit_sha)?;
    let registry = state.registry.clone();
    let value = blocking(move || {
        let s = registry.get_or_create(&store)?;
        s.trees(&path, params.branch.as_deref(), commit.as_ref(), params.object_depth)
    })
    .await?;
    Ok(Json(value))
}

pub async fn trees_root(State(state): State<AppState>, Path(store): Path<String>, Query(params): Query<ListParams>) -> HandlerResult<Json<Value>> {
    trees_at(state, store, String::new(), params).await
}

pub async fn trees(
    State(state): State<AppState>,
    Path((store, path)): Path<(String, String)>,
    Query(params): Query<ListParams>,
) -> HandlerResult<Json<Value>> {
    trees_at(state, store, path, params).await
}

pub async fn diff(
    State(state): State<AppState>,
    Path((store, sha)): Path<(String, String)>,
) -> HandlerResult<Json<Value>> {
    let to = Hash::from_hex(&sha)?;
    let registry = state.registry.clone();
    let changes = blocking(move || {
        let s = registry.get_or_create(&store)?;
        let from = s.branch_head(crate::store::DEFAULT_BRANCH)?;
        s.diff(&from, &to)
    })
    .await?;
    let rendered: Vec<Value> = changes
        .iter()
        .map(|c| json!({ "path": c.path, "kind": c.kind.to_string() }))
        .collect();
    Ok(Json(json!({ "diff": rendered })))
}
