//! HTTP surface: one axum router exposing every store over a REST-ish API.
//! Route shapes and query parameter defaults mirror the original bottle
//! server as closely as axum's extractors allow.

mod handlers;
mod params;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::query_cache::QueryCache;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub cache: Arc<QueryCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stores/:store", post(handlers::create_store))
        .route("/stores", get(handlers::list_stores))
        .route("/cache_stats", get(handlers::cache_stats))
        .route("/reset_cache_stats", post(handlers::reset_cache_stats))
        .route("/thread_dump", get(handlers::thread_dump))
        .route(
            "/:store/branch/:branch",
            post(handlers::create_branch).get(handlers::get_branch),
        )
        .route("/:store/merge/:source", post(handlers::merge))
        .route(
            "/:store/entry",
            get(handlers::get_entry_root)
                .put(handlers::put_entry_root)
                .delete(handlers::delete_entry_root),
        )
        .route(
            "/:store/entry/*path",
            get(handlers::get_entry)
                .put(handlers::put_entry)
                .delete(handlers::delete_entry),
        )
        .route("/:store/keys", get(handlers::keys_root))
        .route("/:store/keys/*path", get(handlers::keys))
        .route("/:store/entries", get(handlers::entries_root))
        .route("/:store/entries/*path", get(handlers::entries))
        .route("/:store/trees", get(handlers::trees_root))
        .route("/:store/trees/*path", get(handlers::trees))
        .route("/:store/diff/:sha", get(handlers::diff))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
