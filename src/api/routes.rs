use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    let mut router = Router::new()
        // Files
        .route(
            "/folders/:folder_id/files",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files", get(handlers::list_files))
        .route("/files/:id", get(handlers::get_file))
        .route("/files/:id", put(handlers::update_file))
        .route("/files/:id", delete(handlers::delete_file))
        .route("/files/:id/download", get(handlers::download_file))
        // Versions
        .route(
            "/files/:id/versions",
            post(handlers::upload_version).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/:id/versions", get(handlers::list_versions))
        .route("/versions/:id/restore", post(handlers::restore_version))
        .route("/versions/:id/download", get(handlers::download_version))
        // Shares
        .route("/files/:id/shares", post(handlers::grant_share))
        .route("/files/:id/shares", get(handlers::list_shares))
        .route("/shares/:id", delete(handlers::revoke_share))
        .route("/shares/token/:token", get(handlers::share_access))
        // Search
        .route("/search", get(handlers::search))
        // Internal
        .route("/_internal/folders", put(handlers::put_folder))
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled — purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
