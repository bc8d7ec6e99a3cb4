use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    middleware,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;

use crate::api::{error, handlers, site};
use crate::config::Environment;
use crate::store::traits::Store;

/// JSON request bodies above this size are refused
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Routes of the synchronization API and the diagnostic pages.
pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Service banner and diagnostics
        .route("/", get(site::banner))
        .route("/hello/:message", get(site::hello))
        .route("/health", get(site::health_check::<S>))
        .route("/html/count", get(site::html_count::<S>))
        // Synchronization API, version 1
        .route("/api/v1", get(site::api_index))
        .route("/api/v1/documents", get(handlers::list_documents::<S>))
        .route(
            "/api/v1/documents/:document_guid/instances",
            get(handlers::pull_instances::<S>).post(handlers::push_instance::<S>),
        )
        .route(
            "/api/v1/documents/:document_guid/instances/batch",
            post(handlers::push_batch::<S>),
        )
        .route(
            "/api/v1/documents/:document_guid/instances/:id",
            get(handlers::get_instance::<S>)
                .put(handlers::put_instance::<S>)
                .delete(handlers::delete_instance::<S>),
        )
}

/// Full application: API routes, static viewer files, the 404 fallback and
/// the error/panic/body-limit layers, with the store injected as state.
pub fn create_app<S: Store + 'static>(
    store: Arc<S>,
    environment: Environment,
    static_dir: impl AsRef<Path>,
) -> Router {
    let static_files = ServeDir::new(static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(error::route_not_found.into_service());

    create_router::<S>()
        .fallback_service(static_files)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(middleware::map_response_with_state(
            environment,
            error::expose_error_detail,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(store)
}
