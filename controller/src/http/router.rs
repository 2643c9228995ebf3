use core::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    app::AppState,
    http::{api, middleware::QuietSupervisorFailures},
};

/// Builds the control API with tracing and a request timeout.
pub(crate) fn create_app(app_state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http().on_failure(QuietSupervisorFailures))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ));

    Router::new()
        .nest("/api", api::routes())
        .with_state(app_state)
        .fallback(routing::any(|req: Request<Body>| async move {
            tracing::warn!(method = %req.method(), uri = %req.uri(), "Unhandled request");
            StatusCode::NOT_FOUND
        }))
        .layer(middleware_stack)
}
