use core::time::Duration;

use axum::http::StatusCode;
use tower_http::{
    classify::ServerErrorsFailureClass,
    trace::{DefaultOnFailure, OnFailure},
};
use tracing::{Span, debug};

/// Failure hook for the trace layer.
///
/// `ApiError` already logs every fault it renders. A 503 only says the broker supervisor is gone,
/// so the trace layer reports it at `DEBUG`; other failures go through tower-http's default.
#[derive(Clone, Copy, Default)]
pub(crate) struct QuietSupervisorFailures;

impl OnFailure<ServerErrorsFailureClass> for QuietSupervisorFailures {
    fn on_failure(&mut self, class: ServerErrorsFailureClass, latency: Duration, span: &Span) {
        if is_supervisor_unavailable(&class) {
            debug!(
                parent: span,
                %class,
                latency_ms = latency.as_millis(),
                "Broker supervisor unavailable"
            );
        } else {
            DefaultOnFailure::default().on_failure(class, latency, span);
        }
    }
}

const fn is_supervisor_unavailable(class: &ServerErrorsFailureClass) -> bool {
    matches!(
        *class,
        ServerErrorsFailureClass::StatusCode(StatusCode::SERVICE_UNAVAILABLE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_service_unavailable_is_quieted() {
        assert!(is_supervisor_unavailable(
            &ServerErrorsFailureClass::StatusCode(StatusCode::SERVICE_UNAVAILABLE)
        ));
        assert!(!is_supervisor_unavailable(
            &ServerErrorsFailureClass::StatusCode(StatusCode::INTERNAL_SERVER_ERROR)
        ));
        assert!(!is_supervisor_unavailable(&ServerErrorsFailureClass::Error(
            "connection reset".to_owned()
        )));
    }
}
