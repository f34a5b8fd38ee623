use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use saga_core::ExecutionRequest;
use saga_exec::{Coordinator, ExecutionError};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::exit_codes;
use crate::output::{print_error, OutputFormat};
use crate::{DispatcherArgs, EngineArgs, EventsArgs, ServeArgs};

use super::config::{build_coordinator, load_registry};

#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, request_timeout: Duration) -> Self {
        Self {
            coordinator,
            request_timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sagas", get(list_sagas))
        .route("/sagas/execute", post(execute))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve_cmd(
    path: &Path,
    serve: ServeArgs,
    engine: EngineArgs,
    dispatcher: DispatcherArgs,
    events: EventsArgs,
) -> i32 {
    let output = crate::OutputArgs {
        format: OutputFormat::Text,
        quiet: false,
    };
    let registry = match load_registry(path, &output) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let coordinator = match build_coordinator(registry, &engine, &dispatcher, &events) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let listener = match TcpListener::bind(serve.bind).await {
        Ok(l) => l,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to bind {}: {e}", serve.bind));
            return exit_codes::RUNTIME_ERROR;
        }
    };
    let local_addr = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();
    tracing::info!(
        addr = %local_addr,
        sagas = coordinator.registry().len(),
        "saga coordinator listening"
    );

    let state = AppState::new(coordinator, Duration::from_millis(serve.request_timeout_ms));
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match result {
        Ok(()) => {
            tracing::info!("server stopped");
            exit_codes::SUCCESS
        }
        Err(e) => {
            print_error(output.format, output.quiet, &format!("server error: {e}"));
            exit_codes::RUNTIME_ERROR
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_sagas(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "sagas": state.coordinator.registry().names() }))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn execute(
    State(state): State<AppState>,
    body: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(b) => b,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if request.saga_name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "saga_name is required");
    }

    let cancel = CancellationToken::new();
    let timer = {
        let cancel = cancel.clone();
        let timeout = state.request_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel();
        })
    };

    // The run gets its own task so a dropped connection cannot interrupt
    // compensation halfway.
    let coordinator = state.coordinator.clone();
    let run = tokio::spawn(async move { coordinator.execute_with_cancel(request, cancel).await });
    let joined = run.await;
    timer.abort();

    match joined {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(ExecutionError::NotFound(e))) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "saga run task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "saga run aborted")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use saga_core::{Registry, Saga, Step};
    use saga_exec::{DispatchError, EchoDispatcher, ExecutorConfig, FnDispatcher, NoOpEventSink};
    use tower::ServiceExt;

    fn order_saga() -> Saga {
        Saga::new("order")
            .with_step(Step::new("charge", "payments.charge").compensated_by("payments.refund"))
            .with_step(Step::new("ship", "warehouse.ship").requires("charge"))
    }

    fn app_with(dispatcher: Arc<dyn saga_exec::Dispatcher>, timeout: Duration) -> Router {
        let registry = Arc::new(Registry::from_sagas(vec![order_saga()]).unwrap());
        let coordinator = Coordinator::new(registry, ExecutorConfig::default())
            .with_dispatcher(dispatcher)
            .with_event_sink(Arc::new(NoOpEventSink));
        router(AppState::new(Arc::new(coordinator), timeout))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/sagas/execute")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = app_with(Arc::new(EchoDispatcher), Duration::from_secs(5));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn execute_returns_result() {
        let app = app_with(Arc::new(EchoDispatcher), Duration::from_secs(5));
        let response = app
            .oneshot(post_json(r#"{"saga_name":"order","payload":{"amount":10},"trace_id":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "succeeded");
        assert_eq!(body["details"]["trace_id"], "abc");
        assert_eq!(body["details"]["steps"]["ship"]["status"], "succeeded");
    }

    #[tokio::test]
    async fn failed_run_is_still_200() {
        let dispatcher = FnDispatcher::new(|inv| {
            Box::pin(async move {
                if inv.action == "warehouse.ship" {
                    Err(DispatchError::Failed("no trucks".into()))
                } else {
                    Ok(json!(null))
                }
            })
        });
        let app = app_with(Arc::new(dispatcher), Duration::from_secs(5));
        let response = app.oneshot(post_json(r#"{"saga_name":"order"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["details"]["failed_step"], "ship");
        assert_eq!(body["details"]["steps"]["charge"]["status"], "compensated");
    }

    #[tokio::test]
    async fn unknown_saga_is_404() {
        let app = app_with(Arc::new(EchoDispatcher), Duration::from_secs(5));
        let response = app.oneshot(post_json(r#"{"saga_name":"refund"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("refund"));
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = app_with(Arc::new(EchoDispatcher), Duration::from_secs(5));
        let response = app.clone().oneshot(post_json("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post_json(r#"{"payload":{}}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_timeout_cancels_and_compensates() {
        let dispatcher = FnDispatcher::new(|inv| {
            Box::pin(async move {
                if inv.action != "warehouse.ship" {
                    return Ok(json!(null));
                }
                tokio::select! {
                    _ = inv.cancel.cancelled() => Err(DispatchError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(json!(null)),
                }
            })
        });
        let app = app_with(Arc::new(dispatcher), Duration::from_millis(100));
        let response = app.oneshot(post_json(r#"{"saga_name":"order"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["details"]["cancelled"], true);
        assert_eq!(body["details"]["steps"]["ship"]["status"], "failed");
        assert_eq!(body["details"]["steps"]["charge"]["status"], "compensated");
    }
}
