//! API Routes
//!
//! Configures the Axum router with the WebSocket endpoint and the internal
//! emit API.

use axum::{
    extract::Request,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use super::handlers::{
    emit_campus_admins_handler, emit_campus_rooms_handler, emit_conversation_handler,
    emit_user_rooms_handler, emit_users_handler, health_handler, stats_handler, AppState,
};
use super::middleware::require_emit_key;
use super::ws::ws_handler;

/// Request span carrying the method and path only. The query string is left
/// out because `/ws` takes its bearer token there.
pub fn request_span(request: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - API key: required on every `/emit/*` route
/// - CORS: any origin, on `/stats` and `/health` only
/// - Tracing: logs all requests without their query strings
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let emit = Router::new()
        .route("/emit/users", post(emit_users_handler))
        .route("/emit/user-rooms", post(emit_user_rooms_handler))
        .route("/emit/campus-rooms", post(emit_campus_rooms_handler))
        .route("/emit/campus-admins", post(emit_campus_admins_handler))
        .route("/emit/conversation", post(emit_conversation_handler))
        .route_layer(from_fn_with_state(state.clone(), require_emit_key));

    let public = Router::new()
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors);

    Router::new()
        .route("/ws", get(ws_handler))
        .merge(emit)
        .merge(public)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::API_KEY_HEADER;
    use crate::auth::Identity;
    use crate::config::Config;
    use crate::directory::StaticDirectory;
    use crate::gateway::GatewayHooks;
    use crate::registry::ConnectionId;
    use crate::transport::Outbound;
    use axum::{
        body::Body,
        http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, Request, StatusCode},
    };
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tower::util::ServiceExt;

    const KEY: &str = "test-key";

    fn test_state(emit_api_key: Option<&str>) -> AppState {
        let directory =
            Arc::new(StaticDirectory::new().with_user(Identity::student("s1"), "token-s1"));
        let config = Config {
            emit_api_key: emit_api_key.map(str::to_string),
            ..Config::default()
        };
        AppState::new(directory.clone(), directory.clone(), directory, &config)
    }

    fn create_test_app() -> Router {
        create_router(test_state(Some(KEY)))
    }

    /// Registers an authenticated socket for `s1` and returns its channel.
    fn connect_s1(state: &AppState) -> UnboundedReceiver<Outbound> {
        let (tx, rx) = unbounded_channel();
        let connection = ConnectionId::new();
        state.transport.attach(connection.clone(), tx);
        state.fanout.on_connect(&connection, &Identity::student("s1"));
        rx
    }

    fn post_json(uri: &str, key: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("origin", "https://elsewhere.example")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::from(body)).unwrap()
    }

    const FORGED: &str = r#"{"payload":{"title":"forged"}}"#;

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .header("origin", "https://dashboard.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_emit_without_key_is_rejected_and_not_delivered() {
        let state = test_state(Some(KEY));
        let mut rx = connect_s1(&state);
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/emit/user-rooms", None, FORGED))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_with_wrong_key_is_rejected() {
        let state = test_state(Some(KEY));
        let mut rx = connect_s1(&state);
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/emit/user-rooms", Some("guess"), FORGED))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_is_disabled_without_configured_key() {
        let state = test_state(None);
        let mut rx = connect_s1(&state);
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/emit/user-rooms", Some(""), FORGED))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_with_key_is_delivered() {
        let state = test_state(Some(KEY));
        let mut rx = connect_s1(&state);
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/emit/user-rooms", Some(KEY), FORGED))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Frame(_))));
    }

    #[tokio::test]
    async fn test_emit_empty_event_is_bad_request() {
        let app = create_test_app();

        let response = app
            .oneshot(post_json("/emit/user-rooms", Some(KEY), r#"{"event":""}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ws?token=token-s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/emit/everyone")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_request_span_omits_query_string() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let request = Request::builder()
            .uri("/ws?token=secret-bearer")
            .body(Body::empty())
            .unwrap();
        tracing::subscriber::with_default(subscriber, || {
            let span = request_span(&request);
            let _entered = span.enter();
            tracing::debug!("handled");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("path=/ws"));
        assert!(!output.contains("secret-bearer"));
    }
}
