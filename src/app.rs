use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ApiConfig, SecurityConfig};
use crate::gateway::AggregationGateway;
use crate::handlers::{health, items, session, users};
use crate::middleware::caller_context_middleware;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<AggregationGateway>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(gateway: AggregationGateway, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            jwt_secret: jwt_secret.into(),
        }
    }
}

/// Build the full router. Request tracing follows `api`, CORS follows
/// `security`.
pub fn app(state: AppState, api: &ApiConfig, security: &SecurityConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health::health))
        .merge(api_routes(state.clone()))
        .with_state(state);

    if api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if security.enable_cors {
        router = router.layer(cors_layer(security));
    }
    router
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Items
        .route("/api/items", get(items::list).post(items::create))
        .route("/api/items/mine", get(items::list_mine))
        .route(
            "/api/items/area",
            get(items::list_in_box).post(items::list_in_region),
        )
        .route("/api/items/owner/:owner_id", get(items::list_by_owner))
        .route(
            "/api/items/:id",
            get(items::get).put(items::update).delete(items::delete),
        )
        // Users
        .route(
            "/api/users",
            get(users::list)
                .post(users::register)
                .put(users::update_self)
                .delete(users::delete_self),
        )
        .route("/api/users/:id", get(users::get).delete(users::delete))
        // Session
        .route("/api/auth/login", post(session::login))
        .route("/api/auth/whoami", get(session::whoami))
        .route_layer(from_fn_with_state(state, caller_context_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Item Gateway",
            "version": version,
            "endpoints": {
                "items": "/api/items[/:id] (reads public, writes by owner or admin)",
                "owner": "/api/items/owner/:owner_id (public)",
                "mine": "/api/items/mine (authenticated)",
                "area": "/api/items/area (public, GET box query or POST box/polygon)",
                "users": "/api/users[/:id] (identity service pass-through)",
                "auth": "/api/auth/login, /api/auth/whoami",
                "health": "/health",
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;
    use tracing::span::{Attributes, Id};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use crate::config::AppConfig;
    use crate::database::MemoryItemStore;
    use crate::testing::StubIdentityClient;

    /// Counts the per-request spans opened by the HTTP trace layer
    struct RequestSpans(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for RequestSpans {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            if attrs.metadata().name() == "request" {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    async fn request_spans(enable_request_logging: bool) -> usize {
        let spans = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(RequestSpans(spans.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut config = AppConfig::development();
        config.api.enable_request_logging = enable_request_logging;
        let gateway = AggregationGateway::new(
            Arc::new(MemoryItemStore::new()),
            Arc::new(StubIdentityClient::default()),
        );
        let router = app(AppState::new(gateway, "secret"), &config.api, &config.security);

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        spans.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn request_tracing_follows_config() {
        assert_eq!(request_spans(true).await, 1);
        assert_eq!(request_spans(false).await, 0);
    }
}
