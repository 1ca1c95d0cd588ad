#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use item_gateway::auth::{verify_token, CallerContext, Claims};
use item_gateway::database::MemoryItemStore;
use item_gateway::gateway::AggregationGateway;
use item_gateway::identity::{HttpIdentityClient, Role};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "hunter2";

pub fn mint_token(id: &str, role: Role) -> String {
    let now = chrono::Utc::now();
    let claims = Claims {
        id: id.to_string(),
        role,
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to mint token")
}

pub fn caller(id: &str, role: Role) -> CallerContext {
    CallerContext::new(id, role, mint_token(id, role))
}

/// How the fake identity service answers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Normal,
    Down,
    Garbage,
    Slow(Duration),
}

struct FakeState {
    users: Mutex<BTreeMap<String, Value>>,
    mode: Mutex<Mode>,
    lookups: AtomicUsize,
    next_id: AtomicUsize,
}

/// In-process stand-in for the identity service, speaking its wire format
/// (`_id` keys, wrapped mutation responses, bearer tokens).
pub struct FakeIdentityService {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeIdentityService {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(FakeState {
            users: Mutex::new(BTreeMap::new()),
            mode: Mutex::new(Mode::Normal),
            lookups: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        });

        let router = Router::new()
            .route(
                "/api/v1/users",
                get(list_users).post(create_user).put(update_user),
            )
            .route("/api/v1/users/:id", get(get_user).delete(delete_user))
            .route("/api/v1/auth/login", post(login))
            .with_state(state.clone());

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind fake identity service")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}/api/v1", port),
            state,
        })
    }

    pub async fn with_users(users: &[(&str, Role)]) -> Result<Self> {
        let service = Self::start().await?;
        for (id, role) in users {
            service.add_user(id, *role);
        }
        Ok(service)
    }

    pub fn add_user(&self, id: &str, role: Role) {
        let role = serde_json::to_value(role).expect("role serializes");
        self.state.users.lock().unwrap().insert(
            id.to_string(),
            json!({
                "_id": id,
                "user_name": id,
                "email": format!("{}@example.com", id),
                "role": role,
            }),
        );
    }

    pub fn remove_user(&self, id: &str) {
        self.state.users.lock().unwrap().remove(id);
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    pub fn lookups(&self) -> usize {
        self.state.lookups.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> url::Url {
        url::Url::parse(&self.base_url).expect("valid base url")
    }

    pub fn client(&self) -> HttpIdentityClient {
        self.client_with_timeout(Duration::from_secs(2))
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> HttpIdentityClient {
        HttpIdentityClient::new(self.url(), timeout).expect("client builds")
    }

    /// Gateway over a fresh in-memory store and this service
    pub fn gateway(&self) -> (AggregationGateway, MemoryItemStore) {
        let store = MemoryItemStore::new();
        let gateway = AggregationGateway::new(Arc::new(store.clone()), Arc::new(self.client()));
        (gateway, store)
    }
}

impl FakeState {
    async fn gate(&self) -> Result<(), Response> {
        let mode = *self.mode.lock().unwrap();
        match mode {
            Mode::Normal => Ok(()),
            Mode::Down => Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "database offline" })),
            )
                .into_response()),
            Mode::Garbage => Err((StatusCode::OK, "<html>maintenance</html>").into_response()),
            Mode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn bearer(&self, headers: &HeaderMap) -> Result<CallerContext, Response> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| verify_token(token, JWT_SECRET).ok())
            .ok_or_else(|| message(StatusCode::UNAUTHORIZED, "Invalid token"))
    }
}

fn message(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "message": msg }))).into_response()
}

type Shared = State<Arc<FakeState>>;

async fn list_users(State(s): Shared) -> Response {
    if let Err(r) = s.gate().await {
        return r;
    }
    let users: Vec<Value> = s.users.lock().unwrap().values().cloned().collect();
    Json(users).into_response()
}

async fn get_user(State(s): Shared, Path(id): Path<String>) -> Response {
    if let Err(r) = s.gate().await {
        return r;
    }
    s.lookups.fetch_add(1, Ordering::SeqCst);
    let found = s.users.lock().unwrap().get(&id).cloned();
    match found {
        Some(user) => Json(user).into_response(),
        None => message(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn create_user(State(s): Shared, Json(body): Json<Value>) -> Response {
    if let Err(r) = s.gate().await {
        return r;
    }
    let Some(user_name) = body.get("user_name").and_then(Value::as_str) else {
        return message(StatusCode::BAD_REQUEST, "user_name is required");
    };
    let mut users = s.users.lock().unwrap();
    if users.values().any(|u| u["user_name"] == user_name) {
        return message(StatusCode::CONFLICT, "user_name already taken");
    }
    let id = format!("{:024x}", s.next_id.fetch_add(1, Ordering::SeqCst));
    let user = json!({
        "_id": id,
        "user_name": user_name,
        "email": body.get("email").cloned().unwrap_or(Value::Null),
        "role": "user",
    });
    users.insert(id, user.clone());
    (
        StatusCode::CREATED,
        Json(json!({ "message": "User created", "user": user })),
    )
        .into_response()
}

async fn update_user(State(s): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = s.gate().await {
        return r;
    }
    let caller = match s.bearer(&headers) {
        Ok(caller) => caller,
        Err(r) => return r,
    };
    let mut users = s.users.lock().unwrap();
    let Some(user) = users.get_mut(&caller.id) else {
        return message(StatusCode::NOT_FOUND, "User not found");
    };
    for field in ["user_name", "email"] {
        if let Some(value) = body.get(field) {
            user[field] = value.clone();
        }
    }
    Json(json!({ "message": "User updated", "user": user.clone() })).into_response()
}

async fn delete_user(State(s): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(r) = s.gate().await {
        return r;
    }
    let caller = match s.bearer(&headers) {
        Ok(caller) => caller,
        Err(r) => return r,
    };
    if caller.id != id && !caller.is_admin() {
        return message(StatusCode::FORBIDDEN, "Not allowed");
    }
    match s.users.lock().unwrap().remove(&id) {
        Some(user) => Json(json!({ "message": "User deleted", "user": user })).into_response(),
        None => message(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn login(State(s): Shared, Json(body): Json<Value>) -> Response {
    if let Err(r) = s.gate().await {
        return r;
    }
    let username = body.get("username").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    let user = s
        .users
        .lock()
        .unwrap()
        .values()
        .find(|u| u["user_name"] == username)
        .cloned();
    match user {
        Some(user) if password == PASSWORD => {
            let id = user["_id"].as_str().unwrap_or_default();
            let role: Role = serde_json::from_value(user["role"].clone()).unwrap_or(Role::User);
            Json(json!({ "token": mint_token(id, role), "user": user })).into_response()
        }
        _ => message(StatusCode::UNAUTHORIZED, "Invalid username or password"),
    }
}
