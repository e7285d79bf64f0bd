#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const PASSWORD: &str = "secret123";

/// Sign a token the way the API does: HS256 with `sub` and `exp`
pub fn mint(sub: &str, exp: i64) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": exp }),
        &EncodingKey::from_secret(b"fixture-secret"),
    )
    .expect("Failed to sign fixture token")
}

pub fn mint_valid(sub: &str) -> String {
    mint(sub, Utc::now().timestamp() + 1800)
}

struct Account {
    name: String,
    email: String,
    password: String,
}

/// In-process stand-in for the FARM Starter API
#[derive(Default)]
pub struct FakeApi {
    accounts: Mutex<Vec<Account>>,
    signed_out: Mutex<Vec<String>>,
    pub fail_sign_out: AtomicBool,
    pub garbage_users: AtomicBool,
}

impl FakeApi {
    pub fn with_account(name: &str, email: &str) -> Arc<Self> {
        let api = Self::default();
        api.accounts.lock().unwrap().push(Account {
            name: name.to_string(),
            email: email.to_string(),
            password: PASSWORD.to_string(),
        });
        Arc::new(api)
    }

    /// Bearer values received by the sign-out endpoint, in order
    pub fn signed_out(&self) -> Vec<String> {
        self.signed_out.lock().unwrap().clone()
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn register(State(api): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    let field = |name: &str| body[name].as_str().unwrap_or_default().to_string();
    let mut accounts = api.accounts.lock().unwrap();
    if accounts.iter().any(|a| a.email == field("email")) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    accounts.push(Account {
        name: field("name"),
        email: field("email"),
        password: field("password"),
    });
    (StatusCode::CREATED, Json(json!({ "id": accounts.len().to_string() }))).into_response()
}

async fn signin(State(api): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let accounts = api.accounts.lock().unwrap();
    match accounts.iter().find(|a| a.email == email && a.password == password) {
        Some(account) => Json(json!({
            "access_token": mint_valid(&account.email),
            "token_type": "bearer",
        }))
        .into_response(),
        None => detail(StatusCode::BAD_REQUEST, "Invalid email or password"),
    }
}

async fn signout(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if api.fail_sign_out.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }
    let Some(token) = bearer(&headers) else {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    };
    api.signed_out.lock().unwrap().push(token);
    Json(json!({ "message": "Signed out successfully" })).into_response()
}

async fn list_users(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    if api.garbage_users.load(Ordering::SeqCst) {
        return Json(json!({ "unexpected": true })).into_response();
    }
    let accounts = api.accounts.lock().unwrap();
    let users: Vec<Value> = accounts
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "email": a.email,
                "created": "2025-03-14T09:26:53.589",
                "updated": "2025-03-14T09:26:53.589",
            })
        })
        .collect();
    Json(users).into_response()
}

async fn get_user(
    State(api): State<Arc<FakeApi>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if bearer(&headers).is_none() {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    let accounts = api.accounts.lock().unwrap();
    let index = id.parse::<usize>().ok().and_then(|i| i.checked_sub(1));
    match index.and_then(|i| accounts.get(i)) {
        Some(a) => Json(json!({
            "name": a.name,
            "email": a.email,
            "created": "2025-03-14T09:26:53Z",
            "updated": "2025-03-14T09:26:53Z",
        }))
        .into_response(),
        None => detail(StatusCode::NOT_FOUND, "User not found"),
    }
}

/// Serve the fake API on an ephemeral port and return its base URL
pub async fn spawn(api: Arc<FakeApi>) -> String {
    let app = Router::new()
        .route("/api/users", post(register).get(list_users))
        .route("/api/users/{id}", get(get_user))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", post(signout))
        .with_state(api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL nothing is listening on
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
