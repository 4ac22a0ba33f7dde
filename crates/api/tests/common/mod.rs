#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use meterdeck_api::auth::cookies::SESSION_COOKIE;
use meterdeck_api::auth::password::hash_password;
use meterdeck_api::config::ServerConfig;
use meterdeck_api::router::build_app_router;
use meterdeck_api::state::AppState;
use meterdeck_api::usage::SnapshotUsageProvider;
use meterdeck_core::csrf::{CSRF_COOKIE, CSRF_HEADER};
use meterdeck_core::roles::Role;
use meterdeck_db::models::user::{CreateUser, User};
use meterdeck_db::{CredentialStore, MemoryCredentialStore};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-value";
pub const LEGACY_PASSWORD: &str = "legacy-dashboard-password";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const VIEWER_EMAIL: &str = "viewer@example.com";
pub const ACCOUNT_PASSWORD: &str = "account-password-123";

/// A router plus direct handles on the state behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
}

/// Build a `ServerConfig` from a handful of env-style overrides.
pub fn test_config(vars: &[(&str, &str)]) -> ServerConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ServerConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config must be valid")
}

pub fn build_test_app(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryCredentialStore::new());
    let usage = Arc::new(SnapshotUsageProvider::new(json!({
        "totals": { "requests": 42, "costUsd": 1.5 },
        "daily": [],
        "byModel": [],
        "byApiKey": [],
    })));
    let state = AppState::new(config, store.clone(), usage);
    let router = build_app_router(state.clone()).expect("router must build");
    TestApp {
        router,
        state,
        store,
    }
}

/// Legacy mode with a secret and a dashboard password.
pub fn legacy_app() -> TestApp {
    build_test_app(test_config(&[
        ("AUTH_SECRET", SECRET),
        ("DASHBOARD_PASSWORD", LEGACY_PASSWORD),
    ]))
}

/// Accounts mode backed by the in-memory store.
pub fn accounts_app() -> TestApp {
    build_test_app(test_config(&[
        ("AUTH_SECRET", SECRET),
        ("AUTH_MODE", "accounts"),
        ("DATABASE_URL", "postgres://unused/meterdeck"),
    ]))
}

/// No signing secret at all.
pub fn unconfigured_app() -> TestApp {
    build_test_app(test_config(&[("DASHBOARD_PASSWORD", LEGACY_PASSWORD)]))
}

pub async fn seed_user(app: &TestApp, email: &str, role: Role) -> User {
    app.store
        .create_user(&CreateUser {
            email: email.to_string(),
            password_hash: Some(hash_password(ACCOUNT_PASSWORD).expect("hashing must succeed")),
            name: "Seeded".to_string(),
            role,
        })
        .await
        .expect("seeding must succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Cookies and headers a browser would attach.
#[derive(Debug, Default, Clone)]
pub struct Creds {
    pub csrf: Option<String>,
    pub session: Option<String>,
}

impl Creds {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: &str) -> Self {
        self.session = Some(session.to_string());
        self
    }

    fn apply(&self, mut builder: axum::http::request::Builder) -> axum::http::request::Builder {
        let mut cookies = Vec::new();
        if let Some(csrf) = &self.csrf {
            cookies.push(format!("{CSRF_COOKIE}={csrf}"));
            builder = builder.header(CSRF_HEADER, csrf);
        }
        if let Some(session) = &self.session {
            cookies.push(format!("{SESSION_COOKIE}={session}"));
        }
        if !cookies.is_empty() {
            builder = builder.header(COOKIE, cookies.join("; "));
        }
        builder
    }
}

pub fn get_request(uri: &str, creds: &Creds) -> Request<Body> {
    creds
        .apply(Request::builder().method(Method::GET).uri(uri))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value, creds: &Creds) -> Request<Body> {
    creds
        .apply(Request::builder().method(method).uri(uri))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str, creds: &Creds) -> Response<Body> {
    send(app, get_request(uri, creds)).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value, creds: &Creds) -> Response<Body> {
    send(app, json_request(Method::POST, uri, &body, creds)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of the `name` cookie set by `response`, if any.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.to_string())
        })
}

/// Full `Set-Cookie` line for `name`, attributes included.
pub fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|cookie| cookie.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Fetch a CSRF token the way the frontend does.
pub async fn csrf_creds(app: &TestApp) -> Creds {
    let response = get(app, "/api/v1/csrf", &Creds::none()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie_value(&response, CSRF_COOKIE).expect("csrf cookie must be set");
    let json = body_json(response).await;
    assert_eq!(json["token"], cookie.as_str());
    Creds {
        csrf: Some(cookie),
        session: None,
    }
}

/// Log in and return credentials carrying both the CSRF token and session.
pub async fn login(app: &TestApp, body: Value) -> Creds {
    let mut creds = csrf_creds(app).await;
    let response = post_json(app, "/api/v1/login", body, &creds).await;
    assert_eq!(response.status(), StatusCode::OK, "login must succeed");
    creds.session =
        Some(set_cookie_value(&response, SESSION_COOKIE).expect("session cookie must be set"));
    creds
}

pub async fn login_legacy(app: &TestApp) -> Creds {
    login(app, json!({ "password": LEGACY_PASSWORD })).await
}

pub async fn login_account(app: &TestApp, email: &str) -> Creds {
    login(app, json!({ "email": email, "password": ACCOUNT_PASSWORD })).await
}
