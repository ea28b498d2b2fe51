#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use volunteer_admin_api::auth::{generate_jwt, Claims};
use volunteer_admin_api::database::{AuditLog, MemoryTables};

pub const ADMIN_PREFIX: &str = "/api/admin";

/// Fresh in-memory app; every call starts with empty tables.
pub fn app() -> Router {
    volunteer_admin_api::app(&MemoryTables, &AuditLog::Tracing, None)
}

pub fn token(privileges: &[&str]) -> String {
    let claims = Claims::new(1, "Admin".to_string(), privileges.iter().map(|p| p.to_string()).collect());
    generate_jwt(claims).expect("token")
}

pub fn root_token() -> String {
    token(&["root"])
}

pub struct Client {
    app: Router,
    token: Option<String>,
}

impl Client {
    pub fn new(app: Router, token: Option<String>) -> Self {
        Self { app, token }
    }

    pub fn root() -> Self {
        Self::new(app(), Some(root_token()))
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }

    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(format!("{}{}", ADMIN_PREFIX, path));
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }
}

pub fn ids(body: &Value) -> Vec<i64> {
    body["rows"]
        .as_array()
        .expect("rows array")
        .iter()
        .map(|row| row["id"].as_i64().expect("row id"))
        .collect()
}
