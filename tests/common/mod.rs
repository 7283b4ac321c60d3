#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration as Span;
use serde_json::Value;
use tower::ServiceExt;

use docrest::auth::{AuthToken, Authenticator, Permissions};
use docrest::config::AppConfig;
use docrest::database::{Collection, DocumentStore, MemoryStore};
use docrest::dsl::Settings;
use docrest::formats::DateTime;
use docrest::samples;
use docrest::validation::Validator;
use docrest::Server;

pub const FULL_KEY: &str = samples::SAMPLE_API_KEY;
pub const READER_KEY: &str = "payments-reader";
pub const EXPIRED_KEY: &str = "expired-key";
pub const ADMIN_KEY: &str = "admin-key";

/// The sample resources assembled in-process over a memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn DocumentStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(samples::settings(), samples::validator()).await
    }

    pub async fn with_settings(settings: Settings, validator: Validator) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let config = AppConfig::from_lookup(|_| None);
        let auth = settings.auth.clone();
        let server = Server::assemble(settings, store.clone(), validator, &config)
            .await
            .expect("settings assemble");

        let authenticator = Authenticator::new(store.collection(&auth.database, &auth.collection));
        let yesterday = DateTime::from(DateTime::now().as_naive() - Span::days(1));
        for token in [
            samples::token(FULL_KEY),
            AuthToken::new(READER_KEY, Permissions::new().grant("payments", ["read"])),
            AuthToken::new(EXPIRED_KEY, Permissions::new().grant("*", ["*"])).valid_until(yesterday),
            AuthToken::new(ADMIN_KEY, Permissions::new().grant("*", ["*"])),
        ] {
            authenticator.register(&token).await.expect("token stored");
        }

        Self { router: server.router(), store }
    }

    pub fn collection(&self, database: &str, name: &str) -> Arc<dyn Collection> {
        self.store.collection(database, name)
    }

    pub async fn send(&self, method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(FULL_KEY), None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(FULL_KEY), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(FULL_KEY), Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(FULL_KEY), Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(FULL_KEY), None).await
    }
}

/// The built `docrest` binary on a free port, killed on drop.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_docrest"))
            .args(["--memory", "--port", &port.to_string()])
            .env_remove("DATABASE_URL")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
