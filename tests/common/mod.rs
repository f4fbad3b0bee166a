#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use tourbook_api::config::AppConfig;
use tourbook_api::database::{DocumentStore, MemoryStore};
use tourbook_api::services::{Email, Mailer, MailerError};
use tourbook_api::{app, AppState};

/// Captures outgoing mail; can be switched to fail delivery
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl Outbox {
    pub fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<Email> {
        self.sent.lock().ok()?.last().cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, email: Email) -> Result<(), MailerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailerError::Delivery("connection refused".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

/// One server per test, on its own port and in-memory store
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub outbox: Arc<Outbox>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AppConfig::testing()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let outbox = Arc::new(Outbox::default());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store, outbox.clone()).await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url,
            state,
            outbox,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, name: &str, email: &str) -> Result<Account> {
        let res = self
            .client
            .post(self.url("/api/v1/users/signup"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": "pass1234",
                "passwordConfirm": "pass1234"
            }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "signup failed: {}", res.status());

        let body = res.json::<Value>().await?;
        Ok(Account {
            id: body["data"]["user"]["id"].as_str().context("user id")?.to_string(),
            token: body["token"].as_str().context("token")?.to_string(),
        })
    }

    /// Signed-up account whose role is then set directly in the store
    pub async fn account_with_role(&self, email: &str, role: &str) -> Result<Account> {
        let account = self.signup("Staff Member", email).await?;
        self.set_user_fields(&account.id, json!({ "role": role })).await?;
        Ok(account)
    }

    pub async fn set_user_fields(&self, id: &str, fields: Value) -> Result<()> {
        let id = Uuid::parse_str(id)?;
        let set: Map<String, Value> = fields.as_object().cloned().context("fields must be an object")?;
        self.state
            .store
            .update_id("users", id, set, vec![])
            .await?
            .context("user not stored")?;
        Ok(())
    }

    pub async fn create_tour(&self, token: &str, name: &str, price: f64) -> Result<String> {
        let res = self
            .client
            .post(self.url("/api/v1/tours"))
            .bearer_auth(token)
            .json(&tour_body(name, price))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "tour create failed: {}", res.status());
        let body = res.json::<Value>().await?;
        Ok(body["data"]["document"]["id"].as_str().context("tour id")?.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub token: String,
}

pub fn tour_body(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 12,
        "difficulty": "medium",
        "price": price,
        "summary": "Breathtaking hike through the mountains"
    })
}

/// The first `Set-Cookie` header, if any
pub fn set_cookie(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
