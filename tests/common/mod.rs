use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use sha2::Sha256;
use storefront_api::{
    config::AppConfig,
    db,
    entities::product,
    errors::ServiceError,
    events::{self, EventSender},
    notifications::LogConfirmationSender,
    payments::{IntentMetadata, PaymentGateway, PaymentIntent},
    sessions::InMemorySessionStore,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// Payment gateway double: returns deterministic intents and records the
/// metadata attached to them.
pub struct MockGateway {
    pub intents: Mutex<Vec<PaymentIntent>>,
    pub metadata: Mutex<HashMap<String, (String, bool, String)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            intents: Mutex::new(Vec::new()),
            metadata: Mutex::new(HashMap::new()),
        }
    }

    pub fn metadata_for(&self, intent_id: &str) -> Option<(String, bool, String)> {
        self.metadata.lock().unwrap().get(intent_id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        _amount_minor: i64,
        _currency: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let pid = format!("pi_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: pid.clone(),
            client_secret: format!("{}_secret_test", pid),
        };
        self.intents.lock().unwrap().push(intent.clone());
        Ok(intent)
    }

    async fn update_intent_metadata(
        &self,
        intent_id: &str,
        metadata: &IntentMetadata,
    ) -> Result<(), ServiceError> {
        self.metadata.lock().unwrap().insert(
            intent_id.to_string(),
            (
                metadata.bag.clone(),
                metadata.save_info,
                metadata.username.clone(),
            ),
        );
        Ok(())
    }
}

/// Test harness: application state over a throwaway SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    db_file: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_file = format!("storefront_test_{}.db", Uuid::new_v4().simple());
        let _ = std::fs::remove_file(&db_file);

        let mut cfg = AppConfig::new(
            format!("sqlite://{db_file}?mode=rwc"),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.stripe_webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(MockGateway::new());
        let sessions = Arc::new(InMemorySessionStore::new());

        let state = storefront_api::build_state(
            db_arc,
            cfg,
            sessions,
            gateway.clone(),
            Arc::new(LogConfirmationSender),
            event_sender,
            // Keep the bounded poll but drop the pause so webhook tests run
            // instantly.
            Some((3, Duration::ZERO)),
        );

        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            gateway,
            db_file,
            _event_task: event_task,
        }
    }

    /// Sends a request, optionally with a JSON body and session header.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        session: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            builder = builder.header("x-session-id", session);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Delivers a signed webhook payload.
    pub async fn deliver_webhook(&self, payload: &Value) -> axum::response::Response {
        let body = serde_json::to_vec(payload).expect("serialize webhook payload");
        let header = sign_webhook(TEST_WEBHOOK_SECRET, Utc::now().timestamp(), &body);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/checkout/webhook")
            .header("content-type", "application/json")
            .header("stripe-signature", header)
            .body(Body::from(body))
            .expect("build webhook request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook delivery")
    }

    pub async fn seed_product(&self, sku: &str, price: Decimal, has_sizes: bool) -> product::Model {
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(format!("Test Product {}", sku)),
            description: Set(Some("Seeded for integration tests".to_string())),
            price: Set(price),
            has_sizes: Set(has_sizes),
            image_url: Set(None),
            rating: Set(None),
            created_at: Set(Utc::now()),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Builds a `t=...,v1=...` signature header for a webhook body.
pub fn sign_webhook(secret: &str, timestamp: i64, body: &[u8]) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(body);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Reads a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    }
}

/// Asserts the status and returns the parsed body.
pub async fn expect_status(response: axum::response::Response, status: StatusCode) -> Value {
    let actual = response.status();
    let body = body_json(response).await;
    assert_eq!(actual, status, "unexpected status, body: {}", body);
    body
}
