//! Shared test infrastructure.
//!
//! Integration tests need a live Postgres; they read TEST_DATABASE_URL (or
//! DATABASE_URL) and skip with a note when neither is set or the connection
//! fails. Schema convergence is serialized through a binary-wide mutex so
//! tests that mutate provisioning state do not race each other.

// each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::sync::OnceLock;

use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use recordstack::{ActorContext, DatabaseConfig, DatabaseManager};

pub fn schema_guard() -> &'static Mutex<()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| Mutex::new(()))
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connects and converges a test database, or `None` to skip the test.
pub async fn db() -> Option<PgPool> {
    init_tracing();
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;
    let manager = match DatabaseManager::connect(&DatabaseConfig::with_url(&url)).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("skipping: could not connect to test database: {e}");
            return None;
        }
    };
    {
        let _lock = schema_guard().lock().await;
        manager.converge().await.expect("schema convergence");
    }
    Some(manager.pool().clone())
}

/// Unique, identifier-safe prefix for scratch objects.
pub fn unique(base: &str) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!("zz{}_{base}", &tag[..8])
}

pub fn actor() -> ActorContext {
    ActorContext::new("integration_test").expect("test actor")
}
