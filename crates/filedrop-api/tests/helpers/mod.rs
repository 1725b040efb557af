//! Test helpers: build the router against a temporary local storage directory.
//!
//! Run from workspace root: `cargo test -p filedrop-api`.

pub mod fixtures;

use axum_test::TestServer;
use filedrop_api::auth::ApiKeyAuthorizer;
use filedrop_api::constants;
use filedrop_api::setup::routes;
use filedrop_api::AppState;
use filedrop_core::Config;
use filedrop_storage::create_storage;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Key accepted by apps built with [`setup_test_app_with_keys`].
pub const TEST_API_KEY: &str = "test-api-key-0123456789abcdef";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server plus the storage directory it writes into.
pub struct TestApp {
    pub server: TestServer,
    pub storage_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn stored(&self, key: &str) -> std::path::PathBuf {
        self.storage_dir.path().join(key)
    }
}

/// Open app (no API keys) with local storage.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

/// App that requires `Authorization: Bearer TEST_API_KEY`.
pub async fn setup_test_app_with_keys() -> TestApp {
    setup_test_app_with(&[("API_KEYS", TEST_API_KEY)]).await
}

pub async fn setup_test_app_with(vars: &[(&str, &str)]) -> TestApp {
    let storage_dir = tempfile::tempdir().expect("Failed to create temp directory");

    let mut env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    env.insert(
        "LOCAL_STORAGE_PATH".to_string(),
        storage_dir.path().to_string_lossy().to_string(),
    );
    env.insert(
        "LOCAL_STORAGE_BASE_URL".to_string(),
        "http://localhost:3000/files".to_string(),
    );

    let config = Config::from_source(|key| env.get(key).cloned()).expect("Invalid test config");
    config.validate().expect("Invalid test config");

    let storage = create_storage(&config)
        .await
        .expect("Failed to create local storage");
    let authorizer = Arc::new(ApiKeyAuthorizer::new(config.api_keys().to_vec()));
    let state = Arc::new(AppState::new(config.clone(), storage, authorizer));

    let router = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        storage_dir,
    }
}
