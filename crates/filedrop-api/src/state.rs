//! Application state shared by every handler.

use crate::auth::Authorizer;
use filedrop_core::Config;
use filedrop_ingest::IngestService;
use filedrop_storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub ingest: IngestService,
    pub authorizer: Arc<dyn Authorizer>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>, authorizer: Arc<dyn Authorizer>) -> Self {
        let ingest = IngestService::new(
            storage.clone(),
            filedrop_ingest::IngestOptions::from_config(&config),
        );
        Self {
            config,
            storage,
            ingest,
            authorizer,
        }
    }
}
