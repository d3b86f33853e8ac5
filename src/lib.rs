pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod listing;
pub mod storage;
pub mod utils;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::storage::ObjectStorage;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            config,
            db,
            storage,
        }
    }
}
