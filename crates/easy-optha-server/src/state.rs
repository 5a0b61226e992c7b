use std::sync::Arc;

use easy_optha_core::SharedDatabase;

use crate::{config::Config, error::ServerError};

#[derive(Clone)]
pub struct State {
    pub db: SharedDatabase,
    pub config: Arc<Config>,
}

impl State {
    /// Open the configured history database.
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let db = SharedDatabase::open(&config.database.path)?;
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: Config, db: SharedDatabase) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}
