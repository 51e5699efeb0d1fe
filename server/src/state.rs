use std::sync::{Arc, Mutex};

use iss_core::error::AppError;
use iss_core::estimate::RootCauseHints;
use rusqlite::Connection;

use crate::config::ServerConfig;

/// Shared handler state: the store handle plus immutable configuration.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    pub config: Arc<ServerConfig>,
    pub hints: Arc<RootCauseHints>,
}

impl AppState {
    pub fn new(conn: Connection, config: ServerConfig) -> Self {
        let hints = config.root_cause_hints();
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            hints: Arc::new(hints),
        }
    }

    /// Run store work on the blocking pool while holding the connection lock.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|e| {
                AppError::new("DB_LOCK_POISONED", "Store lock is poisoned")
                    .with_details(e.to_string())
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            AppError::new("DB_TASK_FAILED", "Store task did not complete")
                .with_details(e.to_string())
        })?
    }
}
