//! The process-wide SurrealDB connection backing the database result store.

use std::sync::LazyLock;

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use tokio::sync::OnceCell;

use crate::DbError;

pub type Database = Surreal<Any>;

static DB: LazyLock<OnceCell<Database>> = LazyLock::new(OnceCell::new);

/// Where job statuses are kept when the database store is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Any SurrealDB endpoint: `mem://`, `rocksdb://path`, `ws://host:port`.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root user and password, needed by remote servers only.
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::endpoint("mem://")
    }
}

impl DbConfig {
    /// Statuses live only as long as the process.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: "transcriber".to_string(),
            database: "jobs".to_string(),
            credentials: None,
        }
    }

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self
        }
    }

    pub fn with_database(self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self
        }
    }

    pub fn with_credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some((username.into(), password.into())),
            ..self
        }
    }
}

/// Connect once; later calls get the first connection whatever config they pass.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    DB.get_or_try_init(|| async move {
        tracing::info!("Opening result database at {}", config.endpoint);
        let db = connect(config.endpoint.as_str()).await?;

        if let Some((username, password)) = &config.credentials {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }
        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        tracing::info!(
            namespace = %config.namespace,
            database = %config.database,
            "Result database ready"
        );
        Ok(db)
    })
    .await
}

/// The connection made by [`init_db`].
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}
