use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::RwLock;
use tracing::info;

use super::postgres::PgCollection;
use super::{Collection, DocumentStore, StoreError};

/// PostgreSQL-backed document store.
///
/// Each logical database maps to a PostgreSQL database of the same name,
/// reached by swapping the path of the configured URL. Pools are created
/// lazily and cached; missing databases are created on first use.
#[derive(Clone)]
pub struct PgStore {
    base_url: url::Url,
    max_connections: u32,
    connection_timeout: Duration,
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
    collections: Arc<StdRwLock<HashMap<(String, String), Arc<PgCollection>>>>,
}

impl PgStore {
    pub fn new(database_url: &str, max_connections: u32, connection_timeout: Duration) -> Result<Self, StoreError> {
        let base_url = url::Url::parse(database_url).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        Ok(Self {
            base_url,
            max_connections,
            connection_timeout,
            pools: Arc::new(RwLock::new(HashMap::new())),
            collections: Arc::new(StdRwLock::new(HashMap::new())),
        })
    }

    /// Get existing pool or create a new one lazily
    pub async fn pool(&self, database_name: &str) -> Result<PgPool, StoreError> {
        if !Self::is_valid_db_name(database_name) {
            return Err(StoreError::InvalidName(database_name.to_string()));
        }

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(database_name) {
                return Ok(pool.clone());
            }
        }

        self.ensure_database(database_name).await?;
        let pool = self.connect(&self.build_connection_string(database_name)).await?;

        let mut pools = self.pools.write().await;
        let pool = pools.entry(database_name.to_string()).or_insert(pool).clone();
        info!("Created database pool for: {}", database_name);
        Ok(pool)
    }

    /// Pool on the database named by the configured URL itself
    async fn admin_pool(&self) -> Result<PgPool, StoreError> {
        let key = format!("admin:{}", self.base_url.path());
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(&key) {
                return Ok(pool.clone());
            }
        }
        let pool = self.connect(self.base_url.as_str()).await?;
        let mut pools = self.pools.write().await;
        Ok(pools.entry(key).or_insert(pool).clone())
    }

    async fn connect(&self, connection_string: &str) -> Result<PgPool, StoreError> {
        Ok(PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connection_timeout)
            .connect(connection_string)
            .await?)
    }

    async fn ensure_database(&self, database_name: &str) -> Result<(), StoreError> {
        let admin = self.admin_pool().await?;
        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(database_name)
            .fetch_optional(&admin)
            .await?;
        if exists.is_some() {
            return Ok(());
        }

        let query = format!("CREATE DATABASE {}", quote_identifier(database_name));
        match sqlx::query(&query).execute(&admin).await {
            Ok(_) => {
                info!("Created database {}", database_name);
                Ok(())
            }
            // another process created it concurrently
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42P04") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn build_connection_string(&self, database_name: &str) -> String {
        let mut url = self.base_url.clone();
        // Replace the path to the database name (ensure leading slash)
        url.set_path(&format!("/{}", database_name));
        url.into()
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }

    /// Same character rules as resource locations: a letter, then letters,
    /// digits, `_` or `-`.
    pub fn is_valid_db_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') && name.len() > 1
            }
            _ => false,
        }
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl DocumentStore for PgStore {
    fn collection(&self, database: &str, name: &str) -> Arc<dyn Collection> {
        let key = (database.to_string(), name.to_string());
        {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(collection) = collections.get(&key) {
                return collection.clone();
            }
        }
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(key)
            .or_insert_with(|| Arc::new(PgCollection::new(self.clone(), database, name)))
            .clone()
    }

    /// Pings the admin pool to ensure connectivity
    async fn ping(&self) -> Result<(), StoreError> {
        let pool = self.admin_pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }
}
