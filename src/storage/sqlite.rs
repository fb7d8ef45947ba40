//! SQLite fleet store
//!
//! - **Embedded**: no separate database server required
//! - **WAL mode**: heartbeat writes do not block readers
//! - **Migrations**: schema versioned with `sqlx::migrate!`
//!
//! Every write is a single-row upsert, so no explicit transactions are
//! needed; the coordinator's per-generator writer lock already orders writes
//! for the same generator.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use crate::fleet::{Collector, Generator};

use super::backend::{FleetStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{CollectorRow, GeneratorRow};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    ///
    /// ```no_run
    /// # use collector_fleet::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./fleet.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref().to_string_lossy().to_string();

        info!("opening SQLite fleet store at: {db_path}");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self { pool, db_path })
    }
}

#[async_trait]
impl FleetStore for SqliteStore {
    #[instrument(skip(self, collector), fields(collector = %collector.name))]
    async fn upsert_collector(&self, collector: &Collector) -> StorageResult<()> {
        let row = CollectorRow::try_from(collector)?;

        sqlx::query(
            r#"
            INSERT INTO collectors (id, name, status, last_heartbeat, version, registered_at, deleted)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                status = excluded.status,
                last_heartbeat = excluded.last_heartbeat,
                version = excluded.version,
                deleted = excluded.deleted
            "#,
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(&row.status)
        .bind(row.last_heartbeat)
        .bind(&row.version)
        .bind(row.registered_at)
        .bind(row.deleted)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_collectors(&self) -> StorageResult<Vec<Collector>> {
        let rows: Vec<CollectorRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, last_heartbeat, version, registered_at, deleted
            FROM collectors
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("loaded {} collectors", rows.len());
        rows.into_iter().map(Collector::try_from).collect()
    }

    #[instrument(skip(self, generator), fields(generator = %generator.name))]
    async fn upsert_generator(&self, generator: &Generator) -> StorageResult<()> {
        let row = GeneratorRow::try_from(generator)?;

        sqlx::query(
            r#"
            INSERT INTO generators (name, is_active, possible_collectors, current_collector)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                is_active = excluded.is_active,
                possible_collectors = excluded.possible_collectors,
                current_collector = excluded.current_collector
            "#,
        )
        .bind(&row.name)
        .bind(row.is_active)
        .bind(&row.possible_collectors)
        .bind(&row.current_collector)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_current_collector(
        &self,
        generator: &str,
        collector: Option<&str>,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE generators SET current_collector = ? WHERE name = ?")
            .bind(collector)
            .bind(generator)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::QueryFailed(format!(
                "generator '{generator}' is not stored"
            )));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_generators(&self) -> StorageResult<Vec<Generator>> {
        let rows: Vec<GeneratorRow> = sqlx::query_as(
            r#"
            SELECT name, is_active, possible_collectors, current_collector
            FROM generators
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("loaded {} generators", rows.len());
        rows.into_iter().map(Generator::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite fleet store operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {e}");
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {e}"),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (collectors,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM collectors WHERE deleted = 0")
            .fetch_one(&self.pool)
            .await?;

        let (generators,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM generators")
            .fetch_one(&self.pool)
            .await?;

        let (unassigned,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM generators WHERE is_active = 1 AND current_collector IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let file_size_kb = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0) as f64
            / 1_000.0;

        Ok(format!(
            "SQLite: {collectors} collectors, {generators} generators ({unassigned} unassigned), {file_size_kb:.1} KB on disk"
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite fleet store");
        self.pool.close().await;
        Ok(())
    }
}
