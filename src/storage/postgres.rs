use crate::models::{NewVisit, Visit, VisitRow};
use crate::storage::trait_def::validate;
use crate::storage::{Storage, StorageResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGSERIAL PRIMARY KEY,
                ip TEXT NOT NULL,
                country TEXT NOT NULL DEFAULT 'Unknown',
                region TEXT NOT NULL DEFAULT 'Unknown',
                city TEXT NOT NULL DEFAULT 'Unknown',
                browser TEXT NOT NULL DEFAULT 'Unknown',
                os TEXT NOT NULL DEFAULT 'Unknown',
                device TEXT NOT NULL DEFAULT 'Unknown Device',
                timestamp BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_timestamp ON visits(timestamp DESC)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert(&self, visit: &NewVisit) -> StorageResult<Visit> {
        validate(visit)?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO visits (ip, country, region, city, browser, os, device, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&visit.ip)
        .bind(&visit.location.country)
        .bind(&visit.location.region)
        .bind(&visit.location.city)
        .bind(&visit.browser)
        .bind(&visit.os)
        .bind(&visit.device)
        .bind(visit.timestamp.timestamp_micros())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(Visit::stored(id, visit))
    }

    async fn list_all(&self) -> StorageResult<Vec<Visit>> {
        let rows = sqlx::query_as::<_, VisitRow>(
            r#"
            SELECT id, ip, country, region, city, browser, os, device, timestamp
            FROM visits
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        let visits = rows
            .into_iter()
            .map(Visit::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(visits)
    }

    async fn list(&self, limit: i64, offset: i64) -> StorageResult<Vec<Visit>> {
        let rows = sqlx::query_as::<_, VisitRow>(
            r#"
            SELECT id, ip, country, region, city, browser, os, device, timestamp
            FROM visits
            ORDER BY timestamp DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        let visits = rows
            .into_iter()
            .map(Visit::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(visits)
    }

    async fn count(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
