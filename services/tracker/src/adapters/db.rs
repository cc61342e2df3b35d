//! services/tracker/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `TargetStore` and `PoolStore` ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.
//!
//! Every port operation is a single short transaction touching one row: the
//! target upgrade locks its row with `FOR UPDATE`, and pool increments are
//! relative `UPDATE`s evaluated by the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phishing_core::domain::{Pool, Status, StatusSet, Target};
use phishing_core::ids::generate_id;
use phishing_core::ports::{PoolStore, PortError, PortResult, TargetStore};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> PortError {
    PortError::Unavailable(e.to_string())
}

fn counter_delta(statuses: &StatusSet, status: Status) -> i64 {
    i64::from(statuses.contains(&status))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct TargetRecord {
    id: String,
    sent_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    clicked_at: Option<DateTime<Utc>>,
    phished_at: Option<DateTime<Utc>>,
}
impl TargetRecord {
    fn to_domain(self) -> Target {
        Target {
            id: self.id,
            sent_at: self.sent_at,
            opened_at: self.opened_at,
            clicked_at: self.clicked_at,
            phished_at: self.phished_at,
        }
    }
}

#[derive(FromRow)]
struct PoolRecord {
    id: String,
    group_name: String,
    template: String,
    sent_count: i64,
    opened_count: i64,
    clicked_count: i64,
    phished_count: i64,
}
impl PoolRecord {
    fn to_domain(self) -> Pool {
        Pool {
            id: self.id,
            group: self.group_name,
            template: self.template,
            sent_count: self.sent_count as u64,
            opened_count: self.opened_count as u64,
            clicked_count: self.clicked_count as u64,
            phished_count: self.phished_count as u64,
        }
    }
}

const TARGET_COLUMNS: &str = "id, sent_at, opened_at, clicked_at, phished_at";
const POOL_COLUMNS: &str =
    "id, group_name, template, sent_count, opened_count, clicked_count, phished_count";

//=========================================================================================
// `TargetStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TargetStore for PgStore {
    async fn create_target(&self) -> PortResult<Target> {
        let record = sqlx::query_as::<_, TargetRecord>(&format!(
            "INSERT INTO targets (id) VALUES ($1) RETURNING {TARGET_COLUMNS}"
        ))
        .bind(generate_id())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(record.to_domain())
    }

    async fn get_target(&self, target_id: &str) -> PortResult<Target> {
        let record = sqlx::query_as::<_, TargetRecord>(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE id = $1"
        ))
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| PortError::NotFound(format!("Target {} not found", target_id)))?;
        Ok(record.to_domain())
    }

    async fn upgrade(
        &self,
        target_id: &str,
        new_status: Status,
        at: DateTime<Utc>,
    ) -> PortResult<StatusSet> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        // The row lock serializes concurrent upgrades of this target only.
        let record = sqlx::query_as::<_, TargetRecord>(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE id = $1 FOR UPDATE"
        ))
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| PortError::NotFound(format!("Target {} not found", target_id)))?;

        let mut target = record.to_domain();
        let reached = target.upgrade(new_status, at);

        if !reached.is_empty() {
            sqlx::query(
                "UPDATE targets SET sent_at = $2, opened_at = $3, clicked_at = $4, phished_at = $5 WHERE id = $1",
            )
            .bind(target_id)
            .bind(target.sent_at)
            .bind(target.opened_at)
            .bind(target.clicked_at)
            .bind(target.phished_at)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;
        debug!(
            "Target {} asked for {}, reached {:?}, now at {:?}",
            target_id,
            new_status,
            reached,
            target.furthest()
        );
        Ok(reached)
    }

    async fn reset_targets(&self, target_ids: &[String]) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE targets SET sent_at = NULL, opened_at = NULL, clicked_at = NULL, phished_at = NULL WHERE id = ANY($1)",
        )
        .bind(target_ids)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

//=========================================================================================
// `PoolStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PoolStore for PgStore {
    async fn get_or_create(&self, group: &str, template: &str) -> PortResult<Pool> {
        // Losing a creation race is fine: the unique constraint keeps one row
        // and the SELECT below returns it to every caller.
        sqlx::query(
            "INSERT INTO pools (id, group_name, template) VALUES ($1, $2, $3) ON CONFLICT (group_name, template) DO NOTHING",
        )
        .bind(generate_id())
        .bind(group)
        .bind(template)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        let record = sqlx::query_as::<_, PoolRecord>(&format!(
            "SELECT {POOL_COLUMNS} FROM pools WHERE group_name = $1 AND template = $2"
        ))
        .bind(group)
        .bind(template)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Pool ({}, {}) not found", group, template))
            }
            _ => unavailable(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_pool(&self, pool_id: &str) -> PortResult<Pool> {
        let record = sqlx::query_as::<_, PoolRecord>(&format!(
            "SELECT {POOL_COLUMNS} FROM pools WHERE id = $1"
        ))
        .bind(pool_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| PortError::NotFound(format!("Pool {} not found", pool_id)))?;
        Ok(record.to_domain())
    }

    async fn increment_statuses(&self, pool_id: &str, statuses: &StatusSet) -> PortResult<()> {
        if statuses.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            "UPDATE pools SET \
                sent_count = sent_count + $2, \
                opened_count = opened_count + $3, \
                clicked_count = clicked_count + $4, \
                phished_count = phished_count + $5 \
             WHERE id = $1",
        )
        .bind(pool_id)
        .bind(counter_delta(statuses, Status::Sent))
        .bind(counter_delta(statuses, Status::Opened))
        .bind(counter_delta(statuses, Status::Clicked))
        .bind(counter_delta(statuses, Status::Phished))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Pool {} not found", pool_id)));
        }
        Ok(())
    }

    async fn reset_pools(&self, pool_ids: &[String]) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE pools SET sent_count = 0, opened_count = 0, clicked_count = 0, phished_count = 0 WHERE id = ANY($1)",
        )
        .bind(pool_ids)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}
