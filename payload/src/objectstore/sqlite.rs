// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite-backed `ObjectStore`: the persistent dedup catalog.
//!
//! Grounded on the teacher's `infrastructure::repositories::schema` module
//! (create-database-if-missing + `SqlitePool`), but migrated with plain
//! runtime `CREATE TABLE IF NOT EXISTS` DDL and the `sqlx` runtime query
//! API rather than the `sqlx::migrate!`/`query!` compile-time macros, so
//! the catalog schema evolves without a live database connection at build
//! time.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::ObjectStore;
use dittofs_payload_domain::value_objects::BlockHash;

/// Persistent, SQLite-backed dedup catalog.
pub struct SqliteObjectStore {
    pool: SqlitePool,
}

impl SqliteObjectStore {
    /// Opens (creating if missing) the catalog database at `database_url`
    /// (e.g. `"sqlite://./payload_objects.db"`) and ensures its schema.
    pub async fn open(database_url: &str) -> PayloadResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PayloadError::internal(format!("invalid sqlite url {database_url}: {e}")))?
            .create_if_missing(true);

        // A single connection serializes refcount updates at the pool
        // level, which is sufficient for a small counter catalog and
        // avoids sqlite's per-connection ":memory:" database isolation
        // surprising callers that use an in-memory catalog for tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| PayloadError::internal(format!("failed to open object catalog: {e}")))?;

        Self::ensure_schema(&pool).await?;
        info!("object catalog ready at {}", database_url);
        Ok(Self { pool })
    }

    async fn ensure_schema(pool: &SqlitePool) -> PayloadResult<()> {
        debug!("ensuring object catalog schema");
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS block_objects (
                hash_hex TEXT PRIMARY KEY,
                refcount INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await
        .map_err(|e| PayloadError::internal(format!("schema migration failed: {e}")))?;
        Ok(())
    }
}

fn hash_hex(hash: &BlockHash) -> String {
    hex::encode(hash)
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn lookup(&self, hash: &BlockHash) -> PayloadResult<(bool, u64)> {
        let row = sqlx::query("SELECT refcount FROM block_objects WHERE hash_hex = ?")
            .bind(hash_hex(hash))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PayloadError::transient(format!("object catalog lookup failed: {e}")))?;

        match row {
            Some(row) => {
                let refcount: i64 = row.get("refcount");
                Ok((true, refcount as u64))
            }
            None => Ok((false, 0)),
        }
    }

    async fn incref(&self, hash: &BlockHash) -> PayloadResult<u64> {
        let row = sqlx::query("UPDATE block_objects SET refcount = refcount + 1 WHERE hash_hex = ? RETURNING refcount")
            .bind(hash_hex(hash))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PayloadError::transient(format!("object catalog incref failed: {e}")))?;

        match row {
            Some(row) => Ok(row.get::<i64, _>("refcount") as u64),
            None => Err(PayloadError::internal(format!("incref on unknown hash {}", hash_hex(hash)))),
        }
    }

    async fn insert(&self, hash: &BlockHash) -> PayloadResult<()> {
        // ON CONFLICT handles the race where two files complete a
        // lookup-miss for identical content concurrently: the second
        // insert becomes an incref instead of violating the primary key.
        sqlx::query(
            "INSERT INTO block_objects (hash_hex, refcount) VALUES (?, 1)
             ON CONFLICT(hash_hex) DO UPDATE SET refcount = refcount + 1",
        )
        .bind(hash_hex(hash))
        .execute(&self.pool)
        .await
        .map_err(|e| PayloadError::transient(format!("object catalog insert failed: {e}")))?;
        Ok(())
    }

    async fn decref(&self, hash: &BlockHash) -> PayloadResult<u64> {
        let row = sqlx::query(
            "UPDATE block_objects SET refcount = MAX(refcount - 1, 0) WHERE hash_hex = ? RETURNING refcount",
        )
        .bind(hash_hex(hash))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PayloadError::transient(format!("object catalog decref failed: {e}")))?;

        match row {
            Some(row) => Ok(row.get::<i64, _>("refcount") as u64),
            None => Err(PayloadError::internal(format!("decref on unknown hash {}", hash_hex(hash)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(byte: u8) -> BlockHash {
        [byte; 32]
    }

    #[tokio::test]
    async fn insert_then_lookup_round_trips() {
        let store = SqliteObjectStore::open("sqlite::memory:").await.unwrap();
        let h = hash_of(1);
        assert_eq!(store.lookup(&h).await.unwrap(), (false, 0));
        store.insert(&h).await.unwrap();
        assert_eq!(store.lookup(&h).await.unwrap(), (true, 1));
    }

    #[tokio::test]
    async fn incref_and_decref_track_refcount() {
        let store = SqliteObjectStore::open("sqlite::memory:").await.unwrap();
        let h = hash_of(2);
        store.insert(&h).await.unwrap();
        assert_eq!(store.incref(&h).await.unwrap(), 2);
        assert_eq!(store.decref(&h).await.unwrap(), 1);
        assert_eq!(store.decref(&h).await.unwrap(), 0);
        // decref never goes negative.
        assert_eq!(store.decref(&h).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_insert_of_same_hash_converges_to_refcount_two() {
        let store = SqliteObjectStore::open("sqlite::memory:").await.unwrap();
        let h = hash_of(3);
        store.insert(&h).await.unwrap();
        store.insert(&h).await.unwrap();
        assert_eq!(store.lookup(&h).await.unwrap(), (true, 2));
    }
}
