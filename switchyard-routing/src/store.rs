//! Analytical-store client.
//!
//! Defines the narrow store surface routing needs: a one-round-trip
//! presence check across both physical tables, and idempotent span
//! upserts keyed by `(project_id, call_id)`. The Postgres implementation
//! pools connections with deadpool; the in-memory implementation backs
//! tests and single-process use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde::{Deserialize, Serialize};
use switchyard_core::{
    ProjectId, StoreError, TablePresence, Timestamp, CALLS_COMPLETE_TABLE, CALLS_MERGED_TABLE,
};
use tokio_postgres::NoTls;

/// One span write, as produced upstream by the call-lifecycle layer.
///
/// A logical call may arrive as two sparse records (a start write and an
/// end write); the store coalesces them under the `(project_id, call_id)`
/// key, which is what makes retried writes safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub project_id: ProjectId,
    pub call_id: String,
    pub op_name: String,
    pub trace_id: String,
    /// `None` marks a trace root.
    pub parent_id: Option<String>,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub latency_ms: Option<i64>,
    pub error: Option<String>,
}

/// Async store client surface consumed by the resolver and the writer.
#[async_trait]
pub trait AnalyticalStore: Send + Sync {
    /// Check row existence in both physical tables in one round trip.
    async fn table_presence(&self, project_id: &str) -> Result<TablePresence, StoreError>;

    /// Idempotently upsert a span into the named call table.
    ///
    /// Only the two known call tables are valid targets.
    async fn upsert_span(&self, table: &str, span: &SpanRecord) -> Result<(), StoreError>;
}

fn validate_call_table(table: &str) -> Result<(), StoreError> {
    if table == CALLS_MERGED_TABLE || table == CALLS_COMPLETE_TABLE {
        Ok(())
    } else {
        Err(StoreError::QueryFailed {
            reason: format!("unknown call table: {table}"),
        })
    }
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// Connection configuration for the Postgres-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "switchyard".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Create a store configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SWITCHYARD_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SWITCHYARD_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("SWITCHYARD_DB_NAME")
                .unwrap_or_else(|_| "switchyard".to_string()),
            user: std::env::var("SWITCHYARD_DB_USER")
                .unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("SWITCHYARD_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SWITCHYARD_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("SWITCHYARD_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> Result<Pool, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool {
                reason: format!("failed to create pool: {e}"),
            })
    }
}

/// Postgres-backed analytical store client.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size, for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AnalyticalStore for PgStore {
    async fn table_presence(&self, project_id: &str) -> Result<TablePresence, StoreError> {
        let conn = self.get_conn().await?;

        // Both existence checks in a single statement so ground truth
        // costs exactly one round trip.
        let row = conn
            .query_one(
                "SELECT \
                   EXISTS(SELECT 1 FROM calls_merged WHERE project_id = $1) AS in_merged, \
                   EXISTS(SELECT 1 FROM calls_complete WHERE project_id = $1) AS in_complete",
                &[&project_id],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;

        Ok(TablePresence {
            in_merged: row.try_get("in_merged").map_err(|e| StoreError::RowShape {
                reason: e.to_string(),
            })?,
            in_complete: row
                .try_get("in_complete")
                .map_err(|e| StoreError::RowShape {
                    reason: e.to_string(),
                })?,
        })
    }

    async fn upsert_span(&self, table: &str, span: &SpanRecord) -> Result<(), StoreError> {
        validate_call_table(table)?;
        let conn = self.get_conn().await?;

        // Table names come from the closed constant set, never from
        // caller input; only values are parameterized.
        let sql = format!(
            "INSERT INTO {table} \
               (project_id, call_id, op_name, trace_id, parent_id, \
                started_at, ended_at, latency_ms, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (project_id, call_id) DO UPDATE SET \
               ended_at = COALESCE({table}.ended_at, EXCLUDED.ended_at), \
               latency_ms = COALESCE({table}.latency_ms, EXCLUDED.latency_ms), \
               error = COALESCE({table}.error, EXCLUDED.error)"
        );

        conn.execute(
            sql.as_str(),
            &[
                &span.project_id,
                &span.call_id,
                &span.op_name,
                &span.trace_id,
                &span.parent_id,
                &span.started_at,
                &span.ended_at,
                &span.latency_ms,
                &span.error,
            ],
        )
        .await
        .map_err(|e| StoreError::QueryFailed {
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory [`AnalyticalStore`] for tests and single-process use.
///
/// Tracks how many presence round trips were issued and supports
/// per-table write-fault injection so dual-write failure paths are
/// testable.
#[derive(Default)]
pub struct MemoryStore {
    // (table, project_id) -> call_id -> span
    rows: Mutex<HashMap<(String, String), HashMap<String, SpanRecord>>>,
    presence_queries: AtomicUsize,
    fail_writes_to: Mutex<Option<String>>,
}

fn guard<T>(lock: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    lock.lock().map_err(|_| StoreError::LockPoisoned)
}

// Test-support accessors recover the data behind a poisoned lock rather
// than propagate a panic from whichever thread poisoned it.
fn guard_recovering<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ground-truth presence round trips issued so far.
    pub fn presence_queries(&self) -> usize {
        self.presence_queries.load(Ordering::SeqCst)
    }

    /// Inject a write failure for one table, or clear with `None`.
    pub fn fail_writes_to(&self, table: Option<&str>) {
        *guard_recovering(&self.fail_writes_to) = table.map(str::to_string);
    }

    /// Row count for a project in one table.
    pub fn row_count(&self, table: &str, project_id: &str) -> usize {
        guard_recovering(&self.rows)
            .get(&(table.to_string(), project_id.to_string()))
            .map(|calls| calls.len())
            .unwrap_or(0)
    }

    /// Fetch one stored span, mainly for asserting coalesced upserts.
    pub fn get_span(&self, table: &str, project_id: &str, call_id: &str) -> Option<SpanRecord> {
        guard_recovering(&self.rows)
            .get(&(table.to_string(), project_id.to_string()))
            .and_then(|calls| calls.get(call_id).cloned())
    }
}

#[async_trait]
impl AnalyticalStore for MemoryStore {
    async fn table_presence(&self, project_id: &str) -> Result<TablePresence, StoreError> {
        self.presence_queries.fetch_add(1, Ordering::SeqCst);
        let rows = guard(&self.rows)?;
        let has = |table: &str| {
            rows.get(&(table.to_string(), project_id.to_string()))
                .is_some_and(|calls| !calls.is_empty())
        };
        Ok(TablePresence {
            in_merged: has(CALLS_MERGED_TABLE),
            in_complete: has(CALLS_COMPLETE_TABLE),
        })
    }

    async fn upsert_span(&self, table: &str, span: &SpanRecord) -> Result<(), StoreError> {
        validate_call_table(table)?;
        if guard(&self.fail_writes_to)?
            .as_deref()
            .is_some_and(|failing| failing == table)
        {
            return Err(StoreError::QueryFailed {
                reason: format!("injected write failure for {table}"),
            });
        }

        let mut rows = guard(&self.rows)?;
        let calls = rows
            .entry((table.to_string(), span.project_id.clone()))
            .or_default();
        match calls.get_mut(&span.call_id) {
            Some(existing) => {
                // Same coalescing rule as the Postgres upsert: first
                // non-null wins for the end-write fields.
                if existing.ended_at.is_none() {
                    existing.ended_at = span.ended_at;
                }
                if existing.latency_ms.is_none() {
                    existing.latency_ms = span.latency_ms;
                }
                if existing.error.is_none() {
                    existing.error = span.error.clone();
                }
            }
            None => {
                calls.insert(span.call_id.clone(), span.clone());
            }
        }
        Ok(())
    }
}
