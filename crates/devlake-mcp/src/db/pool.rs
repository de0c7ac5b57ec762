//! Connection Manager: bounded pool, row-limit enforcement and reconnection

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use deadpool::Runtime;
use deadpool::managed::{
    self, Metrics, PoolError, RecycleError, RecycleResult, TimeoutType, Timeouts,
};
use serde::Serialize;

use super::ResultSet;
use super::connector::{Connector, DbConnection, DbError};
use crate::observability::AUDIT_TARGET;
use crate::security::{ExecuteError, QueryGuard, ValidatedQuery};
use crate::{Error, Result};

const RECYCLE_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub type Pool = managed::Pool<ConnectionFactory>;
type PooledConnection = managed::Object<ConnectionFactory>;

/// Reconnect schedule for transient failures: exponential backoff with a cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: usize,
    pub acquire_timeout: Duration,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub max_lifetime: Duration,
    pub default_row_limit: u32,
    /// Hard ceiling on returned rows; no caller request exceeds it
    pub max_row_limit: u32,
    pub reconnect: ReconnectPolicy,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(300),
            default_row_limit: 100,
            max_row_limit: 1000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// deadpool manager that opens sessions through a [`Connector`]
#[derive(Debug)]
pub struct ConnectionFactory {
    connector: Arc<dyn Connector>,
    max_lifetime: Duration,
}

impl managed::Manager for ConnectionFactory {
    type Type = Box<dyn DbConnection>;
    type Error = DbError;

    async fn create(&self) -> std::result::Result<Self::Type, DbError> {
        self.connector.connect().await
    }

    async fn recycle(&self, conn: &mut Self::Type, metrics: &Metrics) -> RecycleResult<DbError> {
        if metrics.age() > self.max_lifetime {
            return Err(RecycleError::Backend(DbError::transient(
                "connection exceeded its maximum lifetime",
            )));
        }
        conn.ping().await.map_err(RecycleError::Backend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeaseState {
    Idle,
    Active,
    Closed,
}

/// Exclusive claim on one pooled connection.
///
/// Dropping a lease that is still `Active` (a cancelled execution) discards
/// the underlying connection instead of returning it to the pool.
pub struct ConnectionLease {
    object: Option<PooledConnection>,
    state: LeaseState,
    leased: Arc<AtomicUsize>,
}

impl ConnectionLease {
    fn new(object: PooledConnection, leased: Arc<AtomicUsize>) -> Self {
        leased.fetch_add(1, Ordering::SeqCst);
        Self {
            object: Some(object),
            state: LeaseState::Idle,
            leased,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LeaseState {
        self.state
    }

    const fn is_attached(&self) -> bool {
        self.object.is_some()
    }

    fn attach(&mut self, object: PooledConnection) {
        self.object = Some(object);
        self.state = LeaseState::Idle;
    }

    fn discard(&mut self, reason: &str) {
        if let Some(object) = self.object.take() {
            drop(managed::Object::take(object));
            tracing::warn!(target: AUDIT_TARGET, event = "lease_discarded", reason, "Discarded pooled connection");
        }
        self.state = LeaseState::Closed;
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("state", &self.state)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.state == LeaseState::Active {
            self.discard("cancelled mid-flight");
        }
        self.leased.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
    pub waiting: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub latency_ms: u64,
    pub degraded: bool,
    pub pool: PoolStatus,
}

enum CheckoutError {
    Exhausted(Duration),
    Backend(DbError),
    Fatal(Error),
}

enum AttemptError {
    Transient(DbError),
    Fatal(Error),
}

/// Owns the connection pool and runs validated queries on leased connections
pub struct ConnectionManager {
    pool: Pool,
    settings: PoolSettings,
    guard: QueryGuard,
    endpoint: String,
    leased: Arc<AtomicUsize>,
    degraded: AtomicBool,
    reconnects: AtomicU64,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("settings", &self.settings)
            .field("status", &self.status())
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, settings: PoolSettings) -> Result<Self> {
        let endpoint = connector.endpoint();
        let factory = ConnectionFactory {
            connector,
            max_lifetime: settings.max_lifetime,
        };

        let pool = Pool::builder(factory)
            .max_size(settings.max_size)
            .wait_timeout(Some(settings.acquire_timeout))
            .create_timeout(Some(settings.connect_timeout))
            .recycle_timeout(Some(RECYCLE_TIMEOUT))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            guard: QueryGuard::new(settings.query_timeout),
            settings,
            endpoint,
            leased: Arc::new(AtomicUsize::new(0)),
            degraded: AtomicBool::new(false),
            reconnects: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Rows a call may return: the caller's request (or the default) capped
    /// by the hard maximum. A zero request means the default.
    #[must_use]
    pub fn effective_limit(&self, caller_limit: Option<u32>) -> u32 {
        caller_limit
            .filter(|&limit| limit > 0)
            .unwrap_or(self.settings.default_row_limit)
            .min(self.settings.max_row_limit)
    }

    /// Wait for a free connection.
    ///
    /// The wait never exceeds the configured acquire timeout, whatever the
    /// caller asks for.
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<ConnectionLease> {
        let wait = timeout.map_or(self.settings.acquire_timeout, |t| {
            t.min(self.settings.acquire_timeout)
        });

        let mut attempt = 0;
        loop {
            #[cfg(feature = "metrics")]
            let started = Instant::now();
            let failure = match self.checkout(wait).await {
                Ok(object) => {
                    #[cfg(feature = "metrics")]
                    crate::observability::record_pool_wait_time(started.elapsed());
                    return Ok(ConnectionLease::new(object, Arc::clone(&self.leased)));
                }
                Err(CheckoutError::Exhausted(waited)) => {
                    tracing::warn!(
                        target: AUDIT_TARGET,
                        event = "pool_exhausted",
                        wait_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                        in_use = self.in_use(),
                        "No connection became available in time"
                    );
                    #[cfg(feature = "metrics")]
                    crate::observability::record_pool_error("exhausted");
                    return Err(Error::PoolExhausted);
                }
                Err(CheckoutError::Fatal(err)) => return Err(err),
                Err(CheckoutError::Backend(err)) => err,
            };

            attempt += 1;
            self.backoff_or_fail(attempt, &failure).await?;
        }
    }

    /// Run `query` on `lease`, returning at most the effective row limit.
    ///
    /// Transient failures discard the lease's connection and retry on a fresh
    /// one with backoff; once the attempts run out the pool is marked degraded.
    pub async fn execute(
        &self,
        lease: &mut ConnectionLease,
        query: &ValidatedQuery,
        caller_limit: Option<u32>,
    ) -> Result<ResultSet> {
        let limit = self.effective_limit(caller_limit);
        // One extra row tells us whether the cap truncated the result.
        let sql = query.bounded_sql(u64::from(limit) + 1);

        let mut attempt = 0;
        loop {
            let failure = match self.attempt(lease, &sql, limit).await {
                Ok(result) => {
                    if attempt > 0 {
                        self.degraded.store(false, Ordering::SeqCst);
                        tracing::info!(attempt, "Query succeeded after reconnect");
                    }
                    return Ok(result);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient(err)) => err,
            };

            attempt += 1;
            self.backoff_or_fail(attempt, &failure).await?;
        }
    }

    /// Return the lease's connection to the pool.
    ///
    /// A lease released while still `Active` is discarded instead.
    pub fn release(&self, mut lease: ConnectionLease) {
        if lease.state == LeaseState::Active {
            lease.discard("released mid-flight");
        }
        drop(lease);
    }

    /// Lightweight liveness probe
    pub async fn health_check(&self) -> bool {
        self.health_report().await.healthy
    }

    pub async fn health_report(&self) -> HealthReport {
        let started = Instant::now();
        let probe = self.probe().await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Err(e) = &probe {
            tracing::warn!(error = %e, "Database health probe failed");
        } else {
            self.degraded.store(false, Ordering::SeqCst);
        }

        HealthReport {
            healthy: probe.is_ok(),
            latency_ms,
            degraded: self.is_degraded(),
            pool: self.status(),
        }
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        #[cfg(feature = "metrics")]
        crate::observability::set_pool_stats(status.max_size, status.available, status.waiting);
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }

    /// Leases currently held by callers
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.leased.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Stop handing out connections; outstanding leases are dropped on release.
    pub fn close(&self) {
        self.pool.close();
        tracing::info!(endpoint = %self.endpoint, "Connection pool closed");
    }

    async fn checkout(&self, wait: Duration) -> std::result::Result<PooledConnection, CheckoutError> {
        let timeouts = Timeouts {
            wait: Some(wait),
            create: Some(self.settings.connect_timeout),
            recycle: Some(RECYCLE_TIMEOUT),
        };

        self.pool.timeout_get(&timeouts).await.map_err(|e| match e {
            PoolError::Timeout(TimeoutType::Wait) => CheckoutError::Exhausted(wait),
            PoolError::Timeout(TimeoutType::Create) => CheckoutError::Backend(DbError::transient(
                format!("connecting to {} timed out", self.endpoint),
            )),
            PoolError::Timeout(TimeoutType::Recycle) => {
                CheckoutError::Backend(DbError::transient("connection validation timed out"))
            }
            PoolError::Backend(err) => CheckoutError::Backend(err),
            PoolError::Closed => {
                CheckoutError::Fatal(Error::Connection("connection pool is closed".into()))
            }
            other => CheckoutError::Fatal(Error::Connection(other.to_string())),
        })
    }

    async fn attempt(
        &self,
        lease: &mut ConnectionLease,
        sql: &str,
        limit: u32,
    ) -> std::result::Result<ResultSet, AttemptError> {
        if !lease.is_attached() {
            let object = self
                .checkout(self.settings.acquire_timeout)
                .await
                .map_err(|e| match e {
                    CheckoutError::Exhausted(_) => AttemptError::Fatal(Error::PoolExhausted),
                    CheckoutError::Backend(err) => AttemptError::Transient(err),
                    CheckoutError::Fatal(err) => AttemptError::Fatal(err),
                })?;
            lease.attach(object);
        }

        let Some(conn) = lease.object.as_mut() else {
            return Err(AttemptError::Fatal(Error::Connection(
                "lease has no connection".into(),
            )));
        };
        lease.state = LeaseState::Active;

        let max_rows = usize::try_from(limit).unwrap_or(usize::MAX);
        let outcome = self
            .guard
            .execute_with_error(conn.fetch(sql, max_rows))
            .await;

        match outcome {
            Ok(mut fetched) => {
                lease.state = LeaseState::Idle;
                let truncated = fetched.has_more || fetched.rows.len() > max_rows;
                fetched.rows.truncate(max_rows);
                Ok(ResultSet {
                    columns: fetched.columns,
                    rows: fetched.rows,
                    truncated,
                    effective_limit: limit,
                })
            }
            Err(ExecuteError::Timeout(after)) => {
                lease.discard("query timeout");
                Err(AttemptError::Fatal(Error::QueryTimeout(after)))
            }
            Err(ExecuteError::Query(err)) if err.is_transient() => {
                lease.discard("transient failure");
                Err(AttemptError::Transient(err))
            }
            Err(ExecuteError::Query(err)) => {
                lease.state = LeaseState::Idle;
                Err(AttemptError::Fatal(err.into()))
            }
        }
    }

    /// Sleep before reconnect `attempt`, or give up and mark the pool degraded.
    async fn backoff_or_fail(&self, attempt: u32, failure: &DbError) -> Result<()> {
        let policy = self.settings.reconnect;
        if attempt > policy.attempts {
            self.degraded.store(true, Ordering::SeqCst);
            tracing::error!(
                endpoint = %self.endpoint,
                attempts = policy.attempts,
                error = %failure,
                "Reconnect attempts exhausted; pool marked degraded"
            );
            return Err(Error::Connection(format!(
                "{failure} (gave up after {} reconnect attempts)",
                policy.attempts
            )));
        }

        let backoff = policy.backoff(attempt);
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(
            target: AUDIT_TARGET,
            event = "reconnect_attempt",
            attempt,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = %failure,
            "Transient database failure, reconnecting"
        );
        #[cfg(feature = "metrics")]
        crate::observability::record_reconnect();

        tokio::time::sleep(backoff).await;
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let mut lease = self.acquire(Some(HEALTH_ACQUIRE_TIMEOUT)).await?;
        let Some(conn) = lease.object.as_mut() else {
            return Err(Error::Connection("lease has no connection".into()));
        };
        lease.state = LeaseState::Active;

        match self.guard.execute(conn.ping()).await {
            Ok(()) => {
                lease.state = LeaseState::Idle;
                self.release(lease);
                Ok(())
            }
            Err(e) => {
                lease.discard("health probe failed");
                Err(e)
            }
        }
    }
}
