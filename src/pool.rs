//! Connection pooling keyed by connection string.
//!
//! A [`ConnectionPool`] holds one entry per normalized connection string.
//! Each entry keeps its idle sessions and the number of sessions it has
//! open; that number never exceeds the configured maximum. Acquiring a
//! session first sweeps the idle list (expired or dead sessions are closed)
//! and tops it up to the configured minimum, then hands out an idle
//! session, opens a new one, or waits for a release.
//!
//! Opening sessions is abstracted behind [`Connector`], so the pool can be
//! exercised without a server.
//!
//! Sessions are handed out as [`PooledSession`]s, which remember the entry
//! they were counted against. A session whose entry was cleared in the
//! meantime is closed on release instead of joining the new entry.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::connect::ConnectParams;
use crate::protocol::constants::DEFAULT_MAX_POOL_SIZE;
use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Default time to wait for a free session.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool sizing and lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Sessions kept open even when idle.
    pub min_pool_size: usize,

    /// Maximum number of open sessions, idle or in use.
    pub max_pool_size: usize,

    /// Maximum age of a session; zero means unlimited.
    pub connection_lifetime: Duration,

    /// How long [`ConnectionPool::get_entry`] waits for a release when the
    /// pool is at its maximum. `None` waits forever.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: 0,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            connection_lifetime: Duration::ZERO,
            acquire_timeout: Some(DEFAULT_ACQUIRE_TIMEOUT),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of sessions opened ahead of demand. Capped by the
    /// maximum when the pool tops up.
    #[must_use]
    pub fn min_pool_size(mut self, count: usize) -> Self {
        self.min_pool_size = count;
        self
    }

    /// Set the maximum number of sessions (at least one).
    #[must_use]
    pub fn max_pool_size(mut self, count: usize) -> Self {
        self.max_pool_size = count.max(1);
        self
    }

    /// Set the maximum age of a session. Older idle sessions are closed on
    /// the next acquire; zero disables the check.
    #[must_use]
    pub fn connection_lifetime(mut self, lifetime: Duration) -> Self {
        self.connection_lifetime = lifetime;
        self
    }

    /// Set how long an acquire waits on a full pool. `None` waits forever.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// A pooled session.
#[async_trait]
pub trait Session: Send + 'static {
    /// Whether the session still answers.
    async fn ping(&mut self) -> bool;

    /// Close the session, ignoring errors.
    async fn close(self);

    /// When the session was opened.
    fn opened_at(&self) -> Instant;
}

/// Opens sessions for a pool.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    async fn connect(&self, params: &ConnectParams) -> Result<Self::Session>;
}

/// Opens real database sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDbConnector;

#[async_trait]
impl Connector for MaxDbConnector {
    type Session = Connection;

    async fn connect(&self, params: &ConnectParams) -> Result<Connection> {
        Connection::connect_with_params(params).await
    }
}

#[async_trait]
impl Session for Connection {
    async fn ping(&mut self) -> bool {
        Connection::ping(self).await.is_ok()
    }

    async fn close(self) {
        if let Err(e) = Connection::close(self).await {
            debug!(error = %e, "error while closing pooled session");
        }
    }

    fn opened_at(&self) -> Instant {
        Connection::opened_at(self)
    }
}

/// Snapshot of one pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Sessions waiting in the pool.
    pub idle: usize,
    /// Open sessions, idle ones included.
    pub active: usize,
}

/// A session checked out of a [`ConnectionPool`].
///
/// Dereferences to the underlying session. Hand it back with
/// [`ConnectionPool::release_entry`] or [`ConnectionPool::discard_entry`].
#[derive(Debug)]
pub struct PooledSession<S> {
    session: S,
    generation: u64,
}

impl<S> PooledSession<S> {
    /// Identity of the pool entry this session is counted against.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<S> Deref for PooledSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S> DerefMut for PooledSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

struct EntryState<S> {
    idle: Vec<S>,
    active_count: usize,
}

struct PoolEntry<S> {
    name: String,
    generation: u64,
    config: PoolConfig,
    state: tokio::sync::Mutex<EntryState<S>>,
    released: Notify,
    cleared: AtomicBool,
}

/// Registry of per-connection-string pools.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    entries: parking_lot::Mutex<HashMap<String, Arc<PoolEntry<C::Session>>>>,
    next_generation: AtomicU64,
}

impl<C: Connector + Default> Default for ConnectionPool<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Create an empty registry that opens sessions through `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            entries: parking_lot::Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    fn lookup(&self, params: &ConnectParams) -> Option<Arc<PoolEntry<C::Session>>> {
        self.entries.lock().get(&params.normalized()).cloned()
    }

    fn entry_for(&self, params: &ConnectParams) -> Arc<PoolEntry<C::Session>> {
        let mut entries = self.entries.lock();
        entries
            .entry(params.normalized())
            .or_insert_with(|| {
                let name = pool_name(params);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                debug!(pool = %name, generation, max = params.pool.max_pool_size, "creating pool entry");
                Arc::new(PoolEntry {
                    name,
                    generation,
                    config: params.pool.clone(),
                    state: tokio::sync::Mutex::new(EntryState {
                        idle: Vec::new(),
                        active_count: 0,
                    }),
                    released: Notify::new(),
                    cleared: AtomicBool::new(false),
                })
            })
            .clone()
    }

    /// Acquire a session for `params`.
    pub async fn get_entry(&self, params: &ConnectParams) -> Result<PooledSession<C::Session>> {
        let entry = self.entry_for(params);
        let deadline = entry
            .config
            .acquire_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        loop {
            let released = entry.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            {
                let mut state = entry.state.lock().await;
                if entry.cleared.load(Ordering::Acquire) {
                    return Err(Error::ResourceNotFound {
                        key: entry.name.clone(),
                    });
                }
                self.sweep(&entry, &mut state, params).await;

                if let Some(session) = state.idle.pop() {
                    trace!(pool = %entry.name, "acquired idle session");
                    return Ok(entry.hand_out(session));
                }
                if state.active_count < entry.config.max_pool_size {
                    let session = self.connector.connect(params).await?;
                    state.active_count += 1;
                    trace!(pool = %entry.name, active = state.active_count, "opened new session");
                    return Ok(entry.hand_out(session));
                }
            }

            trace!(pool = %entry.name, "pool exhausted, waiting for a release");
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, released).await.is_err() {
                        return Err(Error::PoolExhausted {
                            key: entry.name.clone(),
                            timeout: entry.config.acquire_timeout.unwrap_or_default(),
                        });
                    }
                }
                None => released.await,
            }
        }
    }

    /// Close idle sessions that expired or stopped answering, then top the
    /// idle list up to the minimum size. A failed top-up only logs; the
    /// acquire still proceeds with what is already idle.
    async fn sweep(
        &self,
        entry: &PoolEntry<C::Session>,
        state: &mut EntryState<C::Session>,
        params: &ConnectParams,
    ) {
        let lifetime = entry.config.connection_lifetime;
        let idle = std::mem::take(&mut state.idle);
        for mut session in idle {
            let expired = !lifetime.is_zero() && session.opened_at().elapsed() > lifetime;
            if expired || !session.ping().await {
                warn!(pool = %entry.name, expired, "evicting pooled session");
                session.close().await;
                state.active_count = state.active_count.saturating_sub(1);
            } else {
                state.idle.push(session);
            }
        }

        while state.idle.len() < entry.config.min_pool_size
            && state.active_count < entry.config.max_pool_size
        {
            match self.connector.connect(params).await {
                Ok(session) => {
                    state.active_count += 1;
                    state.idle.push(session);
                }
                Err(e) => {
                    warn!(pool = %entry.name, error = %e, "could not top up pool to its minimum size");
                    break;
                }
            }
        }
    }

    /// The live entry for `params`, if it is the one `generation` was
    /// handed out from.
    fn owning_entry(
        &self,
        params: &ConnectParams,
        generation: u64,
    ) -> Option<Arc<PoolEntry<C::Session>>> {
        self.lookup(params)
            .filter(|entry| entry.generation == generation)
    }

    /// Return a session to its pool.
    ///
    /// A session from a cleared or different pool is closed and reported as
    /// [`Error::ResourceNotFound`]; it never joins another entry's idle list.
    pub async fn release_entry(
        &self,
        params: &ConnectParams,
        session: PooledSession<C::Session>,
    ) -> Result<()> {
        let Some(entry) = self.owning_entry(params, session.generation) else {
            debug!(generation = session.generation, "closing session released to a stale pool");
            session.session.close().await;
            return Err(Error::ResourceNotFound {
                key: pool_name(params),
            });
        };
        {
            let mut state = entry.state.lock().await;
            state.idle.push(session.session);
            trace!(pool = %entry.name, idle = state.idle.len(), "session released");
        }
        entry.released.notify_one();
        Ok(())
    }

    /// Close a session that must not be reused and free its slot.
    pub async fn discard_entry(
        &self,
        params: &ConnectParams,
        session: PooledSession<C::Session>,
    ) -> Result<()> {
        let generation = session.generation;
        session.session.close().await;
        let entry = self
            .owning_entry(params, generation)
            .ok_or_else(|| Error::ResourceNotFound {
                key: pool_name(params),
            })?;
        {
            let mut state = entry.state.lock().await;
            state.active_count = state.active_count.saturating_sub(1);
            debug!(pool = %entry.name, active = state.active_count, "session discarded");
        }
        entry.released.notify_one();
        Ok(())
    }

    /// Close the idle sessions of one pool and forget it.
    pub async fn clear_entry(&self, params: &ConnectParams) -> Result<()> {
        let entry = self
            .entries
            .lock()
            .remove(&params.normalized())
            .ok_or_else(|| Error::ResourceNotFound {
                key: pool_name(params),
            })?;
        Self::shutdown(entry).await;
        Ok(())
    }

    /// Close the idle sessions of every pool and forget them all.
    pub async fn clear_all_pools(&self) {
        let entries: Vec<_> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            Self::shutdown(entry).await;
        }
    }

    async fn shutdown(entry: Arc<PoolEntry<C::Session>>) {
        entry.cleared.store(true, Ordering::Release);
        let idle = {
            let mut state = entry.state.lock().await;
            let idle = std::mem::take(&mut state.idle);
            state.active_count = state.active_count.saturating_sub(idle.len());
            idle
        };
        debug!(pool = %entry.name, closed = idle.len(), "clearing pool entry");
        for session in idle {
            session.close().await;
        }
        entry.released.notify_waiters();
    }

    /// Idle and active counts of the pool for `params`.
    pub async fn status(&self, params: &ConnectParams) -> Option<PoolStatus> {
        let entry = self.lookup(params)?;
        let state = entry.state.lock().await;
        Some(PoolStatus {
            idle: state.idle.len(),
            active: state.active_count,
        })
    }

    /// Number of pool entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no pool entry exists.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<S> PoolEntry<S> {
    fn hand_out(&self, session: S) -> PooledSession<S> {
        PooledSession {
            session,
            generation: self.generation,
        }
    }
}

/// Pool name used in logs and errors; never includes the password.
fn pool_name(params: &ConnectParams) -> String {
    format!(
        "{}@{}:{}/{}",
        params.username, params.host, params.port, params.database
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PoolConfig::new()
            .min_pool_size(2)
            .max_pool_size(0)
            .connection_lifetime(Duration::from_secs(60))
            .acquire_timeout(None);
        assert_eq!(config.min_pool_size, 2);
        assert_eq!(config.max_pool_size, 1);
        assert_eq!(config.connection_lifetime, Duration::from_secs(60));
        assert_eq!(config.acquire_timeout, None);
    }

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.min_pool_size, 0);
        assert_eq!(config.max_pool_size, 100);
        assert!(config.connection_lifetime.is_zero());
        assert_eq!(config.acquire_timeout, Some(DEFAULT_ACQUIRE_TIMEOUT));
    }

    #[test]
    fn test_pool_name_hides_password() {
        let params = ConnectParams::new("db1", 7210, "TST").with_credentials("DBA", "secret");
        assert_eq!(pool_name(&params), "DBA@db1:7210/TST");
    }
}
