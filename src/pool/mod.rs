//! Connection pooling.
//!
//! The pool is two-level: a process-wide [`PoolManager`] owns one
//! [`SubPool`] per endpoint address. Borrowing never blocks on an empty or
//! full idle queue; when nothing usable is idle, the subpool dials a fresh
//! connection instead, trading socket reuse for latency. A background
//! checker per subpool evicts connections that sat idle past the timeout or
//! whose socket turned readable while parked (a readable idle socket means
//! half-close or unsolicited data).
//!
//! Pools are looked up by name in a process-wide registry with the default
//! manager registered under `"default"`.

mod conn;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::context::Context;
use crate::error::Result;
use crate::interceptor::BoxFuture;
use crate::registry::Registry;

pub use conn::{PoolManager, PooledConn, SubPool};

/// Tuning knobs for a [`PoolManager`] and the subpools it creates.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Connections dialed when a subpool is created.
    pub initial_cap: usize,
    /// Upper bound on idle connections per endpoint.
    pub max_cap: usize,
    /// Idle connections older than this are evicted.
    pub idle_timeout: Duration,
    /// Budget for a single dial, capped by the call deadline.
    pub dial_timeout: Duration,
    /// How often the checker sweeps the idle queue.
    pub check_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            initial_cap: 1,
            max_cap: 1000,
            idle_timeout: Duration::from_secs(60),
            dial_timeout: Duration::from_millis(200),
            check_interval: Duration::from_secs(3),
        }
    }
}

/// Borrow connections keyed by endpoint address.
pub trait Pool: Send + Sync {
    /// Borrow a connection to `address`. Ownership transfers to the
    /// caller: [`PooledConn::release`] returns it, dropping destroys it.
    fn get<'a>(&'a self, ctx: &'a Context, address: &'a str) -> BoxFuture<'a, Result<PooledConn>>;
}

static POOLS: Lazy<Registry<dyn Pool>> =
    Lazy::new(|| Registry::new("default", Arc::new(PoolManager::new(PoolOptions::default()))));

/// Register a pool under a name, replacing any prior entry.
pub fn register(name: impl Into<String>, pool: Arc<dyn Pool>) {
    POOLS.register(name, pool);
}

/// Look up a pool by name; unknown names get the default manager.
pub fn get(name: &str) -> Arc<dyn Pool> {
    POOLS.get(name)
}
