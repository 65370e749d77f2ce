//! Pool manager, per-endpoint subpools, and the borrowed-connection
//! wrapper.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use tokio::net::TcpStream;

use super::{Pool, PoolOptions};
use crate::codec::Framer;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::BoxFuture;

/// Process-wide pool: endpoint address → subpool.
pub struct PoolManager {
    opts: PoolOptions,
    pools: RwLock<HashMap<String, Arc<SubPool>>>,
}

impl PoolManager {
    pub fn new(opts: PoolOptions) -> Self {
        Self { opts, pools: RwLock::new(HashMap::new()) }
    }

    fn lookup(&self, address: &str) -> Option<Arc<SubPool>> {
        self.pools.read().unwrap().get(address).cloned()
    }

    async fn get_conn(&self, ctx: &Context, address: &str) -> Result<PooledConn> {
        if let Some(sub) = self.lookup(address) {
            return sub.get(ctx).await;
        }

        let sub = SubPool::new(address.to_string(), self.opts.clone(), ctx).await?;
        // Last writer wins under concurrent first use of an endpoint; the
        // loser's subpool is dropped and its checker stops with it.
        self.pools.write().unwrap().insert(address.to_string(), sub.clone());
        sub.get(ctx).await
    }
}

impl Pool for PoolManager {
    fn get<'a>(&'a self, ctx: &'a Context, address: &'a str) -> BoxFuture<'a, Result<PooledConn>> {
        Box::pin(self.get_conn(ctx, address))
    }
}

struct IdleConn {
    conn: TcpStream,
    framer: Framer,
    returned_at: Instant,
}

/// Per-endpoint container of idle connections.
pub struct SubPool {
    address: String,
    opts: PoolOptions,
    idle: Mutex<Option<VecDeque<IdleConn>>>,
    closed: AtomicBool,
}

impl SubPool {
    /// Create a subpool and pre-dial `initial_cap` connections.
    pub async fn new(address: String, opts: PoolOptions, ctx: &Context) -> Result<Arc<Self>> {
        let pool = Arc::new(Self {
            address,
            opts,
            idle: Mutex::new(Some(VecDeque::new())),
            closed: AtomicBool::new(false),
        });

        let initial = pool.opts.initial_cap.max(1);
        for _ in 0..initial {
            let conn = pool.dial(ctx).await?;
            pool.park(IdleConn { conn, framer: Framer::new(), returned_at: Instant::now() });
        }

        pool.spawn_checker();
        Ok(pool)
    }

    async fn dial(&self, ctx: &Context) -> Result<TcpStream> {
        if ctx.is_expired() {
            return Err(Error::DeadlineExceeded);
        }

        let mut budget = self.opts.dial_timeout;
        if let Some(remaining) = ctx.remaining() {
            budget = budget.min(remaining);
        }

        match tokio::time::timeout(budget, TcpStream::connect(&self.address)).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(Error::DeadlineExceeded),
        }
    }

    /// Borrow a connection: pop an idle one, or dial when none is parked.
    /// Never waits on the queue.
    pub async fn get(self: &Arc<Self>, ctx: &Context) -> Result<PooledConn> {
        let parked = {
            let mut idle = self.idle.lock().unwrap();
            match idle.as_mut() {
                None => return Err(Error::ConnectionClosed),
                Some(queue) => queue.pop_front(),
            }
        };

        let (conn, framer) = match parked {
            Some(ic) => (ic.conn, ic.framer),
            None => (self.dial(ctx).await?, Framer::new()),
        };

        Ok(PooledConn {
            conn: Some(conn),
            framer,
            pool: Arc::downgrade(self),
            released: false,
        })
    }

    /// Park an idle connection; closes it when the queue is full or the
    /// subpool shut down.
    fn park(&self, ic: IdleConn) {
        let mut idle = self.idle.lock().unwrap();
        match idle.as_mut() {
            Some(queue) if queue.len() < self.opts.max_cap => queue.push_back(ic),
            // Dropping the TcpStream closes the socket.
            _ => {}
        }
    }

    fn spawn_checker(self: &Arc<Self>) {
        let pool = Arc::downgrade(self);
        let interval = self.opts.check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else { return };
                if pool.closed.load(Ordering::Acquire) {
                    return;
                }
                pool.sweep();
            }
        });
    }

    /// Drain up to the current queue depth, closing stale or readable
    /// connections and re-parking the rest.
    fn sweep(&self) {
        let mut idle = self.idle.lock().unwrap();
        let Some(queue) = idle.as_mut() else { return };
        let depth = queue.len();
        for _ in 0..depth {
            let Some(ic) = queue.pop_front() else { break };
            if self.is_usable(&ic) {
                queue.push_back(ic);
            }
        }
    }

    fn is_usable(&self, ic: &IdleConn) -> bool {
        if ic.returned_at + self.opts.idle_timeout < Instant::now() {
            return false;
        }
        // An idle socket must have nothing to read: data means the peer
        // spoke out of turn, zero bytes means it half-closed.
        let mut probe = [0u8; 1];
        match ic.conn.try_read(&mut probe) {
            Ok(_) => false,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }

    /// Shut the subpool down, closing every parked connection. In-flight
    /// borrows become destroy-on-drop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut idle = self.idle.lock().unwrap();
        // Taking the queue drops every TcpStream in it.
        idle.take();
    }

    #[cfg(test)]
    fn idle_len(&self) -> usize {
        self.idle.lock().unwrap().as_ref().map_or(0, VecDeque::len)
    }
}

/// A borrowed connection.
///
/// Calling [`release`](Self::release) after a clean request/response pair
/// parks the connection for reuse. Dropping without release destroys it, so
/// a cancelled or failed call can never hand a connection in an unknown
/// protocol state back to the pool.
pub struct PooledConn {
    conn: Option<TcpStream>,
    framer: Framer,
    pool: std::sync::Weak<SubPool>,
    released: bool,
}

impl PooledConn {
    /// The raw stream, for writing.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        self.conn.as_mut().expect("connection taken")
    }

    /// Read one frame using this connection's framer.
    pub async fn read_frame(&mut self) -> Result<bytes::Bytes> {
        let conn = self.conn.as_mut().expect("connection taken");
        self.framer.read_frame(conn).await
    }

    /// Return the connection to its subpool for reuse.
    pub fn release(mut self) {
        self.released = true;
        let Some(conn) = self.conn.take() else { return };
        let framer = std::mem::take(&mut self.framer);
        if let Some(pool) = self.pool.upgrade() {
            pool.park(IdleConn { conn, framer, returned_at: Instant::now() });
        }
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        // Not released: the socket is dropped here, closing it exactly
        // once.
        let _ = self.conn.take();
    }
}
