//! Transport layer: the client side sends one frame and reads one back;
//! the server side owns the listener, the accept loop, and the
//! per-connection read loop.
//!
//! Both sides are looked up by protocol name in process-wide registries
//! with the defaults registered under `"default"`.

mod client;
mod server;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::Lazy;
use tokio::task::JoinHandle;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::BoxFuture;
use crate::pool::Pool;
use crate::registry::Registry;
use crate::selector::Selector;

pub use client::DefaultClientTransport;
pub use server::DefaultServerTransport;

/// Network type of a call or a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Tcp,
    Udp,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" | "tcp4" | "tcp6" => Ok(Network::Tcp),
            "udp" | "udp4" | "udp6" => Ok(Network::Udp),
            other => Err(Error::NetworkNotSupported(other.to_string())),
        }
    }
}

/// Parameters for one client-side send.
pub struct ClientTransportOptions {
    pub service_name: String,
    pub target: String,
    pub network: Network,
    pub pool: Arc<dyn Pool>,
    pub selector: Arc<dyn Selector>,
}

/// Send one request frame and return the response frame.
pub trait ClientTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        ctx: &'a Context,
        frame: &'a [u8],
        opts: &'a ClientTransportOptions,
    ) -> BoxFuture<'a, Result<Bytes>>;
}

/// Server-side consumer of decoded envelope bytes: parses the request,
/// dispatches it, and returns the serialized response payload.
pub trait MessageHandler: Send + Sync {
    fn handle<'a>(&'a self, ctx: Context, body: Bytes) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Parameters for a server listener.
#[derive(Clone)]
pub struct ServerTransportOptions {
    pub address: String,
    pub network: Network,
    pub protocol: String,
    pub keepalive_period: Option<Duration>,
    pub handler: Arc<dyn MessageHandler>,
}

/// A bound, serving listener.
#[derive(Debug)]
pub struct Listening {
    local_addr: SocketAddr,
    task: JoinHandle<Result<()>>,
}

impl Listening {
    pub(crate) fn new(local_addr: SocketAddr, task: JoinHandle<Result<()>>) -> Self {
        Self { local_addr, task }
    }

    /// The bound address; useful with `127.0.0.1:0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and tear the serve task down.
    pub fn shutdown(&self) {
        self.task.abort();
    }

    /// Wait for the serve task to exit.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(Error::server_internal(e.to_string())),
        }
    }
}

/// Bind a listener and serve connections until shut down.
pub trait ServerTransport: Send + Sync {
    fn listen_and_serve(&self, opts: ServerTransportOptions) -> BoxFuture<'static, Result<Listening>>;
}

static CLIENT_TRANSPORTS: Lazy<Registry<dyn ClientTransport>> =
    Lazy::new(|| Registry::new("default", Arc::new(DefaultClientTransport)));

static SERVER_TRANSPORTS: Lazy<Registry<dyn ServerTransport>> =
    Lazy::new(|| Registry::new("default", Arc::new(DefaultServerTransport)));

/// Register a client transport, replacing any prior entry.
pub fn register_client_transport(name: impl Into<String>, transport: Arc<dyn ClientTransport>) {
    CLIENT_TRANSPORTS.register(name, transport);
}

/// Look up a client transport by protocol name; unknown names get the
/// default.
pub fn get_client_transport(name: &str) -> Arc<dyn ClientTransport> {
    CLIENT_TRANSPORTS.get(name)
}

/// Register a server transport, replacing any prior entry.
pub fn register_server_transport(name: impl Into<String>, transport: Arc<dyn ServerTransport>) {
    SERVER_TRANSPORTS.register(name, transport);
}

/// Look up a server transport by protocol name; unknown names get the
/// default.
pub fn get_server_transport(name: &str) -> Arc<dyn ServerTransport> {
    SERVER_TRANSPORTS.get(name)
}
