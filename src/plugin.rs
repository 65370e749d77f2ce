//! Plugin surface: typed init hooks applied at server startup.
//!
//! Plugins come in two shapes. A resolver plugin registers the server with
//! a service directory and wires a selector; a tracing plugin produces a
//! server interceptor that the server appends to its chain. The server
//! applies each registered plugin it was configured with, handing it the
//! matching slice of its options.
//!
//! A span-emitting tracing plugin backed by the `tracing` crate ships
//! built in under the name `"tracing"`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::Instrument;

use crate::context::Context;
use crate::error::Result;
use crate::interceptor::{BoxFuture, HandlerCont, ServerInterceptor};

/// Configuration slice handed to plugin init hooks.
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    /// The serving address of this server.
    pub server_addr: String,
    /// Names of the services this server exposes.
    pub services: Vec<String>,
    /// Address of the service directory, for resolver plugins.
    pub selector_server_addr: String,
    /// Address of the tracing collector, for tracing plugins.
    pub tracing_server_addr: String,
    /// Span name for the tracing interceptor.
    pub span_name: String,
}

/// Registers services with a directory and typically installs a selector.
pub trait ResolverPlugin: Send + Sync {
    fn init(&self, opts: &PluginOptions) -> Result<()>;
}

/// Produces a server interceptor that wraps every dispatch in a trace
/// span.
pub trait TracingPlugin: Send + Sync {
    fn init(&self, opts: &PluginOptions) -> Result<Arc<dyn ServerInterceptor>>;
}

/// A registered plugin of either shape.
#[derive(Clone)]
pub enum PluginKind {
    Resolver(Arc<dyn ResolverPlugin>),
    Tracing(Arc<dyn TracingPlugin>),
}

static PLUGINS: Lazy<RwLock<HashMap<String, PluginKind>>> = Lazy::new(|| {
    let mut map: HashMap<String, PluginKind> = HashMap::new();
    map.insert("tracing".to_string(), PluginKind::Tracing(Arc::new(SpanTracing)));
    RwLock::new(map)
});

/// Register a plugin under a name, replacing any prior entry.
pub fn register(name: impl Into<String>, plugin: PluginKind) {
    PLUGINS.write().unwrap().insert(name.into(), plugin);
}

/// Look up a plugin by name.
pub fn get(name: &str) -> Option<PluginKind> {
    PLUGINS.read().unwrap().get(name).cloned()
}

/// The built-in tracing plugin: spans via the `tracing` crate, no
/// collector connection.
pub struct SpanTracing;

impl TracingPlugin for SpanTracing {
    fn init(&self, opts: &PluginOptions) -> Result<Arc<dyn ServerInterceptor>> {
        Ok(Arc::new(TracingInterceptor { span_name: opts.span_name.clone() }))
    }
}

/// Wraps each dispatch in an info span carrying the call target.
pub struct TracingInterceptor {
    span_name: String,
}

impl ServerInterceptor for TracingInterceptor {
    fn intercept<'a>(
        &'a self,
        ctx: Context,
        next: HandlerCont<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        let span = tracing::info_span!(
            "rpc",
            span_name = %self.span_name,
            service = %ctx.service_name(),
            method = %ctx.method(),
        );
        Box::pin(next(ctx).instrument(span))
    }
}
