//! Server assembly: options, plugin initialization, and serving.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{codes, Error, Result};
use crate::interceptor::ServerInterceptor;
use crate::plugin::{self, PluginKind, PluginOptions};
use crate::serialization::SerializationType;
use crate::service::{Dispatcher, Service, ServiceDesc};
use crate::transport::{self, Listening, Network, ServerTransport as _, ServerTransportOptions};

/// Server configuration, builder style.
#[derive(Clone, Default)]
pub struct ServerOptions {
    pub(crate) address: String,
    pub(crate) network: Network,
    pub(crate) timeout: Option<Duration>,
    pub(crate) protocol: String,
    pub(crate) serialization: SerializationType,
    pub(crate) plugin_names: Vec<String>,
    pub(crate) selector_server_address: String,
    pub(crate) tracing_server_address: String,
    pub(crate) tracing_span_name: String,
    pub(crate) keepalive_period: Option<Duration>,
}

impl ServerOptions {
    pub fn new() -> Self {
        Self { protocol: "default".to_string(), ..Default::default() }
    }

    /// Listen address, e.g. `127.0.0.1:8000` (port 0 for ephemeral).
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Budget for a single dispatch; handlers running longer produce a
    /// deadline error envelope.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_serialization(mut self, serialization: SerializationType) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn with_plugins(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.plugin_names = names.into_iter().collect();
        self
    }

    pub fn with_selector_server_address(mut self, address: impl Into<String>) -> Self {
        self.selector_server_address = address.into();
        self
    }

    pub fn with_tracing_server_address(mut self, address: impl Into<String>) -> Self {
        self.tracing_server_address = address.into();
        self
    }

    pub fn with_tracing_span_name(mut self, name: impl Into<String>) -> Self {
        self.tracing_span_name = name.into();
        self
    }

    pub fn with_keepalive_period(mut self, period: Duration) -> Self {
        self.keepalive_period = Some(period);
        self
    }
}

/// An RPC server: one service table, a transport, and the configured
/// plugins.
pub struct Server {
    opts: ServerOptions,
    service: Option<Arc<Service>>,
    interceptors: Vec<Arc<dyn ServerInterceptor>>,
}

impl Server {
    pub fn new(opts: ServerOptions) -> Self {
        Self { opts, service: None, interceptors: Vec::new() }
    }

    /// Append a server interceptor; applied outermost-first in
    /// registration order.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn ServerInterceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Register a service, replacing any prior registration wholesale.
    pub fn register(&mut self, desc: ServiceDesc) -> &mut Self {
        self.service = Some(Arc::new(Service::from_desc(desc)));
        self
    }

    /// Run plugin init hooks: resolver plugins see the directory and
    /// serving addresses, tracing plugins contribute interceptors.
    fn init_plugins(&mut self) -> Result<()> {
        let service_names = self
            .service
            .iter()
            .map(|s| s.name().to_string())
            .collect::<Vec<_>>();

        for name in &self.opts.plugin_names {
            let Some(kind) = plugin::get(name) else {
                return Err(Error::framework(
                    codes::CONFIG_ERROR,
                    format!("plugin {name} is not registered"),
                ));
            };

            match kind {
                PluginKind::Resolver(p) => {
                    let popts = PluginOptions {
                        server_addr: self.opts.address.clone(),
                        services: service_names.clone(),
                        selector_server_addr: self.opts.selector_server_address.clone(),
                        ..Default::default()
                    };
                    p.init(&popts)?;
                }
                PluginKind::Tracing(p) => {
                    let popts = PluginOptions {
                        tracing_server_addr: self.opts.tracing_server_address.clone(),
                        span_name: self.opts.tracing_span_name.clone(),
                        ..Default::default()
                    };
                    self.interceptors.push(p.init(&popts)?);
                }
            }
        }
        Ok(())
    }

    /// Initialize plugins, bind the listener, and start serving in the
    /// background. The returned handle exposes the bound address.
    pub async fn start(mut self) -> Result<Listening> {
        self.init_plugins()?;

        let service = self.service.take().ok_or_else(|| {
            Error::framework(codes::CONFIG_ERROR, "no service registered")
        })?;

        let dispatcher = Arc::new(Dispatcher {
            service,
            serialization: self.opts.serialization,
            interceptors: self.interceptors,
            timeout: self.opts.timeout,
        });

        let transport_opts = ServerTransportOptions {
            address: self.opts.address.clone(),
            network: self.opts.network,
            protocol: self.opts.protocol.clone(),
            keepalive_period: self.opts.keepalive_period,
            handler: dispatcher,
        };

        let transport = transport::get_server_transport(&self.opts.protocol);
        let listening = transport.listen_and_serve(transport_opts).await?;
        tracing::info!(address = %listening.local_addr(), "serving");
        Ok(listening)
    }

    /// Serve until interrupted.
    pub async fn serve(self) -> Result<()> {
        let listening = self.start().await?;
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");
        listening.shutdown();
        Ok(())
    }
}
