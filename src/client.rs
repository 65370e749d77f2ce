//! Client invocation pipeline.
//!
//! [`Client::invoke`] is the single entry point: serialize the request,
//! wrap it in the envelope, frame it, send it through the transport, and
//! decode the reply the same way in reverse. [`Client::call`] is the
//! convenience entry for plain struct types and forces msgpack, which is
//! the only built-in scheme that can encode arbitrary serde values.
//!
//! A non-zero `ret_code` in the response envelope surfaces as a
//! [`Error::Business`] carrying the peer's code and message verbatim.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{self, Codec as _};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::{client_intercept, ClientInterceptor, Invoker};
use crate::pool;
use crate::protocol::{Request, Response};
use crate::selector;
use crate::serialization::{Payload, SerializationType};
use crate::service::parse_service_path;
use crate::transport::{self, ClientTransport as _, ClientTransportOptions, Network};

/// Per-call configuration, builder style.
#[derive(Clone)]
pub struct CallOptions {
    pub(crate) target: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) network: Network,
    pub(crate) protocol: String,
    pub(crate) serialization: SerializationType,
    pub(crate) selector_name: String,
    pub(crate) interceptors: Vec<Arc<dyn ClientInterceptor>>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self {
            target: String::new(),
            timeout: None,
            network: Network::Tcp,
            protocol: "default".to_string(),
            serialization: SerializationType::Protobuf,
            selector_name: "default".to_string(),
            interceptors: Vec::new(),
        }
    }

    /// Endpoint address `host:port`, used when the selector defers.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Frame codec and transport name.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_serialization(mut self, serialization: SerializationType) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn with_selector_name(mut self, name: impl Into<String>) -> Self {
        self.selector_name = name.into();
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ClientInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// RPC client. Stateless and cheap to clone; connections are owned by the
/// process-wide pool.
#[derive(Clone, Default)]
pub struct Client;

impl Client {
    pub fn new() -> Self {
        Self
    }

    /// Invoke `path` with the scheme configured in `opts`.
    pub async fn invoke<Req, Rsp>(
        &self,
        mut ctx: Context,
        req: &Req,
        path: &str,
        opts: CallOptions,
    ) -> Result<Rsp>
    where
        Req: Payload + Sync,
        Rsp: Payload,
    {
        match opts.timeout {
            Some(timeout) => {
                ctx.set_deadline(std::time::Instant::now() + timeout);
                tokio::time::timeout(timeout, self.invoke_inner(ctx, req, path, opts))
                    .await
                    .map_err(|_| Error::DeadlineExceeded)?
            }
            None => self.invoke_inner(ctx, req, path, opts).await,
        }
    }

    /// Invoke `path` with msgpack serialization; the reflective entry
    /// point for plain struct types.
    pub async fn call<Req, Rsp>(
        &self,
        ctx: Context,
        path: &str,
        req: &Req,
        opts: CallOptions,
    ) -> Result<Rsp>
    where
        Req: Payload + Sync,
        Rsp: Payload,
    {
        self.invoke(ctx, req, path, opts.with_serialization(SerializationType::MsgPack))
            .await
    }

    async fn invoke_inner<Req, Rsp>(
        &self,
        mut ctx: Context,
        req: &Req,
        path: &str,
        opts: CallOptions,
    ) -> Result<Rsp>
    where
        Req: Payload + Sync,
        Rsp: Payload,
    {
        let (service_name, method) = parse_service_path(path)?;
        ctx.set_target(service_name, method);

        let interceptors = opts.interceptors.clone();
        let mut slot: Option<Rsp> = None;
        {
            let slot_ref = &mut slot;
            let opts_ref = &opts;
            let terminal: Invoker<'_> = Box::new(move |ctx| {
                Box::pin(async move {
                    *slot_ref = Some(send(ctx, req, opts_ref).await?);
                    Ok(())
                })
            });
            client_intercept(&interceptors, ctx, terminal).await?;
        }

        slot.ok_or_else(|| {
            Error::server_internal("interceptor chain completed without a response")
        })
    }
}

/// The terminal send: serialize, envelope, frame, transport, unwrap.
async fn send<Req, Rsp>(ctx: Context, req: &Req, opts: &CallOptions) -> Result<Rsp>
where
    Req: Payload + Sync,
    Rsp: Payload,
{
    let payload = req.marshal(opts.serialization)?;

    let request = Request {
        service_path: format!("/{}/{}", ctx.service_name(), ctx.method()),
        payload,
        metadata: ctx.metadata().to_map(),
    };

    let frame_codec = codec::get(&opts.protocol);
    let frame = frame_codec.encode(&request.encode_to_bytes())?;

    let transport = transport::get_client_transport(&opts.protocol);
    let transport_opts = ClientTransportOptions {
        service_name: ctx.service_name().to_string(),
        target: opts.target.clone(),
        network: opts.network,
        pool: pool::get("default"),
        selector: selector::get(&opts.selector_name),
    };

    let response_frame = transport.send(&ctx, &frame, &transport_opts).await?;
    let response_body = frame_codec.decode(response_frame)?;
    let response = Response::decode_from(&response_body)?;

    if response.ret_code != crate::error::codes::OK {
        return Err(Error::business(response.ret_code, response.ret_msg));
    }

    Rsp::unmarshal(opts.serialization, &response.payload)
}
