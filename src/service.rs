//! Service registration and dispatch.
//!
//! A [`ServiceDesc`] is an explicit table of method name → handler, built
//! either with [`ServiceBuilder`] for closure registration or assembled
//! directly by generated stubs. Handlers are monomorphized over their
//! request and response types: [`TypedHandler`] captures decode, the
//! interceptor chain, the user function, and encode in one typed unit, so
//! signature validation happens at compile time.
//!
//! Method lookup is byte-exact on the method name; registering a service
//! replaces any prior registration wholesale.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::{server_intercept, BoxFuture, HandlerCont, ServerInterceptor};
use crate::metadata::Metadata;
use crate::protocol::Request;
use crate::serialization::{Payload, SerializationType};
use crate::transport::MessageHandler;

/// Split a `/<service>/<method>` path into its two segments.
pub fn parse_service_path(path: &str) -> Result<(&str, &str)> {
    let malformed = || Error::client_msg("service path must look like /<service>/<method>");
    let rest = path.strip_prefix('/').ok_or_else(malformed)?;
    match rest.split_once('/') {
        Some((service, method))
            if !service.is_empty() && !method.is_empty() && !method.contains('/') =>
        {
            Ok((service, method))
        }
        _ => Err(malformed()),
    }
}

/// Terminal request processor for one method.
///
/// `call` receives the raw envelope payload plus the serialization scheme
/// and returns the serialized response payload; decoding, the interceptor
/// chain, and encoding all happen inside.
pub trait Handler: Send + Sync {
    fn call<'a>(
        &'a self,
        ctx: Context,
        payload: Bytes,
        scheme: SerializationType,
        interceptors: &'a [Arc<dyn ServerInterceptor>],
    ) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Wraps a typed async function as a [`Handler`].
pub struct TypedHandler<F, Req, Rsp, Fut> {
    f: Arc<F>,
    _marker: PhantomData<fn(Req) -> (Rsp, Fut)>,
}

impl<F, Req, Rsp, Fut> TypedHandler<F, Req, Rsp, Fut>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Rsp>> + Send + 'static,
    Req: Payload,
    Rsp: Payload,
{
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f), _marker: PhantomData }
    }
}

impl<F, Req, Rsp, Fut> Handler for TypedHandler<F, Req, Rsp, Fut>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Rsp>> + Send + 'static,
    Req: Payload,
    Rsp: Payload,
{
    fn call<'a>(
        &'a self,
        ctx: Context,
        payload: Bytes,
        scheme: SerializationType,
        interceptors: &'a [Arc<dyn ServerInterceptor>],
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        let f = self.f.clone();
        Box::pin(async move {
            let req = Req::unmarshal(scheme, &payload)?;
            let terminal: HandlerCont<'a> = Box::new(move |ctx| {
                Box::pin(async move {
                    let rsp = (*f)(ctx, req).await?;
                    rsp.marshal(scheme)
                })
            });
            server_intercept(interceptors, ctx, terminal).await
        })
    }
}

/// One registered method.
pub struct MethodDesc {
    pub method_name: String,
    pub handler: Arc<dyn Handler>,
}

/// A registered service: its name plus an explicit handler table.
pub struct ServiceDesc {
    pub service_name: String,
    pub methods: Vec<MethodDesc>,
}

/// Fluent construction of a [`ServiceDesc`] from typed async functions.
pub struct ServiceBuilder {
    service_name: String,
    methods: Vec<MethodDesc>,
}

impl ServiceBuilder {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), methods: Vec::new() }
    }

    /// Register a method. Re-registering a name replaces the prior
    /// handler.
    pub fn method<F, Req, Rsp, Fut>(mut self, method_name: &str, f: F) -> Self
    where
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Rsp>> + Send + 'static,
        Req: Payload,
        Rsp: Payload,
    {
        self.methods.retain(|m| m.method_name != method_name);
        self.methods.push(MethodDesc {
            method_name: method_name.to_string(),
            handler: Arc::new(TypedHandler::new(f)),
        });
        self
    }

    pub fn build(self) -> ServiceDesc {
        ServiceDesc { service_name: self.service_name, methods: self.methods }
    }
}

/// Runtime routing table for one service.
pub struct Service {
    name: String,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Service {
    pub fn from_desc(desc: ServiceDesc) -> Self {
        let handlers = desc
            .methods
            .into_iter()
            .map(|m| (m.method_name, m.handler))
            .collect();
        Self { name: desc.service_name, handlers }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn handler(&self, method: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(method)
    }
}

/// Bridges the transport to the service: envelope in, serialized response
/// payload out.
pub(crate) struct Dispatcher {
    pub(crate) service: Arc<Service>,
    pub(crate) serialization: SerializationType,
    pub(crate) interceptors: Vec<Arc<dyn ServerInterceptor>>,
    pub(crate) timeout: Option<Duration>,
}

impl MessageHandler for Dispatcher {
    fn handle<'a>(&'a self, mut ctx: Context, body: Bytes) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let request = Request::decode_from(&body)?;

            {
                let (service_name, method) = parse_service_path(&request.service_path)?;
                ctx.set_target(service_name, method);
            }
            ctx.set_metadata(Metadata::from_map(request.metadata));

            let handler = self
                .service
                .handler(ctx.method())
                .ok_or_else(|| Error::server_internal("handlers is nil"))?
                .clone();

            let payload = Bytes::from(request.payload);
            let fut = handler.call(ctx, payload, self.serialization, &self.interceptors);
            match self.timeout {
                Some(t) => tokio::time::timeout(t, fut)
                    .await
                    .map_err(|_| Error::DeadlineExceeded)?,
                None => fut.await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct EchoMsg {
        msg: String,
    }

    crate::impl_payload_serde!(EchoMsg);

    fn echo_service() -> Arc<Service> {
        let desc = ServiceBuilder::new("echo")
            .method("Say", |_ctx: Context, req: EchoMsg| async move {
                Ok(EchoMsg { msg: format!("{} world", req.msg) })
            })
            .build();
        Arc::new(Service::from_desc(desc))
    }

    fn request_body(path: &str, payload: &[u8]) -> Bytes {
        let request = Request {
            service_path: path.to_string(),
            payload: payload.to_vec(),
            metadata: Default::default(),
        };
        Bytes::from(request.encode_to_bytes())
    }

    #[test]
    fn test_parse_service_path() {
        assert_eq!(
            parse_service_path("/helloworld.Greeter/SayHello").unwrap(),
            ("helloworld.Greeter", "SayHello")
        );
        for bad in ["", "/", "//", "/svc", "svc/method", "/svc/", "//method", "/a/b/c"] {
            assert!(parse_service_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_dispatch_invokes_handler() {
        let dispatcher = Dispatcher {
            service: echo_service(),
            serialization: SerializationType::MsgPack,
            interceptors: Vec::new(),
            timeout: None,
        };

        let payload = EchoMsg { msg: "hello".to_string() }
            .marshal(SerializationType::MsgPack)
            .unwrap();
        let out = dispatcher
            .handle(Context::new(), request_body("/echo/Say", &payload))
            .await
            .unwrap();

        let rsp = EchoMsg::unmarshal(SerializationType::MsgPack, &out).unwrap();
        assert_eq!(rsp.msg, "hello world");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let dispatcher = Dispatcher {
            service: echo_service(),
            serialization: SerializationType::MsgPack,
            interceptors: Vec::new(),
            timeout: None,
        };

        let err = dispatcher
            .handle(Context::new(), request_body("/echo/Missing", &[1]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("handlers is nil"));
    }

    #[tokio::test]
    async fn test_dispatch_malformed_path() {
        let dispatcher = Dispatcher {
            service: echo_service(),
            serialization: SerializationType::MsgPack,
            interceptors: Vec::new(),
            timeout: None,
        };

        let err = dispatcher
            .handle(Context::new(), request_body("no-slashes", &[1]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::CLIENT_MSG_ERROR);
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let desc = ServiceBuilder::new("slow")
            .method("Block", |_ctx: Context, req: EchoMsg| async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(req)
            })
            .build();
        let dispatcher = Dispatcher {
            service: Arc::new(Service::from_desc(desc)),
            serialization: SerializationType::MsgPack,
            interceptors: Vec::new(),
            timeout: Some(Duration::from_millis(20)),
        };

        let payload = EchoMsg { msg: "x".to_string() }
            .marshal(SerializationType::MsgPack)
            .unwrap();
        let err = dispatcher
            .handle(Context::new(), request_body("/slow/Block", &payload))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_handler_sees_metadata_and_target() {
        let desc = ServiceBuilder::new("meta")
            .method("Check", |ctx: Context, _req: EchoMsg| async move {
                assert_eq!(ctx.service_name(), "meta");
                assert_eq!(ctx.method(), "Check");
                assert_eq!(ctx.metadata().get("trace-id"), Some(&b"t1"[..]));
                Ok(EchoMsg { msg: "ok".to_string() })
            })
            .build();
        let dispatcher = Dispatcher {
            service: Arc::new(Service::from_desc(desc)),
            serialization: SerializationType::MsgPack,
            interceptors: Vec::new(),
            timeout: None,
        };

        let payload = EchoMsg { msg: "x".to_string() }
            .marshal(SerializationType::MsgPack)
            .unwrap();
        let mut request = Request {
            service_path: "/meta/Check".to_string(),
            payload,
            metadata: Default::default(),
        };
        request.metadata.insert("trace-id".to_string(), b"t1".to_vec());

        dispatcher
            .handle(Context::new(), Bytes::from(request.encode_to_bytes()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_builder_method_reregistration_replaces() {
        let desc = ServiceBuilder::new("dup")
            .method("M", |_ctx: Context, _req: EchoMsg| async move {
                Ok(EchoMsg { msg: "first".to_string() })
            })
            .method("M", |_ctx: Context, _req: EchoMsg| async move {
                Ok(EchoMsg { msg: "second".to_string() })
            })
            .build();
        assert_eq!(desc.methods.len(), 1);

        let dispatcher = Dispatcher {
            service: Arc::new(Service::from_desc(desc)),
            serialization: SerializationType::MsgPack,
            interceptors: Vec::new(),
            timeout: None,
        };
        let payload = EchoMsg { msg: "x".to_string() }
            .marshal(SerializationType::MsgPack)
            .unwrap();
        let out = dispatcher
            .handle(Context::new(), request_body("/dup/M", &payload))
            .await
            .unwrap();
        let rsp = EchoMsg::unmarshal(SerializationType::MsgPack, &out).unwrap();
        assert_eq!(rsp.msg, "second");
    }
}
