//! # callwire
//!
//! A bidirectional RPC framework over length-prefixed binary frames on
//! stream sockets.
//!
//! Every call travels as a frame: a fixed 15-byte header followed by a
//! protobuf envelope that carries routing metadata and the user payload.
//! The payload's serialization scheme (protobuf, msgpack, json) is chosen
//! per call and is independent of the envelope. Requests are dispatched
//! server-side by `/<service>/<method>` path against a registered handler
//! table.
//!
//! ## Architecture
//!
//! - **Client**: serialize → envelope → frame → select endpoint → borrow a
//!   pooled connection → send → read one frame back → decode.
//! - **Server**: accept loop → per-connection frame loop → decode →
//!   dispatch through the interceptor chain → encode → reply.
//! - **Extension registries**: codecs, serialization schemes, selectors,
//!   load balancers, pools, transports, and plugins are all process-wide
//!   name → implementation maps with a sentinel default.
//!
//! ## Example
//!
//! ```no_run
//! use callwire::{
//!     CallOptions, Client, Context, Result, Server, ServerOptions, ServiceBuilder,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct HelloRequest {
//!     msg: String,
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct HelloReply {
//!     msg: String,
//! }
//!
//! callwire::impl_payload_serde!(HelloRequest, HelloReply);
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut server = Server::new(ServerOptions::new().with_address("127.0.0.1:8000"));
//!     server.register(
//!         ServiceBuilder::new("helloworld.Greeter")
//!             .method("SayHello", |_ctx, req: HelloRequest| async move {
//!                 Ok(HelloReply { msg: format!("{} world", req.msg) })
//!             })
//!             .build(),
//!     );
//!     let listening = server.start().await?;
//!
//!     let client = Client::new();
//!     let reply: HelloReply = client
//!         .call(
//!             Context::new(),
//!             "/helloworld.Greeter/SayHello",
//!             &HelloRequest { msg: "hello".to_string() },
//!             CallOptions::new().with_target(listening.local_addr().to_string()),
//!         )
//!         .await?;
//!     assert_eq!(reply.msg, "hello world");
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod metadata;
pub mod plugin;
pub mod pool;
pub mod protocol;
pub mod registry;
pub mod selector;
pub mod serialization;
pub mod service;
pub mod transport;

mod client;
mod server;

pub use client::{CallOptions, Client};
pub use context::Context;
pub use error::{codes, Error, Result};
pub use interceptor::{ClientInterceptor, ServerInterceptor};
pub use metadata::Metadata;
pub use serialization::{Payload, SerializationType};
pub use server::{Server, ServerOptions};
pub use service::{ServiceBuilder, ServiceDesc};
pub use transport::Network;
