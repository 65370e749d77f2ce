//! Server-side transport: accept loop, per-connection read loop, and the
//! frame-level handle pipeline.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use super::{Listening, MessageHandler, Network, ServerTransport, ServerTransportOptions};
use crate::codec::{self, Codec as _, Framer};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::BoxFuture;
use crate::protocol::Response;

/// Initial backoff after a transient accept error.
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(5);

/// Backoff ceiling.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// The built-in TCP/UDP server transport.
pub struct DefaultServerTransport;

impl ServerTransport for DefaultServerTransport {
    fn listen_and_serve(&self, opts: ServerTransportOptions) -> BoxFuture<'static, Result<Listening>> {
        Box::pin(async move {
            match opts.network {
                Network::Tcp => listen_tcp(opts).await,
                Network::Udp => listen_udp(opts).await,
            }
        })
    }
}

async fn listen_tcp(opts: ServerTransportOptions) -> Result<Listening> {
    let listener = TcpListener::bind(&opts.address).await?;
    let local_addr = listener.local_addr()?;

    let task = tokio::spawn(accept_loop(listener, opts));
    Ok(Listening::new(local_addr, task))
}

async fn accept_loop(listener: TcpListener, opts: ServerTransportOptions) -> Result<()> {
    let opts = Arc::new(opts);
    let mut backoff = Duration::ZERO;

    loop {
        let (conn, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) if is_temporary(&e) => {
                backoff = if backoff.is_zero() {
                    ACCEPT_BACKOFF_INITIAL
                } else {
                    (backoff * 2).min(ACCEPT_BACKOFF_MAX)
                };
                tracing::warn!(error = %e, ?backoff, "transient accept error");
                tokio::time::sleep(backoff).await;
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                return Err(Error::Io(e));
            }
        };
        backoff = Duration::ZERO;

        if let Err(e) = enable_keepalive(&conn, opts.keepalive_period) {
            tracing::warn!(error = %e, %peer, "keepalive setup failed");
        }

        let opts = opts.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_conn(conn, &opts).await {
                if !e.is_eof() {
                    tracing::warn!(error = %e, %peer, "connection terminated");
                }
            }
        });
    }
}

fn enable_keepalive(conn: &TcpStream, period: Option<Duration>) -> std::io::Result<()> {
    let sock = SockRef::from(conn);
    sock.set_keepalive(true)?;
    if let Some(period) = period {
        sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(period))?;
    }
    Ok(())
}

/// One task per connection: read a frame, handle it, write the response,
/// until EOF or an I/O failure. The socket closes when the task returns.
async fn handle_conn(mut conn: TcpStream, opts: &ServerTransportOptions) -> Result<()> {
    let mut framer = Framer::new();

    loop {
        let frame = framer.read_frame(&mut conn).await?;
        let response = handle_frame(frame, opts).await?;
        conn.write_all(&response).await?;
    }
}

/// Frame in, frame out. Handler failures become error envelopes and the
/// connection stays up; only protocol and I/O violations propagate.
async fn handle_frame(frame: Bytes, opts: &ServerTransportOptions) -> Result<Bytes> {
    let frame_codec = codec::get(&opts.protocol);
    let body = frame_codec.decode(frame)?;

    let ctx = Context::new();
    let result = opts.handler.handle(ctx, body).await;

    let response = match result {
        Ok(payload) => Response {
            payload,
            ret_code: crate::error::codes::OK,
            ret_msg: "success".to_string(),
        },
        Err(e) => {
            tracing::debug!(error = %e, "handler failed");
            let (ret_code, ret_msg) = e.to_ret();
            Response { payload: Vec::new(), ret_code, ret_msg }
        }
    };

    frame_codec.encode(&response.encode_to_bytes())
}

fn is_temporary(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::TimedOut
    )
}

/// UDP serving: one datagram carries one frame.
async fn listen_udp(opts: ServerTransportOptions) -> Result<Listening> {
    let socket = UdpSocket::bind(&opts.address).await?;
    let local_addr = socket.local_addr()?;

    let task = tokio::spawn(async move {
        let mut buf = vec![0u8; codec::FRAME_HEAD_LEN + codec::MAX_PAYLOAD_LENGTH as usize];
        loop {
            let (received, peer) = socket.recv_from(&mut buf).await?;
            let frame = Bytes::copy_from_slice(&buf[..received]);
            match handle_frame(frame, &opts).await {
                Ok(response) => {
                    if let Err(e) = socket.send_to(&response, peer).await {
                        tracing::warn!(error = %e, %peer, "udp reply failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, %peer, "udp frame rejected"),
            }
        }
    });
    Ok(Listening::new(local_addr, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec as _, DefaultCodec};
    use crate::protocol::Request;

    struct Echo;

    impl MessageHandler for Echo {
        fn handle<'a>(&'a self, _ctx: Context, body: Bytes) -> BoxFuture<'a, Result<Vec<u8>>> {
            Box::pin(async move {
                let request = Request::decode_from(&body)?;
                Ok(request.payload)
            })
        }
    }

    struct Failing;

    impl MessageHandler for Failing {
        fn handle<'a>(&'a self, _ctx: Context, _body: Bytes) -> BoxFuture<'a, Result<Vec<u8>>> {
            Box::pin(async { Err(Error::business(42, "nope")) })
        }
    }

    fn options(handler: Arc<dyn MessageHandler>) -> ServerTransportOptions {
        ServerTransportOptions {
            address: "127.0.0.1:0".to_string(),
            network: Network::Tcp,
            protocol: "default".to_string(),
            keepalive_period: None,
            handler,
        }
    }

    fn request_frame(payload: &[u8]) -> Vec<u8> {
        let request = Request {
            service_path: "/svc/method".to_string(),
            payload: payload.to_vec(),
            metadata: Default::default(),
        };
        DefaultCodec.encode(&request.encode_to_bytes()).unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_handle_frame_success_envelope() {
        let opts = options(Arc::new(Echo));
        let frame = Bytes::from(request_frame(b"data"));
        let out = handle_frame(frame, &opts).await.unwrap();

        let body = DefaultCodec.decode(out).unwrap();
        let response = Response::decode_from(&body).unwrap();
        assert_eq!(response.ret_code, 0);
        assert_eq!(response.payload, b"data");
    }

    #[tokio::test]
    async fn test_handle_frame_business_error_envelope() {
        let opts = options(Arc::new(Failing));
        let frame = Bytes::from(request_frame(b"data"));
        let out = handle_frame(frame, &opts).await.unwrap();

        let body = DefaultCodec.decode(out).unwrap();
        let response = Response::decode_from(&body).unwrap();
        assert_eq!(response.ret_code, 42);
        assert_eq!(response.ret_msg, "nope");
        assert!(response.payload.is_empty());
    }

    #[tokio::test]
    async fn test_temporary_error_classification() {
        assert!(is_temporary(&std::io::Error::from(
            std::io::ErrorKind::ConnectionReset
        )));
        assert!(!is_temporary(&std::io::Error::from(
            std::io::ErrorKind::PermissionDenied
        )));
    }

    #[tokio::test]
    async fn test_tcp_listener_binds_ephemeral_port() {
        let listening = DefaultServerTransport
            .listen_and_serve(options(Arc::new(Echo)))
            .await
            .unwrap();
        assert_ne!(listening.local_addr().port(), 0);
        listening.shutdown();
    }
}
