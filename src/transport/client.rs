//! Client-side transport: endpoint selection, connection borrow, one
//! frame out, one frame in.

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;

use super::{ClientTransport, ClientTransportOptions, Network};
use crate::codec::{FrameHeader, FRAME_HEAD_LEN, MAGIC, MAX_PAYLOAD_LENGTH};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::BoxFuture;
use crate::pool::Pool as _;
use crate::selector::Selector as _;

/// The built-in TCP/UDP client transport.
pub struct DefaultClientTransport;

impl ClientTransport for DefaultClientTransport {
    fn send<'a>(
        &'a self,
        ctx: &'a Context,
        frame: &'a [u8],
        opts: &'a ClientTransportOptions,
    ) -> BoxFuture<'a, Result<Bytes>> {
        Box::pin(async move {
            match opts.network {
                Network::Tcp => send_tcp(ctx, frame, opts).await,
                Network::Udp => send_udp(ctx, frame, opts).await,
            }
        })
    }
}

fn resolve_address(opts: &ClientTransportOptions) -> Result<String> {
    let addr = opts.selector.select(&opts.service_name)?;
    if addr.is_empty() {
        Ok(opts.target.clone())
    } else {
        Ok(addr)
    }
}

async fn send_tcp(ctx: &Context, frame: &[u8], opts: &ClientTransportOptions) -> Result<Bytes> {
    let address = resolve_address(opts)?;
    let mut conn = opts.pool.get(ctx, &address).await?;

    // Full write with a cursor; cancellation is checked between partial
    // writes. Any failure leaves the connection un-released, so the pool
    // never sees it again.
    let mut sent = 0;
    while sent < frame.len() {
        let n = conn.stream_mut().write(&frame[sent..]).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        sent += n;
        if ctx.is_expired() {
            return Err(Error::DeadlineExceeded);
        }
    }

    let response = conn.read_frame().await?;
    conn.release();
    Ok(response)
}

async fn send_udp(ctx: &Context, frame: &[u8], opts: &ClientTransportOptions) -> Result<Bytes> {
    let address = resolve_address(opts)?;
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(&address).await?;
    socket.send(frame).await?;

    let mut buf = vec![0u8; FRAME_HEAD_LEN + MAX_PAYLOAD_LENGTH as usize];
    let received = match ctx.remaining() {
        Some(budget) => tokio::time::timeout(budget, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::DeadlineExceeded)??,
        None => socket.recv(&mut buf).await?,
    };
    buf.truncate(received);

    // A datagram carries exactly one frame; validate it the way the
    // stream framer would.
    let header = FrameHeader::decode(&buf).ok_or_else(|| Error::client_msg("short frame"))?;
    if header.magic != MAGIC {
        return Err(Error::client_msg("invalid magic"));
    }
    if buf.len() != FRAME_HEAD_LEN + header.length as usize {
        return Err(Error::client_msg("datagram length mismatch"));
    }
    Ok(Bytes::from(buf))
}
