//! Interceptor chains for both peers.
//!
//! Interceptors wrap the terminal operation in continuation style: each one
//! receives the context and a `next` continuation, may mutate the context,
//! may short-circuit by not calling `next`, and sees the result on the way
//! back out. Chains compose as a strict right-fold, so for `[A, B]` the
//! execution order is `A.before, B.before, terminal, B.after, A.after`.
//!
//! The request and response values themselves are captured by the terminal
//! closure, so an interceptor cannot drop or swap them, only observe the
//! context and the outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// Boxed future used throughout the handler and interceptor plumbing.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Continuation of a client-side chain; the innermost one performs the
/// serialized send.
pub type Invoker<'a> = Box<dyn FnOnce(Context) -> BoxFuture<'a, Result<()>> + Send + 'a>;

/// Client-side interceptor.
pub trait ClientInterceptor: Send + Sync {
    fn intercept<'a>(&'a self, ctx: Context, next: Invoker<'a>) -> BoxFuture<'a, Result<()>>;
}

/// Run `terminal` through `interceptors` in registration order, outermost
/// first.
pub fn client_intercept<'a>(
    interceptors: &'a [Arc<dyn ClientInterceptor>],
    ctx: Context,
    terminal: Invoker<'a>,
) -> BoxFuture<'a, Result<()>> {
    match interceptors.split_first() {
        None => terminal(ctx),
        Some((head, rest)) => head.intercept(
            ctx,
            Box::new(move |ctx| client_intercept(rest, ctx, terminal)),
        ),
    }
}

/// Continuation of a server-side chain; the innermost one decodes the
/// request, runs the handler, and yields the serialized response payload.
pub type HandlerCont<'a> = Box<dyn FnOnce(Context) -> BoxFuture<'a, Result<Vec<u8>>> + Send + 'a>;

/// Server-side interceptor.
pub trait ServerInterceptor: Send + Sync {
    fn intercept<'a>(&'a self, ctx: Context, next: HandlerCont<'a>) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Run `terminal` through `interceptors` in registration order, outermost
/// first.
pub fn server_intercept<'a>(
    interceptors: &'a [Arc<dyn ServerInterceptor>],
    ctx: Context,
    terminal: HandlerCont<'a>,
) -> BoxFuture<'a, Result<Vec<u8>>> {
    match interceptors.split_first() {
        None => terminal(ctx),
        Some((head, rest)) => head.intercept(
            ctx,
            Box::new(move |ctx| server_intercept(rest, ctx, terminal)),
        ),
    }
}
