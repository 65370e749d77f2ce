//! Per-call context: deadline, metadata, and the resolved call target.
//!
//! A [`Context`] is cloned cheaply and flows through the whole pipeline on
//! both peers. Interceptors may mutate it before passing it to their
//! continuation. Deadlines are absolute instants; all downstream waits
//! derive their budget from [`Context::remaining`]. Absence of a deadline
//! means no timeout.

use std::time::{Duration, Instant};

use crate::metadata::Metadata;

/// Call-scoped carrier for deadline, metadata, and routing target.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    metadata: Metadata,
    service_name: String,
    method: String,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        let mut ctx = Self::new();
        ctx.set_deadline(Instant::now() + timeout);
        ctx
    }

    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` when no deadline is set,
    /// `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub(crate) fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Record the parsed call target; available to interceptors and
    /// header builders downstream.
    pub(crate) fn set_target(&mut self, service_name: &str, method: &str) {
        self.service_name = service_name.to_string();
        self.method = method.to_string();
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}
