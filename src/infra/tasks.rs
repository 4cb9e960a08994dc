//! Detached background work.
//!
//! The delivery path only ever *submits* work; it never awaits it. The
//! scheduler contract is that a submitted task runs to completion even
//! after the response that triggered it has been sent. In production that
//! is the tokio runtime; tests substitute a scheduler they can drain.

use futures::future::BoxFuture;

pub trait TaskScheduler: Send + Sync {
    fn submit(&self, task: BoxFuture<'static, ()>);
}

/// Scheduler backed by `tokio::spawn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl TaskScheduler for TokioScheduler {
    fn submit(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}
