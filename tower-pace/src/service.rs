use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tokio::time::Instant;
use tokio::time::Sleep;
use tokio::time::sleep;
use tower::BoxError;
use tower::Service;

use pace_limit::Admission;
use pace_limit::Reason;

use crate::error::PaceError;

/// A service that holds requests in `poll_ready` until the admission gate
/// grants them.
///
/// Refusals come with a `retry_after` hint; the service parks a timer for
/// that long and re-probes the gate on wake, so a permit is only ever taken
/// against a fresh clock reading. The permit is taken *after* the inner
/// service reports ready, to avoid burning quota on a request that cannot
/// be dispatched yet.
#[derive(Debug)]
pub struct ThrottleService<G, S>
where
    G: ?Sized,
{
    inner: S,
    gate: Arc<G>,
    backoff: Option<Pin<Box<Sleep>>>,
    permit_acquired: bool,
    fail_fast: bool,
    wait_limit: Option<Duration>,
    wait_start: Option<Instant>,
    early_wake: Counter<u64>,
}

// Manually implement Clone because Pin<Box<Sleep>> cannot be cloned
impl<G, S> Clone for ThrottleService<G, S>
where
    G: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: Arc::clone(&self.gate),
            // A fresh clone starts with no parked timer and no permit
            backoff: None,
            permit_acquired: false,
            fail_fast: self.fail_fast,
            wait_limit: self.wait_limit,
            wait_start: None,
            early_wake: self.early_wake.clone(),
        }
    }
}

impl<G, S, Req> Service<Req> for ThrottleService<G, S>
where
    G: Admission + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError>,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // 1. Drain a parked backoff timer before probing again
        if let Some(ref mut timer) = self.backoff {
            match timer.as_mut().poll(cx) {
                Poll::Ready(_) => {
                    self.backoff = None;
                }
                Poll::Pending => {
                    // Woken before the backoff elapsed
                    let gate = format!("{:?}", self.gate);
                    self.early_wake.add(1, &[KeyValue::new("gate", gate)]);
                    return Poll::Pending;
                }
            }
        }

        // 2. Check inner service readiness FIRST to avoid over-consuming quota
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        // 3. Probe the gate if we don't hold a permit yet
        if !self.permit_acquired {
            if let Some(limit) = self.wait_limit {
                let start = *self.wait_start.get_or_insert(Instant::now());
                if start.elapsed() >= limit {
                    self.wait_start = None;
                    return Poll::Ready(Err(Box::new(PaceError::WaitLimitExceeded)));
                }
            }

            match self.gate.try_admit() {
                ControlFlow::Continue(()) => {
                    self.permit_acquired = true;
                    self.wait_start = None;
                }
                ControlFlow::Break(Reason::Exhausted { retry_after }) => {
                    if self.fail_fast {
                        return Poll::Ready(Err(Box::new(PaceError::RateLimited { retry_after })));
                    }

                    // Never sleep past the remaining wait budget
                    let backoff = match (self.wait_limit, self.wait_start) {
                        (Some(limit), Some(start)) => {
                            retry_after.min(limit.saturating_sub(start.elapsed()))
                        }
                        _ => retry_after,
                    };

                    let mut timer = Box::pin(sleep(backoff));
                    match timer.as_mut().poll(cx) {
                        Poll::Pending => {
                            self.backoff = Some(timer);
                            return Poll::Pending;
                        }
                        Poll::Ready(_) => {
                            // Zero-length hint; yield and re-probe
                            cx.waker().wake_by_ref();
                            return Poll::Pending;
                        }
                    }
                }
            }
        }

        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.permit_acquired = false;
        self.wait_start = None;
        self.inner.call(req)
    }
}

impl<G, S> ThrottleService<G, S>
where
    G: ?Sized,
{
    pub fn new(inner: S, gate: Arc<G>) -> Self {
        let meter = global::meter("throttle_service");

        Self {
            inner,
            gate,
            backoff: None,
            permit_acquired: false,
            fail_fast: false,
            wait_limit: None,
            wait_start: None,
            early_wake: meter.u64_counter("early_wake").build(),
        }
    }

    /// Set whether the service should fail immediately when a window is
    /// full.
    ///
    /// If `true`, the service returns [`PaceError::RateLimited`] instead of
    /// queueing until the gate opens.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Bound the total time a request may spend waiting for admission.
    ///
    /// Exceeding the limit fails the request with
    /// [`PaceError::WaitLimitExceeded`]. The limit covers the admission
    /// wait only, not the inner service's execution.
    pub fn with_wait_limit(mut self, wait_limit: Duration) -> Self {
        self.wait_limit = Some(wait_limit);
        self
    }
}
