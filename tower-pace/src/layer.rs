use std::sync::Arc;
use std::time::Duration;

use tower::Layer;

use pace_limit::Admission;

use crate::service::ThrottleService;

/// Applies a multi-window admission gate to requests.
#[derive(Debug)]
pub struct ThrottleLayer<G>
where
    G: ?Sized,
{
    gate: Arc<G>,
    fail_fast: bool,
    wait_limit: Option<Duration>,
}

impl<G> Clone for ThrottleLayer<G>
where
    G: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            fail_fast: self.fail_fast,
            wait_limit: self.wait_limit,
        }
    }
}

impl<G> ThrottleLayer<G>
where
    G: Admission + ?Sized,
{
    /// Create a ThrottleLayer around a shared admission gate.
    pub fn new(gate: Arc<G>) -> Self {
        ThrottleLayer {
            gate,
            fail_fast: false,
            wait_limit: None,
        }
    }

    /// Set whether wrapped services should fail immediately when a window
    /// is full instead of queueing.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Bound the time wrapped services may spend waiting for admission.
    pub fn with_wait_limit(mut self, wait_limit: Duration) -> Self {
        self.wait_limit = Some(wait_limit);
        self
    }
}

impl<G, S> Layer<S> for ThrottleLayer<G>
where
    G: ?Sized,
{
    type Service = ThrottleService<G, S>;

    fn layer(&self, service: S) -> Self::Service {
        let mut svc =
            ThrottleService::new(service, self.gate.clone()).with_fail_fast(self.fail_fast);
        if let Some(wait_limit) = self.wait_limit {
            svc = svc.with_wait_limit(wait_limit);
        }
        svc
    }
}
