use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower::layer::util::Stack;

use pace_limit::Admission;

use crate::ThrottleLayer;

/// Service Builder Extension with additional useful functions for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Queue requests until the gate admits them, bounded by `wait_limit`
    fn queued_throttle(
        self,
        gate: Arc<dyn Admission + Send + Sync + 'static>,
        wait_limit: Duration,
    ) -> ServiceBuilder<Stack<ThrottleLayer<dyn Admission + Send + Sync + 'static>, L>>;

    /// Reject requests immediately while a window is full
    fn shedding_throttle(
        self,
        gate: Arc<dyn Admission + Send + Sync + 'static>,
    ) -> ServiceBuilder<Stack<ThrottleLayer<dyn Admission + Send + Sync + 'static>, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn queued_throttle(
        self,
        gate: Arc<dyn Admission + Send + Sync + 'static>,
        wait_limit: Duration,
    ) -> ServiceBuilder<Stack<ThrottleLayer<dyn Admission + Send + Sync + 'static>, L>> {
        self.layer(ThrottleLayer::new(gate).with_wait_limit(wait_limit))
    }

    fn shedding_throttle(
        self,
        gate: Arc<dyn Admission + Send + Sync + 'static>,
    ) -> ServiceBuilder<Stack<ThrottleLayer<dyn Admission + Send + Sync + 'static>, L>> {
        self.layer(ThrottleLayer::new(gate).with_fail_fast(true))
    }
}
