use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceBuilder;
use tower::ServiceExt;

use pace_limit::Quota;
use pace_limit::Throttler;

use super::*;

use futures::future::Ready;
use futures::future::ready;

#[derive(Clone, Debug)]
struct MockService {
    pub count: Arc<AtomicUsize>,
}

impl Service<()> for MockService {
    type Response = ();
    type Error = BoxError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ()) -> Self::Future {
        self.count.fetch_add(1, Ordering::SeqCst);
        ready(Ok(()))
    }
}

fn mock() -> MockService {
    MockService {
        count: Arc::new(AtomicUsize::new(0)),
    }
}

fn gate(limits: &[(u64, usize)]) -> Arc<Throttler> {
    let quotas = limits
        .iter()
        .map(|&(ms, max)| Quota::new(Duration::from_millis(ms), max).unwrap())
        .collect::<Vec<_>>();
    Arc::new(Throttler::new(quotas).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_poll_ready_backpressure() {
    let mut service = ThrottleService::new(mock(), gate(&[(100, 2)]));

    let _ = service.ready().await.unwrap();
    service.call(()).await.unwrap();

    let _ = service.ready().await.unwrap();
    service.call(()).await.unwrap();

    // The third request must stay Pending while the window is full
    let mut ready_fut = service.ready();
    tokio::select! {
        _ = &mut ready_fut => panic!("Should be throttled!"),
        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
    }

    tokio::time::advance(Duration::from_millis(110)).await;

    ready_fut.await.expect("Should recover");
    service.call(()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_queued_multi_window_gate() {
    let mut service = ThrottleService::new(mock(), gate(&[(50, 1), (200, 2)]));

    service.ready().await.unwrap().call(()).await.unwrap();

    tokio::time::advance(Duration::from_millis(50)).await;
    service.ready().await.unwrap().call(()).await.unwrap();

    // The 50ms window has room again shortly, but the 200ms window holds
    // the third request back until the opening burst ages out.
    let mut ready_fut = service.ready();
    tokio::select! {
        _ = &mut ready_fut => panic!("200ms window should still be full"),
        _ = tokio::time::sleep(Duration::from_millis(100)) => {}
    }

    tokio::time::advance(Duration::from_millis(60)).await;
    ready_fut.await.expect("Should admit once both windows clear");
    service.call(()).await.unwrap();
}

#[tokio::test]
async fn test_fail_fast_rejects_with_retry_hint() {
    let mut service =
        ThrottleService::new(mock(), gate(&[(10_000, 1)])).with_fail_fast(true);

    service.ready().await.unwrap().call(()).await.unwrap();

    let err = service.ready().await.expect_err("window is full");
    assert!(matches!(
        err.downcast_ref::<PaceError>(),
        Some(PaceError::RateLimited { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_wait_limit_bounds_the_admission_wait() {
    let mut service = ThrottleService::new(mock(), gate(&[(10_000, 1)]))
        .with_wait_limit(Duration::from_millis(100));

    service.ready().await.unwrap().call(()).await.unwrap();

    // The second request may wait at most 100ms for a 10s window.
    let err = service.ready().await.expect_err("wait limit must trip");
    assert!(matches!(
        err.downcast_ref::<PaceError>(),
        Some(PaceError::WaitLimitExceeded)
    ));
}

#[tokio::test]
async fn test_layer_integration() {
    let mut service = ServiceBuilder::new()
        .layer(ThrottleLayer::new(gate(&[(1000, 100)])))
        .service(mock());

    // Verify it handles a basic request
    service.ready().await.unwrap().call(()).await.unwrap();
}

#[tokio::test]
async fn test_shared_state_across_clones() {
    let layer = ThrottleLayer::new(gate(&[(10_000, 1)]));

    let mut svc1 = layer.layer(mock());
    let mut svc2 = layer.layer(mock());

    svc1.ready().await.unwrap().call(()).await.unwrap();

    // svc2 should now be throttled because svc1 used the only slot
    assert!(futures::poll!(svc2.ready()).is_pending());
}

#[tokio::test]
async fn test_builder_ext() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut service = ServiceBuilder::new()
        .queued_throttle(gate(&[(1000, 10)]), Duration::from_secs(1))
        .service(MockService {
            count: count.clone(),
        });

    service.ready().await.unwrap().call(()).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
