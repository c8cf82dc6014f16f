use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tokio::time::sleep;

use crate::Admission;
use crate::ConfigError;
use crate::Quota;
use crate::Reason;

/// The admission wait was cancelled before a slot was granted.
///
/// Nothing was recorded against any window; the throttler state is exactly
/// as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("admission wait was cancelled before a slot was granted")]
pub struct Cancelled;

/// Ring of the most recent grant instants for one quota.
///
/// The slot under the cursor is always the oldest entry, because grants
/// overwrite slots in chronological order. `None` marks a slot that has
/// never been written, which admits unconditionally.
#[derive(Debug)]
struct GrantLog {
    slots: Vec<Option<Instant>>,
    cursor: usize,
}

impl GrantLog {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            cursor: 0,
        }
    }

    /// When the slot about to be overwritten leaves `window`, if it is
    /// still inside it as of `now`.
    fn blocked_until(&self, window: Duration, now: Instant) -> Option<Instant> {
        let oldest = self.slots[self.cursor]?;
        let frees_at = oldest + window;
        (now < frees_at).then_some(frees_at)
    }

    fn record(&mut self, now: Instant) {
        self.slots[self.cursor] = Some(now);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }
}

/// A throttler enforcing several sliding execution quotas at once.
///
/// Admission is granted only when one more execution fits in *every*
/// configured [`Quota`], judged against a single snapshot of "now"; the
/// grant is then recorded against all quotas in the same critical section.
/// One `Throttler` is meant to be shared across many concurrent callers via
/// `Arc`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use pace_limit::Quota;
/// use pace_limit::Throttler;
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() {
/// let throttler = Throttler::new(vec![
///     Quota::new(Duration::from_millis(50), 5).unwrap(),
///     Quota::new(Duration::from_millis(200), 8).unwrap(),
/// ])
/// .unwrap();
///
/// throttler.acquire().await;
/// # }
/// ```
#[derive(Debug)]
pub struct Throttler {
    quotas: Vec<Quota>,
    // One lock over all logs: every window must be checked against the same
    // snapshot of now and the same log state.
    logs: Mutex<Vec<GrantLog>>,
}

impl Throttler {
    /// Creates a throttler enforcing all of `quotas`.
    ///
    /// Each quota gets a ring of exactly `max_executions` slots, so the
    /// first `max_executions` admissions for that window are free.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoQuotas`] if `quotas` is empty. Per-quota
    /// validation happens in [`Quota::new`].
    pub fn new(quotas: impl IntoIterator<Item = Quota>) -> Result<Self, ConfigError> {
        let quotas: Vec<Quota> = quotas.into_iter().collect();
        if quotas.is_empty() {
            return Err(ConfigError::NoQuotas);
        }
        let logs = quotas
            .iter()
            .map(|quota| GrantLog::with_capacity(quota.max_executions()))
            .collect();
        Ok(Self {
            quotas,
            logs: Mutex::new(logs),
        })
    }

    /// The quotas this throttler enforces, in configuration order.
    pub fn quotas(&self) -> &[Quota] {
        &self.quotas
    }

    /// Waits until one more execution fits in every quota, then records it.
    ///
    /// Each refusal carries a `retry_after` hint: the time until the most
    /// restrictive of the currently violated windows frees a slot. The
    /// caller sleeps that long, then re-probes with a fresh clock reading,
    /// so a waiter that wakes "too early" (because other callers changed
    /// the logs) simply loops. The lock is never held while sleeping.
    ///
    /// Grants are ordered by lock acquisition, not arrival: strict FIFO
    /// among waiters is deliberately not guaranteed. If the quotas can
    /// never be satisfied this waits forever; that is the caller's
    /// configuration to fix, not an error.
    ///
    /// Cancel-safe: dropping the returned future between polls records
    /// nothing.
    pub async fn acquire(&self) {
        loop {
            match self.try_admit() {
                ControlFlow::Continue(()) => return,
                ControlFlow::Break(Reason::Exhausted { retry_after }) => {
                    sleep(retry_after).await;
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up when `cancel`
    /// completes.
    ///
    /// The cancel future is polled before the admission probe on every
    /// cycle, so an already-completed `cancel` refuses without touching the
    /// logs, and a completion during a backoff sleep interrupts the wait.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` completes first. No execution is
    /// recorded in that case.
    pub async fn acquire_cancellable<F>(&self, cancel: F) -> Result<(), Cancelled>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        tokio::select! {
            biased;
            _ = &mut cancel => Err(Cancelled),
            _ = self.acquire() => Ok(()),
        }
    }
}

impl Admission for Throttler {
    fn try_admit(&self) -> ControlFlow<Reason> {
        // The lock is only ever held across this read-check-write, so
        // poison implies a panic inside this block.
        let mut logs = self.logs.lock().expect("lock poisoned");
        let now = Instant::now();

        let mut retry_after = Duration::ZERO;
        for (quota, log) in self.quotas.iter().zip(logs.iter()) {
            if let Some(frees_at) = log.blocked_until(quota.window(), now) {
                retry_after = retry_after.max(frees_at - now);
            }
        }

        if !retry_after.is_zero() {
            return ControlFlow::Break(Reason::Exhausted { retry_after });
        }

        for log in logs.iter_mut() {
            log.record(now);
        }
        ControlFlow::Continue(())
    }
}
