//! # pace-limit
//!
//! `pace-limit` provides admission throttling against several sliding
//! execution quotas at once.
//!
//! ## Core Philosophy
//!
//! A single [`Throttler`] enforces every configured [`Quota`]
//! simultaneously: a caller is admitted only when one more execution would
//! not overflow *any* window, and the grant is recorded against all windows
//! in the same critical section. Per quota the state is just a fixed ring of
//! the most recent grant instants, so the admission test is O(1) per window
//! with no scanning and no background timers.
//!
//! ## Key Concepts
//!
//! * **Multi-window**: one admission decision checks all quotas against the
//!   same snapshot of "now".
//! * **Cooperative waiting**: [`Throttler::acquire`] suspends for the
//!   refusal's `retry_after` hint, then re-probes with a fresh clock
//!   reading. Waiters never hold the lock while asleep.
//! * **Admission trait**: the non-blocking probe is exposed through
//!   [`Admission`] so middleware can stay generic over the gate.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use pace_limit::Quota;
//! use pace_limit::Throttler;
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let throttler = Throttler::new(vec![
//!     Quota::new(Duration::from_secs(1), 10).unwrap(),
//!     Quota::new(Duration::from_secs(60), 100).unwrap(),
//! ])
//! .unwrap();
//!
//! // Waits until one more execution fits in both windows.
//! throttler.acquire().await;
//! # }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod quota;
mod throttler;

pub use quota::ConfigError;
pub use quota::Quota;
pub use throttler::Cancelled;
pub use throttler::Throttler;

/// Reasons why an admission probe might refuse a caller.
#[derive(Debug, PartialEq)]
pub enum Reason {
    /// At least one quota window is currently full.
    ///
    /// `retry_after` is the time until the most restrictive of the violated
    /// windows frees a slot. Other windows may still refuse after that wait,
    /// so callers must re-probe rather than assume success.
    Exhausted { retry_after: Duration },
}

/// The non-blocking admission probe.
///
/// Gates must be `Send` and `Sync` so they can be shared across task
/// boundaries via `Arc`.
pub trait Admission: Debug {
    /// Attempts to admit a single execution right now.
    ///
    /// On `Continue` the execution has been recorded against every window
    /// and the caller may proceed immediately.
    ///
    /// # Errors
    ///
    /// Breaks with a [`Reason`] if any window is full.
    fn try_admit(&self) -> ControlFlow<Reason>;
}
