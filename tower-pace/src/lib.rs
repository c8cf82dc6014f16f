//! # Tower Pace
//!
//! `tower-pace` applies a [`pace_limit`] admission gate to services in the
//! [Tower](https://github.com/tower-rs/tower) ecosystem.
//!
//! ## Behaviour
//!
//! The [`ThrottleLayer`] wraps a service so that each request must pass the
//! gate's multi-window admission check before dispatch:
//!
//! 1. **Queued mode** (default): requests park in `poll_ready` for the
//!    gate's `retry_after` hint and re-probe on wake, exerting ordinary
//!    Tower backpressure. An optional wait limit converts an excessive
//!    admission wait into [`PaceError::WaitLimitExceeded`].
//! 2. **Fail-fast mode**: a full window rejects immediately with
//!    [`PaceError::RateLimited`], carrying the retry hint.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`PaceError`], allowing automatic
//!   conversion to HTTP status codes (429, 408).

mod error;
mod ext;
mod layer;
mod service;

#[cfg(test)]
mod tests;

pub use error::PaceError;
pub use ext::ServiceBuilderExt;
pub use layer::ThrottleLayer;
pub use service::ThrottleService;
