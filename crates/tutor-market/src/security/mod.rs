//! Request hardening helpers shared by the public endpoints.

pub mod rate_limit;

pub use rate_limit::{RateLimiter, SlidingWindowRateLimiter};
