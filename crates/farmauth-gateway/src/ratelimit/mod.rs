//! Request throttling.

pub mod fixed_window;

pub use fixed_window::{RateLimitState, RateLimiter, DEFAULT_MAX_KEYS};
