//! Ratewarden - per-key fixed-window rate limiting
//!
//! This crate decides whether the next request for a caller-chosen key may
//! proceed, under a quota of requests per fixed-length window. Keys can carry
//! their own quota; everything else falls back to a configured default.
//!
//! ```
//! use std::time::Duration;
//! use ratewarden::ratelimit::RateLimiter;
//!
//! let limiter = RateLimiter::new();
//! limiter
//!     .set_custom_limit("api-key-1", 2, Some(Duration::from_secs(30)))
//!     .unwrap();
//!
//! assert!(limiter.is_allowed("api-key-1"));
//! assert!(limiter.is_allowed("api-key-1"));
//! assert!(!limiter.is_allowed("api-key-1"));
//! assert_eq!(limiter.rate_limit_info("api-key-1").remaining, 0);
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod telemetry;
