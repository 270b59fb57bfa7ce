//! # Utility Modules
//!
//! Supporting utilities for logging, metrics and timing.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: Thread-safe observability counters
//! - **Timeout**: Async timeout wrappers

pub mod logging;
pub mod metrics;
pub mod timeout;
