//! Background jobs run alongside the HTTP server.

pub mod cache_sweep;

pub use cache_sweep::{cache_sweep_task, CacheSweepMetrics};
