//! # Controller
//!
//! Core controller modules for the env-inject controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `parser`: `.env` file parsing
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod parser;
pub mod reconciler;
pub mod server;
