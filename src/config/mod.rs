//! # Configuration
//!
//! Process-level configuration for the controller.

pub mod controller;

pub use controller::ControllerConfig;
