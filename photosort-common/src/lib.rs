//! Shared types for photosort
//!
//! Common error type, layered configuration loading, and progress event
//! definitions used by the photosort engine and CLI.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
