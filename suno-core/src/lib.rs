//! Core types and traits for the SunoAI backend
//!
//! This crate provides configuration, logging, the error type and the
//! session storage used by every other suno component.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
