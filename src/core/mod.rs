//! Configuration and error handling
//!
//! This module contains the ambient building blocks of the Wardrobe service:
//! layered configuration and the crate error type.

pub mod error;
pub mod config;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use error::{Error, Result};
pub use config::Config;
