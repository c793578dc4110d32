//! # API Module
//!
//! The command surface offered to other components. Every command reports a
//! closed [`ResultCode`]; entity commands carry a lock key, where `0` means
//! "no key".

pub mod result;
pub mod commands;


pub use result::ResultCode;
pub use commands::{ApplyFlags, DesignSource, Wardrobe};
