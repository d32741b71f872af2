//! Shared utilities for the termsync crates: error codes, terminal colors
//! and poison-tolerant lock helpers.

#![deny(clippy::all)]

mod color;
pub mod error_codes;
mod sync;

pub use color::Colors;
pub use color::init as color_init;
pub use sync::mutex_lock_or_recover;
