//! # playvault-core
//! Foundation types and traits for Playvault key custody and token swaps.

pub mod amount;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;
