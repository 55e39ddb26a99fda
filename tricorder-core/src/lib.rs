//! # Tricorder Core
//!
//! Core types, errors, and traits shared by the Tricorder crates.
//!
//! - **Types**: Transaction signatures and their validation
//! - **Errors**: A single error hierarchy for fetch, RPC and validation failures
//! - **Constants**: Cache policy defaults and Solana endpoint lists
//! - **Traits**: The [`Fetcher`] seam between the cache and the slow backend
//!
//! ## Example
//!
//! ```rust
//! use tricorder_core::TxSignature;
//!
//! let raw = bs58::encode([7u8; 64]).into_string();
//! let sig = TxSignature::parse(&raw).unwrap();
//! assert_eq!(sig.as_str(), raw);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{Result, TricorderError};
pub use traits::*;
pub use types::*;
