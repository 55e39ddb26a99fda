//! Domain types for Tricorder.
//!
//! - [`TxSignature`]: A validated base58 Solana transaction signature
//! - [`ApiVersion`]: Response versions understood by the HTTP layer

mod signature;
mod version;

pub use signature::*;
pub use version::*;
