//! # Tricorder Cache
//!
//! The deduplicating read-through cache at the heart of Tricorder.
//!
//! - [`TtlMap`]: concurrent map of fetch outcomes with absolute expiry
//! - [`Interlock`]: per-key single-flight gate with ticketed release
//! - [`ReadThrough`]: composes both around a [`Fetcher`](tricorder_core::Fetcher)
//! - [`spawn_sweeper`]: periodic reclamation of long-expired entries
//!
//! ## Example
//!
//! ```rust,ignore
//! use tricorder_cache::{ReadThrough, spawn_sweeper, SweepConfig};
//!
//! let reader = ReadThrough::new(fetcher);
//! spawn_sweeper(reader.cache().clone(), SweepConfig::default());
//!
//! match reader.get_or_fetch("5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnb").await {
//!     Ok(Some(tx)) => { /* serve */ }
//!     Ok(None) => { /* recently failed, suppressed */ }
//!     Err(e) => { /* fetch failed just now */ }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod interlock;
mod maintenance;
mod read_through;
mod ttl_map;

pub use interlock::{Interlock, InterlockGuard, Ticket};
pub use maintenance::{spawn_sweeper, sweep_once, SweepConfig};
pub use read_through::{CachePolicy, ReadThrough, ReadThroughStats};
pub use ttl_map::{CacheStats, Cached, TtlMap};
