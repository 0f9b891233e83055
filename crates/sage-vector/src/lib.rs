//! # sage-vector
//!
//! A pure-Rust embedded flat vector index with exact cosine-similarity
//! nearest-neighbor search.
//!
//! ## Features
//!
//! - **Pure Rust**: No native dependencies, compiles anywhere Rust does
//! - **Exact search**: Full scan with a cosine kernel, no recall loss
//! - **Thread-Safe**: Concurrent insert and search without torn reads
//! - **Deterministic**: Ties broken by insertion order (lower id first)
//! - **Restorable**: Rebuild from durable rows, resuming the id counter
//!
//! ## Quick Start
//!
//! ```rust
//! use sage_vector::FlatIndex;
//!
//! let index = FlatIndex::new(3).unwrap();
//!
//! let a = index.add(&[1.0, 0.0, 0.0]).unwrap();
//! let b = index.add(&[0.0, 1.0, 0.0]).unwrap();
//!
//! let hits = index.search(&[0.9, 0.1, 0.0], 2).unwrap();
//! assert_eq!(hits[0].id, a);
//! assert!(hits[0].score > hits[1].score);
//! # let _ = b;
//! ```
//!
//! The scan is CPU-bound; callers on an async runtime should run it on a
//! blocking worker (e.g. `tokio::task::spawn_blocking`) and may pass a
//! [`CancelFlag`] to abort a scan that outlives its request.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod error;
pub mod index;

// Re-exports for convenience
pub use distance::cosine_similarity;
pub use error::{Error, Result};
pub use index::{CancelFlag, FlatIndex, Hit, VectorId};
