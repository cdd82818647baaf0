//! Pagination module
//!
//! # Overview
//!
//! Offset-paged collections are fetched one page at a time through a
//! caller-supplied page fetch. The engine asks for cursor 0 first, uses the
//! reported total to work out how many more pages it needs, fetches those
//! with bounded concurrency, and returns the elements in cursor order no
//! matter which page finished first.
//!
//! A failure on the first page fails the whole call. A failure on a later
//! page yields the pages that succeeded before it, flagged as truncated,
//! together with the cause.

mod engine;
pub mod remote;
mod types;

pub use engine::PaginationEngine;
pub use remote::RemoteCollection;
pub use types::{
    AggregatedCollection, CollectionError, CollectionResult, PageRequest, PageResult,
    PaginationConfig, PartialCollection,
};

#[cfg(test)]
mod tests;
