//! Caching module for the Holocron serve crate
//!
//! Holds the single statistics snapshot slot written by the aggregator and
//! read by the statistics read path.

pub mod snapshot_cache;

pub use snapshot_cache::{
    create_snapshot_cache, MokaSnapshotCache, SharedSnapshotCache, SnapshotCache,
    StoreSnapshotCache,
};
