//! Cache module for storing fetched series and bundles
//!
//! This module provides a two-tier TTL cache: a fast in-memory map mirrored to
//! a persistent store of JSON files. Expired entries are never returned by
//! `get`, but can still be read through `read` (with an `is_expired` flag) so
//! the orchestrator can fall back to stale data when a refresh fails.

mod manager;
mod store;

pub use manager::{CacheManager, CachedData, CACHE_VERSION_KEY, DEFAULT_TTL_HOURS};
pub use store::{CacheStore, FileStore, StoreError, DEFAULT_ENTRY_LIMIT};
