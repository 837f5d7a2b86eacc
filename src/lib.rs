//! econdash library
//!
//! Fetches economic indicator series from several providers, merges the
//! supplementary sources into the primary ones and caches the result.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod fetcher;
pub mod logging;
pub mod merge;
pub mod orchestrator;
pub mod providers;
