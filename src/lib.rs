//! # Paperboy
//!
//! A daily digest pipeline for syndicated news sources: scan each
//! configured feed for yesterday's articles, extract and clean the ones
//! worth keeping, fold them into one digest per source, and bind each
//! digest into an EPUB edition (plus a print rendition) filed in a
//! shared store.
//!
//! ## Pipeline
//!
//! 1. **Fetch**: one concurrent job per source (feed scan, bounded
//!    parallel article extraction, headline and body filtering, staging)
//! 2. **Compaction**: drain the staging pen, group by source, partition
//!    into category sections
//! 3. **Rendering**: newspaper-style EPUB per digest, print rendition
//!    flattened from it
//! 4. **Persistence**: upsert both artifacts into the shared editions
//!    table; clear staging only after everything made it through
//!
//! The library surface exists so the binary stays thin and the whole
//! run can be driven from integration tests.

#![forbid(unsafe_code)]

pub mod cli;
pub mod compact;
pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod job;
pub mod models;
pub mod render;
pub mod run;
pub mod store;
pub mod utils;
