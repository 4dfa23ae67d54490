//! Song Studio: a devotional-song library service built around a
//! write-through in-memory cache.
//!
//! The layers, outermost in:
//!
//! - [`infra::http`]: axum routes, thin shims over the cache.
//! - [`cache`]: resident entity collections, compressed export blobs,
//!   and the HTTP session store. All consistency rules live here.
//! - [`application`]: gateway traits and the error taxonomy.
//! - [`infra::db`]: the Postgres implementation of the gateway.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
