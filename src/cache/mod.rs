//! Song Studio cache system.
//!
//! Three cooperating layers between the HTTP routes and the persistence
//! gateway:
//!
//! - **Entity cache** ([`StudioCache`]): resident per-entity collections
//!   with write-through mutation and collection-level invalidation, plus
//!   selective hydration of large-object song content.
//! - **Export cache** ([`ExportCache`]): per-entity gzip blobs and
//!   time-boxed zip bundles for offline downloads.
//! - **Session store** ([`SessionStore`]): write-through HTTP session
//!   persistence with a TTL read cache.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `songstudio.toml`:
//!
//! ```toml
//! [cache]
//! warmup_on_start = true
//! song_content_limit = 200
//! bundle_ttl_secs = 300
//! # ... see config.rs for all options
//! ```

mod config;
mod entry;
mod export;
mod lock;
mod service;
mod session_store;
mod store;

pub use config::CacheConfig;
pub use entry::TimeBoxed;
pub use export::{ExportCache, ExportError};
pub use service::{SessionExport, StudioCache};
pub use session_store::SessionStore;
pub use store::{EntityStore, pitches_by_song_key, session_items_key};
