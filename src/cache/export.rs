//! Compressed export cache.
//!
//! Holds one gzip blob per entity id (canonical JSON) and a time-boxed
//! zip bundle per entity family for "take offline" downloads. Per-item
//! compression keeps a single update O(1) in blob work; the bundle stores
//! the already-compressed blobs without recompression, so assembly is
//! concatenation and is deferred behind a freshness window.
//!
//! A blob write or delete invalidates that family's bundle immediately:
//! bundle staleness is bounded by the earlier of the TTL and the next
//! write. Bundle assembly is all-or-nothing; a truncated archive is worse
//! than an error.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::types::EntityKind;

use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::export";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode entity for export: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to compress export blob: {0}")]
    Compress(#[from] std::io::Error),
    #[error("failed to assemble export bundle: {0}")]
    Bundle(#[from] zip::result::ZipError),
}

struct Bundle {
    bytes: Bytes,
    built_at: Instant,
}

/// Per-entity compressed blobs plus lazily rebuilt zip bundles.
pub struct ExportCache {
    bundle_ttl: Duration,
    blobs: RwLock<HashMap<EntityKind, HashMap<Uuid, Bytes>>>,
    bundles: Mutex<HashMap<EntityKind, Bundle>>,
}

impl ExportCache {
    pub fn new(bundle_ttl: Duration) -> Self {
        Self {
            bundle_ttl,
            blobs: RwLock::new(HashMap::new()),
            bundles: Mutex::new(HashMap::new()),
        }
    }

    /// Compress and store one entity's canonical JSON, invalidating the
    /// family bundle.
    pub fn set<T: Serialize>(
        &self,
        kind: EntityKind,
        id: Uuid,
        entity: &T,
    ) -> Result<(), ExportError> {
        let blob = compress_json(entity)?;
        rw_write(&self.blobs, SOURCE, "blob.set")
            .entry(kind)
            .or_default()
            .insert(id, blob);
        self.invalidate_bundle(kind);
        Ok(())
    }

    /// Remove one entity's blob, invalidating the family bundle.
    pub fn delete(&self, kind: EntityKind, id: Uuid) {
        rw_write(&self.blobs, SOURCE, "blob.delete")
            .entry(kind)
            .or_default()
            .remove(&id);
        self.invalidate_bundle(kind);
    }

    /// Rebuild a family's entire blob map from freshly loaded entities.
    /// Used at warmup and on manual cache reload.
    pub fn replace_all<T: Serialize>(
        &self,
        kind: EntityKind,
        entities: &[(Uuid, T)],
    ) -> Result<(), ExportError> {
        let mut fresh = HashMap::with_capacity(entities.len());
        for (id, entity) in entities {
            fresh.insert(*id, compress_json(entity)?);
        }
        rw_write(&self.blobs, SOURCE, "blob.replace_all").insert(kind, fresh);
        self.invalidate_bundle(kind);
        Ok(())
    }

    /// Number of blobs currently held for a family.
    pub fn len(&self, kind: EntityKind) -> usize {
        rw_read(&self.blobs, SOURCE, "blob.len")
            .get(&kind)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }

    /// The family's zip bundle, rebuilt when the previous build is older
    /// than the freshness window or a blob has changed since.
    pub fn bundle(&self, kind: EntityKind) -> Result<Bytes, ExportError> {
        // The bundle mutex is held across assembly so concurrent download
        // requests share one rebuild instead of racing.
        let mut bundles = mutex_lock(&self.bundles, SOURCE, "bundle.get");
        if let Some(existing) = bundles.get(&kind)
            && existing.built_at.elapsed() < self.bundle_ttl
        {
            return Ok(existing.bytes.clone());
        }

        let started = Instant::now();
        let bytes = self.assemble(kind)?;
        let elapsed = started.elapsed();
        counter!("songstudio_export_bundle_rebuild_total", "entity" => kind.as_str()).increment(1);
        histogram!("songstudio_export_bundle_build_ms").record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            entity = kind.as_str(),
            bytes = bytes.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "rebuilt export bundle"
        );

        bundles.insert(
            kind,
            Bundle {
                bytes: bytes.clone(),
                built_at: Instant::now(),
            },
        );
        Ok(bytes)
    }

    fn assemble(&self, kind: EntityKind) -> Result<Bytes, ExportError> {
        let blobs = rw_read(&self.blobs, SOURCE, "bundle.assemble");
        let family = blobs.get(&kind);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        // Blobs are gzip already; a second pass would waste cycles for
        // nothing, so entries are stored as-is.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        if let Some(family) = family {
            let mut ids: Vec<_> = family.keys().copied().collect();
            ids.sort_unstable();
            for id in ids {
                writer.start_file(format!("{id}.json.gz"), options)?;
                writer.write_all(&family[&id])?;
            }
        }

        let cursor = writer.finish()?;
        Ok(Bytes::from(cursor.into_inner()))
    }

    fn invalidate_bundle(&self, kind: EntityKind) {
        mutex_lock(&self.bundles, SOURCE, "bundle.invalidate").remove(&kind);
    }

    /// Drop every blob and bundle. Used by full cache reload.
    pub fn clear(&self) {
        rw_write(&self.blobs, SOURCE, "clear.blobs").clear();
        mutex_lock(&self.bundles, SOURCE, "clear.bundles").clear();
    }
}

fn compress_json<T: Serialize>(entity: &T) -> Result<Bytes, ExportError> {
    let json = serde_json::to_vec(entity)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(Bytes::from(encoder.finish()?))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
    }

    fn doc(name: &str) -> Doc {
        Doc {
            name: name.to_string(),
        }
    }

    fn read_bundle(bytes: &Bytes) -> Vec<(String, Doc)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("open bundle");
        let mut docs = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).expect("bundle entry");
            let name = entry.name().to_string();
            let mut compressed = Vec::new();
            entry.read_to_end(&mut compressed).expect("read entry");
            let mut json = String::new();
            GzDecoder::new(compressed.as_slice())
                .read_to_string(&mut json)
                .expect("decompress entry");
            docs.push((name, serde_json::from_str(&json).expect("decode entry")));
        }
        docs
    }

    #[test]
    fn bundle_contains_stored_blobs() {
        let cache = ExportCache::new(Duration::from_secs(300));
        let id = Uuid::new_v4();
        cache.set(EntityKind::Songs, id, &doc("Bhajan")).unwrap();

        let bundle = cache.bundle(EntityKind::Songs).unwrap();
        let docs = read_bundle(&bundle);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, format!("{id}.json.gz"));
        assert_eq!(docs[0].1, doc("Bhajan"));
    }

    #[test]
    fn write_invalidates_bundle_before_ttl() {
        let cache = ExportCache::new(Duration::from_secs(300));
        let id = Uuid::new_v4();
        cache.set(EntityKind::Songs, id, &doc("Before")).unwrap();
        let _ = cache.bundle(EntityKind::Songs).unwrap();

        // Well inside the TTL window the update must still be visible.
        cache.set(EntityKind::Songs, id, &doc("After")).unwrap();
        let bundle = cache.bundle(EntityKind::Songs).unwrap();
        assert_eq!(read_bundle(&bundle)[0].1, doc("After"));
    }

    #[test]
    fn delete_removes_entry_from_next_bundle() {
        let cache = ExportCache::new(Duration::from_secs(300));
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        cache.set(EntityKind::Singers, keep, &doc("Keep")).unwrap();
        cache.set(EntityKind::Singers, drop, &doc("Drop")).unwrap();
        let _ = cache.bundle(EntityKind::Singers).unwrap();

        cache.delete(EntityKind::Singers, drop);
        let bundle = cache.bundle(EntityKind::Singers).unwrap();
        let docs = read_bundle(&bundle);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].1, doc("Keep"));
    }

    #[test]
    fn fresh_bundle_is_reused() {
        let cache = ExportCache::new(Duration::from_secs(300));
        cache
            .set(EntityKind::Templates, Uuid::new_v4(), &doc("T"))
            .unwrap();
        let first = cache.bundle(EntityKind::Templates).unwrap();
        let second = cache.bundle(EntityKind::Templates).unwrap();
        // Same allocation: no rebuild happened.
        assert_eq!(first.as_ptr(), second.as_ptr());
    }

    #[test]
    fn replace_all_swaps_family() {
        let cache = ExportCache::new(Duration::from_secs(300));
        cache
            .set(EntityKind::Centers, Uuid::new_v4(), &doc("Old"))
            .unwrap();

        let fresh_id = Uuid::new_v4();
        cache
            .replace_all(EntityKind::Centers, &[(fresh_id, doc("New"))])
            .unwrap();

        assert_eq!(cache.len(EntityKind::Centers), 1);
        let docs = read_bundle(&cache.bundle(EntityKind::Centers).unwrap());
        assert_eq!(docs[0].1, doc("New"));
    }

    #[test]
    fn fresh_bundle_skips_the_rebuild_counter() {
        let recorder = metrics_util::debugging::DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let cache = ExportCache::new(Duration::from_secs(300));
        cache
            .set(EntityKind::Songs, Uuid::new_v4(), &doc("Counted"))
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            let _ = cache.bundle(EntityKind::Songs).unwrap();
            let _ = cache.bundle(EntityKind::Songs).unwrap();
        });

        let rebuilds: u64 = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| {
                key.key().name() == "songstudio_export_bundle_rebuild_total"
            })
            .map(|(_, _, _, value)| match value {
                metrics_util::debugging::DebugValue::Counter(count) => count,
                _ => 0,
            })
            .sum();
        assert_eq!(rebuilds, 1);
    }

    #[test]
    fn empty_family_yields_empty_archive() {
        let cache = ExportCache::new(Duration::from_secs(300));
        let bundle = cache.bundle(EntityKind::Feedback).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bundle.to_vec())).expect("open bundle");
        assert_eq!(archive.len(), 0);
    }
}
