//! Offline export surface: per-entity blobs and zip bundle freshness.

mod support;

use std::io::{Cursor, Read};
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde_json::Value as JsonValue;

use songstudio::application::repos::{
    CreateFeedbackParams, CreatePitchParams, CreateSingerParams, CreateSongParams,
    CreateTemplateParams, SessionItemParams, CreateSessionParams, UpdateSongParams,
};
use songstudio::cache::{CacheConfig, StudioCache};
use songstudio::domain::types::{AspectRatio, EntityKind, Gender};

use support::InMemoryGateway;

fn studio() -> (Arc<InMemoryGateway>, StudioCache) {
    let gateway = Arc::new(InMemoryGateway::new());
    let cache = StudioCache::new(&CacheConfig::default(), gateway.clone());
    (gateway, cache)
}

fn song(name: &str) -> CreateSongParams {
    CreateSongParams {
        name: name.to_string(),
        lyrics: Some(format!("{name} lyrics")),
        ..Default::default()
    }
}

fn read_bundle(bytes: &[u8]) -> Vec<(String, JsonValue)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("open bundle");
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).expect("bundle entry");
        let name = entry.name().to_string();
        let mut compressed = Vec::new();
        entry.read_to_end(&mut compressed).expect("read entry");
        let mut json = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut json)
            .expect("decompress entry");
        entries.push((name, serde_json::from_str(&json).expect("decode entry")));
    }
    entries
}

#[tokio::test]
async fn song_bundle_contains_full_songs() {
    let (_gateway, cache) = studio();
    let created = cache.create_song(song("Bundle Me")).await.unwrap();

    let bundle = cache.export_bundle(EntityKind::Songs).unwrap();
    let entries = read_bundle(&bundle);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, format!("{}.json.gz", created.song.id));
    assert_eq!(entries[0].1["name"], "Bundle Me");
    // Export payloads carry the large-object fields the light cache
    // withholds.
    assert_eq!(entries[0].1["lyrics"], "Bundle Me lyrics");
}

#[tokio::test]
async fn bundle_reflects_writes_before_ttl_expiry() {
    let (_gateway, cache) = studio();
    let created = cache.create_song(song("Version One")).await.unwrap();
    let stale = cache.export_bundle(EntityKind::Songs).unwrap();

    cache
        .update_song(
            created.song.id,
            UpdateSongParams {
                name: Some("Version Two".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Default TTL is minutes; the write must invalidate the bundle now.
    let fresh = cache.export_bundle(EntityKind::Songs).unwrap();
    assert_ne!(stale.as_ptr(), fresh.as_ptr());
    assert_eq!(read_bundle(&fresh)[0].1["name"], "Version Two");
}

#[tokio::test]
async fn unchanged_bundle_is_served_from_cache() {
    let (_gateway, cache) = studio();
    cache.create_song(song("Static")).await.unwrap();

    let first = cache.export_bundle(EntityKind::Songs).unwrap();
    let second = cache.export_bundle(EntityKind::Songs).unwrap();
    assert_eq!(first.as_ptr(), second.as_ptr());
}

#[tokio::test]
async fn deleted_entity_leaves_the_bundle() {
    let (_gateway, cache) = studio();
    let keep = cache.create_song(song("Keep")).await.unwrap();
    let gone = cache.create_song(song("Gone")).await.unwrap();

    cache.delete_song(gone.song.id).await.unwrap();

    let entries = read_bundle(&cache.export_bundle(EntityKind::Songs).unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, format!("{}.json.gz", keep.song.id));
}

#[tokio::test]
async fn warmup_seeds_every_export_family() {
    let (gateway, cache) = studio();
    cache.create_song(song("Seeded")).await.unwrap();
    cache
        .create_singer(CreateSingerParams {
            name: "Seeded Singer".to_string(),
            gender: Gender::Male,
            email: None,
            center_ids: Vec::new(),
            is_admin: false,
            editor_for: Vec::new(),
        })
        .await
        .unwrap();
    cache
        .create_template(CreateTemplateParams {
            name: "Seeded Template".to_string(),
            description: None,
            aspect_ratio: AspectRatio::Widescreen,
            slides: serde_json::json!([]),
            reference_slide: 0,
            center_id: None,
            is_default: false,
            yaml: String::new(),
        })
        .await
        .unwrap();

    // A second instance warming from the same storage sees the same
    // export surface.
    let fresh = StudioCache::new(&CacheConfig::default(), gateway);
    fresh.warmup().await;

    assert_eq!(
        read_bundle(&fresh.export_bundle(EntityKind::Songs).unwrap()).len(),
        1
    );
    assert_eq!(
        read_bundle(&fresh.export_bundle(EntityKind::Singers).unwrap()).len(),
        1
    );
    assert_eq!(
        read_bundle(&fresh.export_bundle(EntityKind::Templates).unwrap()).len(),
        1
    );
}

#[tokio::test]
async fn feedback_bundle_tracks_writes_and_warmup() {
    let (gateway, cache) = studio();
    let kept = cache
        .create_feedback(CreateFeedbackParams {
            song_id: None,
            author: Some("Listener".to_string()),
            message: "Tempo drags in the second verse".to_string(),
        })
        .await
        .unwrap();
    let removed = cache
        .create_feedback(CreateFeedbackParams {
            song_id: None,
            author: None,
            message: "Retracted".to_string(),
        })
        .await
        .unwrap();

    let entries = read_bundle(&cache.export_bundle(EntityKind::Feedback).unwrap());
    assert_eq!(entries.len(), 2);

    cache.delete_feedback(removed.id).await.unwrap();
    let entries = read_bundle(&cache.export_bundle(EntityKind::Feedback).unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, format!("{}.json.gz", kept.id));
    assert_eq!(entries[0].1["message"], "Tempo drags in the second verse");

    // A fresh instance warming from the same storage serves the same
    // feedback bundle, like every other family.
    let fresh = StudioCache::new(&CacheConfig::default(), gateway);
    fresh.warmup().await;
    let entries = read_bundle(&fresh.export_bundle(EntityKind::Feedback).unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1["author"], "Listener");
}

#[tokio::test]
async fn session_export_carries_ordered_items() {
    let (_gateway, cache) = studio();
    let one = cache.create_song(song("First")).await.unwrap();
    let two = cache.create_song(song("Second")).await.unwrap();
    let session = cache
        .create_session(CreateSessionParams {
            name: "Evening".to_string(),
            center_id: None,
        })
        .await
        .unwrap();

    cache
        .replace_session_items(
            session.id,
            &[
                SessionItemParams {
                    song_id: one.song.id,
                    singer_id: None,
                    pitch_id: None,
                },
                SessionItemParams {
                    song_id: two.song.id,
                    singer_id: None,
                    pitch_id: None,
                },
            ],
        )
        .await
        .unwrap();

    let entries = read_bundle(&cache.export_bundle(EntityKind::Sessions).unwrap());
    assert_eq!(entries.len(), 1);
    let payload = &entries[0].1;
    assert_eq!(payload["name"], "Evening");
    let items = payload["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["position"], 1);
    assert_eq!(items[1]["position"], 2);
    assert_eq!(items[0]["song_id"], one.song.id.to_string());
}

#[tokio::test]
async fn default_template_switch_refreshes_whole_family() {
    let (_gateway, cache) = studio();
    let template = |name: &str, default: bool| CreateTemplateParams {
        name: name.to_string(),
        description: None,
        aspect_ratio: AspectRatio::Standard,
        slides: serde_json::json!([]),
        reference_slide: 0,
        center_id: None,
        is_default: default,
        yaml: String::new(),
    };
    let first = cache.create_template(template("A", true)).await.unwrap();
    let second = cache.create_template(template("B", true)).await.unwrap();

    assert!(second.is_default);
    let templates = cache.templates().await.unwrap();
    let defaults: Vec<_> = templates.iter().filter(|t| t.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, second.id);

    // The export blobs must agree with the resident collection.
    let entries = read_bundle(&cache.export_bundle(EntityKind::Templates).unwrap());
    let blob_for = |id: uuid::Uuid| {
        entries
            .iter()
            .find(|(name, _)| *name == format!("{id}.json.gz"))
            .map(|(_, payload)| payload.clone())
            .unwrap()
    };
    assert_eq!(blob_for(first.id)["is_default"], false);
    assert_eq!(blob_for(second.id)["is_default"], true);
}

#[tokio::test]
async fn pitch_write_keeps_export_family_in_step() {
    let (_gateway, cache) = studio();
    let song = cache.create_song(song("Pitched")).await.unwrap();
    let singer = cache
        .create_singer(CreateSingerParams {
            name: "Voice".to_string(),
            gender: Gender::Other,
            email: None,
            center_ids: Vec::new(),
            is_admin: false,
            editor_for: Vec::new(),
        })
        .await
        .unwrap();

    let pitch = cache
        .create_pitch(CreatePitchParams {
            song_id: song.song.id,
            singer_id: singer.id,
            value: "F#".to_string(),
        })
        .await
        .unwrap();
    cache.update_pitch_value(pitch.id, "G").await.unwrap();

    let entries = read_bundle(&cache.export_bundle(EntityKind::Pitches).unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1["value"], "G");
    assert_eq!(entries[0].1["song_name"], "Pitched");
}
