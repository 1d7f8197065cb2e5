//! Integration tests for the core TokenStore operations.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;

use tokenvault::events::EventKind;
use tokenvault::store::{BatchOp, ListQuery, SearchField, StoreOptions, TokenStore};
use tokenvault::{StoreConfig, TokenVaultError};

/// Helper: build and initialize a store in a fresh temp dir.
fn ready_store() -> (TempDir, TokenStore) {
    let dir = TempDir::new().expect("create temp dir");
    let store = TokenStore::with_defaults(StoreConfig::new(dir.path()));
    store.initialize().expect("initialize store");
    (dir, store)
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn store_and_retrieve_roundtrip() {
    let (_dir, store) = ready_store();
    let payload = json!({
        "access_token": "gho_abc123",
        "refresh_token": "ghr_def456",
        "expires_at": 1_700_000_000,
    });

    let receipt = store.store("github", &payload, None).unwrap();
    assert!(receipt.size > 0);
    assert!(!receipt.checksum.is_empty());

    let found = store.retrieve("github").unwrap().expect("record present");
    assert_eq!(found.data, payload);
    assert_eq!(found.metadata.checksum, receipt.checksum);
}

#[test]
fn retrieve_absent_id_returns_none() {
    let (_dir, store) = ready_store();
    assert!(store.retrieve("nope").unwrap().is_none());
}

#[test]
fn retrieve_updates_access_statistics() {
    let (_dir, store) = ready_store();
    store.store("github", &json!({"t": "x"}), None).unwrap();

    store.retrieve("github").unwrap();
    let found = store.retrieve("github").unwrap().unwrap();
    assert_eq!(found.metadata.access_count, 2);
}

// ---------------------------------------------------------------------------
// Remove and exists
// ---------------------------------------------------------------------------

#[test]
fn remove_then_exists_false_and_retrieve_none() {
    let (_dir, store) = ready_store();
    store.store("github", &json!({"t": "x"}), None).unwrap();
    assert!(store.exists("github").unwrap());

    store.remove("github", true).unwrap();
    assert!(!store.exists("github").unwrap());
    assert!(store.retrieve("github").unwrap().is_none());
}

#[test]
fn remove_missing_id_fails_not_found() {
    let (_dir, store) = ready_store();
    assert!(matches!(
        store.remove("ghost", false),
        Err(TokenVaultError::NotFound(_))
    ));
}

#[test]
fn store_after_remove_creates_fresh_record() {
    let (_dir, store) = ready_store();
    store
        .store(
            "github",
            &json!({"t": "old"}),
            Some(StoreOptions {
                tags: vec!["old-tag".into()],
                status: None,
            }),
        )
        .unwrap();
    store.retrieve("github").unwrap();
    store.remove("github", false).unwrap();

    store.store("github", &json!({"t": "new"}), None).unwrap();
    let found = store.retrieve("github").unwrap().unwrap();

    // No tombstones: the recreated record starts over.
    assert!(found.metadata.tags.is_empty());
    assert_eq!(found.metadata.access_count, 1);
    assert_eq!(found.data, json!({"t": "new"}));
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[test]
fn update_preserves_created_at_and_tags() {
    let (_dir, store) = ready_store();
    store
        .store(
            "github",
            &json!({"t": "v1"}),
            Some(StoreOptions {
                tags: vec!["vcs".into()],
                status: None,
            }),
        )
        .unwrap();

    let before = store.retrieve("github").unwrap().unwrap().metadata;
    let receipt = store.update("github", &json!({"t": "v2"})).unwrap();
    let after = store.retrieve("github").unwrap().unwrap();

    assert_eq!(after.metadata.created_at, before.created_at);
    assert!(after.metadata.tags.contains("vcs"));
    assert_eq!(after.metadata.checksum, receipt.checksum);
    assert_eq!(after.data, json!({"t": "v2"}));
}

#[test]
fn update_missing_id_fails_not_found() {
    let (_dir, store) = ready_store();
    assert!(matches!(
        store.update("ghost", &json!({"t": "x"})),
        Err(TokenVaultError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

#[test]
fn null_payload_is_rejected_and_emits_error_event() {
    let (_dir, store) = ready_store();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    store.subscribe(move |event| {
        if let EventKind::Error { operation, .. } = &event.kind {
            sink.lock().push(operation.clone());
        }
    });

    assert!(store.store("github", &serde_json::Value::Null, None).is_err());
    assert_eq!(errors.lock().as_slice(), &["store".to_string()]);
}

#[test]
fn invalid_ids_are_rejected() {
    let (_dir, store) = ready_store();
    assert!(store.store("", &json!({"t": "x"}), None).is_err());
    assert!(store.store("bad/id", &json!({"t": "x"}), None).is_err());
}

// ---------------------------------------------------------------------------
// Not initialized
// ---------------------------------------------------------------------------

#[test]
fn operations_fail_fast_before_initialize() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::with_defaults(StoreConfig::new(dir.path()));

    assert!(matches!(
        store.store("github", &json!({"t": "x"}), None),
        Err(TokenVaultError::NotInitialized)
    ));
    assert!(matches!(
        store.list(None),
        Err(TokenVaultError::NotInitialized)
    ));
    assert!(matches!(
        store.backup(true),
        Err(TokenVaultError::NotInitialized)
    ));

    // Nothing was written apart from the directories themselves.
    assert!(!dir.path().join("storage.index").exists());
}

#[test]
fn store_on_shut_down_engine_writes_nothing_even_without_encryption() {
    let dir = TempDir::new().unwrap();
    let mut config = StoreConfig::new(dir.path());
    config.encryption_enabled = false;
    let store = TokenStore::with_defaults(config);
    store.initialize().unwrap();
    store.shutdown().unwrap();

    assert!(matches!(
        store.store("ghost", &json!({"t": "x"}), None),
        Err(TokenVaultError::NotInitialized)
    ));

    // Failing fast means no record file either, even though the
    // directories from the earlier initialize are still present.
    assert!(!dir.path().join("records").join("ghost.dat").exists());
}

#[test]
fn shutdown_makes_engine_not_ready() {
    let (_dir, store) = ready_store();
    store.store("github", &json!({"t": "x"}), None).unwrap();
    store.shutdown().unwrap();

    assert!(matches!(
        store.retrieve("github"),
        Err(TokenVaultError::NotInitialized)
    ));
}

#[test]
fn reinitialize_reloads_persisted_records() {
    let dir = TempDir::new().unwrap();
    let payload = json!({"access_token": "x"});

    {
        let store = TokenStore::with_defaults(StoreConfig::new(dir.path()));
        store.initialize().unwrap();
        store.store("github", &payload, None).unwrap();
        store.shutdown().unwrap();
    }

    // A second engine over the same directory picks up key material and
    // index from disk.
    let store = TokenStore::with_defaults(StoreConfig::new(dir.path()));
    let summary = store.initialize().unwrap();
    assert_eq!(summary.records_loaded, 1);

    let found = store.retrieve("github").unwrap().unwrap();
    assert_eq!(found.data, payload);
}

// ---------------------------------------------------------------------------
// List and search
// ---------------------------------------------------------------------------

#[test]
fn list_cardinality_tracks_store_and_remove() {
    let (_dir, store) = ready_store();
    for i in 0..5 {
        store.store(&format!("id-{i}"), &json!({"n": i}), None).unwrap();
    }
    store.remove("id-1", false).unwrap();
    store.remove("id-3", true).unwrap();

    assert_eq!(store.list(None).unwrap().len(), 3);
}

#[test]
fn list_filters_by_tags_and_paginates() {
    let (_dir, store) = ready_store();
    for (id, tag) in [("a", "oauth"), ("b", "oauth"), ("c", "apikey")] {
        store
            .store(
                id,
                &json!({"t": id}),
                Some(StoreOptions {
                    tags: vec![tag.into()],
                    status: None,
                }),
            )
            .unwrap();
    }

    let query = ListQuery {
        tags: Some(vec!["oauth".into()]),
        ..ListQuery::default()
    };
    let hits = store.list(Some(&query)).unwrap();
    assert_eq!(hits.len(), 2);

    let query = ListQuery {
        limit: Some(2),
        offset: 1,
        ..ListQuery::default()
    };
    assert_eq!(store.list(Some(&query)).unwrap().len(), 2);
}

#[test]
fn search_matches_only_requested_fields() {
    let (_dir, store) = ready_store();
    store
        .store(
            "github-prod",
            &json!({"t": "x"}),
            Some(StoreOptions {
                tags: vec!["vcs".into()],
                status: None,
            }),
        )
        .unwrap();
    store.store("slack-prod", &json!({"t": "y"}), None).unwrap();

    let by_id = store.search("github", &[SearchField::Id]).unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].id, "github-prod");

    let by_tag = store.search("vcs", &[SearchField::Tags]).unwrap();
    assert_eq!(by_tag.len(), 1);

    // "prod" is in both ids but search is scoped to tags here.
    assert!(store.search("prod", &[SearchField::Tags]).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[test]
fn batch_failures_do_not_abort_the_rest() {
    let (_dir, store) = ready_store();

    let results = store
        .batch(&[
            BatchOp::Store {
                id: "a".into(),
                payload: json!({"t": "1"}),
                options: None,
            },
            BatchOp::Retrieve {
                id: "does-not-exist".into(),
            },
            BatchOp::Store {
                id: "b".into(),
                payload: json!({"t": "2"}),
                options: None,
            },
        ])
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].ok);
    assert!(!results[1].ok);
    assert!(results[1].error.as_deref().unwrap().contains("not found"));
    assert!(results[2].ok);

    // Both valid stores are visible afterwards.
    assert_eq!(store.list(None).unwrap().len(), 2);
}

#[test]
fn batch_retrieve_returns_payload_data() {
    let (_dir, store) = ready_store();
    store.store("a", &json!({"t": "1"}), None).unwrap();

    let results = store
        .batch(&[BatchOp::Retrieve { id: "a".into() }])
        .unwrap();
    assert!(results[0].ok);
    assert_eq!(results[0].data, Some(json!({"t": "1"})));
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn lifecycle_events_are_emitted_in_order() {
    let (_dir, store) = ready_store();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |event| sink.lock().push(event.kind.clone()));

    store.store("github", &json!({"t": "x"}), None).unwrap();
    store.retrieve("github").unwrap();
    store.remove("github", true).unwrap();

    let events = seen.lock();
    assert!(matches!(events[0], EventKind::Stored { .. }));
    assert!(matches!(events[1], EventKind::Retrieved { .. }));
    assert!(matches!(events[2], EventKind::Removed { secure: true, .. }));
}

#[test]
fn read_path_failures_emit_error_events() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::with_defaults(StoreConfig::new(dir.path()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |event| {
        if let EventKind::Error { operation, .. } = &event.kind {
            sink.lock().push(operation.clone());
        }
    });

    assert!(store.exists("github").is_err());
    assert!(store.list(None).is_err());
    assert!(store.search("x", &[SearchField::Id]).is_err());
    assert!(store.stats().is_err());
    assert!(store.list_backups().is_err());

    let ops = seen.lock();
    assert_eq!(
        ops.as_slice(),
        ["exists", "list", "search", "stats", "list_backups"]
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_stores_of_distinct_ids_all_succeed() {
    let (_dir, store) = ready_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .store(&format!("worker-{i}"), &json!({"n": i}), None)
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list(None).unwrap().len(), 8);
    for i in 0..8 {
        let found = store.retrieve(&format!("worker-{i}")).unwrap().unwrap();
        assert_eq!(found.data, json!({"n": i}));
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn config_returns_defensive_copy_and_patch_merges() {
    let (_dir, store) = ready_store();

    let mut copy = store.config();
    copy.max_backup_files = 99;
    // Mutating the copy must not affect the engine.
    assert_eq!(store.config().max_backup_files, 5);

    store.update_config(tokenvault::ConfigPatch {
        max_backup_files: Some(2),
        ..Default::default()
    });
    assert_eq!(store.config().max_backup_files, 2);
    assert!(store.config().encryption_enabled);
}
