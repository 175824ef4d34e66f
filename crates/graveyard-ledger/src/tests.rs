use super::*;
use graveyard_core::{
    Architecture, CoreError, InstallEquivalence, InstallIdentifier, InstallMode,
    InstallRecordEquivalence,
};
use graveyard_store::{JsonFileStore, KeyValueStore, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;

fn runtime(version: &str, architecture: Architecture) -> InstallIdentifier {
    InstallIdentifier::runtime(version, architecture)
}

fn ledger_with(value: Value) -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::with_entry(DEFAULT_LEDGER_KEY, value))
}

fn stored(ledger: &Ledger<MemoryStore>) -> Option<Value> {
    ledger.store().snapshot(DEFAULT_LEDGER_KEY)
}

fn paths(records: &[LedgerRecord]) -> Vec<&str> {
    records.iter().map(|record| record.path.as_str()).collect()
}

#[test]
fn legacy_mapping_migrates_to_single_record() {
    let ledger = ledger_with(json!({"net-3.1-x64": "/opt/dotnet/3.1-x64"}));

    let records = ledger.records().expect("must load legacy ledger");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/opt/dotnet/3.1-x64");
    assert_eq!(records[0].install.install_id, "net-3.1-x64");
    assert_eq!(records[0].install.version, "net-3.1");
    assert_eq!(records[0].install.architecture, Some(Architecture::X64));
    assert_eq!(records[0].install.install_mode, InstallMode::Runtime);

    let persisted = stored(&ledger).expect("migration must be written back");
    assert!(persisted.is_array());
    assert_eq!(persisted[0]["path"], "/opt/dotnet/3.1-x64");
    assert_eq!(persisted[0]["install"]["install_id"], "net-3.1-x64");
}

#[test]
fn migration_is_idempotent_byte_for_byte() {
    let ledger = ledger_with(json!({
        "3.1.0": "/opt/dotnet/3.1.0",
        "8.0.1~arm64~aspnetcore": "/opt/dotnet/8.0.1-arm64",
        "net-6.0-x86-global": "/usr/share/dotnet/6.0"
    }));

    ledger.records().expect("first load must migrate");
    let first = serde_json::to_vec(&stored(&ledger)).expect("must encode");

    ledger.records().expect("second load must succeed");
    let second = serde_json::to_vec(&stored(&ledger)).expect("must encode");

    assert_eq!(first, second);
}

#[test]
fn legacy_entries_migrate_in_key_order() {
    let ledger = ledger_with(json!({
        "8.0.1~x64": "/b",
        "3.1.0~x64": "/a",
        "9.0.0~x64": "/c"
    }));

    let records = ledger.records().expect("must load");
    assert_eq!(paths(&records), vec!["/a", "/b", "/c"]);
}

#[test]
fn migrate_reports_source_shape() {
    let ledger = ledger_with(json!({"3.1.0": "/a", "5.0.0~x64": "/b"}));

    let report = ledger.migrate().expect("must migrate");
    assert_eq!(report.source_shape, SourceShape::Legacy);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.record_count, 2);
    assert!(report.skipped.is_empty());

    let report = ledger.migrate().expect("must reload");
    assert_eq!(report.source_shape, SourceShape::Modern);
    assert_eq!(report.migrated, 0);
    assert_eq!(report.record_count, 2);
}

#[test]
fn missing_ledger_loads_empty_and_writes_back() {
    let ledger = Ledger::new(MemoryStore::new());

    let report = ledger.migrate().expect("must load empty ledger");
    assert_eq!(report.source_shape, SourceShape::Empty);
    assert_eq!(report.record_count, 0);
    assert_eq!(stored(&ledger), Some(json!([])));
}

#[test]
fn empty_legacy_mapping_normalizes_to_empty_record_list() {
    let ledger = ledger_with(json!({}));

    let report = ledger.migrate().expect("must migrate");
    assert_eq!(report.source_shape, SourceShape::Legacy);
    assert_eq!(report.record_count, 0);
    assert_eq!(stored(&ledger), Some(json!([])));
}

#[test]
fn add_then_remove_leaves_no_equivalent_record() {
    let ledger = Ledger::new(MemoryStore::new());
    ledger
        .add(runtime("6.0.25", Architecture::X64), "/opt/dotnet/6.0.25")
        .expect("must add unrelated");
    ledger
        .add(runtime("7.0.14", Architecture::Arm64), "/opt/dotnet/7.0.14")
        .expect("must add unrelated");

    let target = runtime("8.0.1", Architecture::X64);
    ledger
        .add(target.clone(), "/opt/dotnet/8.0.1")
        .expect("must add target");

    let removed = ledger.remove(&target).expect("must remove");
    assert_eq!(removed, 1);

    let records = ledger.records().expect("must load");
    assert!(records
        .iter()
        .all(|record| !InstallRecordEquivalence.is_equivalent(&record.install, &target)));
    assert_eq!(
        paths(&records),
        vec!["/opt/dotnet/6.0.25", "/opt/dotnet/7.0.14"]
    );
}

#[test]
fn add_keeps_duplicate_records() {
    let ledger = Ledger::new(MemoryStore::new());
    let install = runtime("8.0.1", Architecture::X64);
    ledger.add(install.clone(), "/a").expect("must add");
    ledger.add(install, "/a").expect("must add duplicate");

    assert_eq!(ledger.records().expect("must load").len(), 2);
}

#[test]
fn remove_clears_every_equivalent_record() {
    let ledger = ledger_with(json!({"8.0.1-x64": "/legacy/8.0.1"}));
    let install = runtime("8.0.1", Architecture::X64);
    ledger.add(install.clone(), "/p1").expect("must add first");
    ledger.add(install.clone(), "/p2").expect("must add second");
    ledger
        .add(runtime("8.0.1", Architecture::Arm64), "/arm")
        .expect("must add other architecture");

    let removed = ledger.remove(&install).expect("must remove");
    assert_eq!(removed, 3);
    assert_eq!(paths(&ledger.records().expect("must load")), vec!["/arm"]);
}

#[test]
fn noop_remove_preserves_content_and_still_writes_back() {
    let ledger = Ledger::new(MemoryStore::new());
    ledger
        .add(runtime("6.0.25", Architecture::X64), "/a")
        .expect("must add");
    let before = stored(&ledger);
    let updates_before = ledger.store().update_count();

    let removed = ledger
        .remove(&runtime("9.0.0", Architecture::X64))
        .expect("no-op remove must succeed");

    assert_eq!(removed, 0);
    assert_eq!(stored(&ledger), before);
    assert!(ledger.store().update_count() > updates_before);
}

#[test]
fn noop_remove_commits_pending_migration() {
    let ledger = ledger_with(json!({"3.1.0": "/opt/dotnet/3.1.0"}));

    ledger
        .remove(&runtime("9.0.0", Architecture::X64))
        .expect("must remove");

    let persisted = stored(&ledger).expect("must persist");
    assert!(persisted.is_array());
    assert_eq!(persisted[0]["path"], "/opt/dotnet/3.1.0");
}

#[test]
fn remove_uses_injected_matcher() {
    let version_only =
        |left: &InstallIdentifier, right: &InstallIdentifier| left.version == right.version;
    let ledger = Ledger::new(MemoryStore::new()).with_matcher(version_only);
    ledger
        .add(runtime("8.0.1", Architecture::X64), "/x64")
        .expect("must add");
    ledger
        .add(runtime("8.0.1", Architecture::Arm64), "/arm64")
        .expect("must add");
    ledger
        .add(runtime("6.0.0", Architecture::X64), "/six")
        .expect("must add");

    let removed = ledger
        .remove(&runtime("8.0.1", Architecture::X86))
        .expect("must remove");
    assert_eq!(removed, 2);
    assert_eq!(paths(&ledger.records().expect("must load")), vec!["/six"]);
}

#[test]
fn paths_for_lists_equivalent_records_in_order() {
    let ledger = ledger_with(json!({"8.0.1-x64": "/legacy"}));
    let install = runtime("8.0.1", Architecture::X64);
    ledger.add(install.clone(), "/fresh").expect("must add");
    ledger
        .add(runtime("8.0.2", Architecture::X64), "/other")
        .expect("must add");

    let found = ledger.paths_for(&install).expect("must list paths");
    assert_eq!(found, vec!["/legacy".to_string(), "/fresh".to_string()]);
}

#[test]
fn malformed_legacy_key_aborts_and_leaves_store_untouched() {
    let original = json!({"8.0.1~sparc": "/opt/a", "3.1.0": "/opt/b"});
    let ledger = ledger_with(original.clone());

    let err = ledger
        .add(runtime("9.0.0", Architecture::X64), "/opt/c")
        .expect_err("malformed legacy key must abort");
    match err {
        LedgerError::MalformedLegacyKey {
            install_key,
            path,
            source: CoreError::MalformedInstallKey { reason, .. },
        } => {
            assert_eq!(install_key, "8.0.1~sparc");
            assert_eq!(path, "/opt/a");
            assert!(reason.contains("unknown token"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stored(&ledger), Some(original));
    assert_eq!(ledger.store().update_count(), 0);
}

#[test]
fn malformed_legacy_key_is_skipped_under_skip_policy() {
    let ledger = ledger_with(json!({"8.0.1~sparc": "/opt/a", "3.1.0": "/opt/b"}))
        .with_malformed_key_policy(MalformedKeyPolicy::Skip);

    let report = ledger.migrate().expect("skip policy must migrate");
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].install_key, "8.0.1~sparc");
    assert_eq!(report.skipped[0].path, "/opt/a");

    assert_eq!(paths(&ledger.records().expect("must load")), vec!["/opt/b"]);
}

#[test]
fn injected_parser_drives_legacy_migration() {
    let parser = |key: &str| -> Result<InstallIdentifier, CoreError> {
        let version = key.trim_start_matches('v');
        let mut install = InstallIdentifier::new(version, None, InstallMode::Sdk, false);
        install.install_id = key.to_string();
        Ok(install)
    };
    let ledger = ledger_with(json!({"v8.0.100": "/sdk"})).with_parser(parser);

    let records = ledger.records().expect("must migrate with custom parser");
    assert_eq!(records[0].install.version, "8.0.100");
    assert_eq!(records[0].install.install_mode, InstallMode::Sdk);
    assert_eq!(records[0].install.install_id, "v8.0.100");
}

#[test]
fn corrupt_values_are_rejected_without_write_back() {
    for value in [
        json!(42),
        json!("not a ledger"),
        json!({"3.1.0": 7}),
        json!([{"path": "/missing-install"}]),
    ] {
        let ledger = ledger_with(value.clone());
        let err = ledger.records().expect_err("corrupt ledger must be rejected");
        assert!(
            matches!(err, LedgerError::CorruptLedger { .. }),
            "unexpected error for {value}: {err:?}"
        );
        assert_eq!(stored(&ledger), Some(value));
    }
}

#[test]
fn store_failure_propagates_and_keeps_prior_content() {
    let ledger = Ledger::new(MemoryStore::new());
    ledger
        .add(runtime("6.0.25", Architecture::X64), "/a")
        .expect("must add");
    let before = stored(&ledger);

    ledger.store().fail_updates(true);
    let err = ledger
        .add(runtime("8.0.1", Architecture::X64), "/b")
        .expect_err("add must fail when the store rejects updates");
    assert!(matches!(err, LedgerError::Persistence { .. }));
    assert!(err.to_string().contains(DEFAULT_LEDGER_KEY));

    let err = ledger
        .remove(&runtime("6.0.25", Architecture::X64))
        .expect_err("remove must fail when the store rejects updates");
    assert!(matches!(err, LedgerError::Persistence { .. }));
    assert_eq!(stored(&ledger), before);
}

#[test]
fn add_rejects_empty_path_without_store_io() {
    let ledger = Ledger::new(MemoryStore::new());
    let err = ledger
        .add(runtime("8.0.1", Architecture::X64), "  ")
        .expect_err("blank path must be rejected");
    assert!(matches!(err, LedgerError::InvalidPath { .. }));
    assert_eq!(ledger.store().update_count(), 0);
}

#[test]
fn custom_key_isolates_ledgers_in_one_store() {
    let store = Arc::new(MemoryStore::new());
    let workspace = Ledger::new(Arc::clone(&store)).with_key("workspace-a");
    let other = Ledger::new(Arc::clone(&store)).with_key("workspace-b");

    workspace
        .add(runtime("8.0.1", Architecture::X64), "/a")
        .expect("must add");

    assert_eq!(workspace.ledger_key(), "workspace-a");
    assert_eq!(workspace.records().expect("must load").len(), 1);
    assert!(other.records().expect("must load").is_empty());
    assert_eq!(store.snapshot(DEFAULT_LEDGER_KEY), None);
}

#[test]
fn clear_empties_tracker_without_touching_ledger() {
    let ledger = Ledger::new(MemoryStore::new());
    let persisted = runtime("8.0.1", Architecture::X64);
    let working = runtime("9.0.0", Architecture::Arm64);
    ledger.add(persisted.clone(), "/persisted").expect("must add");
    assert!(ledger.track(working.clone(), "/working"));

    assert_eq!(ledger.iterate().collect::<Vec<_>>(), vec![working]);

    let updates_before = ledger.store().update_count();
    ledger.clear();
    assert_eq!(ledger.iterate().count(), 0);
    assert!(ledger.in_progress().is_empty());
    assert_eq!(ledger.store().update_count(), updates_before);

    let reloaded = Ledger::new(MemoryStore::with_entry(
        DEFAULT_LEDGER_KEY,
        stored(&ledger).expect("must persist"),
    ));
    let records = reloaded.records().expect("must load");
    assert_eq!(records, vec![LedgerRecord::new(persisted, "/persisted")]);
}

#[test]
fn tracker_is_not_populated_by_add_or_remove() {
    let ledger = Ledger::new(MemoryStore::new());
    let install = runtime("8.0.1", Architecture::X64);
    ledger.add(install.clone(), "/a").expect("must add");
    assert_eq!(ledger.iterate().count(), 0);

    ledger.track(install.clone(), "/a");
    ledger.remove(&install).expect("must remove");
    assert_eq!(ledger.iterate().count(), 1);
}

#[test]
fn tracker_iteration_is_a_restartable_snapshot() {
    let tracker = InProgressTracker::new();
    tracker.track(runtime("6.0.0", Architecture::X64), "/six");

    let snapshot = tracker.iterate();
    tracker.track(runtime("7.0.0", Architecture::X64), "/seven");
    assert_eq!(snapshot.count(), 1);

    let first: Vec<_> = (&tracker).into_iter().collect();
    let second: Vec<_> = tracker.iterate().collect();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn tracker_collapses_identical_records_only() {
    let tracker = InProgressTracker::new();
    let install = runtime("8.0.1", Architecture::X64);
    assert!(tracker.track(install.clone(), "/a"));
    assert!(!tracker.track(install.clone(), "/a"));
    assert!(tracker.track(install, "/b"));
    assert_eq!(tracker.len(), 2);
}

#[test]
fn racing_adds_on_separate_ledgers_lose_an_update() {
    let store = Arc::new(MemoryStore::new());
    let first = Ledger::new(Arc::clone(&store));
    let second = Ledger::new(Arc::clone(&store));

    // add(8.0.1, /one) and add(9.0.0, /two) on one key: both load before
    // either persists, so the later write wins.

    let (mut first_records, _) = first.load().expect("first load");
    let (mut second_records, _) = second.load().expect("second load");

    first_records.push(LedgerRecord::new(runtime("8.0.1", Architecture::X64), "/one"));
    first.persist(&first_records).expect("first store");
    second_records.push(LedgerRecord::new(runtime("9.0.0", Architecture::X64), "/two"));
    second.persist(&second_records).expect("second store");

    let records = first.records().expect("must load");
    assert_eq!(paths(&records), vec!["/two"]);
}

#[test]
fn concurrent_adds_through_one_ledger_are_all_kept() {
    let ledger = Arc::new(Ledger::new(MemoryStore::new()));

    let handles = (0..8)
        .map(|worker| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for index in 0..25 {
                    ledger
                        .add(
                            runtime(&format!("{worker}.0.{index}"), Architecture::X64),
                            format!("/opt/dotnet/{worker}/{index}"),
                        )
                        .expect("must add");
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("worker must finish");
    }

    assert_eq!(ledger.records().expect("must load").len(), 200);
}

#[test]
fn ledger_survives_restart_on_file_store() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("state.json");
    JsonFileStore::new(&path)
        .update(DEFAULT_LEDGER_KEY, json!({"net-3.1-x64": "/opt/dotnet/3.1-x64"}))
        .expect("must seed legacy ledger");

    {
        let ledger = Ledger::new(JsonFileStore::new(&path));
        ledger
            .add(runtime("8.0.1", Architecture::X64), "/opt/dotnet/8.0.1")
            .expect("must add");
        ledger.track(runtime("9.0.0", Architecture::X64), "/tmp/in-flight");
    }

    let reopened = Ledger::new(JsonFileStore::new(&path));
    let records = reopened.records().expect("must reload");
    assert_eq!(
        paths(&records),
        vec!["/opt/dotnet/3.1-x64", "/opt/dotnet/8.0.1"]
    );
    assert_eq!(reopened.iterate().count(), 0);
}

#[test]
fn file_backed_ledgers_on_distinct_keys_keep_every_record() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("state.json");

    let handles = (0..4)
        .map(|worker| {
            let ledger = Ledger::new(JsonFileStore::new(&path)).with_key(format!("k{worker}"));
            thread::spawn(move || {
                for index in 0..50 {
                    ledger
                        .add(
                            runtime(&format!("{worker}.0.{index}"), Architecture::X64),
                            format!("/opt/dotnet/{worker}/{index}"),
                        )
                        .expect("must add");
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("worker must finish");
    }

    let counts: Vec<usize> = (0..4)
        .map(|worker| {
            Ledger::new(JsonFileStore::new(&path))
                .with_key(format!("k{worker}"))
                .records()
                .expect("must load")
                .len()
        })
        .collect();
    assert_eq!(counts, vec![50, 50, 50, 50]);
}
