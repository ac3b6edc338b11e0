use std::fs;

use serde_json::{json, Value};
use tracing::debug;
use vault_sync::clock::{Clock, ManualClock, SystemClock};
use vault_sync::Collection;
use vault_sync_store::{CollectionDb, SqliteStore, StateStore};

use crate::record::JsonRecord;

type Result<T = ()> = std::result::Result<T, Box<dyn std::error::Error>>;

/// `vsync merge <local> <remote>`: merge two snapshot files.
pub fn merge(local_path: &str, remote_path: &str, write: bool, now: Option<u64>) -> Result {
    let report = merge_files(local_path, remote_path, write, now)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn merge_files(local_path: &str, remote_path: &str, write: bool, now: Option<u64>) -> Result<Value> {
    let mut local = read_snapshot(local_path)?;
    let remote = read_snapshot(remote_path)?;
    let clock = ManualClock::new(now.unwrap_or_else(|| SystemClock.now().as_millis()));

    let report = local.merge_with(&remote, &clock)?;

    if write {
        fs::write(local_path, serde_json::to_vec_pretty(&local)?)?;
        debug!(path = local_path, records = local.len(), "wrote merged snapshot");
    }

    Ok(json!({
        "applied": report.applied,
        "forward": report.forward,
        "previousWatermark": report.previous_watermark,
        "lastMerged": report.last_merged,
    }))
}

/// `vsync inspect <db> [key]`: list keys, or describe one collection.
pub fn inspect(db_path: &str, key: Option<&str>, namespace: Option<&str>) -> Result {
    let store = SqliteStore::open(db_path)?;
    match key {
        Some(key) => inspect_collection(&store, key, namespace),
        None => inspect_list(&store, namespace),
    }
}

fn inspect_collection(store: &SqliteStore, key: &str, namespace: Option<&str>) -> Result {
    let namespaces: Vec<String> = match namespace {
        Some(ns) => vec![ns.to_string()],
        None => store.namespaces()?,
    };

    for ns in &namespaces {
        let Some(data) = store.get(ns, key)? else {
            continue;
        };
        let collection: Collection<JsonRecord> = serde_json::from_slice(&data)
            .map_err(|e| format!("invalid snapshot {ns}/{key}: {e}"))?;
        let unstamped = collection.iter().filter(|r| r.updated.is_none()).count();

        println!("Collection: {key}");
        println!("Namespace: {ns}");
        println!("Size: {} bytes", data.len());
        println!("Records: {}", collection.len());
        if unstamped > 0 {
            println!("Unstamped: {unstamped}");
        }
        println!("Last merged: {}", collection.last_merged());
        return Ok(());
    }

    Err(format!("collection '{key}' not found").into())
}

fn inspect_list(store: &SqliteStore, namespace: Option<&str>) -> Result {
    let namespaces = store.namespaces()?;

    if namespaces.is_empty() {
        println!("  (empty database)");
        return Ok(());
    }

    for ns in &namespaces {
        if namespace.is_some_and(|filter| filter != ns.as_str()) {
            continue;
        }

        let keys = store.list_keys(ns)?;
        println!("Namespace: {ns} ({} collections)", keys.len());
        for key in &keys {
            let size = store.get(ns, key)?.map(|d| d.len()).unwrap_or(0);
            println!("  {key:<40} {size:>8} B");
        }
        println!();
    }

    Ok(())
}

/// `vsync export <db> <key>`: print a stored collection.
pub fn export(db_path: &str, key: &str, namespace: &str) -> Result {
    let collection = export_collection(db_path, key, namespace)?;
    println!("{}", serde_json::to_string_pretty(&collection)?);
    Ok(())
}

fn export_collection(db_path: &str, key: &str, namespace: &str) -> Result<Collection<JsonRecord>> {
    let db = open_db(SqliteStore::open(db_path)?, namespace);
    db.load(key)?
        .ok_or_else(|| format!("collection '{key}' not found in '{namespace}'").into())
}

/// `vsync import <db> <key> <file>`: validate and store a snapshot file.
pub fn import(db_path: &str, key: &str, file: &str, namespace: &str) -> Result {
    let collection = read_snapshot(file)?;
    let mut db = open_db(SqliteStore::open(db_path)?, namespace);
    db.save(key, &collection)?;
    println!(
        "Imported {} records into {namespace}/{key} (last merged {})",
        collection.len(),
        collection.last_merged()
    );
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────

fn open_db(store: SqliteStore, namespace: &str) -> CollectionDb<SqliteStore> {
    CollectionDb::builder(store).namespace(namespace).build()
}

fn read_snapshot(path: &str) -> Result<Collection<JsonRecord>> {
    let bytes = fs::read(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    let collection =
        serde_json::from_slice(&bytes).map_err(|e| format!("invalid snapshot {path}: {e}"))?;
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use vault_sync::Timestamp;

    fn write_json(path: &Path, value: Value) -> String {
        fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn ids(set: &Value, kind: &str) -> Vec<String> {
        set[kind]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn merge_reports_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_json(
            &dir.path().join("local.json"),
            json!({
                "lastMerged": 10,
                "items": [
                    {"id": "gone", "updated": 5, "site": "a"},
                    {"id": "mine", "updated": 50, "site": "b"}
                ]
            }),
        );
        let remote = write_json(
            &dir.path().join("remote.json"),
            json!({
                "lastMerged": "1970-01-01T00:00:00.012Z",
                "items": [{"id": "theirs", "updated": 60, "site": "c"}]
            }),
        );

        let report = merge_files(&local, &remote, false, Some(1_000)).unwrap();

        assert_eq!(ids(&report["applied"], "added"), vec!["theirs"]);
        assert_eq!(ids(&report["applied"], "removed"), vec!["gone"]);
        assert_eq!(ids(&report["forward"], "added"), vec!["mine"]);
        assert_eq!(report["lastMerged"], "1970-01-01T00:00:01.000Z");
        assert_eq!(report["previousWatermark"], "1970-01-01T00:00:00.010Z");
        assert_eq!(report["forward"]["added"][0]["site"], "b");

        // Without --write the local file is untouched.
        let unchanged = read_snapshot(&local).unwrap();
        assert_eq!(unchanged.len(), 2);
    }

    #[test]
    fn merge_without_now_reads_system_clock() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_json(
            &dir.path().join("local.json"),
            json!({"lastMerged": 0, "items": [{"id": "mine", "updated": 5}]}),
        );
        let remote = write_json(
            &dir.path().join("remote.json"),
            json!({"lastMerged": 0, "items": []}),
        );

        let before = SystemClock.now();
        let report = merge_files(&local, &remote, false, None).unwrap();

        let last_merged: Timestamp = serde_json::from_value(report["lastMerged"].clone()).unwrap();
        assert!(last_merged >= before);
        assert_eq!(ids(&report["forward"], "added"), vec!["mine"]);
    }

    #[test]
    fn merge_write_persists_local() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_json(
            &dir.path().join("local.json"),
            json!({"lastMerged": 0, "items": []}),
        );
        let remote = write_json(
            &dir.path().join("remote.json"),
            json!({"lastMerged": 20, "items": [{"id": "x", "updated": 20}]}),
        );

        merge_files(&local, &remote, true, Some(1_000)).unwrap();

        let merged = read_snapshot(&local).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.last_merged(), Timestamp::from_millis(20));
    }

    #[test]
    fn merge_rejects_unstamped_remote() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_json(
            &dir.path().join("local.json"),
            json!({"lastMerged": 0, "items": []}),
        );
        let remote = write_json(
            &dir.path().join("remote.json"),
            json!({"lastMerged": 0, "items": [{"id": "x"}]}),
        );

        assert!(merge_files(&local, &remote, true, Some(1_000)).is_err());
        assert!(read_snapshot(&local).unwrap().is_empty());
    }

    #[test]
    fn import_then_export() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("vault.db");
        let db = db.to_str().unwrap();
        let file = write_json(
            &dir.path().join("snap.json"),
            json!({"lastMerged": 30, "items": [{"id": "a", "updated": 25, "note": "hi"}]}),
        );

        import(db, "v1", &file, "vaults").unwrap();
        let exported = export_collection(db, "v1", "vaults").unwrap();

        assert_eq!(exported.last_merged(), Timestamp::from_millis(30));
        assert_eq!(exported.get(&"a".to_string()).unwrap().fields["note"], "hi");
        assert!(export_collection(db, "v1", "other").is_err());
    }

    #[test]
    fn import_rejects_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("vault.db");
        let db = db.to_str().unwrap();
        let file = write_json(
            &dir.path().join("bad.json"),
            json!({"lastMerged": "yesterday", "items": []}),
        );

        assert!(import(db, "v1", &file, "vaults").is_err());
        assert!(SqliteStore::open(db).unwrap().list_keys("vaults").unwrap().is_empty());
    }
}
