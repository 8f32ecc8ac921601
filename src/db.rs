// 💾 Snapshot Store - persisted, versioned item collection
// One row per snapshot key: JSON payload {version, items} + SHA-256 checksum.
// Reads degrade to "no prior state"; only writes can fail.

use crate::item::{Item, ItemId};
use crate::store::FieldUpdate;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, warn};

/// Current payload format. 1 = before sub-squad, group, relations and status fields.
pub const SNAPSHOT_VERSION: u32 = 2;

// ============================================================================
// SNAPSHOT PAYLOAD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,

    #[serde(default)]
    pub items: Vec<Item>,
}

impl Snapshot {
    pub fn new(items: Vec<Item>) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            items,
        }
    }
}

/// SHA-256 of the payload text, hex encoded
pub fn compute_checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail (one per import batch / accepted field mutation)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            key TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            payload TEXT NOT NULL,
            checksum TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SNAPSHOT READ / WRITE
// ============================================================================

/// Replace the snapshot stored under `key` (single write per import)
pub fn save_snapshot(conn: &Connection, key: &str, items: &[Item]) -> Result<()> {
    let snapshot = Snapshot::new(items.to_vec());
    let payload = serde_json::to_string(&snapshot).context("Failed to serialize snapshot")?;
    let checksum = compute_checksum(&payload);

    conn.execute(
        "INSERT INTO snapshots (key, version, payload, checksum, saved_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(key) DO UPDATE SET
            version = excluded.version,
            payload = excluded.payload,
            checksum = excluded.checksum,
            saved_at = excluded.saved_at",
        params![key, SNAPSHOT_VERSION, payload, checksum, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("Failed to write snapshot: {}", key))?;

    debug!(key, items = items.len(), "saved snapshot");
    Ok(())
}

/// Strict read: Ok(None) when absent, Err when corrupt
pub fn read_snapshot(conn: &Connection, key: &str) -> Result<Option<Snapshot>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT payload, checksum FROM snapshots WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .with_context(|| format!("Failed to read snapshot: {}", key))?;

    let Some((payload, checksum)) = row else {
        return Ok(None);
    };

    if compute_checksum(&payload) != checksum {
        bail!("Snapshot checksum mismatch: {}", key);
    }

    let snapshot: Snapshot = serde_json::from_str(&payload)
        .with_context(|| format!("Failed to parse snapshot: {}", key))?;

    if snapshot.version > SNAPSHOT_VERSION {
        warn!(
            key,
            version = snapshot.version,
            supported = SNAPSHOT_VERSION,
            "snapshot written by a newer version, loading known fields only"
        );
    }

    Ok(Some(snapshot))
}

/// Lenient read: any failure degrades to an empty prior collection
pub fn load_snapshot(conn: &Connection, key: &str) -> Vec<Item> {
    match read_snapshot(conn, key) {
        Ok(Some(snapshot)) => {
            debug!(key, version = snapshot.version, items = snapshot.items.len(), "loaded snapshot");
            snapshot.items
        }
        Ok(None) => {
            debug!(key, "no snapshot stored");
            Vec::new()
        }
        Err(e) => {
            warn!(key, error = %format!("{:#}", e), "snapshot unreadable, treating as no prior state");
            Vec::new()
        }
    }
}

// ============================================================================
// EVENT LOG
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_events(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// SNAPSHOT STORE (connection + key)
// ============================================================================

/// SnapshotStore - the persisted side of the reconciliation store
pub struct SnapshotStore {
    conn: Connection,
    key: String,
}

impl SnapshotStore {
    pub fn open(db_path: &Path, key: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        setup_database(&conn)?;
        Ok(SnapshotStore {
            conn,
            key: key.into(),
        })
    }

    pub fn open_in_memory(key: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SnapshotStore {
            conn,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn load(&self) -> Vec<Item> {
        load_snapshot(&self.conn, &self.key)
    }

    pub fn save(&self, items: &[Item]) -> Result<()> {
        save_snapshot(&self.conn, &self.key, items)
    }

    pub fn record(&self, event: &Event) -> Result<()> {
        insert_event(&self.conn, event)
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, entity_type, entity_id)
    }

    /// Persist an accepted field mutation: snapshot write + audit event
    pub fn record_update(
        &self,
        items: &[Item],
        id: ItemId,
        update: &FieldUpdate,
        actor: &str,
    ) -> Result<()> {
        self.save(items)?;

        let event = Event::new(
            "field_update",
            "item",
            &id.to_string(),
            serde_json::to_value(update)?,
            actor,
        );
        self.record(&event)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{EffortClass, ImpactClass};
    use tempfile::TempDir;

    const KEY: &str = "priorizacao_state";

    fn sample_items() -> Vec<Item> {
        let mut a = Item::new(1, "Revisar contrato");
        a.effort = Some(EffortClass::Low);
        a.impact = Some(ImpactClass::VeryHigh);
        a.notes = "falar com jurídico".to_string();
        let mut b = Item::new(2, "Migrar pagamentos");
        b.parent_id = Some(1);
        b.related_ids = [1].into_iter().collect();
        vec![a, b]
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        save_snapshot(&conn, KEY, &sample_items()).unwrap();
        let loaded = load_snapshot(&conn, KEY);

        assert_eq!(loaded, sample_items());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        save_snapshot(&conn, KEY, &sample_items()).unwrap();
        save_snapshot(&conn, KEY, &sample_items()[..1]).unwrap();

        assert_eq!(load_snapshot(&conn, KEY).len(), 1);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_missing_snapshot_is_no_prior_state() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        assert!(read_snapshot(&conn, KEY).unwrap().is_none());
        assert!(load_snapshot(&conn, KEY).is_empty());
    }

    #[test]
    fn test_tampered_payload_degrades() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        save_snapshot(&conn, KEY, &sample_items()).unwrap();

        conn.execute(
            "UPDATE snapshots SET payload = replace(payload, 'Revisar', 'Revisor') WHERE key = ?1",
            params![KEY],
        )
        .unwrap();

        let err = read_snapshot(&conn, KEY).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(load_snapshot(&conn, KEY).is_empty());
    }

    #[test]
    fn test_corrupt_json_degrades() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let payload = "{not json";
        conn.execute(
            "INSERT INTO snapshots (key, version, payload, checksum, saved_at) VALUES (?1, 2, ?2, ?3, '')",
            params![KEY, payload, compute_checksum(payload)],
        )
        .unwrap();

        assert!(read_snapshot(&conn, KEY).is_err());
        assert!(load_snapshot(&conn, KEY).is_empty());
    }

    #[test]
    fn test_version_one_payload_loads_with_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let payload = r#"{"version":1,"items":[{"id":3,"demand":"Revisar contrato","squad":"Pagamentos","effort":"High"}]}"#;
        conn.execute(
            "INSERT INTO snapshots (key, version, payload, checksum, saved_at) VALUES (?1, 1, ?2, ?3, '')",
            params![KEY, payload, compute_checksum(payload)],
        )
        .unwrap();

        let items = load_snapshot(&conn, KEY);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 3);
        assert_eq!(items[0].effort, Some(EffortClass::High));
        assert_eq!(items[0].group, "");
        assert_eq!(items[0].parent_id, None);
    }

    #[test]
    fn test_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let event = Event::new(
            "field_update",
            "item",
            "7",
            serde_json::json!({"field": "squad", "value": "Pagamentos"}),
            "test_actor",
        );
        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "item", "7").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event.event_id);
        assert_eq!(events[0].data["field"], "squad");
        assert_eq!(count_events(&conn).unwrap(), 1);
    }

    #[test]
    fn test_record_update_saves_and_audits() {
        let store = SnapshotStore::open_in_memory(KEY).unwrap();
        let mut items = sample_items();
        items[1].urgency = 4;

        store
            .record_update(&items, 2, &FieldUpdate::Urgency(4), "cli")
            .unwrap();

        assert_eq!(store.load()[1].urgency, 4);
        let events = store.events_for("item", "2").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "field_update");
        assert_eq!(events[0].data["field"], "urgency");
        assert_eq!(events[0].data["value"], 4);
    }

    #[test]
    fn test_snapshot_store_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("triage.db");

        {
            let store = SnapshotStore::open(&path, KEY).unwrap();
            store.save(&sample_items()).unwrap();
        }

        let reopened = SnapshotStore::open(&path, KEY).unwrap();
        assert_eq!(reopened.load().len(), 2);

        let other_key = SnapshotStore::open(&path, "outra_chave").unwrap();
        assert!(other_key.load().is_empty());
    }
}
