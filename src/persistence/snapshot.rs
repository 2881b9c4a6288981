//! JSON snapshot store
//!
//! The whole data set lives in one JSON document:
//!
//! ```text
//! {
//!   "players": { "<nick>": { "channel_stats": { "<network>:<#channel>": { ...record... } } } },
//!   "backups": [ { "backup_id", "network", "channel", "created_at", "records": { "<nick>": { ... } } } ]
//! }
//! ```
//!
//! Loading migrates older documents once: unknown keys are dropped, missing
//! or null values take defaults, legacy channel keys are re-normalized and
//! every record is repaired with [`PlayerChannelRecord::normalize`].
//! Every write replaces the file atomically through a temp file and rename.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    new_backup_id, to_timestamp, BackupFilter, BackupSummary, ClearReceipt, Persistence, PersistenceError,
    PersistenceResult, BACKUP_LIST_LIMIT,
};
use crate::core::clock::Timestamp;
use crate::core::key::ChannelKey;
use crate::game::level::LevelTable;
use crate::game::record::{FieldValue, PlayerChannelRecord, RecordField};

type Records = BTreeMap<(String, ChannelKey), PlayerChannelRecord>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBackup {
    backup_id: String,
    network: String,
    channel: String,
    created_at: Timestamp,
    records: BTreeMap<String, PlayerChannelRecord>,
}

#[derive(Debug, Default, Serialize)]
struct Document {
    players: BTreeMap<String, PlayerDocument>,
    backups: Vec<StoredBackup>,
}

#[derive(Debug, Default, Serialize)]
struct PlayerDocument {
    channel_stats: BTreeMap<String, PlayerChannelRecord>,
}

#[derive(Debug, Default)]
struct State {
    records: Records,
    backups: Vec<StoredBackup>,
}

/// File-backed whole-document store.
#[derive(Debug)]
pub struct JsonSnapshotStore {
    path: PathBuf,
    levels: LevelTable,
    state: Mutex<State>,
}

impl JsonSnapshotStore {
    /// Open (or start) the document at `path`.
    pub fn open(path: impl Into<PathBuf>, levels: LevelTable) -> PersistenceResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let state = migrate(&raw, &levels)?;
            info!(
                path = %path.display(),
                records = state.records.len(),
                backups = state.backups.len(),
                "loaded snapshot"
            );
            state
        } else {
            info!(path = %path.display(), "no snapshot yet, starting empty");
            State::default()
        };

        Ok(Self {
            path,
            levels,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, state: &State) -> PersistenceResult<()> {
        let mut doc = Document::default();
        for ((player, key), record) in &state.records {
            doc.players
                .entry(player.clone())
                .or_default()
                .channel_stats
                .insert(key.to_string(), record.clone());
        }
        doc.backups = state.backups.clone();

        let body = serde_json::to_string_pretty(&doc)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "snapshot written");
        Ok(())
    }
}

impl Persistence for JsonSnapshotStore {
    fn get_record(&self, player: &str, key: &ChannelKey) -> PersistenceResult<PlayerChannelRecord> {
        let mut state = self.state.lock();
        let id = (player.to_string(), key.clone());
        if let Some(record) = state.records.get(&id) {
            return Ok(record.clone());
        }
        let record = PlayerChannelRecord::fresh(&self.levels);
        state.records.insert(id, record.clone());
        self.write(&state)?;
        Ok(record)
    }

    fn find_record(&self, player: &str, key: &ChannelKey) -> PersistenceResult<Option<PlayerChannelRecord>> {
        let state = self.state.lock();
        Ok(state.records.get(&(player.to_string(), key.clone())).cloned())
    }

    fn save_record(
        &self,
        player: &str,
        key: &ChannelKey,
        fields: &[(RecordField, FieldValue)],
    ) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        let levels = &self.levels;
        let record = state
            .records
            .entry((player.to_string(), key.clone()))
            .or_insert_with(|| PlayerChannelRecord::fresh(levels));
        let rejected = record.apply(fields);
        if !rejected.is_empty() {
            warn!(player, key = %key, ?rejected, "ignored mistyped fields");
        }
        self.write(&state)
    }

    fn channel_records(&self, key: &ChannelKey) -> PersistenceResult<Vec<(String, PlayerChannelRecord)>> {
        let state = self.state.lock();
        Ok(state
            .records
            .iter()
            .filter(|((_, k), _)| k == key)
            .map(|((player, _), record)| (player.clone(), record.clone()))
            .collect())
    }

    fn backup_and_clear(&self, key: &ChannelKey) -> PersistenceResult<ClearReceipt> {
        let mut state = self.state.lock();
        let doomed: Vec<(String, ChannelKey)> = state
            .records
            .keys()
            .filter(|(_, k)| k == key)
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Ok(ClearReceipt {
                backup_id: None,
                cleared: 0,
            });
        }

        let now = chrono::Utc::now();
        let backup_id = new_backup_id(key, now);
        let mut records = BTreeMap::new();
        for id in &doomed {
            if let Some(record) = state.records.remove(id) {
                records.insert(id.0.clone(), record);
            }
        }
        let cleared = records.len();
        state.backups.push(StoredBackup {
            backup_id: backup_id.clone(),
            network: key.network().to_string(),
            channel: key.channel().to_string(),
            created_at: to_timestamp(now),
            records,
        });
        self.write(&state)?;
        info!(key = %key, backup_id = %backup_id, cleared, "channel backed up and cleared");

        Ok(ClearReceipt {
            backup_id: Some(backup_id),
            cleared,
        })
    }

    fn restore(&self, backup_id: &str) -> PersistenceResult<usize> {
        let mut state = self.state.lock();
        let Some(backup) = state.backups.iter().find(|b| b.backup_id == backup_id).cloned() else {
            return Ok(0);
        };
        let key = ChannelKey::new(&backup.network, &backup.channel);
        for (player, record) in &backup.records {
            state.records.insert((player.clone(), key.clone()), record.clone());
        }
        self.write(&state)?;
        info!(backup_id, restored = backup.records.len(), "backup restored");
        Ok(backup.records.len())
    }

    fn list_backups(&self, filter: &BackupFilter) -> PersistenceResult<Vec<BackupSummary>> {
        let state = self.state.lock();
        Ok(state
            .backups
            .iter()
            .rev()
            .map(|b| BackupSummary {
                backup_id: b.backup_id.clone(),
                key: ChannelKey::new(&b.network, &b.channel),
                created_at: b.created_at,
                players: b.records.len(),
            })
            .filter(|s| filter.matches(&s.key))
            .take(BACKUP_LIST_LIMIT)
            .collect())
    }
}

// =============================================================================
// MIGRATION
// =============================================================================

fn migrate(raw: &str, levels: &LevelTable) -> PersistenceResult<State> {
    let doc: Value = serde_json::from_str(raw)?;
    let root = doc
        .as_object()
        .ok_or_else(|| PersistenceError::Corrupt("document root is not an object".into()))?;

    let mut state = State::default();

    if let Some(players) = root.get("players").and_then(Value::as_object) {
        for (player, entry) in players {
            let Some(stats) = entry.get("channel_stats").and_then(Value::as_object) else {
                continue;
            };
            for (raw_key, fields) in stats {
                let Some(key) = ChannelKey::parse_legacy(raw_key) else {
                    warn!(player = %player, key = %raw_key, "skipping record without network");
                    continue;
                };
                let record = migrate_record(fields, levels);
                state.records.insert((player.clone(), key), record);
            }
        }
    }

    if let Some(backups) = root.get("backups").and_then(Value::as_array) {
        for raw in backups {
            match serde_json::from_value::<StoredBackup>(raw.clone()) {
                Ok(mut backup) => {
                    backup.channel = crate::core::key::normalize_channel(&backup.channel);
                    for record in backup.records.values_mut() {
                        record.normalize(levels);
                    }
                    state.backups.push(backup);
                }
                Err(e) => warn!(error = %e, "skipping unreadable backup"),
            }
        }
    }

    Ok(state)
}

fn migrate_record(fields: &Value, levels: &LevelTable) -> PlayerChannelRecord {
    let mut record = PlayerChannelRecord::fresh(levels);
    if let Some(map) = fields.as_object() {
        let updates: Vec<(RecordField, FieldValue)> = map
            .iter()
            .filter_map(|(name, value)| Some((RecordField::from_name(name)?, json_field(value)?)))
            .collect();
        record.apply(&updates);
    }
    record.normalize(levels);
    record
}

fn json_field(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => Some(FieldValue::Null),
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Int)
            .or_else(|| n.as_f64().map(FieldValue::Real)),
        Value::String(s) => s.parse::<f64>().ok().map(FieldValue::Real),
        _ => None,
    }
}
