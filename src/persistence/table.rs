//! Per-field table store
//!
//! Records are kept as rows of `(player, network, channel) -> {column: value}`
//! with one column per [`RecordField`], plus a separate backup table.
//!
//! A store opened on a file is durable. Every change is appended to a
//! journal before it is applied, one checksummed line per change:
//!
//! ```text
//! [8 hex: CRC32 of json] [space] [json entry] [newline]
//!
//! entries:
//!   row         whole row (creation, compaction)
//!   set         column update
//!   archive     move a channel's rows into the backup table
//!   backup_row  one backup table row (compaction)
//!   restore     copy a backup's rows back
//! ```
//!
//! Opening replays the journal up to the first damaged line, then rewrites
//! it compacted (temp file and rename) so it holds only live rows and
//! backups.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    new_backup_id, to_timestamp, BackupFilter, BackupSummary, ClearReceipt, Persistence, PersistenceResult,
    BACKUP_LIST_LIMIT,
};
use crate::core::clock::Timestamp;
use crate::core::key::ChannelKey;
use crate::game::level::LevelTable;
use crate::game::record::{FieldValue, PlayerChannelRecord, RecordField};

type Row = BTreeMap<RecordField, FieldValue>;

/// Row columns as written to the journal, keyed by column name.
type Columns = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
struct BackupRow {
    backup_id: String,
    player: String,
    key: ChannelKey,
    created_at: Timestamp,
    columns: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Entry {
    Row {
        player: String,
        key: ChannelKey,
        columns: Columns,
    },
    Set {
        player: String,
        key: ChannelKey,
        columns: Columns,
    },
    Archive {
        backup_id: String,
        key: ChannelKey,
        created_at: Timestamp,
    },
    BackupRow {
        backup_id: String,
        player: String,
        key: ChannelKey,
        created_at: Timestamp,
        columns: Columns,
    },
    Restore {
        backup_id: String,
    },
}

fn encode_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Bool(b) => Value::Bool(b),
        FieldValue::Int(i) => Value::from(i),
        FieldValue::Real(r) => serde_json::Number::from_f64(r).map_or(Value::Null, Value::Number),
        FieldValue::Null => Value::Null,
    }
}

fn decode_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Int)
            .or_else(|| n.as_f64().map(FieldValue::Real)),
        Value::Null => Some(FieldValue::Null),
        _ => None,
    }
}

fn to_columns(row: &Row) -> Columns {
    row.iter()
        .map(|(field, value)| (field.name().to_string(), encode_value(*value)))
        .collect()
}

fn from_columns(columns: &Columns) -> Row {
    let mut row = Row::new();
    for (name, raw) in columns {
        match (RecordField::from_name(name), decode_value(raw)) {
            (Some(field), Some(value)) => {
                row.insert(field, value);
            }
            _ => debug!(column = %name, "dropped unknown journal column"),
        }
    }
    row
}

fn encode_line(entry: &Entry) -> PersistenceResult<String> {
    let body = serde_json::to_string(entry)?;
    Ok(format!("{:08x} {}\n", crc32fast::hash(body.as_bytes()), body))
}

fn decode_line(line: &str) -> Option<Entry> {
    let (crc, body) = line.split_once(' ')?;
    let crc = u32::from_str_radix(crc, 16).ok()?;
    if crc32fast::hash(body.as_bytes()) != crc {
        return None;
    }
    serde_json::from_str(body).ok()
}

#[derive(Debug)]
struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    fn append(&mut self, entry: &Entry) -> PersistenceResult<()> {
        let line = encode_line(entry)?;
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Tables {
    channel_stats: BTreeMap<(String, ChannelKey), Row>,
    channel_stats_backup: Vec<BackupRow>,
    journal: Option<Journal>,
}

impl Tables {
    /// Log `entry` (when journaled), then apply it.
    fn commit(&mut self, entry: Entry, starting: &Row) -> PersistenceResult<()> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&entry)?;
        }
        self.apply(entry, starting);
        Ok(())
    }

    fn apply(&mut self, entry: Entry, starting: &Row) {
        match entry {
            Entry::Row { player, key, columns } => {
                let mut row = starting.clone();
                row.extend(from_columns(&columns));
                self.channel_stats.insert((player, key), row);
            }
            Entry::Set { player, key, columns } => {
                self.channel_stats
                    .entry((player, key))
                    .or_insert_with(|| starting.clone())
                    .extend(from_columns(&columns));
            }
            Entry::Archive {
                backup_id,
                key,
                created_at,
            } => {
                let ids: Vec<(String, ChannelKey)> = self
                    .channel_stats
                    .keys()
                    .filter(|(_, k)| *k == key)
                    .cloned()
                    .collect();
                for id in ids {
                    if let Some(columns) = self.channel_stats.remove(&id) {
                        self.channel_stats_backup.push(BackupRow {
                            backup_id: backup_id.clone(),
                            player: id.0,
                            key: key.clone(),
                            created_at,
                            columns,
                        });
                    }
                }
            }
            Entry::BackupRow {
                backup_id,
                player,
                key,
                created_at,
                columns,
            } => {
                let mut row = starting.clone();
                row.extend(from_columns(&columns));
                self.channel_stats_backup.push(BackupRow {
                    backup_id,
                    player,
                    key,
                    created_at,
                    columns: row,
                });
            }
            Entry::Restore { backup_id } => {
                let rows: Vec<BackupRow> = self
                    .channel_stats_backup
                    .iter()
                    .filter(|r| r.backup_id == backup_id)
                    .cloned()
                    .collect();
                for row in rows {
                    self.channel_stats.insert((row.player, row.key), row.columns);
                }
            }
        }
    }

    /// Entries that rebuild the current tables from nothing.
    fn compacted(&self) -> Vec<Entry> {
        let rows = self.channel_stats.iter().map(|((player, key), row)| Entry::Row {
            player: player.clone(),
            key: key.clone(),
            columns: to_columns(row),
        });
        let backups = self.channel_stats_backup.iter().map(|b| Entry::BackupRow {
            backup_id: b.backup_id.clone(),
            player: b.player.clone(),
            key: b.key.clone(),
            created_at: b.created_at,
            columns: to_columns(&b.columns),
        });
        rows.chain(backups).collect()
    }
}

/// Per-field store, journaled to disk when opened on a file.
#[derive(Debug)]
pub struct TableStore {
    levels: LevelTable,
    starting: Row,
    tables: Mutex<Tables>,
}

impl TableStore {
    /// Store without a journal; its contents live as long as the value.
    pub fn new(levels: LevelTable) -> Self {
        let starting = PlayerChannelRecord::fresh(&levels).fields().into_iter().collect();
        Self {
            levels,
            starting,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Open (or start) the journal at `path`.
    pub fn open(path: impl Into<PathBuf>, levels: LevelTable) -> PersistenceResult<Self> {
        let path = path.into();
        let store = Self::new(levels);
        let mut tables = Tables::default();

        if path.exists() {
            let raw = fs::read(&path)?;
            let raw = String::from_utf8_lossy(&raw);
            let mut replayed = 0usize;
            for (n, line) in raw.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
                match decode_line(line) {
                    Some(entry) => {
                        tables.apply(entry, &store.starting);
                        replayed += 1;
                    }
                    None => {
                        warn!(path = %path.display(), line = n + 1, "damaged journal line, dropping the rest");
                        break;
                    }
                }
            }
            info!(
                path = %path.display(),
                replayed,
                rows = tables.channel_stats.len(),
                backups = tables.channel_stats_backup.len(),
                "replayed table journal"
            );
        } else {
            info!(path = %path.display(), "no table journal yet, starting empty");
        }

        let tmp = path.with_extension("tmp");
        let mut body = String::new();
        for entry in tables.compacted() {
            body.push_str(&encode_line(&entry)?);
        }
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;

        let file = OpenOptions::new().append(true).open(&path)?;
        tables.journal = Some(Journal { path, file });
        *store.tables.lock() = tables;
        Ok(store)
    }

    /// Journal file, if the store is durable.
    pub fn path(&self) -> Option<PathBuf> {
        self.tables.lock().journal.as_ref().map(|j| j.path.clone())
    }

    fn hydrate(&self, row: &Row) -> PlayerChannelRecord {
        let mut record = PlayerChannelRecord::fresh(&self.levels);
        let columns: Vec<(RecordField, FieldValue)> = row.iter().map(|(f, v)| (*f, *v)).collect();
        record.apply(&columns);
        record
    }
}

impl Persistence for TableStore {
    fn get_record(&self, player: &str, key: &ChannelKey) -> PersistenceResult<PlayerChannelRecord> {
        let mut tables = self.tables.lock();
        let id = (player.to_string(), key.clone());
        if let Some(row) = tables.channel_stats.get(&id) {
            return Ok(self.hydrate(row));
        }
        tables.commit(
            Entry::Row {
                player: id.0,
                key: id.1,
                columns: to_columns(&self.starting),
            },
            &self.starting,
        )?;
        Ok(self.hydrate(&self.starting))
    }

    fn find_record(&self, player: &str, key: &ChannelKey) -> PersistenceResult<Option<PlayerChannelRecord>> {
        let tables = self.tables.lock();
        Ok(tables
            .channel_stats
            .get(&(player.to_string(), key.clone()))
            .map(|row| self.hydrate(row)))
    }

    fn save_record(
        &self,
        player: &str,
        key: &ChannelKey,
        fields: &[(RecordField, FieldValue)],
    ) -> PersistenceResult<()> {
        // Type-check through a scratch record so a bad value never lands in a column
        let mut scratch = PlayerChannelRecord::fresh(&self.levels);
        let mut row = Row::new();
        for (field, value) in fields {
            if field.write(&mut scratch, *value) {
                row.insert(*field, field.read(&scratch));
            } else {
                warn!(player, key = %key, field = field.name(), "ignored mistyped field");
            }
        }

        let mut tables = self.tables.lock();
        if row.is_empty() && tables.channel_stats.contains_key(&(player.to_string(), key.clone())) {
            return Ok(());
        }
        tables.commit(
            Entry::Set {
                player: player.to_string(),
                key: key.clone(),
                columns: to_columns(&row),
            },
            &self.starting,
        )
    }

    fn channel_records(&self, key: &ChannelKey) -> PersistenceResult<Vec<(String, PlayerChannelRecord)>> {
        let tables = self.tables.lock();
        Ok(tables
            .channel_stats
            .iter()
            .filter(|((_, k), _)| k == key)
            .map(|((player, _), row)| (player.clone(), self.hydrate(row)))
            .collect())
    }

    fn backup_and_clear(&self, key: &ChannelKey) -> PersistenceResult<ClearReceipt> {
        let mut tables = self.tables.lock();
        let cleared = tables.channel_stats.keys().filter(|(_, k)| k == key).count();
        if cleared == 0 {
            return Ok(ClearReceipt {
                backup_id: None,
                cleared: 0,
            });
        }

        let now = chrono::Utc::now();
        let backup_id = new_backup_id(key, now);
        tables.commit(
            Entry::Archive {
                backup_id: backup_id.clone(),
                key: key.clone(),
                created_at: to_timestamp(now),
            },
            &self.starting,
        )?;
        info!(key = %key, backup_id = %backup_id, cleared, "channel backed up and cleared");

        Ok(ClearReceipt {
            backup_id: Some(backup_id),
            cleared,
        })
    }

    fn restore(&self, backup_id: &str) -> PersistenceResult<usize> {
        let mut tables = self.tables.lock();
        let restored = tables
            .channel_stats_backup
            .iter()
            .filter(|r| r.backup_id == backup_id)
            .count();
        if restored == 0 {
            return Ok(0);
        }
        tables.commit(
            Entry::Restore {
                backup_id: backup_id.to_string(),
            },
            &self.starting,
        )?;
        info!(backup_id, restored, "backup restored");
        Ok(restored)
    }

    fn list_backups(&self, filter: &BackupFilter) -> PersistenceResult<Vec<BackupSummary>> {
        let tables = self.tables.lock();
        let mut summaries: Vec<BackupSummary> = Vec::new();
        for row in tables.channel_stats_backup.iter().rev() {
            if !filter.matches(&row.key) {
                continue;
            }
            match summaries.iter_mut().find(|s| s.backup_id == row.backup_id) {
                Some(summary) => summary.players += 1,
                None => summaries.push(BackupSummary {
                    backup_id: row.backup_id.clone(),
                    key: row.key.clone(),
                    created_at: row.created_at,
                    players: 1,
                }),
            }
        }
        summaries.truncate(BACKUP_LIST_LIMIT);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::check_conformance;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("duckhunt_table_{}.journal", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_conformance() {
        let store = TableStore::new(LevelTable::default());
        check_conformance(&store);
    }

    #[test]
    fn test_conformance_journaled() {
        let path = temp_path();
        let store = TableStore::open(&path, LevelTable::default()).unwrap();
        assert_eq!(store.path(), Some(path.clone()));
        check_conformance(&store);
        drop(store);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_survives_reopen() {
        let path = temp_path();
        let key = ChannelKey::new("net", "#ducks");
        let backup_id = {
            let store = TableStore::open(&path, LevelTable::default()).unwrap();
            store
                .save_record(
                    "alice",
                    &key,
                    &[
                        (RecordField::Xp, FieldValue::Real(120.5)),
                        (RecordField::BestTime, FieldValue::Real(2.25)),
                        (RecordField::Jammed, FieldValue::Bool(true)),
                    ],
                )
                .unwrap();
            store.get_record("bob", &key).unwrap();
            let receipt = store.backup_and_clear(&key).unwrap();
            store
                .save_record("carol", &key, &[(RecordField::Ammo, FieldValue::Int(1))])
                .unwrap();
            receipt.backup_id.unwrap()
        };

        let store = TableStore::open(&path, LevelTable::default()).unwrap();
        let players: Vec<String> = store.channel_records(&key).unwrap().into_iter().map(|(p, _)| p).collect();
        assert_eq!(players, vec!["carol".to_string()]);
        assert_eq!(store.get_record("carol", &key).unwrap().ammo, 1);

        let listed = store.list_backups(&BackupFilter::channel(&key)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].backup_id, backup_id);
        assert_eq!(listed[0].players, 2);

        assert_eq!(store.restore(&backup_id).unwrap(), 2);
        let alice = store.find_record("alice", &key).unwrap().unwrap();
        assert_eq!(alice.xp, 120.5);
        assert_eq!(alice.best_time, Some(2.25));
        assert!(alice.jammed);
        drop(store);

        // The restore itself was journaled
        let store = TableStore::open(&path, LevelTable::default()).unwrap();
        assert_eq!(store.channel_records(&key).unwrap().len(), 3);
        assert!(!path.with_extension("tmp").exists());
        drop(store);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_damaged_tail_is_dropped() {
        let path = temp_path();
        let key = ChannelKey::new("net", "#ducks");
        {
            let store = TableStore::open(&path, LevelTable::default()).unwrap();
            store
                .save_record("alice", &key, &[(RecordField::Xp, FieldValue::Real(10.0))])
                .unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        let torn = encode_line(&Entry::Set {
            player: "alice".into(),
            key: key.clone(),
            columns: to_columns(&Row::from([(RecordField::Xp, FieldValue::Real(99.0))])),
        })
        .unwrap();
        file.write_all(torn[..torn.len() / 2].as_bytes()).unwrap();
        drop(file);

        let store = TableStore::open(&path, LevelTable::default()).unwrap();
        assert_eq!(store.get_record("alice", &key).unwrap().xp, 10.0);
        drop(store);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_line_checksum() {
        let entry = Entry::Restore {
            backup_id: "b1".into(),
        };
        let line = encode_line(&entry).unwrap();
        assert_eq!(decode_line(line.trim_end()), Some(entry));
        let tampered = line.trim_end().replace("b1", "b2");
        assert_eq!(decode_line(&tampered), None);
    }

    #[test]
    fn test_mistyped_field_is_skipped() {
        let store = TableStore::new(LevelTable::default());
        let key = ChannelKey::new("net", "#ducks");
        store
            .save_record(
                "alice",
                &key,
                &[
                    (RecordField::Jammed, FieldValue::Real(1.5)),
                    (RecordField::Ammo, FieldValue::Int(2)),
                ],
            )
            .unwrap();
        let record = store.get_record("alice", &key).unwrap();
        assert!(!record.jammed);
        assert_eq!(record.ammo, 2);
    }

    #[test]
    fn test_list_limit() {
        let store = TableStore::new(LevelTable::default());
        let key = ChannelKey::new("net", "#ducks");
        for _ in 0..25 {
            store.get_record("alice", &key).unwrap();
            store.backup_and_clear(&key).unwrap();
        }
        assert_eq!(store.list_backups(&BackupFilter::default()).unwrap().len(), BACKUP_LIST_LIMIT);
    }
}
