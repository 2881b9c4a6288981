//! Persistence
//!
//! Player records live behind the [`Persistence`] trait. Two backends
//! implement it with identical observable behavior:
//!
//! - [`snapshot::JsonSnapshotStore`]: one JSON document holding every record
//!   and every backup, rewritten atomically on each save.
//! - [`table::TableStore`]: per-field rows keyed by player and channel, the
//!   shape of a relational schema, made durable by an append-only journal.
//!
//! Both are synchronous and internally locked; a record is only ever
//! referenced transiently while one command runs.

pub mod snapshot;
pub mod table;

use thiserror::Error;

use crate::core::clock::Timestamp;
use crate::core::key::ChannelKey;
use crate::game::record::{FieldValue, PlayerChannelRecord, RecordField};

pub use snapshot::JsonSnapshotStore;
pub use table::TableStore;

/// Most backups returned by one listing.
pub const BACKUP_LIST_LIMIT: usize = 20;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the backing file failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document is not valid JSON.
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored document is structurally wrong.
    #[error("corrupt storage: {0}")]
    Corrupt(String),
}

/// Result alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Outcome of clearing a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearReceipt {
    /// Backup holding the cleared records; `None` when nothing was stored.
    pub backup_id: Option<String>,
    /// Records removed.
    pub cleared: usize,
}

/// One listed backup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupSummary {
    /// Identifier accepted by [`Persistence::restore`].
    pub backup_id: String,
    /// Channel the backup was taken from.
    pub key: ChannelKey,
    /// When the backup was taken.
    pub created_at: Timestamp,
    /// Records in the backup.
    pub players: usize,
}

/// Restricts a backup listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupFilter {
    /// Only this network.
    pub network: Option<String>,
    /// Only this channel (normalized).
    pub channel: Option<String>,
}

impl BackupFilter {
    /// Backups of one channel.
    pub fn channel(key: &ChannelKey) -> Self {
        Self {
            network: Some(key.network().to_string()),
            channel: Some(key.channel().to_string()),
        }
    }

    /// Whether a backup of `key` passes the filter.
    pub fn matches(&self, key: &ChannelKey) -> bool {
        self.network.as_deref().map_or(true, |n| n == key.network())
            && self.channel.as_deref().map_or(true, |c| c == key.channel())
    }
}

/// Storage for player channel records.
pub trait Persistence: Send + Sync {
    /// The player's record, created with starting values when absent.
    fn get_record(&self, player: &str, key: &ChannelKey) -> PersistenceResult<PlayerChannelRecord>;

    /// The player's record if one exists.
    fn find_record(&self, player: &str, key: &ChannelKey) -> PersistenceResult<Option<PlayerChannelRecord>>;

    /// Write the given fields of the player's record, creating it if needed.
    fn save_record(
        &self,
        player: &str,
        key: &ChannelKey,
        fields: &[(RecordField, FieldValue)],
    ) -> PersistenceResult<()>;

    /// Every record of a channel, by player.
    fn channel_records(&self, key: &ChannelKey) -> PersistenceResult<Vec<(String, PlayerChannelRecord)>>;

    /// Snapshot a channel's records into a backup, then delete them.
    fn backup_and_clear(&self, key: &ChannelKey) -> PersistenceResult<ClearReceipt>;

    /// Put a backup's records back; returns how many were restored.
    fn restore(&self, backup_id: &str) -> PersistenceResult<usize>;

    /// Backups newest first, at most [`BACKUP_LIST_LIMIT`].
    fn list_backups(&self, filter: &BackupFilter) -> PersistenceResult<Vec<BackupSummary>>;
}

/// Backup identifier: `{network}_{channel}_{YYYYmmdd_HHMMSS}_{8 hex}`.
pub fn new_backup_id(key: &ChannelKey, at: chrono::DateTime<chrono::Utc>) -> String {
    let salt = uuid::Uuid::new_v4();
    let short = hex::encode(&salt.as_bytes()[..4]);
    format!(
        "{}_{}_{}_{}",
        key.network(),
        key.channel(),
        at.format("%Y%m%d_%H%M%S"),
        short
    )
}

/// Seconds since the epoch for a chrono instant.
pub(crate) fn to_timestamp(at: chrono::DateTime<chrono::Utc>) -> Timestamp {
    at.timestamp_millis() as f64 / 1000.0
}

// =============================================================================
// CONFORMANCE
// =============================================================================

/// Behavior every backend must share. Each backend's tests run this.
#[cfg(test)]
pub(crate) fn check_conformance(store: &dyn Persistence) {
    use crate::game::level::LevelTable;

    let key = ChannelKey::new("net", "#Ducks");
    let other = ChannelKey::new("net", "#other");

    // Lazy creation with starting values
    assert!(store.find_record("alice", &key).unwrap().is_none());
    let fresh = store.get_record("alice", &key).unwrap();
    assert_eq!(fresh, PlayerChannelRecord::fresh(&LevelTable::default()));
    assert!(store.find_record("alice", &key).unwrap().is_some());

    // Partial saves touch only the named fields
    let mut record = fresh.clone();
    record.xp = 42.5;
    record.ammo = 3;
    record.best_time = Some(1.25);
    record.sight_next_shot = true;
    let changes = record.changes_since(&fresh);
    store.save_record("alice", &key, &changes).unwrap();
    assert_eq!(store.get_record("alice", &key).unwrap(), record);

    // Channel names are case-insensitive, channels independent
    let same = ChannelKey::new("net", "#DUCKS");
    assert_eq!(store.get_record("alice", &same).unwrap().xp, 42.5);
    assert_eq!(store.get_record("alice", &other).unwrap().xp, 0.0);

    store
        .save_record("bob", &key, &[(RecordField::Xp, FieldValue::Real(7.0))])
        .unwrap();
    let mut players: Vec<String> = store
        .channel_records(&key)
        .unwrap()
        .into_iter()
        .map(|(p, _)| p)
        .collect();
    players.sort();
    assert_eq!(players, vec!["alice".to_string(), "bob".to_string()]);

    // Backup, clear, restore reproduces every field
    let before: Vec<(String, PlayerChannelRecord)> = store.channel_records(&key).unwrap();
    let receipt = store.backup_and_clear(&key).unwrap();
    assert_eq!(receipt.cleared, 2);
    let backup_id = receipt.backup_id.clone().unwrap();
    assert!(backup_id.starts_with("net_#ducks_"));
    assert!(store.channel_records(&key).unwrap().is_empty());
    assert_eq!(store.get_record("alice", &other).unwrap().xp, 0.0);

    assert_eq!(store.restore(&backup_id).unwrap(), 2);
    let mut after = store.channel_records(&key).unwrap();
    let mut expected = before;
    after.sort_by(|a, b| a.0.cmp(&b.0));
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(after, expected);

    // Clearing an empty channel backs up nothing
    let empty = ChannelKey::new("net", "#empty");
    let none = store.backup_and_clear(&empty).unwrap();
    assert_eq!(none, ClearReceipt { backup_id: None, cleared: 0 });

    assert_eq!(store.restore("no_such_backup").unwrap(), 0);

    // Listing: newest first, filtered
    let second = store.backup_and_clear(&key).unwrap().backup_id.unwrap();
    let listed = store.list_backups(&BackupFilter::channel(&key)).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].backup_id, second);
    assert_eq!(listed[1].backup_id, backup_id);
    assert_eq!(listed[0].players, 2);
    assert!(store.list_backups(&BackupFilter::channel(&other)).unwrap().is_empty());

    let filter = BackupFilter {
        network: Some("elsewhere".into()),
        channel: None,
    };
    assert!(store.list_backups(&filter).unwrap().is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_id_format() {
        let key = ChannelKey::new("libera", "#Ducks");
        let at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let id = new_backup_id(&key, at);
        assert!(id.starts_with("libera_#ducks_20231114_221320_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_filter_matches() {
        let key = ChannelKey::new("net", "#a");
        assert!(BackupFilter::default().matches(&key));
        assert!(BackupFilter::channel(&key).matches(&key));
        assert!(!BackupFilter::channel(&ChannelKey::new("net", "#b")).matches(&key));
    }
}
