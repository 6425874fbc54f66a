//! Checkpoint state files.
//!
//! A history archive publishes one state file per checkpoint. It names the
//! buckets that, merged together, hold the full ledger state at that
//! checkpoint's sequence. Levels are ordered newest first; within a level
//! `curr` is newer than `snap`. Empty slots hold the zero hash.

use serde::{Deserialize, Serialize};
use strand_types::Hash256;

use crate::error::{ArchiveError, ArchiveResult};

/// Ledgers per checkpoint.
pub const CHECKPOINT_FREQUENCY: u32 = 64;

pub const HAS_VERSION: u32 = 1;

/// Whether a state file is published at `sequence`.
pub fn is_checkpoint(sequence: u32) -> bool {
    sequence.wrapping_add(1) % CHECKPOINT_FREQUENCY == 0
}

/// The checkpoint containing `sequence`.
pub fn checkpoint_containing(sequence: u32) -> u32 {
    (sequence / CHECKPOINT_FREQUENCY + 1) * CHECKPOINT_FREQUENCY - 1
}

/// Pending merge of a level, carried through but not interpreted here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureBucket {
    pub state: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLevel {
    pub curr: String,
    pub snap: String,
    #[serde(default)]
    pub next: FutureBucket,
}

impl BucketLevel {
    pub fn new(curr: Hash256, snap: Hash256) -> Self {
        Self {
            curr: curr.to_hex(),
            snap: snap.to_hex(),
            next: FutureBucket::default(),
        }
    }
}

/// History archive state (HAS) for one checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryArchiveState {
    pub version: u32,
    #[serde(default)]
    pub server: String,
    pub current_ledger: u32,
    pub current_buckets: Vec<BucketLevel>,
}

impl HistoryArchiveState {
    pub fn new(current_ledger: u32, levels: Vec<BucketLevel>) -> Self {
        Self {
            version: HAS_VERSION,
            server: format!("strand {}", env!("CARGO_PKG_VERSION")),
            current_ledger,
            current_buckets: levels,
        }
    }

    pub fn from_json(text: &str) -> ArchiveResult<Self> {
        serde_json::from_str(text).map_err(|e| ArchiveError::InvalidState(e.to_string()))
    }

    pub fn to_json(&self) -> ArchiveResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ArchiveError::InvalidState(e.to_string()))
    }

    /// Non-empty bucket hashes, newest first: `curr` then `snap` of each
    /// level, level 0 first.
    pub fn bucket_hashes(&self) -> ArchiveResult<Vec<Hash256>> {
        let mut hashes = Vec::new();
        for level in &self.current_buckets {
            for hex in [&level.curr, &level.snap] {
                let hash = Hash256::from_hex(hex)
                    .map_err(|e| ArchiveError::InvalidState(format!("bucket hash {hex}: {e}")))?;
                if !hash.is_zero() {
                    hashes.push(hash);
                }
            }
        }
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_boundaries() {
        assert!(is_checkpoint(63));
        assert!(is_checkpoint(127));
        assert!(!is_checkpoint(64));
        assert_eq!(checkpoint_containing(1), 63);
        assert_eq!(checkpoint_containing(63), 63);
        assert_eq!(checkpoint_containing(64), 127);
    }

    #[test]
    fn bucket_hashes_skip_empty_slots() {
        let a = Hash256::digest(b"a");
        let b = Hash256::digest(b"b");
        let c = Hash256::digest(b"c");
        let has = HistoryArchiveState::new(
            63,
            vec![
                BucketLevel::new(a, b),
                BucketLevel::new(Hash256::zero(), c),
                BucketLevel::new(Hash256::zero(), Hash256::zero()),
            ],
        );
        assert_eq!(has.bucket_hashes().unwrap(), vec![a, b, c]);
    }

    #[test]
    fn json_uses_archive_field_names() {
        let has = HistoryArchiveState::new(127, vec![BucketLevel::new(Hash256::zero(), Hash256::zero())]);
        let json = has.to_json().unwrap();
        assert!(json.contains("\"currentLedger\": 127"));
        assert!(json.contains("\"currentBuckets\""));
        assert_eq!(HistoryArchiveState::from_json(&json).unwrap(), has);
    }

    #[test]
    fn missing_next_defaults() {
        let text = format!(
            r#"{{"version":1,"currentLedger":63,"currentBuckets":[{{"curr":"{}","snap":"{}"}}]}}"#,
            Hash256::zero(),
            Hash256::zero()
        );
        let has = HistoryArchiveState::from_json(&text).unwrap();
        assert!(has.bucket_hashes().unwrap().is_empty());
        assert_eq!(has.server, "");
    }

    #[test]
    fn bad_hash_is_rejected() {
        let mut has = HistoryArchiveState::new(63, vec![BucketLevel::new(Hash256::zero(), Hash256::zero())]);
        has.current_buckets[0].curr = "nothex".into();
        assert!(matches!(
            has.bucket_hashes(),
            Err(ArchiveError::InvalidState(_))
        ));
    }
}
