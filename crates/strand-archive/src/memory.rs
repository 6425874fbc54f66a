use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Mutex, RwLock};

use strand_types::{BucketEntry, Hash256};

use crate::bucket::encode_bucket;
use crate::error::{ArchiveError, ArchiveResult};
use crate::has::{BucketLevel, HistoryArchiveState};
use crate::traits::HistoryArchive;

#[derive(Default)]
struct ArchiveState {
    checkpoints: HashMap<u32, HistoryArchiveState>,
    buckets: HashMap<Hash256, Vec<u8>>,
    unavailable: bool,
}

/// In-memory archive for tests and embedding.
///
/// Records every `bucket_exists` call so tests can check which buckets a
/// reader asked for.
#[derive(Default)]
pub struct InMemoryArchive {
    inner: RwLock<ArchiveState>,
    existence_checks: Mutex<Vec<Hash256>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a bucket and return its hash.
    pub fn put_bucket(&self, entries: &[BucketEntry]) -> ArchiveResult<Hash256> {
        let bucket = encode_bucket(entries)?;
        self.inner
            .write()
            .expect("lock poisoned")
            .buckets
            .insert(bucket.hash, bucket.data);
        Ok(bucket.hash)
    }

    /// Store raw bucket bytes under `hash`, unchecked.
    pub fn put_raw_bucket(&self, hash: Hash256, data: Vec<u8>) {
        self.inner
            .write()
            .expect("lock poisoned")
            .buckets
            .insert(hash, data);
    }

    pub fn remove_bucket(&self, hash: &Hash256) -> bool {
        self.inner
            .write()
            .expect("lock poisoned")
            .buckets
            .remove(hash)
            .is_some()
    }

    pub fn put_checkpoint(&self, has: HistoryArchiveState) {
        self.inner
            .write()
            .expect("lock poisoned")
            .checkpoints
            .insert(has.current_ledger, has);
    }

    /// Publish a checkpoint whose levels hold the given `(curr, snap)` pairs.
    pub fn publish(&self, sequence: u32, levels: &[(Hash256, Hash256)]) {
        let levels = levels
            .iter()
            .map(|(curr, snap)| BucketLevel::new(*curr, *snap))
            .collect();
        self.put_checkpoint(HistoryArchiveState::new(sequence, levels));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().expect("lock poisoned").unavailable = unavailable;
    }

    /// Hashes passed to `bucket_exists`, in call order.
    pub fn existence_checks(&self) -> Vec<Hash256> {
        self.existence_checks.lock().expect("lock poisoned").clone()
    }

    fn check(&self) -> ArchiveResult<std::sync::RwLockReadGuard<'_, ArchiveState>> {
        let state = self
            .inner
            .read()
            .map_err(|_| ArchiveError::Unavailable("archive lock poisoned".into()))?;
        if state.unavailable {
            return Err(ArchiveError::Unavailable("archive offline".into()));
        }
        Ok(state)
    }
}

impl HistoryArchive for InMemoryArchive {
    fn get_checkpoint_has(&self, sequence: u32) -> ArchiveResult<HistoryArchiveState> {
        self.check()?
            .checkpoints
            .get(&sequence)
            .cloned()
            .ok_or(ArchiveError::CheckpointNotFound(sequence))
    }

    fn bucket_exists(&self, hash: &Hash256) -> ArchiveResult<bool> {
        self.existence_checks.lock().expect("lock poisoned").push(*hash);
        Ok(self.check()?.buckets.contains_key(hash))
    }

    fn get_bucket_stream(&self, hash: &Hash256) -> ArchiveResult<Box<dyn Read + Send>> {
        let data = self
            .check()?
            .buckets
            .get(hash)
            .cloned()
            .ok_or(ArchiveError::BucketNotFound(*hash))?;
        Ok(Box::new(Cursor::new(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketReader;
    use strand_types::BucketMetadata;

    #[test]
    fn buckets_are_content_addressed() {
        let archive = InMemoryArchive::new();
        let entries = vec![BucketEntry::Meta(BucketMetadata { ledger_version: 12 })];
        let a = archive.put_bucket(&entries).unwrap();
        let b = archive.put_bucket(&entries).unwrap();
        assert_eq!(a, b);
        assert!(archive.bucket_exists(&a).unwrap());

        let stream = archive.get_bucket_stream(&a).unwrap();
        let decoded: Vec<_> = BucketReader::new(a, stream)
            .collect::<ArchiveResult<_>>()
            .unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn missing_checkpoint_and_bucket() {
        let archive = InMemoryArchive::new();
        assert!(matches!(
            archive.get_checkpoint_has(63),
            Err(ArchiveError::CheckpointNotFound(63))
        ));
        let hash = Hash256::digest(b"nope");
        assert!(!archive.bucket_exists(&hash).unwrap());
        assert!(matches!(
            archive.get_bucket_stream(&hash),
            Err(ArchiveError::BucketNotFound(_))
        ));
        assert_eq!(archive.existence_checks(), vec![hash]);
    }

    #[test]
    fn publish_builds_levels() {
        let archive = InMemoryArchive::new();
        let a = Hash256::digest(b"a");
        archive.publish(127, &[(a, Hash256::zero())]);
        let has = archive.get_checkpoint_has(127).unwrap();
        assert_eq!(has.bucket_hashes().unwrap(), vec![a]);
    }

    #[test]
    fn offline_archive_fails() {
        let archive = InMemoryArchive::new();
        archive.set_unavailable(true);
        assert!(matches!(
            archive.bucket_exists(&Hash256::zero()),
            Err(ArchiveError::Unavailable(_))
        ));
    }
}
