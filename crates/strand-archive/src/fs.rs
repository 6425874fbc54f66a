use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use strand_types::{BucketEntry, Hash256};
use tracing::debug;

use crate::bucket::encode_bucket;
use crate::error::{ArchiveError, ArchiveResult};
use crate::has::HistoryArchiveState;
use crate::traits::HistoryArchive;

/// Archive laid out on a local filesystem.
///
/// Layout:
/// - `history/ww/xx/yy/history-wwxxyyzz.json` for the checkpoint at
///   `0xwwxxyyzz`
/// - `bucket/aa/bb/cc/bucket-<hash>.gz` for a bucket whose hex hash starts
///   with `aabbcc`
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_path(&self, sequence: u32) -> PathBuf {
        let hex = format!("{sequence:08x}");
        self.root
            .join("history")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex[4..6])
            .join(format!("history-{hex}.json"))
    }

    pub fn bucket_path(&self, hash: &Hash256) -> PathBuf {
        let hex = hash.to_hex();
        self.root
            .join("bucket")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex[4..6])
            .join(format!("bucket-{hex}.gz"))
    }

    pub fn put_bucket(&self, entries: &[BucketEntry]) -> ArchiveResult<Hash256> {
        let bucket = encode_bucket(entries)?;
        let path = self.bucket_path(&bucket.hash);
        if !path.exists() {
            write_atomic(&path, &bucket.data)?;
            debug!(hash = %bucket.hash.short_hex(), entries = entries.len(), "archive: bucket written");
        }
        Ok(bucket.hash)
    }

    pub fn put_checkpoint(&self, has: &HistoryArchiveState) -> ArchiveResult<()> {
        let path = self.checkpoint_path(has.current_ledger);
        write_atomic(&path, has.to_json()?.as_bytes())?;
        debug!(ledger = has.current_ledger, "archive: checkpoint written");
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> ArchiveResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl HistoryArchive for FsArchive {
    fn get_checkpoint_has(&self, sequence: u32) -> ArchiveResult<HistoryArchiveState> {
        let path = self.checkpoint_path(sequence);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArchiveError::CheckpointNotFound(sequence))
            }
            Err(e) => return Err(e.into()),
        };
        HistoryArchiveState::from_json(&text)
    }

    fn bucket_exists(&self, hash: &Hash256) -> ArchiveResult<bool> {
        Ok(self.bucket_path(hash).try_exists()?)
    }

    fn get_bucket_stream(&self, hash: &Hash256) -> ArchiveResult<Box<dyn Read + Send>> {
        match File::open(self.bucket_path(hash)) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::BucketNotFound(*hash))
            }
            Err(e) => Err(e.into()),
        }
    }
}
