use std::io::Read;

use strand_types::Hash256;

use crate::error::ArchiveResult;
use crate::has::HistoryArchiveState;

/// Read boundary for a checkpoint archive.
///
/// Buckets are content-addressed and immutable. A bucket named by a
/// published state file may still be missing if the archive is incomplete;
/// callers check with `bucket_exists` before streaming.
pub trait HistoryArchive: Send + Sync {
    /// The state file of the checkpoint at `sequence`.
    fn get_checkpoint_has(&self, sequence: u32) -> ArchiveResult<HistoryArchiveState>;

    fn bucket_exists(&self, hash: &Hash256) -> ArchiveResult<bool>;

    /// A reader over the bucket's gzip bytes.
    fn get_bucket_stream(&self, hash: &Hash256) -> ArchiveResult<Box<dyn Read + Send>>;
}
