//! Checkpoint archives for Strand.
//!
//! A history archive publishes, at every checkpoint, a state file naming the
//! content-addressed buckets that together hold the full ledger state. This
//! crate reads those files, decodes bucket streams, and exposes the state at
//! a checkpoint as a lazy stream of live ledger entries.
//!
//! # Key Types
//!
//! - [`HistoryArchive`] — read boundary for an archive
//! - [`HistoryArchiveState`] — one checkpoint's bucket list
//! - [`BucketReader`] — streaming decoder over one gzip bucket
//! - [`MemoryStateReader`] — producer/consumer reader over a whole checkpoint
//! - [`InMemoryArchive`], [`FsArchive`] — archive backends

pub mod bucket;
pub mod error;
pub mod fs;
pub mod has;
pub mod memory;
pub mod reader;
pub mod traits;

pub use bucket::{decode_bucket, encode_bucket, BucketReader, EncodedBucket};
pub use error::{ArchiveError, ArchiveResult};
pub use fs::FsArchive;
pub use has::{
    checkpoint_containing, is_checkpoint, BucketLevel, FutureBucket, HistoryArchiveState,
    CHECKPOINT_FREQUENCY,
};
pub use memory::InMemoryArchive;
pub use reader::{MemoryStateReader, DEFAULT_BUFFER_SIZE};
pub use traits::HistoryArchive;
