//! Streaming reader over the ledger state of one checkpoint.
//!
//! A producer thread walks the checkpoint's buckets newest first and pushes
//! live entries into a bounded channel; the reader's owner pulls them with
//! [`MemoryStateReader::read`]. The producer blocks while the channel is
//! full. Dropping the reader disconnects the channel and the producer stops
//! at its next push.
//!
//! A key seen in a newer bucket shadows the same key in every older bucket,
//! whether the newer record was live or a tombstone.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use strand_types::{codec, BucketEntry, Hash256, LedgerEntry};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, warn};

use crate::bucket::BucketReader;
use crate::error::{ArchiveError, ArchiveResult};
use crate::has::HistoryArchiveState;
use crate::traits::HistoryArchive;

/// Default capacity of the entry channel.
pub const DEFAULT_BUFFER_SIZE: usize = 5000;

/// First protocol version whose buckets may carry init entries.
const INIT_ENTRY_PROTOCOL: u32 = 11;

type Item = ArchiveResult<LedgerEntry>;

enum ReaderState {
    Unbuffered,
    Streaming {
        rx: Receiver<Item>,
        producer: Option<JoinHandle<()>>,
    },
    Finished,
}

/// Single-pass reader of the live ledger entries at a checkpoint.
pub struct MemoryStateReader {
    archive: Arc<dyn HistoryArchive>,
    has: HistoryArchiveState,
    sequence: u32,
    buffer_size: usize,
    state: ReaderState,
}

impl MemoryStateReader {
    /// Prepare a reader for the checkpoint at `sequence`. Fails if the
    /// archive has no state file for it.
    pub fn new(
        archive: Arc<dyn HistoryArchive>,
        sequence: u32,
        buffer_size: usize,
    ) -> ArchiveResult<Self> {
        let has = archive.get_checkpoint_has(sequence)?;
        Ok(Self {
            archive,
            has,
            sequence,
            buffer_size,
            state: ReaderState::Unbuffered,
        })
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Start the producer. Must be called exactly once, before `read`.
    pub fn buffer_reads(&mut self) -> ArchiveResult<()> {
        if !matches!(self.state, ReaderState::Unbuffered) {
            return Err(ArchiveError::ReaderState("buffer_reads called more than once"));
        }
        // A zero-capacity tokio channel is rejected at construction.
        let (tx, rx) = channel(self.buffer_size.max(1));
        let archive = Arc::clone(&self.archive);
        let has = self.has.clone();
        let producer = thread::Builder::new()
            .name(format!("state-reader-{}", self.sequence))
            .spawn(move || stream_buckets(archive.as_ref(), &has, &tx))?;
        self.state = ReaderState::Streaming {
            rx,
            producer: Some(producer),
        };
        Ok(())
    }

    /// The next live entry, `Ok(None)` once the checkpoint is exhausted.
    ///
    /// An archive or decode error is returned once; every later call returns
    /// `Ok(None)`.
    pub fn read(&mut self) -> ArchiveResult<Option<LedgerEntry>> {
        let ReaderState::Streaming { rx, producer } = &mut self.state else {
            return match self.state {
                ReaderState::Unbuffered => {
                    Err(ArchiveError::ReaderState("read called before buffer_reads"))
                }
                _ => Ok(None),
            };
        };
        match rx.blocking_recv() {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => {
                self.state = ReaderState::Finished;
                Err(e)
            }
            None => {
                if let Some(handle) = producer.take() {
                    if handle.join().is_err() {
                        warn!(sequence = self.sequence, "state reader: producer panicked");
                    }
                }
                self.state = ReaderState::Finished;
                Ok(None)
            }
        }
    }
}

/// Producer body. Returns early when the consumer hangs up.
fn stream_buckets(archive: &dyn HistoryArchive, has: &HistoryArchiveState, tx: &Sender<Item>) {
    let buckets = match has.bucket_hashes() {
        Ok(buckets) => buckets,
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
            return;
        }
    };
    debug!(
        ledger = has.current_ledger,
        buckets = buckets.len(),
        "state reader: streaming checkpoint"
    );

    let mut seen = HashSet::new();
    for hash in &buckets {
        match archive.bucket_exists(hash) {
            Ok(true) => {}
            Ok(false) => {
                let _ = tx.blocking_send(Err(ArchiveError::BucketNotFound(*hash)));
                return;
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
        match stream_bucket(archive, *hash, &mut seen, tx) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

/// Stream one bucket. `Ok(false)` when the consumer has gone away.
fn stream_bucket(
    archive: &dyn HistoryArchive,
    hash: Hash256,
    seen: &mut HashSet<Vec<u8>>,
    tx: &Sender<Item>,
) -> ArchiveResult<bool> {
    let mut reader = BucketReader::new(hash, archive.get_bucket_stream(&hash)?);
    let mut protocol_version = 0;
    while let Some(entry) = reader.next_entry()? {
        let (key, live) = match entry {
            BucketEntry::Meta(meta) => {
                protocol_version = meta.ledger_version;
                continue;
            }
            BucketEntry::Dead(key) => {
                seen.insert(codec::encode(&key)?);
                continue;
            }
            BucketEntry::Init(entry) => {
                if protocol_version < INIT_ENTRY_PROTOCOL {
                    return Err(ArchiveError::CorruptBucket {
                        bucket: hash,
                        index: reader.position() - 1,
                        reason: format!("init entry in protocol {protocol_version} bucket"),
                    });
                }
                (codec::encode(&entry.ledger_key())?, entry)
            }
            BucketEntry::Live(entry) => (codec::encode(&entry.ledger_key())?, entry),
        };

        // The first record of a key wins, even against a later one in the
        // same bucket.
        if !seen.insert(key) {
            continue;
        }
        if tx.blocking_send(Ok(live)).is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}
