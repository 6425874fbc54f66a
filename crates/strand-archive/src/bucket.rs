//! Bucket file codec.
//!
//! A bucket is a gzip stream of length-prefixed records, each one canonically
//! encoded [`BucketEntry`]. The prefix is a 4-byte big-endian length. A
//! bucket's hash is the digest of its uncompressed record stream, so the
//! compression level never changes a bucket's address.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use strand_types::{codec, BucketEntry, Hash256};

use crate::error::{ArchiveError, ArchiveResult};

/// Records larger than this are treated as corruption.
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// An encoded bucket: its content hash and gzip bytes.
#[derive(Clone, Debug)]
pub struct EncodedBucket {
    pub hash: Hash256,
    pub data: Vec<u8>,
}

fn write_record<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(data)
}

/// Read one record. `Ok(None)` at a clean end of stream; a stream that ends
/// inside a length prefix or record is an error.
fn read_record<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a record length",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record length {len} exceeds {MAX_RECORD_LEN}"),
        ));
    }
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(Some(data))
}

/// Encode entries into a bucket, in the given order.
pub fn encode_bucket(entries: &[BucketEntry]) -> ArchiveResult<EncodedBucket> {
    let mut raw = Vec::new();
    for entry in entries {
        write_record(&mut raw, &codec::encode(entry)?)?;
    }
    let hash = Hash256::digest(&raw);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let data = encoder.finish()?;
    Ok(EncodedBucket { hash, data })
}

/// Streaming decoder over one bucket.
///
/// Yields entries in file order. After the first error the reader is
/// exhausted.
pub struct BucketReader<R: Read> {
    hash: Hash256,
    inner: GzDecoder<R>,
    index: u64,
    done: bool,
}

impl<R: Read> BucketReader<R> {
    pub fn new(hash: Hash256, reader: R) -> Self {
        Self {
            hash,
            inner: GzDecoder::new(reader),
            index: 0,
            done: false,
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Records decoded so far.
    pub fn position(&self) -> u64 {
        self.index
    }

    pub fn next_entry(&mut self) -> ArchiveResult<Option<BucketEntry>> {
        if self.done {
            return Ok(None);
        }
        let result = self.decode_next();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn decode_next(&mut self) -> ArchiveResult<Option<BucketEntry>> {
        let record = read_record(&mut self.inner).map_err(|e| self.corrupt(e.to_string()))?;
        let Some(bytes) = record else {
            return Ok(None);
        };
        let entry = codec::decode(&bytes).map_err(|e| self.corrupt(e.to_string()))?;
        self.index += 1;
        Ok(Some(entry))
    }

    fn corrupt(&self, reason: String) -> ArchiveError {
        ArchiveError::CorruptBucket {
            bucket: self.hash,
            index: self.index,
            reason,
        }
    }
}

impl<R: Read> Iterator for BucketReader<R> {
    type Item = ArchiveResult<BucketEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Decode a whole bucket and check its content hash.
pub fn decode_bucket(hash: Hash256, data: &[u8]) -> ArchiveResult<Vec<BucketEntry>> {
    let mut raw = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut raw)
        .map_err(|e| ArchiveError::CorruptBucket {
            bucket: hash,
            index: 0,
            reason: e.to_string(),
        })?;
    let actual = Hash256::digest(&raw);
    if actual != hash {
        return Err(ArchiveError::HashMismatch {
            expected: hash,
            actual,
        });
    }
    BucketReader::new(hash, data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_types::{
        AccountEntry, AccountId, BucketMetadata, LedgerEntry, LedgerEntryData, LedgerKey,
    };

    fn live(seed: &str, balance: i64) -> BucketEntry {
        BucketEntry::Live(LedgerEntry::new(
            1,
            LedgerEntryData::Account(AccountEntry {
                account_id: AccountId::from_seed(seed),
                balance,
                seq_num: 0,
                num_sub_entries: 0,
                inflation_dest: None,
                flags: 0,
                home_domain: String::new(),
                thresholds: [1, 0, 0, 0],
                signers: vec![],
            }),
        ))
    }

    #[test]
    fn entries_come_back_in_order() {
        let entries = vec![
            BucketEntry::Meta(BucketMetadata { ledger_version: 12 }),
            live("a", 10),
            BucketEntry::Dead(LedgerKey::account(AccountId::from_seed("b"))),
        ];
        let bucket = encode_bucket(&entries).unwrap();
        assert_eq!(decode_bucket(bucket.hash, &bucket.data).unwrap(), entries);
    }

    #[test]
    fn hash_ignores_compression() {
        let entries = vec![live("a", 10)];
        let bucket = encode_bucket(&entries).unwrap();
        let mut raw = Vec::new();
        write_record(&mut raw, &codec::encode(&entries[0]).unwrap()).unwrap();
        assert_eq!(bucket.hash, Hash256::digest(&raw));
    }

    #[test]
    fn empty_bucket_is_empty() {
        let bucket = encode_bucket(&[]).unwrap();
        let mut reader = BucketReader::new(bucket.hash, bucket.data.as_slice());
        assert!(reader.next_entry().unwrap().is_none());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn wrong_hash_is_detected() {
        let bucket = encode_bucket(&[live("a", 1)]).unwrap();
        let err = decode_bucket(Hash256::digest(b"other"), &bucket.data).unwrap_err();
        assert!(matches!(err, ArchiveError::HashMismatch { .. }));
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let entry = codec::encode(&live("a", 1)).unwrap();
        let mut raw = Vec::new();
        write_record(&mut raw, &entry).unwrap();
        raw.truncate(raw.len() - 2);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let data = encoder.finish().unwrap();

        let mut reader = BucketReader::new(Hash256::zero(), data.as_slice());
        let err = reader.next_entry().unwrap_err();
        assert!(matches!(err, ArchiveError::CorruptBucket { index: 0, .. }));
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn garbage_record_is_corrupt() {
        let mut raw = Vec::new();
        write_record(&mut raw, &[0xff; 3]).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let data = encoder.finish().unwrap();
        let results: Vec<_> = BucketReader::new(Hash256::zero(), data.as_slice()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
