use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use strand_archive::{ArchiveResult, MemoryStateReader};
use strand_types::{codec, LedgerEntry};
use tracing::debug;

use crate::error::{StateError, VerifyError, VerifyResult};

/// A single-pass stream of canonical ledger entries.
pub trait EntryStream {
    fn next_entry(&mut self) -> ArchiveResult<Option<LedgerEntry>>;
}

impl EntryStream for MemoryStateReader {
    fn next_entry(&mut self) -> ArchiveResult<Option<LedgerEntry>> {
        self.read()
    }
}

/// Maps a canonical entry to the form the local store keeps. Returning
/// `true` ignores the entry; local stores that keep only some entry types
/// or fields use this to drop the rest.
pub type TransformFn = Box<dyn Fn(&LedgerEntry) -> (bool, LedgerEntry) + Send + Sync>;

/// Cross-checks locally stored entries against a canonical stream, one
/// batch at a time.
///
/// 1. `get_ledger_entries(n)` stakes up to `n` canonical entries.
/// 2. The caller looks up its own version of each and passes it to `write`,
///    in any order.
/// 3. Repeat until a batch comes back empty, then call `verify` with the
///    number of entries held locally.
///
/// Any [`StateError`] means the local state is wrong.
pub struct StateVerifier<S> {
    stream: S,
    transform: Option<TransformFn>,
    read_entries: u64,
    reading_done: bool,
    current: BTreeMap<Vec<u8>, LedgerEntry>,
}

impl<S: EntryStream> StateVerifier<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            transform: None,
            read_entries: 0,
            reading_done: false,
            current: BTreeMap::new(),
        }
    }

    pub fn with_transform(stream: S, transform: TransformFn) -> Self {
        Self {
            transform: Some(transform),
            ..Self::new(stream)
        }
    }

    /// Canonical entries read so far, not counting ignored ones.
    pub fn read_entries(&self) -> u64 {
        self.read_entries
    }

    /// Up to `count` normalized canonical entries, staked for `write`.
    /// Fails if the previous batch still has entries nobody wrote.
    pub fn get_ledger_entries(&mut self, count: usize) -> VerifyResult<Vec<LedgerEntry>> {
        self.check_unread_entries()?;

        let mut entries = Vec::with_capacity(count);
        while entries.len() < count {
            let Some(entry) = self.stream.next_entry()? else {
                self.reading_done = true;
                break;
            };
            if let Some(transform) = &self.transform {
                if transform(&entry).0 {
                    continue;
                }
            }
            let key = codec::encode(&entry.ledger_key())?;
            let entry = entry.normalized();
            self.current.insert(key, entry.clone());
            entries.push(entry);
            self.read_entries += 1;
        }
        debug!(
            staked = entries.len(),
            total = self.read_entries,
            done = self.reading_done,
            "verify: batch staked"
        );
        Ok(entries)
    }

    /// Compare one local entry with its staked canonical counterpart.
    pub fn write(&mut self, entry: LedgerEntry) -> VerifyResult<()> {
        let actual = entry.normalized();
        let actual_bytes = codec::encode(&actual)?;
        let key = codec::encode(&actual.ledger_key())?;

        let Some(expected) = self.current.remove(&key) else {
            return Err(StateError::MissingEntry {
                entry: STANDARD.encode(&actual_bytes),
                key: STANDARD.encode(&key),
            }
            .into());
        };

        let pretransform_bytes = codec::encode(&expected)?;
        let expected = match &self.transform {
            Some(transform) => {
                let (ignore, transformed) = transform(&expected);
                if ignore {
                    return Err(VerifyError::InconsistentTransform(
                        STANDARD.encode(&pretransform_bytes),
                    ));
                }
                transformed
            }
            None => expected,
        };
        let expected_bytes = codec::encode(&expected)?;

        if actual_bytes != expected_bytes {
            return Err(StateError::Mismatch {
                expected: STANDARD.encode(&expected_bytes),
                pretransform: STANDARD.encode(&pretransform_bytes),
                actual: STANDARD.encode(&actual_bytes),
            }
            .into());
        }
        Ok(())
    }

    /// Final check once every batch has been written. `local_count` is the
    /// number of entries the local store holds.
    pub fn verify(&self, local_count: u64) -> VerifyResult<()> {
        self.check_unread_entries()?;
        if !self.reading_done {
            return Err(VerifyError::StreamNotDrained);
        }
        if self.read_entries != local_count {
            return Err(StateError::CountMismatch {
                read: self.read_entries,
                local: local_count,
            }
            .into());
        }
        Ok(())
    }

    fn check_unread_entries(&self) -> VerifyResult<()> {
        let Some(example) = self.current.values().next() else {
            return Ok(());
        };
        Err(StateError::UnreadEntries {
            count: self.current.len(),
            example: codec::encode_base64(example).unwrap_or_default(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use strand_archive::ArchiveError;
    use strand_types::{
        AccountEntry, AccountId, Asset, DataEntry, LedgerEntryData, Signer, TrustLineEntry,
    };

    struct VecStream(VecDeque<ArchiveResult<LedgerEntry>>);

    impl VecStream {
        fn of(entries: Vec<LedgerEntry>) -> Self {
            Self(entries.into_iter().map(Ok).collect())
        }
    }

    impl EntryStream for VecStream {
        fn next_entry(&mut self) -> ArchiveResult<Option<LedgerEntry>> {
            self.0.pop_front().transpose()
        }
    }

    fn account(seed: &str, balance: i64) -> LedgerEntry {
        LedgerEntry::new(
            5,
            LedgerEntryData::Account(AccountEntry {
                account_id: AccountId::from_seed(seed),
                balance,
                seq_num: 1,
                num_sub_entries: 0,
                inflation_dest: None,
                flags: 0,
                home_domain: String::new(),
                thresholds: [1, 0, 0, 0],
                signers: vec![],
            }),
        )
    }

    fn data(seed: &str) -> LedgerEntry {
        LedgerEntry::new(
            5,
            LedgerEntryData::Data(DataEntry {
                account_id: AccountId::from_seed(seed),
                name: "k".into(),
                value: b"v".to_vec(),
            }),
        )
    }

    fn canonical() -> Vec<LedgerEntry> {
        vec![account("a", 1), account("b", 2), data("a"), account("c", 3)]
    }

    /// Runs the whole protocol, writing the local version of each staked
    /// entry as `local` returns it.
    fn run<S: EntryStream>(
        verifier: &mut StateVerifier<S>,
        batch: usize,
        local: impl Fn(&LedgerEntry) -> Option<LedgerEntry>,
    ) -> VerifyResult<()> {
        loop {
            let entries = verifier.get_ledger_entries(batch)?;
            if entries.is_empty() {
                return Ok(());
            }
            for entry in entries {
                if let Some(local) = local(&entry) {
                    verifier.write(local)?;
                }
            }
        }
    }

    #[test]
    fn matching_state_verifies() {
        let mut verifier = StateVerifier::new(VecStream::of(canonical()));
        run(&mut verifier, 3, |e| Some(e.clone())).unwrap();
        verifier.verify(4).unwrap();
        assert_eq!(verifier.read_entries(), 4);
    }

    #[test]
    fn extra_local_entry_fails_count() {
        let mut verifier = StateVerifier::new(VecStream::of(canonical()));
        run(&mut verifier, 10, |e| Some(e.clone())).unwrap();
        let err = verifier.verify(5).unwrap_err();
        assert!(err.is_state_error());
        assert!(matches!(
            err,
            VerifyError::State(StateError::CountMismatch { read: 4, local: 5 })
        ));
    }

    #[test]
    fn missing_local_entry_is_unread() {
        let mut verifier = StateVerifier::new(VecStream::of(canonical()));
        let skip = account("b", 2);
        let err = run(&mut verifier, 10, |e| (e != &skip).then(|| e.clone())).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::State(StateError::UnreadEntries { count: 1, .. })
        ));
        assert!(verifier.verify(3).unwrap_err().is_state_error());
    }

    #[test]
    fn changed_field_names_both_encodings() {
        let mut verifier = StateVerifier::new(VecStream::of(canonical()));
        verifier.get_ledger_entries(10).unwrap();
        let err = verifier.write(account("a", 99)).unwrap_err();
        let (expected, actual) = match err {
            VerifyError::State(StateError::Mismatch {
                expected, actual, ..
            }) => (expected, actual),
            other => panic!("expected mismatch, got {other:?}"),
        };
        assert_eq!(expected, codec::encode_base64(&account("a", 1)).unwrap());
        assert_eq!(actual, codec::encode_base64(&account("a", 99)).unwrap());
    }

    #[test]
    fn unknown_local_entry_is_missing() {
        let mut verifier = StateVerifier::new(VecStream::of(canonical()));
        verifier.get_ledger_entries(10).unwrap();
        assert!(matches!(
            verifier.write(account("zz", 1)),
            Err(VerifyError::State(StateError::MissingEntry { .. }))
        ));
    }

    #[test]
    fn verify_requires_drained_stream() {
        let mut verifier = StateVerifier::new(VecStream::of(canonical()));
        for entry in verifier.get_ledger_entries(4).unwrap() {
            verifier.write(entry).unwrap();
        }
        let err = verifier.verify(4).unwrap_err();
        assert!(matches!(err, VerifyError::StreamNotDrained));
        assert!(!err.is_state_error());
    }

    #[test]
    fn signer_order_does_not_matter() {
        let a = Signer {
            key: AccountId::from_seed("s1"),
            weight: 1,
        };
        let b = Signer {
            key: AccountId::from_seed("s2"),
            weight: 2,
        };
        let mut canonical = account("a", 1);
        let mut local = canonical.clone();
        if let LedgerEntryData::Account(acct) = &mut canonical.data {
            acct.signers = vec![a, b];
        }
        if let LedgerEntryData::Account(acct) = &mut local.data {
            acct.signers = vec![b, a];
        }
        let mut verifier = StateVerifier::new(VecStream::of(vec![canonical]));
        run(&mut verifier, 1, |_| Some(local.clone())).unwrap();
        verifier.verify(1).unwrap();
    }

    #[test]
    fn transform_filters_and_reshapes() {
        let only_accounts: TransformFn = Box::new(|entry| {
            let mut entry = entry.clone();
            let ignore = entry.as_account().is_none();
            entry.last_modified_ledger_seq = 0;
            (ignore, entry)
        });
        let mut verifier = StateVerifier::with_transform(VecStream::of(canonical()), only_accounts);
        run(&mut verifier, 2, |e| {
            let mut local = e.clone();
            local.last_modified_ledger_seq = 0;
            Some(local)
        })
        .unwrap();
        verifier.verify(3).unwrap();
    }

    #[test]
    fn inconsistent_transform_is_not_a_state_error() {
        let flip = std::sync::atomic::AtomicBool::new(false);
        let transform: TransformFn = Box::new(move |entry| {
            let seen = flip.swap(true, std::sync::atomic::Ordering::SeqCst);
            (seen, entry.clone())
        });
        let mut verifier =
            StateVerifier::with_transform(VecStream::of(vec![account("a", 1)]), transform);
        verifier.get_ledger_entries(1).unwrap();
        let err = verifier.write(account("a", 1)).unwrap_err();
        assert!(matches!(err, VerifyError::InconsistentTransform(_)));
        assert!(!err.is_state_error());
    }

    #[test]
    fn stream_error_propagates() {
        let mut stream = VecStream::of(vec![account("a", 1)]);
        stream.0.push_back(Err(ArchiveError::Unavailable("offline".into())));
        let mut verifier = StateVerifier::new(stream);
        let err = verifier.get_ledger_entries(5).unwrap_err();
        assert!(matches!(err, VerifyError::Archive(_)));
        assert!(!err.is_state_error());
    }

    #[test]
    fn trustline_entries_compare_by_key() {
        let line = LedgerEntry::new(
            5,
            LedgerEntryData::Trustline(TrustLineEntry {
                account_id: AccountId::from_seed("a"),
                asset: Asset::credit("USD", AccountId::from_seed("issuer")),
                balance: 10,
                limit: 100,
                flags: 1,
            }),
        );
        let mut verifier = StateVerifier::new(VecStream::of(vec![account("a", 1), line.clone()]));
        run(&mut verifier, 1, |e| Some(e.clone())).unwrap();
        verifier.verify(2).unwrap();
    }
}
