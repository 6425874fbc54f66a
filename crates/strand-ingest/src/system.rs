use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use strand_history::{HistoryQueries, HistoryStore};
use strand_source::{CursorReporter, LedgerSource};
use strand_types::Toid;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::ingestion::{Ingestion, CURRENT_VERSION};
use crate::session::{Session, SessionStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Whether a session currently owns the history store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionSlot {
    #[default]
    Idle,
    Running(SessionId),
}

impl SessionSlot {
    /// Claim the slot for `id`. Fails while another session holds it.
    pub fn try_start(&mut self, id: SessionId) -> bool {
        match self {
            SessionSlot::Idle => {
                *self = SessionSlot::Running(id);
                true
            }
            SessionSlot::Running(_) => false,
        }
    }

    pub fn finish(&mut self) {
        *self = SessionSlot::Idle;
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionSlot::Running(_))
    }
}

/// Last observed bounds of the source and of derived history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub source_latest: Option<u32>,
    pub source_elder: Option<u32>,
    pub history_latest: Option<u32>,
    pub history_elder: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another session was running; nothing was done.
    Busy,
    /// History already holds every ledger the source has.
    UpToDate,
    Ingested {
        first: u32,
        last: u32,
        stats: SessionStats,
    },
}

/// Releases the session slot when dropped.
struct SlotGuard<'a> {
    system: &'a System,
    id: SessionId,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.system.slot.lock().expect("lock poisoned");
        slot.finish();
        self.system.idle.notify_all();
        debug!(session = %self.id, "ingest: session slot released");
    }
}

/// Keeps derived history in step with the source.
///
/// At most one session writes to the history store at a time. [`System::tick`]
/// skips its turn when a session is running; the `reingest_*`, `clear_all`
/// and `rebase_history` operations wait for the running session to finish.
pub struct System {
    source: Arc<dyn LedgerSource>,
    store: Arc<dyn HistoryStore>,
    reporter: Arc<dyn CursorReporter>,
    config: IngestConfig,
    slot: Mutex<SessionSlot>,
    idle: Condvar,
    next_session: AtomicU64,
    state: Mutex<LedgerState>,
}

impl System {
    pub fn new(
        source: Arc<dyn LedgerSource>,
        store: Arc<dyn HistoryStore>,
        reporter: Arc<dyn CursorReporter>,
        config: IngestConfig,
    ) -> Self {
        Self {
            source,
            store,
            reporter,
            config,
            slot: Mutex::new(SessionSlot::Idle),
            idle: Condvar::new(),
            next_session: AtomicU64::new(1),
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn is_importing(&self) -> bool {
        self.slot.lock().expect("lock poisoned").is_running()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        match *self.slot.lock().expect("lock poisoned") {
            SessionSlot::Running(id) => Some(id),
            SessionSlot::Idle => None,
        }
    }

    /// The bounds cached by the last [`System::update_ledger_state`].
    pub fn ledger_state(&self) -> LedgerState {
        *self.state.lock().expect("lock poisoned")
    }

    /// Refresh the cached bounds from the source and the history store.
    pub fn update_ledger_state(&self) -> IngestResult<LedgerState> {
        let fresh = LedgerState {
            source_latest: self.source.latest_ledger()?,
            source_elder: self.source.elder_ledger()?,
            history_latest: self.store.latest_ledger()?,
            history_elder: self.store.elder_ledger()?,
        };
        *self.state.lock().expect("lock poisoned") = fresh;
        Ok(fresh)
    }

    /// Ingest whatever the source has closed since the last tick.
    ///
    /// Returns [`TickOutcome::Busy`] at once if a session is running. A panic
    /// raised while ingesting is caught here and returned as
    /// [`IngestError::Panicked`]; the store transaction in flight is rolled
    /// back and the slot released.
    pub fn tick(&self) -> IngestResult<TickOutcome> {
        let Some(guard) = self.try_acquire() else {
            debug!("ingest: session in progress, skipping tick");
            return Ok(TickOutcome::Busy);
        };
        let session = guard.id;
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_once()));
        drop(guard);

        match outcome {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                error!(
                    %session,
                    error = %e,
                    state_error = e.is_state_error(),
                    "ingest: tick failed"
                );
                Err(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%session, panic = %message, "ingest: recovered from panic");
                Err(IngestError::Panicked(message))
            }
        }
    }

    /// Delete and re-ingest `start..=end`.
    pub fn reingest_range(&self, start: u32, end: u32) -> IngestResult<SessionStats> {
        if start == 0 || start > end {
            return Err(IngestError::InvalidRange { start, end });
        }
        let _guard = self.acquire();
        let stats = self.run_session(start, end, true)?;
        self.refresh_state();
        info!(start, end, ledgers = stats.ledgers, "ingest: range complete");
        Ok(stats)
    }

    pub fn reingest_single(&self, sequence: u32) -> IngestResult<SessionStats> {
        self.reingest_range(sequence, sequence)
    }

    /// Trim abandoned history, then re-ingest every ledger the source has.
    pub fn reingest_all(&self) -> IngestResult<SessionStats> {
        let _guard = self.acquire();
        self.trim_abandoned_locked()?;
        let (Some(elder), Some(latest)) =
            (self.source.elder_ledger()?, self.source.latest_ledger()?)
        else {
            return Ok(SessionStats::default());
        };
        let stats = self.run_session(elder, latest, true)?;
        self.refresh_state();
        info!(start = elder, end = latest, ledgers = stats.ledgers, "ingest: range complete");
        Ok(stats)
    }

    /// Re-ingest every ledger written by an older importer version, in
    /// contiguous runs. Returns the number of ledgers re-ingested.
    pub fn reingest_outdated(&self) -> IngestResult<u32> {
        let _guard = self.acquire();
        self.trim_abandoned_locked()?;
        let mut total = 0;
        loop {
            let outdated = self
                .store
                .outdated_ledgers(CURRENT_VERSION, self.config.outdated_batch_size)?;
            if outdated.is_empty() {
                break;
            }
            for (start, end) in contiguous_runs(&outdated) {
                let stats = self.run_session(start, end, true)?;
                info!(start, end, ledgers = stats.ledgers, "reingest: outdated range done");
                total += stats.ledgers;
            }
        }
        self.refresh_state();
        Ok(total)
    }

    /// Delete all derived history.
    pub fn clear_all(&self) -> IngestResult<()> {
        let _guard = self.acquire();
        self.clear_all_locked()?;
        self.refresh_state();
        Ok(())
    }

    /// Delete all derived history and restart it at `sequence`.
    pub fn rebase_history(&self, sequence: u32) -> IngestResult<SessionStats> {
        if sequence == 0 {
            return Err(IngestError::InvalidRange {
                start: sequence,
                end: sequence,
            });
        }
        let _guard = self.acquire();
        self.clear_all_locked()?;
        let stats = self.run_session(sequence, sequence, false)?;
        self.refresh_state();
        info!(sequence, "ingest: history rebased");
        Ok(stats)
    }

    /// Delete history rows for ledgers the source no longer has.
    pub fn trim_abandoned(&self) -> IngestResult<()> {
        let _guard = self.acquire();
        self.trim_abandoned_locked()?;
        self.refresh_state();
        Ok(())
    }

    /// Check that ledger `sequence` links to its parent in the source.
    pub fn validate_ledger_chain(&self, sequence: u32) -> IngestResult<()> {
        if sequence <= 1 {
            return Ok(());
        }
        let current = self
            .source
            .ledger_header(sequence)?
            .ok_or(IngestError::MissingLedger { sequence })?;
        let parent = self
            .source
            .ledger_header(sequence - 1)?
            .ok_or(IngestError::MissingLedger {
                sequence: sequence - 1,
            })?;
        if !current.follows(&parent) {
            return Err(IngestError::ChainBroken {
                sequence,
                previous_hash: current.previous_hash,
                parent_hash: parent.hash,
            });
        }
        Ok(())
    }

    /// Run [`System::tick`] every `tick_interval` on a worker thread until
    /// the returned handle is stopped or dropped.
    ///
    /// The worker owns a current-thread runtime; ticks run on it inline, so
    /// a slow tick delays the next one instead of overlapping it.
    pub fn spawn_ticker(self: &Arc<Self>) -> IngestResult<Ticker> {
        self.config.validate()?;
        let system = Arc::clone(self);
        let period = self.config.tick_interval();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| IngestError::Spawn(e.to_string()))?;
        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = thread::Builder::new()
            .name("strand-ticker".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            // A send or a dropped sender both stop the loop.
                            _ = &mut stopped => break,
                            _ = interval.tick() => {
                                // Failures are logged by tick.
                                let _ = system.tick();
                            }
                        }
                    }
                });
            })
            .map_err(|e| IngestError::Spawn(e.to_string()))?;
        info!(interval_ms = self.config.tick_interval_ms, "ingest: ticker started");
        Ok(Ticker {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    fn run_once(&self) -> IngestResult<TickOutcome> {
        let state = self.update_ledger_state()?;
        let Some((first, last)) = self.next_range(&state)? else {
            return Ok(TickOutcome::UpToDate);
        };
        if state.history_latest.is_some() {
            self.validate_ledger_chain(first)?;
        }

        let stats = self.run_session(first, last, false)?;
        self.report_cursor(last);
        self.refresh_state();
        info!(start = first, end = last, ledgers = stats.ledgers, "ingest: range complete");
        Ok(TickOutcome::Ingested { first, last, stats })
    }

    /// The range a tick should ingest, if any.
    fn next_range(&self, state: &LedgerState) -> IngestResult<Option<(u32, u32)>> {
        let Some(latest) = state.source_latest else {
            return Ok(None);
        };
        let first = match state.history_latest {
            Some(history) => history.saturating_add(1),
            None => {
                // Empty history starts after genesis, or `retention` ledgers
                // behind the tip.
                let floor = if self.config.history_retention_count > 0 {
                    latest.saturating_sub(self.config.history_retention_count)
                } else {
                    1
                };
                match self.source.first_ledger_after(floor)? {
                    Some(first) => first,
                    None => return Ok(None),
                }
            }
        };
        Ok((first <= latest).then_some((first, latest)))
    }

    fn run_session(&self, first: u32, last: u32, clear_existing: bool) -> IngestResult<SessionStats> {
        Session::new(
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            first,
            last,
            &self.config,
        )
        .with_clear_existing(clear_existing)
        .run()
    }

    fn report_cursor(&self, sequence: u32) {
        if self.config.skip_cursor_update {
            return;
        }
        if let Err(e) = self.reporter.set_cursor(&self.config.cursor_name, sequence) {
            warn!(
                cursor = %self.config.cursor_name,
                sequence,
                error = %e,
                "ingest: cursor update failed"
            );
        }
    }

    fn refresh_state(&self) {
        if let Err(e) = self.update_ledger_state() {
            warn!(error = %e, "ingest: ledger state refresh failed");
        }
    }

    fn clear_all_locked(&self) -> IngestResult<()> {
        let mut ingestion = Ingestion::new(Arc::clone(&self.store));
        ingestion.start()?;
        ingestion.clear_all()?;
        ingestion.close()?;
        info!("ingest: history cleared");
        Ok(())
    }

    fn trim_abandoned_locked(&self) -> IngestResult<()> {
        let Some(elder) = self.source.elder_ledger()? else {
            return Ok(());
        };
        let mut ingestion = Ingestion::new(Arc::clone(&self.store));
        ingestion.start()?;
        ingestion.clear(0, Toid::ledger(elder).to_i64())?;
        ingestion.close()?;
        info!(below = elder, "reingest: abandoned ledgers trimmed");
        Ok(())
    }

    fn new_session_id(&self) -> SessionId {
        SessionId(self.next_session.fetch_add(1, Ordering::Relaxed))
    }

    fn try_acquire(&self) -> Option<SlotGuard<'_>> {
        let id = self.new_session_id();
        let mut slot = self.slot.lock().expect("lock poisoned");
        slot.try_start(id).then_some(SlotGuard { system: self, id })
    }

    /// Wait for the slot.
    fn acquire(&self) -> SlotGuard<'_> {
        let id = self.new_session_id();
        let mut slot = self.slot.lock().expect("lock poisoned");
        while !slot.try_start(id) {
            slot = self.idle.wait(slot).expect("lock poisoned");
        }
        SlotGuard { system: self, id }
    }
}

/// Handle to a background ticker. Stops the ticker when dropped.
pub struct Ticker {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Stop ticking and wait for the tick in progress, if any.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("ingest: ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Group ascending sequences into inclusive runs of consecutive values.
fn contiguous_runs(sequences: &[u32]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &seq in sequences {
        match runs.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(seq) => *end = seq,
            _ => runs.push((seq, seq)),
        }
    }
    runs
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_history::InMemoryHistoryStore;
    use strand_source::{InMemoryLedgerSource, NoopReporter};

    fn system(source: Arc<InMemoryLedgerSource>, config: IngestConfig) -> System {
        System::new(
            source,
            Arc::new(InMemoryHistoryStore::new()),
            Arc::new(NoopReporter),
            config,
        )
    }

    fn source_with(ledgers: u32) -> Arc<InMemoryLedgerSource> {
        let source = Arc::new(InMemoryLedgerSource::new());
        for t in 0..ledgers {
            source.append_ledger(u64::from(t), vec![]).unwrap();
        }
        source
    }

    #[test]
    fn slot_is_single_flight() {
        let mut slot = SessionSlot::default();
        assert!(slot.try_start(SessionId(1)));
        assert!(!slot.try_start(SessionId(2)));
        assert_eq!(slot, SessionSlot::Running(SessionId(1)));
        slot.finish();
        assert!(slot.try_start(SessionId(3)));
    }

    #[test]
    fn runs_group_consecutive_ledgers() {
        assert!(contiguous_runs(&[]).is_empty());
        assert_eq!(
            contiguous_runs(&[2, 3, 4, 7, 9, 10]),
            vec![(2, 4), (7, 7), (9, 10)]
        );
        assert_eq!(contiguous_runs(&[u32::MAX]), vec![(u32::MAX, u32::MAX)]);
    }

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn empty_history_starts_after_genesis() {
        let system = system(source_with(5), IngestConfig::default());
        let state = system.update_ledger_state().unwrap();
        assert_eq!(state.source_latest, Some(5));
        assert_eq!(system.next_range(&state).unwrap(), Some((2, 5)));
    }

    #[test]
    fn retention_limits_the_first_range() {
        let config = IngestConfig {
            history_retention_count: 3,
            ..IngestConfig::default()
        };
        let system = system(source_with(10), config);
        let state = system.update_ledger_state().unwrap();
        assert_eq!(system.next_range(&state).unwrap(), Some((8, 10)));
    }

    #[test]
    fn caught_up_history_has_no_range() {
        let system = system(source_with(4), IngestConfig::default());
        let state = LedgerState {
            source_latest: Some(4),
            source_elder: Some(1),
            history_latest: Some(4),
            history_elder: Some(2),
        };
        assert_eq!(system.next_range(&state).unwrap(), None);
        assert_eq!(system.next_range(&LedgerState::default()).unwrap(), None);
    }

    #[test]
    fn chain_validation() {
        let source = source_with(4);
        let system = system(source.clone(), IngestConfig::default());
        system.validate_ledger_chain(4).unwrap();
        system.validate_ledger_chain(1).unwrap();

        source.remove_ledger(3).unwrap();
        assert!(matches!(
            system.validate_ledger_chain(4),
            Err(IngestError::MissingLedger { sequence: 3 })
        ));
        assert!(matches!(
            system.validate_ledger_chain(3),
            Err(IngestError::MissingLedger { sequence: 3 })
        ));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let system = system(source_with(3), IngestConfig::default());
        assert!(matches!(
            system.reingest_range(5, 2),
            Err(IngestError::InvalidRange { start: 5, end: 2 })
        ));
        assert!(system.reingest_range(0, 2).is_err());
        assert!(!system.is_importing());
    }

    #[test]
    fn ticker_rejects_zero_interval() {
        let config = IngestConfig {
            tick_interval_ms: 0,
            ..IngestConfig::default()
        };
        let system = Arc::new(system(source_with(2), config));
        assert!(matches!(system.spawn_ticker(), Err(IngestError::Config(_))));
    }

    #[test]
    fn dropping_ticker_stops_it() {
        let config = IngestConfig {
            tick_interval_ms: 5,
            ..IngestConfig::default()
        };
        let system = Arc::new(system(source_with(3), config));
        let ticker = system.spawn_ticker().unwrap();
        drop(ticker);
        assert!(!system.is_importing());
        assert_eq!(Arc::strong_count(&system), 1);
    }
}
