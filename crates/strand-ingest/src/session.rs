use std::sync::Arc;

use strand_history::HistoryStore;
use strand_source::LedgerSource;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::cursor::Cursor;
use crate::details::operation_details;
use crate::effects::{ingest_effects, EffectIngestion};
use crate::error::{IngestError, IngestResult};
use crate::ingestion::{Ingestion, LedgerCounts};
use crate::participants;
use crate::trades::trade_rows;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Committed,
    RolledBack,
}

/// What a session wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ledgers: u32,
    pub transactions: u64,
    pub operations: u64,
    pub effects: u64,
    pub trades: u64,
}

/// One ingestion pass over an inclusive ledger range.
///
/// Each ledger is written and committed on its own, so an error keeps the
/// ledgers already committed and rolls back only the ledger in progress.
/// With `clear_existing` set, rows already stored for a ledger are deleted
/// before it is written again.
pub struct Session {
    cursor: Cursor,
    ingestion: Ingestion,
    clear_existing: bool,
    ingest_failed_transactions: bool,
    progress_interval: u32,
    state: SessionState,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        source: Arc<dyn LedgerSource>,
        store: Arc<dyn HistoryStore>,
        first: u32,
        last: u32,
        config: &IngestConfig,
    ) -> Self {
        Self {
            cursor: Cursor::new(source, first, last),
            ingestion: Ingestion::new(store),
            clear_existing: false,
            ingest_failed_transactions: config.ingest_failed_transactions,
            progress_interval: config.progress_interval.max(1),
            state: SessionState::Idle,
            stats: SessionStats::default(),
        }
    }

    pub fn with_clear_existing(mut self, clear_existing: bool) -> Self {
        self.clear_existing = clear_existing;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn first_ledger(&self) -> u32 {
        self.cursor.first_ledger()
    }

    pub fn last_ledger(&self) -> u32 {
        self.cursor.last_ledger()
    }

    /// Ingest the whole range. A session runs once.
    pub fn run(&mut self) -> IngestResult<SessionStats> {
        if self.state != SessionState::Idle {
            return Err(IngestError::InvalidState(format!(
                "session for {}..={} already ran",
                self.first_ledger(),
                self.last_ledger()
            )));
        }
        self.state = SessionState::Running;
        debug!(
            first = self.first_ledger(),
            last = self.last_ledger(),
            clear_existing = self.clear_existing,
            "ingest: session started"
        );

        match self.ingest_range() {
            Ok(()) => {
                self.state = SessionState::Committed;
                Ok(self.stats)
            }
            Err(e) => {
                if let Err(rollback) = self.ingestion.rollback() {
                    warn!(error = %rollback, "ingest: rollback failed");
                }
                self.state = SessionState::RolledBack;
                Err(e)
            }
        }
    }

    fn ingest_range(&mut self) -> IngestResult<()> {
        self.ingestion.start()?;
        while self.cursor.next_ledger() {
            self.clear_ledger()?;
            self.ingest_ledger()?;
            self.ingestion.flush()?;
            self.stats.ledgers += 1;
            if self.stats.ledgers % self.progress_interval == 0 {
                info!(
                    ledger = self.cursor.ledger_sequence(),
                    ingested = self.stats.ledgers,
                    last = self.last_ledger(),
                    "ingest: progress"
                );
            }
        }
        if let Some(e) = self.cursor.take_err() {
            return Err(e);
        }
        self.ingestion.close()
    }

    fn clear_ledger(&mut self) -> IngestResult<()> {
        if !self.clear_existing {
            return Ok(());
        }
        let (start, end) = self.cursor.ledger_range();
        self.ingestion.clear(start, end)
    }

    fn ingest_ledger(&mut self) -> IngestResult<()> {
        let counts = LedgerCounts {
            transactions: self.cursor.transactions().len(),
            successful_transactions: self.cursor.successful_transaction_count(),
            failed_transactions: self.cursor.failed_transaction_count(),
            operations: self.cursor.successful_ledger_operation_count(),
        };
        self.ingestion
            .ledger(self.cursor.ledger_id(), self.cursor.ledger(), counts)?;
        while self.cursor.next_tx() {
            self.ingest_transaction()?;
        }
        Ok(())
    }

    fn ingest_transaction(&mut self) -> IngestResult<()> {
        let tx = self.cursor.transaction();
        let successful = tx.is_successful();
        if !successful && !self.ingest_failed_transactions {
            return Ok(());
        }
        let tx_id = self.cursor.transaction_id();
        self.ingestion.transaction(tx_id, tx)?;
        self.stats.transactions += 1;

        while self.cursor.next_op() {
            self.ingest_operation(tx_id, successful)?;
        }

        let participants = participants::for_transaction(self.cursor.transaction());
        self.ingestion
            .transaction_participants(tx_id, &participants)
    }

    fn ingest_operation(&mut self, tx_id: i64, successful: bool) -> IngestResult<()> {
        let view = self.cursor.operation_view();
        self.ingestion.operation(
            view.operation_id,
            tx_id,
            view.order,
            &view.source,
            view.operation_type(),
            operation_details(&view)?,
        )?;
        self.ingestion.operation_participants(
            view.operation_id,
            &participants::for_operation(view.transaction, view.operation),
        )?;
        self.stats.operations += 1;

        // Failed transactions change nothing, so they have no effects.
        if !successful {
            return Ok(());
        }

        let mut effects = EffectIngestion::new(&mut self.ingestion, view.operation_id);
        ingest_effects(&view, &mut effects)?;
        self.stats.effects += u64::from(effects.count());
        effects.finish()?;

        for row in trade_rows(&view)? {
            self.ingestion.trade(row)?;
            self.stats.trades += 1;
        }
        Ok(())
    }
}
