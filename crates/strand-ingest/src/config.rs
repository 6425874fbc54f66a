use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

/// Ingestion settings.
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```toml
/// cursor_name = "HORIZON"
/// history_retention_count = 17280
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Name under which the ingested position is reported to the source.
    pub cursor_name: String,
    /// Do not report the ingested position back to the source.
    pub skip_cursor_update: bool,
    /// Write failed transactions and their operations. Failed transactions
    /// never produce effects or trades.
    pub ingest_failed_transactions: bool,
    /// When history is empty, start this many ledgers behind the source tip.
    /// Zero starts from the oldest ledger the source has.
    pub history_retention_count: u32,
    /// Capacity of the checkpoint state reader's queue.
    pub state_buffer_size: usize,
    /// Period of the background ticker, in milliseconds.
    pub tick_interval_ms: u64,
    /// Outdated ledgers looked up per round of `reingest_outdated`.
    pub outdated_batch_size: usize,
    /// Log progress every this many ledgers within one session.
    pub progress_interval: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cursor_name: "HORIZON".into(),
            skip_cursor_update: false,
            ingest_failed_transactions: true,
            history_retention_count: 0,
            state_buffer_size: 5000,
            tick_interval_ms: 1000,
            outdated_batch_size: 1000,
            progress_interval: 100,
        }
    }
}

impl IngestConfig {
    pub fn from_toml_str(text: &str) -> IngestResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> IngestResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> IngestResult<String> {
        toml::to_string(self).map_err(|e| IngestError::Config(e.to_string()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.cursor_name.is_empty() {
            return Err(IngestError::Config("cursor_name must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(IngestError::Config("tick_interval_ms must be positive".into()));
        }
        if self.outdated_batch_size == 0 {
            return Err(IngestError::Config("outdated_batch_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = IngestConfig::default();
        assert_eq!(c.cursor_name, "HORIZON");
        assert!(c.ingest_failed_transactions);
        assert_eq!(c.state_buffer_size, 5000);
        assert_eq!(c.tick_interval(), Duration::from_secs(1));
        assert_eq!(c.history_retention_count, 0);
        c.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c = IngestConfig::from_toml_str("history_retention_count = 100\nskip_cursor_update = true\n")
            .unwrap();
        assert_eq!(c.history_retention_count, 100);
        assert!(c.skip_cursor_update);
        assert_eq!(c.cursor_name, "HORIZON");
    }

    #[test]
    fn toml_roundtrip() {
        let mut c = IngestConfig::default();
        c.cursor_name = "REPLICA".into();
        let text = c.to_toml_string().unwrap();
        assert_eq!(IngestConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            IngestConfig::from_toml_str("cursor_name = \"\""),
            Err(IngestError::Config(_))
        ));
        assert!(IngestConfig::from_toml_str("tick_interval_ms = 0").is_err());
        assert!(IngestConfig::from_toml_str("cursor_name = 5").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ingest_failed_transactions = false").unwrap();
        let c = IngestConfig::load(file.path()).unwrap();
        assert!(!c.ingest_failed_transactions);
        assert!(IngestConfig::load(Path::new("/nonexistent/strand.toml")).is_err());
    }
}
