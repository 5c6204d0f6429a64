//! JSONL writer for the trade ledger - one append-only file per run
//!
//! Records stream into `trades_<cycle-ts>.jsonl.tmp` and the file is
//! renamed into place on flush, so an interrupted run leaves no
//! partially-written ledger file for the history reader to pick up.

use super::trade::TradeRecord;
use super::writer_backend::{LedgerWriterBackend, LedgerWriterError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct JsonlLedgerWriter {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    written: usize,
}

impl JsonlLedgerWriter {
    pub fn new(history_dir: PathBuf, cycle_ts: DateTime<Utc>) -> std::io::Result<Self> {
        fs::create_dir_all(&history_dir)?;

        let final_path = history_dir.join(format!("trades_{}.jsonl", cycle_ts.timestamp()));
        let tmp_path = final_path.with_extension("jsonl.tmp");
        let file = File::create(&tmp_path)?;

        log::info!("📝 Writing trade ledger to: {}", final_path.display());

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            tmp_path,
            final_path,
            written: 0,
        })
    }

    fn write_record_sync(&mut self, record: &TradeRecord) -> Result<(), LedgerWriterError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LedgerWriterError::Database("writer already committed".to_string()))?;

        let json = serde_json::to_string(record)?;
        writeln!(writer, "{}", json)?;
        self.written += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LedgerWriterError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        if self.written == 0 {
            // Nothing to persist, drop the temp file instead of
            // publishing an empty ledger segment
            drop(writer);
            let _ = fs::remove_file(&self.tmp_path);
            return Ok(());
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&self.tmp_path, &self.final_path)?;

        log::debug!("✅ Committed {} trade(s) to {}", self.written, self.final_path.display());
        Ok(())
    }
}

impl Drop for JsonlLedgerWriter {
    fn drop(&mut self) {
        // Uncommitted temp files must not survive the run
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

#[async_trait]
impl LedgerWriterBackend for JsonlLedgerWriter {
    async fn write_record(&mut self, record: &TradeRecord) -> Result<(), LedgerWriterError> {
        self.write_record_sync(record)
    }

    async fn flush(&mut self) -> Result<(), LedgerWriterError> {
        self.commit()
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
