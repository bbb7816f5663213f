/*!
 * Sinks for enriched title records.
 *
 * The pipeline hands every record to `RecordSink::write` in input order and
 * calls `RecordSink::finish` once with the run summary.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::record::{RecordStatus, TranslatedTitle};
use crate::translation::RunSummary;

/// Header of the translations file
pub const TRANSLATIONS_HEADER: [&str; 3] = ["identifier", "source_title", "translated_title"];

/// Header of the failures file
pub const FAILURES_HEADER: [&str; 4] = ["identifier", "source_title", "status", "reason"];

/// Suffix of files still being written
const IN_PROGRESS_SUFFIX: &str = ".part";

/// Destination of pipeline output
pub trait RecordSink: Send {
    /// Accept the next record
    fn write(&mut self, item: &TranslatedTitle) -> Result<()>;

    /// Called once after the last record
    fn finish(&mut self, summary: &RunSummary) -> Result<()>;
}

impl RecordSink for Vec<TranslatedTitle> {
    fn write(&mut self, item: &TranslatedTitle) -> Result<()> {
        self.push(item.clone());
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Writes `<base>_translations.csv` and `<base>_failures.csv`
///
/// Rows go to `.part` files first. `finish` renames them to their final
/// names, adding `_partial` when the run was cancelled. The failures file is
/// only produced when something failed.
#[derive(Debug)]
pub struct CsvSink {
    base: String,
    translations: Option<csv::Writer<File>>,
    failures: Option<csv::Writer<File>>,
    written: usize,
    failed: usize,
}

impl CsvSink {
    /// Create a sink for the given output base path
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            translations: None,
            failures: None,
            written: 0,
            failed: 0,
        }
    }

    /// Final path of the translations file
    pub fn translations_path(&self, partial: bool) -> PathBuf {
        PathBuf::from(format!("{}_translations{}.csv", self.base, partial_suffix(partial)))
    }

    /// Final path of the failures file
    pub fn failures_path(&self, partial: bool) -> PathBuf {
        PathBuf::from(format!("{}_failures{}.csv", self.base, partial_suffix(partial)))
    }

    /// Records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    fn translations_writer(&mut self) -> Result<&mut csv::Writer<File>> {
        if self.translations.is_none() {
            let path = in_progress(&self.translations_path(false));
            self.translations = Some(open_writer(&path, &TRANSLATIONS_HEADER)?);
        }
        self.translations
            .as_mut()
            .context("translations writer not initialized")
    }

    fn failures_writer(&mut self) -> Result<&mut csv::Writer<File>> {
        if self.failures.is_none() {
            let path = in_progress(&self.failures_path(false));
            self.failures = Some(open_writer(&path, &FAILURES_HEADER)?);
        }
        self.failures
            .as_mut()
            .context("failures writer not initialized")
    }
}

impl RecordSink for CsvSink {
    fn write(&mut self, item: &TranslatedTitle) -> Result<()> {
        self.translations_writer()?
            .write_record([
                item.identifier.as_str(),
                item.source_title.as_str(),
                item.translated_or_empty(),
            ])
            .context("Failed to write translation row")?;
        self.written += 1;

        if item.status == RecordStatus::Failed {
            let reason = item.failure_reason.as_deref().unwrap_or("");
            self.failures_writer()?
                .write_record([
                    item.identifier.as_str(),
                    item.source_title.as_str(),
                    item.status.as_str(),
                    reason,
                ])
                .context("Failed to write failure row")?;
            self.failed += 1;
        }

        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        let partial = summary.is_partial();

        // An empty run still produces a translations file with its header
        self.translations_writer()?;

        if let Some(mut writer) = self.translations.take() {
            writer.flush().context("Failed to flush translations file")?;
            drop(writer);
            let target = self.translations_path(partial);
            finalize(&in_progress(&self.translations_path(false)), &target)?;
            info!("Wrote {} rows to {}", self.written, target.display());
        }

        if let Some(mut writer) = self.failures.take() {
            writer.flush().context("Failed to flush failures file")?;
            drop(writer);
            let target = self.failures_path(partial);
            finalize(&in_progress(&self.failures_path(false)), &target)?;
            info!("Wrote {} failed titles to {}", self.failed, target.display());
        }

        Ok(())
    }
}

fn partial_suffix(partial: bool) -> &'static str {
    if partial { "_partial" } else { "" }
}

fn in_progress(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(IN_PROGRESS_SUFFIX);
    PathBuf::from(name)
}

fn open_writer(path: &Path, header: &[&str]) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }

    debug!("Opening output file {}", path.display());
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer
        .write_record(header)
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    Ok(writer)
}

fn finalize(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))
}
