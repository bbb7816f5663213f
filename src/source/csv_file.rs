/*!
 * CSV record source.
 *
 * Reads pre-exported query results. The identifier and title columns are
 * looked up by header name; extra columns are ignored.
 */

use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};

use super::{RecordIter, RecordSource};
use crate::errors::SourceError;
use crate::record::SourceRecord;

/// Default identifier column
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "book_id";

/// Default title column
pub const DEFAULT_TITLE_COLUMN: &str = "tibetan_title";

/// Title records from a CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
    identifier_column: String,
    title_column: String,
}

impl CsvRecordSource {
    /// Create a source reading the default columns
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            title_column: DEFAULT_TITLE_COLUMN.to_string(),
        }
    }

    /// Read different columns
    pub fn with_columns(mut self, identifier_column: impl Into<String>, title_column: impl Into<String>) -> Self {
        self.identifier_column = identifier_column.into();
        self.title_column = title_column.into();
        self
    }

    /// Input file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<Result<SourceRecord, SourceError>>, SourceError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .flexible(true)
            .trim(::csv::Trim::Headers)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
                .ok_or_else(|| SourceError::MissingField(name.to_string()))
        };
        let identifier_index = column_index(&self.identifier_column)?;
        let title_index = column_index(&self.title_column)?;

        debug!(
            "Reading '{}' and '{}' from {:?}",
            self.identifier_column, self.title_column, self.path
        );

        let records = reader
            .into_records()
            .enumerate()
            .map(|(row, result)| -> Result<SourceRecord, SourceError> {
                let row_data = result?;
                let identifier = row_data.get(identifier_index).unwrap_or("").trim();
                if identifier.is_empty() {
                    // Header is line 1, so data row 0 is line 2
                    return Err(SourceError::Parse(format!(
                        "empty '{}' on line {}",
                        self.identifier_column,
                        row + 2
                    )));
                }
                let title = row_data.get(title_index).unwrap_or("");
                Ok(SourceRecord::new(identifier, title))
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl RecordSource for CsvRecordSource {
    async fn fetch(&self) -> Result<RecordIter, SourceError> {
        let source = self.clone();
        let records = tokio::task::spawn_blocking(move || source.read_all())
            .await
            .map_err(|e| SourceError::Io(std::io::Error::other(e)))??;

        Ok(Box::new(records.into_iter()))
    }

    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }
}
