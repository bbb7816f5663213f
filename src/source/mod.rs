/*!
 * Record sources.
 *
 * A record source yields (identifier, source title) pairs in a stable order.
 * The pipeline only depends on the `RecordSource` trait:
 *
 * - `VecSource`: records held in memory
 * - `CsvRecordSource`: pre-exported query results in a CSV file
 * - `SparqlRecordSource`: a SPARQL endpoint returning JSON results
 */

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::record::SourceRecord;

pub mod csv_file;
pub mod sparql;

pub use self::csv_file::CsvRecordSource;
pub use self::sparql::SparqlRecordSource;

/// Records produced by a source, in source order
pub type RecordIter = Box<dyn Iterator<Item = Result<SourceRecord, SourceError>> + Send>;

/// An ordered, finite sequence of title records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the records
    ///
    /// An error from `fetch` itself, or any item of the iterator, aborts
    /// the run.
    async fn fetch(&self) -> Result<RecordIter, SourceError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    records: Vec<SourceRecord>,
}

impl VecSource {
    /// Create a source from records
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }

    /// Create a source from (identifier, title) pairs
    pub fn from_pairs<I: AsRef<str>, T: AsRef<str>>(pairs: &[(I, T)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(id, title)| SourceRecord::new(id.as_ref(), title.as_ref()))
                .collect(),
        )
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the source holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn fetch(&self) -> Result<RecordIter, SourceError> {
        Ok(Box::new(self.records.clone().into_iter().map(Ok)))
    }

    fn describe(&self) -> String {
        format!("{} in-memory records", self.records.len())
    }
}
