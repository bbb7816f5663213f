/*!
 * Record types flowing through the pipeline.
 *
 * A `TitleRecord` is created by a record source, filled once by the pipeline
 * coordinator, and converted into a `TranslatedTitle` for the sink.
 */

use serde::{Deserialize, Serialize};

/// One catalog entry as produced by a record source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Opaque identifier, unique within a run
    pub identifier: String,
    /// Title in the source script
    pub source_title: String,
}

impl SourceRecord {
    /// Create a new source record
    pub fn new(identifier: impl Into<String>, source_title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source_title: source_title.into(),
        }
    }
}

impl<I: Into<String>, T: Into<String>> From<(I, T)> for SourceRecord {
    fn from((identifier, source_title): (I, T)) -> Self {
        Self::new(identifier, source_title)
    }
}

/// Terminal state of a processed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordStatus {
    /// Empty or whitespace-only title, nothing to translate
    Skipped,
    /// Translated by the backend during this run
    Translated,
    /// Filled from the translation cache
    CacheHit,
    /// Translation failed; a reason is attached
    Failed,
}

impl RecordStatus {
    /// Stable lowercase label used in output files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Translated => "translated",
            Self::CacheHit => "cacheHit",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record owned by the coordinator while it is being processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRecord {
    /// Position in the source sequence
    pub position: usize,
    /// Opaque identifier
    pub identifier: String,
    /// Title in the source script
    pub source_title: String,
    /// Translation, absent until filled
    pub translated_title: Option<String>,
}

impl TitleRecord {
    /// Create a pending record at the given input position
    pub fn new(position: usize, source: SourceRecord) -> Self {
        Self {
            position,
            identifier: source.identifier,
            source_title: source.source_title,
            translated_title: None,
        }
    }

    /// Whether the source title has no content worth translating
    pub fn is_blank(&self) -> bool {
        self.source_title.trim().is_empty()
    }

    /// Finish processing with a translation
    pub fn fill(self, translation: String, status: RecordStatus) -> TranslatedTitle {
        TranslatedTitle {
            identifier: self.identifier,
            source_title: self.source_title,
            translated_title: Some(translation),
            status,
            failure_reason: None,
        }
    }

    /// Finish processing without translating
    pub fn skip(self) -> TranslatedTitle {
        TranslatedTitle {
            identifier: self.identifier,
            source_title: self.source_title,
            translated_title: None,
            status: RecordStatus::Skipped,
            failure_reason: None,
        }
    }

    /// Finish processing with a failure reason
    pub fn fail(self, reason: impl Into<String>) -> TranslatedTitle {
        TranslatedTitle {
            identifier: self.identifier,
            source_title: self.source_title,
            translated_title: None,
            status: RecordStatus::Failed,
            failure_reason: Some(reason.into()),
        }
    }
}

/// An enriched record handed to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedTitle {
    /// Opaque identifier
    pub identifier: String,
    /// Title in the source script
    pub source_title: String,
    /// Translated title, absent for skipped or failed records
    pub translated_title: Option<String>,
    /// Terminal status
    pub status: RecordStatus,
    /// Why translation failed, if it did
    pub failure_reason: Option<String>,
}

impl TranslatedTitle {
    /// Translated title or an empty string, as written to flat files
    pub fn translated_or_empty(&self) -> &str {
        self.translated_title.as_deref().unwrap_or("")
    }
}
