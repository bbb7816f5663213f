/*!
 * Translation caching functionality.
 *
 * This module provides a persistent cache of translations keyed by the
 * normalized source title, so titles translated in an earlier run are never
 * sent to the backend again. The cache is bound to one target language.
 *
 * The cache never fails a run: an unreadable backing file is moved aside and
 * replaced, and if even that fails the cache works in memory for the run. A
 * file written by a newer schema is left alone and the run is uncached.
 */

use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::database::DatabaseConnection;
use crate::errors::CacheError;
use crate::language_utils::{language_codes_match, normalize_to_part2t};

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("whitespace pattern is valid")
});

/// Normalize a title for use as a cache key
///
/// Trims the title and collapses every run of Unicode whitespace into a
/// single ASCII space.
pub fn normalize_title(title: &str) -> String {
    WHITESPACE_RUNS.replace_all(title.trim(), " ").into_owned()
}

/// Row key for a target language tag
///
/// Valid tags are stored as ISO 639-2/T codes so every spelling of a
/// language shares entries. Unknown tags are kept as written, lowercased.
fn language_key(tag: &str) -> String {
    normalize_to_part2t(tag).unwrap_or_else(|_| tag.trim().to_lowercase())
}

/// Stable hash of a normalized title
fn title_hash(normalized_title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_title.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A stored translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Normalized source title (the key)
    pub normalized_title: String,
    /// Stored translation
    pub translated_title: String,
    /// Insertion timestamp (RFC 3339)
    pub created_at: String,
    /// Last overwrite timestamp (RFC 3339)
    pub updated_at: String,
    /// Number of lookups served
    pub hit_count: i64,
}

/// An overwritten translation kept for review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConflict {
    /// Normalized source title
    pub normalized_title: String,
    /// Translation that was replaced
    pub previous_translation: String,
    /// Translation that replaced it
    pub new_translation: String,
    /// When the overwrite happened (RFC 3339)
    pub recorded_at: String,
}

/// Result of a store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// New entry created
    Inserted,
    /// Same value already stored
    Unchanged,
    /// Different value replaced (last write wins)
    Overwritten {
        /// The value that was replaced
        previous: String,
    },
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache entries
    pub total_entries: i64,
    /// Total number of cache hits
    pub total_hits: i64,
    /// Number of recorded conflicts
    pub total_conflicts: i64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entries: {}, Hits: {}, Conflicts: {}",
            self.total_entries, self.total_hits, self.total_conflicts
        )
    }
}

/// Persistent translation cache for one target language
#[derive(Debug, Clone)]
pub struct TranslationCache {
    /// Backing store; `None` when neither disk nor memory could be opened
    db: Option<DatabaseConnection>,
    /// Target language this cache serves, as given
    target_language: String,
    /// Canonical form of the target language used in row keys
    language_key: String,
}

impl TranslationCache {
    /// Open the cache at `path`, degrading to an empty cache on failure
    pub fn open(path: impl AsRef<Path>, target_language: impl Into<String>) -> Self {
        let path = path.as_ref();
        let db = match DatabaseConnection::new(path) {
            Ok(db) => Some(db),
            Err(e) => match e.chain().find_map(|cause| cause.downcast_ref::<CacheError>()) {
                // A newer release owns this file; leave it untouched
                Some(too_new @ CacheError::SchemaTooNew { .. }) => {
                    warn!("{} in {:?}; running without the persistent cache", too_new, path);
                    Self::memory_store()
                }
                _ => {
                    let error = CacheError::Unavailable(format!("{:#}", e));
                    warn!("{}; starting with an empty cache", error);
                    Self::recover(path).or_else(Self::memory_store)
                }
            },
        };

        let target_language = target_language.into();
        Self {
            db,
            language_key: language_key(&target_language),
            target_language,
        }
    }

    /// Create a cache that lives only for this process
    pub fn in_memory(target_language: impl Into<String>) -> Self {
        let target_language = target_language.into();
        Self {
            db: Self::memory_store(),
            language_key: language_key(&target_language),
            target_language,
        }
    }

    fn memory_store() -> Option<DatabaseConnection> {
        match DatabaseConnection::new_in_memory() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("In-memory cache unavailable, caching disabled: {:#}", e);
                None
            }
        }
    }

    /// Move an unreadable cache file aside and start a fresh one
    fn recover(path: &Path) -> Option<DatabaseConnection> {
        if !path.exists() {
            return None;
        }

        let mut aside = path.as_os_str().to_owned();
        aside.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
        let aside = PathBuf::from(aside);

        if let Err(e) = std::fs::rename(path, &aside) {
            warn!("Could not move unreadable cache {:?} aside: {}", path, e);
            return None;
        }
        warn!("Moved unreadable cache to {:?}", aside);

        match DatabaseConnection::new(path) {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("Could not recreate cache at {:?}: {:#}", path, e);
                None
            }
        }
    }

    /// Target language this cache serves
    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Whether this cache holds translations into `language`
    ///
    /// Tags naming the same language (`en`, `eng`, `en-US`) match.
    pub fn serves(&self, language: &str) -> bool {
        self.target_language == language || language_codes_match(&self.target_language, language)
    }

    /// Whether translations survive the process
    pub fn is_persistent(&self) -> bool {
        self.db.as_ref().is_some_and(DatabaseConnection::is_persistent)
    }

    /// Look up a translation; storage errors count as a miss
    pub async fn lookup(&self, normalized_title: &str) -> Option<String> {
        let db = self.db.as_ref()?;
        let hash = title_hash(normalized_title);
        let language = self.language_key.clone();

        let result = db
            .execute_async(move |conn| {
                let found: Option<String> = conn
                    .query_row(
                        "SELECT translated_title FROM translation_cache
                         WHERE title_hash = ?1 AND target_language = ?2",
                        params![hash, language],
                        |row| row.get(0),
                    )
                    .optional()?;

                if found.is_some() {
                    conn.execute(
                        "UPDATE translation_cache SET hit_count = hit_count + 1
                         WHERE title_hash = ?1 AND target_language = ?2",
                        params![hash, language],
                    )?;
                }

                Ok(found)
            })
            .await;

        match result {
            Ok(Some(translation)) => {
                debug!("Cache hit for '{}'", truncate_text(normalized_title, 30));
                Some(translation)
            }
            Ok(None) => {
                debug!("Cache miss for '{}'", truncate_text(normalized_title, 30));
                None
            }
            Err(e) => {
                warn!("Cache lookup failed, treating as miss: {:#}", e);
                None
            }
        }
    }

    /// Store a translation (last write wins)
    ///
    /// Storing an identical value is a no-op. A different value replaces the
    /// stored one and the replacement is recorded as a conflict.
    pub async fn store(&self, normalized_title: &str, translation: &str) -> Result<StoreOutcome, CacheError> {
        let Some(db) = self.db.as_ref() else {
            return Err(CacheError::Unavailable("no backing store".to_string()));
        };

        let hash = title_hash(normalized_title);
        let language = self.language_key.clone();
        let title = normalized_title.to_string();
        let value = translation.to_string();

        let outcome = db
            .transaction_async(move |tx| {
                let now = Utc::now().to_rfc3339();
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT translated_title FROM translation_cache
                         WHERE title_hash = ?1 AND target_language = ?2",
                        params![hash, language],
                        |row| row.get(0),
                    )
                    .optional()?;

                match existing {
                    Some(previous) if previous == value => Ok(StoreOutcome::Unchanged),
                    Some(previous) => {
                        tx.execute(
                            "UPDATE translation_cache SET translated_title = ?3, updated_at = ?4
                             WHERE title_hash = ?1 AND target_language = ?2",
                            params![hash, language, value, now],
                        )?;
                        tx.execute(
                            "INSERT INTO cache_conflicts (
                                title_hash, target_language, normalized_title,
                                previous_translation, new_translation, recorded_at
                             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            params![hash, language, title, previous, value, now],
                        )?;
                        Ok(StoreOutcome::Overwritten { previous })
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO translation_cache (
                                title_hash, target_language, normalized_title,
                                translated_title, created_at, updated_at
                             ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                            params![hash, language, title, value, now],
                        )?;
                        Ok(StoreOutcome::Inserted)
                    }
                }
            })
            .await
            .map_err(|e| CacheError::Unavailable(format!("{:#}", e)))?;

        match &outcome {
            StoreOutcome::Overwritten { previous } => warn!(
                "Cache conflict for '{}': '{}' replaced by '{}'",
                truncate_text(normalized_title, 30),
                previous,
                translation
            ),
            StoreOutcome::Inserted => debug!("Cached translation for '{}'", truncate_text(normalized_title, 30)),
            StoreOutcome::Unchanged => {}
        }

        Ok(outcome)
    }

    /// Fetch the full entry for a title
    pub async fn entry(&self, normalized_title: &str) -> Result<Option<CacheEntry>> {
        let Some(db) = self.db.as_ref() else {
            return Ok(None);
        };
        let hash = title_hash(normalized_title);
        let language = self.language_key.clone();

        db.execute_async(move |conn| {
            let entry = conn
                .query_row(
                    "SELECT normalized_title, translated_title, created_at, updated_at, hit_count
                     FROM translation_cache WHERE title_hash = ?1 AND target_language = ?2",
                    params![hash, language],
                    |row| {
                        Ok(CacheEntry {
                            normalized_title: row.get(0)?,
                            translated_title: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                            hit_count: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    /// Remove one entry; returns whether it existed
    pub async fn invalidate(&self, normalized_title: &str) -> Result<bool> {
        let Some(db) = self.db.as_ref() else {
            return Ok(false);
        };
        let hash = title_hash(normalized_title);
        let language = self.language_key.clone();

        let removed = db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM translation_cache WHERE title_hash = ?1 AND target_language = ?2",
                    params![hash, language],
                )?)
            })
            .await?;

        if removed > 0 {
            info!("Invalidated cached translation for '{}'", truncate_text(normalized_title, 30));
        }
        Ok(removed > 0)
    }

    /// Remove every entry for this target language
    pub async fn clear(&self) -> Result<usize> {
        let Some(db) = self.db.as_ref() else {
            return Ok(0);
        };
        let language = self.language_key.clone();

        let removed = db
            .execute_async(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM translation_cache WHERE target_language = ?1",
                    params![language],
                )?)
            })
            .await?;

        info!("Translation cache cleared ({} entries)", removed);
        Ok(removed)
    }

    /// Get cache statistics
    pub async fn stats(&self) -> Result<CacheStats> {
        let Some(db) = self.db.as_ref() else {
            return Ok(CacheStats::default());
        };
        let language = self.language_key.clone();

        db.execute_async(move |conn| {
            let (total_entries, total_hits): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM translation_cache
                 WHERE target_language = ?1",
                params![language],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let total_conflicts: i64 = conn.query_row(
                "SELECT COUNT(*) FROM cache_conflicts WHERE target_language = ?1",
                params![language],
                |row| row.get(0),
            )?;

            Ok(CacheStats {
                total_entries,
                total_hits,
                total_conflicts,
            })
        })
        .await
    }

    /// Most recent conflicts, newest first
    pub async fn conflicts(&self, limit: usize) -> Result<Vec<CacheConflict>> {
        let Some(db) = self.db.as_ref() else {
            return Ok(Vec::new());
        };
        let language = self.language_key.clone();

        db.execute_async(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT normalized_title, previous_translation, new_translation, recorded_at
                 FROM cache_conflicts WHERE target_language = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;

            let conflicts = stmt
                .query_map(params![language, limit as i64], |row| {
                    Ok(CacheConflict {
                        normalized_title: row.get(0)?,
                        previous_translation: row.get(1)?,
                        new_translation: row.get(2)?,
                        recorded_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(conflicts)
        })
        .await
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
