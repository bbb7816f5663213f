/*!
 * Database module for the persistent translation cache.
 *
 * This module provides SQLite-based persistence for:
 * - Translations keyed by normalized source title and target language
 * - Conflicting overwrites kept for operator review
 */

pub mod schema;
pub mod connection;

// Re-export main types
pub use connection::DatabaseConnection;
