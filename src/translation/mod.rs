/*!
 * Title translation for catalogue records.
 *
 * This module contains the translation core. It is split into several
 * submodules:
 *
 * - `cache`: Persistent translation cache keyed by normalized title
 * - `client`: Retrying, time-bounded calls to a translation backend
 * - `retry`: Backoff and retry budgets
 * - `pipeline`: Ordered, bounded-concurrency run coordination
 */

// Re-export main types for easier usage
pub use self::cache::{CacheStats, StoreOutcome, TranslationCache, normalize_title};
pub use self::client::TranslationClient;
pub use self::pipeline::{PipelineCoordinator, PipelineOptions, RunOutcome, RunSummary};
pub use self::retry::RetryPolicy;

// Submodules
pub mod cache;
pub mod client;
pub mod pipeline;
pub mod retry;
