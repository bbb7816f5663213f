/*!
 * Common test utilities for the titlewai test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use titlewai::providers::mock::MockBackend;
use titlewai::translation::{
    PipelineCoordinator, PipelineOptions, RetryPolicy, TranslationCache, TranslationClient,
};


/// Routes `log` output through the test harness; safe to call repeatedly
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a titles CSV in the default export layout
pub fn create_titles_csv(dir: &Path, rows: &[(&str, &str)]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(dir.join("tibetan_titles.csv"))?;
    writer.write_record(["book_id", "tibetan_title"])?;
    for (id, title) in rows {
        writer.write_record([*id, *title])?;
    }
    writer.flush()?;
    Ok(dir.join("tibetan_titles.csv"))
}

/// Sample Tibetan titles with stable identifiers
pub fn sample_titles() -> Vec<(&'static str, &'static str)> {
    vec![
        ("W22084", "བཀའ་འགྱུར།"),
        ("W23703", "བསྟན་འགྱུར།"),
        ("W1KG13126", "བོད་ཀྱི་ལོ་རྒྱུས།"),
        ("W00KG09", ""),
        ("W1PD95844", "ཐར་པ་རིན་པོ་ཆེའི་རྒྱན།"),
    ]
}

/// Builds a coordinator over a mock backend with near-zero retry delays
pub fn mock_pipeline(
    backend: &MockBackend,
    cache: TranslationCache,
    workers: usize,
    max_retries: u32,
) -> PipelineCoordinator {
    let client = TranslationClient::new(
        Arc::new(backend.clone()),
        RetryPolicy::immediate(max_retries),
        "bo",
    );
    PipelineCoordinator::new(client, cache, PipelineOptions::new("en").with_workers(workers))
        .expect("valid pipeline options")
}
