//! Test vector files.
//!
//! Test vectors are text files that contain whitespace-separated decimal
//! integers, such as the input samples and the golden output of the filter.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Values loaded from a test vector file.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Vectors {
    /// Values read from the file, at most `requested`.
    pub values: Vec<i32>,
    /// Number of values that were requested.
    pub requested: usize,
}

impl Vectors {
    /// Returns true if fewer values than requested were read.
    pub fn is_short(&self) -> bool {
        self.values.len() < self.requested
    }
}

/// Loads up to `max_count` values from a test vector file.
///
/// Parsing stops at the end of the file or at the first token that is not a
/// decimal integer. Reading fewer than `max_count` values is not an error,
/// but a warning is logged. Failing to open or read the file is an error.
pub async fn load(path: impl AsRef<Path>, max_count: usize) -> Result<Vectors> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("could not open test vector file {}", path.display()))?;
    let vectors = Vectors {
        values: parse(&text, max_count),
        requested: max_count,
    };
    if vectors.is_short() {
        tracing::warn!(
            "only read {} values from {} (expected {})",
            vectors.values.len(),
            path.display(),
            max_count
        );
    } else {
        tracing::info!(
            "successfully loaded {} values from {}",
            vectors.values.len(),
            path.display()
        );
    }
    Ok(vectors)
}

/// Parses up to `max_count` whitespace-separated decimal integers.
pub fn parse(text: &str, max_count: usize) -> Vec<i32> {
    text.split_whitespace()
        .map_while(|token| token.parse::<i32>().ok())
        .take(max_count)
        .collect()
}

/// Writes `values` to a test vector file, one value per line.
pub async fn store(path: impl AsRef<Path>, values: &[i32]) -> Result<()> {
    let path = path.as_ref();
    let text: String = values.iter().map(|value| format!("{value}\n")).collect();
    fs::write(path, text)
        .await
        .with_context(|| format!("could not write test vector file {}", path.display()))?;
    tracing::info!("wrote {} values to {}", values.len(), path.display());
    Ok(())
}
