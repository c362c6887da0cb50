//! JSON dataset file backing the in-memory source

use anyhow::{Context, Result, bail};
use budget_engine::Dataset;
use std::path::Path;

pub fn load(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        bail!(
            "Dataset '{}' not found.\n\n\
            Point data.dataset in config.toml (or --dataset) at a JSON file with\n\
            rows, monthEndBalances and comments. data/sample-budget.json shows the format.",
            path.display()
        );
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))
}

/// Write the dataset back after an edit
pub fn save(path: &Path, dataset: &Dataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(dataset)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write dataset: {}", path.display()))
}
