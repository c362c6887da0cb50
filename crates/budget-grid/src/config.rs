//! Configuration for the budget grid

use anyhow::{Context, Result, bail};
use budget_engine::{Direction, EngineConfig, Month, ViewOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Where the dataset lives and what the grid shows
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// JSON dataset (rows, snapshots, comments)
    pub dataset: PathBuf,
    /// Directory for exported CSV reports
    pub output_dir: PathBuf,
    /// Pin "today" to a month (YYYY-MM) instead of the local clock
    pub current_month: Option<String>,
    /// Hidden categories as "direction:category"
    pub hidden: Vec<String>,
    /// Categories ranked after all others
    pub masked: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("./data/budget.json"),
            output_dir: PathBuf::from("./output"),
            current_month: None,
            hidden: Vec::new(),
            masked: Vec::new(),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (strings vs numbers)\n\n\
             See config.toml.example for the expected format."
        })
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Command-line values that take precedence over config.toml
#[derive(Debug, Default)]
pub struct Overrides {
    pub dataset: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub month: Option<Month>,
    pub hidden: Vec<String>,
    pub masked: Vec<String>,
}

/// Resolved settings for one run
#[derive(Debug)]
pub struct Config {
    pub engine: EngineConfig,
    pub dataset: PathBuf,
    pub output_dir: PathBuf,
    pub current_month: Month,
    pub view_options: ViewOptions,
}

impl Config {
    pub fn from_file(file_config: FileConfig, overrides: Overrides) -> Result<Self> {
        let data = file_config.data;

        let current_month = match (overrides.month, data.current_month) {
            (Some(month), _) => month,
            (None, Some(text)) => text
                .parse()
                .with_context(|| format!("Invalid data.current_month: {text}"))?,
            (None, None) => Month::current(),
        };

        let mut view_options = ViewOptions::default();
        for spec in data.hidden.iter().chain(&overrides.hidden) {
            let (direction, category) = parse_hidden(spec)?;
            view_options = view_options.hide(direction, category);
        }
        for category in data.masked.iter().chain(&overrides.masked) {
            view_options = view_options.mask(category.clone());
        }

        file_config
            .engine
            .validate()
            .context("Invalid [engine] section")?;

        Ok(Self {
            engine: file_config.engine,
            dataset: overrides.dataset.unwrap_or(data.dataset),
            output_dir: overrides.output_dir.unwrap_or(data.output_dir),
            current_month,
            view_options,
        })
    }
}

/// Parse "spend:travel" into its direction and category
fn parse_hidden(spec: &str) -> Result<(Direction, String)> {
    let Some((direction, category)) = spec.split_once(':') else {
        bail!("Hidden category '{spec}' must look like direction:category");
    };
    let direction = direction
        .parse::<Direction>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid hidden category '{spec}'"))?;
    Ok((direction, category.trim().to_string()))
}
