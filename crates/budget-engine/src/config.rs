//! Engine tuning knobs

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Loading and layout configuration, usually the `[engine]` table of config.toml
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Months fetched per left/right extension
    pub batch_months: u32,
    /// Distance from an edge (px) that triggers an extension
    pub edge_threshold_px: f64,
    /// Rendered width of one month column (px)
    pub column_width_px: f64,
    /// Initial window: months before the current one
    pub months_before: u32,
    /// Initial window: months after the current one
    pub months_after: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_months: 6,
            edge_threshold_px: 200.0,
            column_width_px: 96.0,
            months_before: 6,
            months_after: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_months == 0 {
            return Err(EngineError::InvalidConfig(
                "batch_months must be at least 1".to_string(),
            ));
        }
        if self.column_width_px.is_nan() || self.column_width_px <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "column_width_px must be positive".to_string(),
            ));
        }
        if self.edge_threshold_px < 0.0 || self.edge_threshold_px.is_nan() {
            return Err(EngineError::InvalidConfig(
                "edge_threshold_px must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
