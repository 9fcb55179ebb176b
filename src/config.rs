// src/config.rs

use std::{path::PathBuf, time::Duration};

/// Where the monthly sales and revenue workbook is published.
pub const DEFAULT_URL: &str = "https://www.eia.gov/electricity/data/eia861m/xls/sales_revenue.xlsx";

/// A cached download older than this is fetched again.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(86_400);

/// Source location and cache policy for the data-acquisition step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub url: String,
    pub cache_dir: PathBuf,
    pub refresh: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            cache_dir: PathBuf::from("."),
            refresh: DEFAULT_REFRESH,
        }
    }
}

impl SourceConfig {
    /// Cache file for the configured URL: the last path segment, query stripped.
    pub fn cache_path(&self) -> Option<PathBuf> {
        let path = self.url.split(['?', '#']).next()?;
        let name = path.rsplit('/').next()?.trim();
        if name.is_empty() {
            return None;
        }
        Some(self.cache_dir.join(name))
    }
}
