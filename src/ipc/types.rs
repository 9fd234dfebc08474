use std::path::PathBuf;

use crate::config::GradingConfig;
use crate::memo::AnalyticsCache;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub grading: GradingConfig,
    pub cache: AnalyticsCache,
}

impl AppState {
    pub fn new() -> Self {
        let grading = GradingConfig::default();
        Self {
            workspace: None,
            db: None,
            grading,
            cache: AnalyticsCache::new(grading.cache_capacity),
        }
    }
}
