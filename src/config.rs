use crate::db;
use crate::grading::{GradingPolicy, OverMaxPolicy};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

pub const GRADING_KEY: &str = "setup.grading";
pub const LOG_ENV: &str = "GRADEBOOKD_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradingConfig {
    pub policy: GradingPolicy,
    pub top_performers_limit: usize,
    pub cache_capacity: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            policy: GradingPolicy::default(),
            top_performers_limit: 10,
            cache_capacity: 32,
        }
    }
}

impl GradingConfig {
    pub fn to_json(&self) -> Value {
        json!({
            "overMaxPolicy": self.policy.over_max.as_str(),
            "displayDecimals": self.policy.display_decimals,
            "topPerformersLimit": self.top_performers_limit,
            "cacheCapacity": self.cache_capacity,
        })
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

/// Applies `patch` field by field; unknown keys and bad values reject the whole patch.
pub fn merge_grading_patch(
    current: &GradingConfig,
    patch: &Map<String, Value>,
) -> Result<GradingConfig, String> {
    let mut next = *current;
    for (k, v) in patch {
        match k.as_str() {
            "overMaxPolicy" => {
                let raw = v
                    .as_str()
                    .ok_or_else(|| format!("{} must be string", k))?;
                next.policy.over_max = OverMaxPolicy::parse(raw)
                    .ok_or_else(|| "overMaxPolicy must be one of: reject, clamp".to_string())?;
            }
            "displayDecimals" => {
                next.policy.display_decimals = parse_i64_range(v, k, 0, 4)? as u32;
            }
            "topPerformersLimit" => {
                next.top_performers_limit = parse_i64_range(v, k, 1, 50)? as usize;
            }
            "cacheCapacity" => {
                next.cache_capacity = parse_i64_range(v, k, 0, 256)? as usize;
            }
            _ => return Err(format!("unknown grading field: {}", k)),
        }
    }
    Ok(next)
}

pub fn load_grading_config(conn: &Connection) -> anyhow::Result<GradingConfig> {
    let defaults = GradingConfig::default();
    let Some(saved) = db::settings_get_json(conn, GRADING_KEY)? else {
        return Ok(defaults);
    };
    let Some(obj) = saved.as_object() else {
        return Ok(defaults);
    };
    // Malformed historical values fall back to defaults rather than blocking startup.
    match merge_grading_patch(&defaults, obj) {
        Ok(cfg) => Ok(cfg),
        Err(msg) => {
            tracing::warn!(%msg, "ignoring saved grading settings");
            Ok(defaults)
        }
    }
}

pub fn save_grading_config(conn: &Connection, cfg: &GradingConfig) -> anyhow::Result<()> {
    db::settings_set_json(conn, GRADING_KEY, &cfg.to_json())
}

/// Log filter directive for the process: `GRADEBOOKD_LOG`, then `RUST_LOG`, then `info`.
pub fn log_filter() -> String {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}
