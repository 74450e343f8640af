// src/config.rs
//! Runtime settings from the environment, plus the optional project-type
//! allow list loaded from a TOML or JSON file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

const ENV_TYPES_PATH: &str = "PROJECT_TYPES_PATH";

#[derive(Debug, Clone)]
pub struct Settings {
    pub counter_feed_url: String,
    pub metadata_feed_url: String,
    pub validation_url: String,
    pub state_path: PathBuf,
    pub bind_addr: String,
    pub watch_interval_secs: u64,
    pub index_interval_secs: u64,
    pub verify_concurrency: usize,
    pub allowed_project_types: Vec<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            counter_feed_url: env_str("COUNTER_FEED_URL", "http://127.0.0.1:8900/counts"),
            metadata_feed_url: env_str("METADATA_FEED_URL", "http://127.0.0.1:8901/listings"),
            validation_url: env_str("VALIDATION_LOOKUP_URL", "http://127.0.0.1:8902/listings"),
            state_path: PathBuf::from(env_str("STATE_PATH", "state/listings.json")),
            bind_addr: env_str("BIND_ADDR", "0.0.0.0:8000"),
            watch_interval_secs: env_or("WATCH_INTERVAL_SECS", 60),
            index_interval_secs: env_or("INDEX_INTERVAL_SECS", 900),
            verify_concurrency: env_or("VERIFY_CONCURRENCY", 4),
            allowed_project_types: load_project_types_default()
                .context("loading project type filter")?,
        })
    }
}

/// Load the allow list from an explicit path. Supports TOML or JSON.
pub fn load_project_types_from(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading project types from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_project_types(&content, ext.as_str())
}

/// Load the allow list using env var + fallbacks:
/// 1) $PROJECT_TYPES_PATH
/// 2) config/project_types.toml
/// 3) config/project_types.json
/// No file means no filter (everything admitted).
pub fn load_project_types_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_TYPES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_project_types_from(&pb);
        } else {
            return Err(anyhow!("PROJECT_TYPES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/project_types.toml");
    if toml_p.exists() {
        return load_project_types_from(&toml_p);
    }
    let json_p = PathBuf::from("config/project_types.json");
    if json_p.exists() {
        return load_project_types_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_project_types(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    let try_toml = hint_ext == "toml" || s.contains("types");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported project types format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlTypes {
        types: Vec<String>,
    }
    let v: TomlTypes = toml::from_str(s)?;
    Ok(clean_list(v.types))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
