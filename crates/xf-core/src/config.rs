//! Configuration loading: query book, guard limits, and the project salt.
//!
//! Two files live in the config directory (`--config`, `XFETCH_CONFIG_DIR`,
//! or the platform config dir):
//! - `queries.yaml` (required for scout/fetch): map of query key to search
//!   query string.
//! - `limits.toml` (optional): guard limits; built-in defaults match the
//!   free plan when the file is absent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use xf_common::{Error, QueryKey, Result};

const QUERIES_FILE: &str = "queries.yaml";
const LIMITS_FILE: &str = "limits.toml";

/// Free-plan query length ceiling.
pub const MAX_QUERY_CHARS: usize = 512;

/// Default project salt for anonymization when `XFETCH_SALT` is unset.
pub const DEFAULT_PROJECT_SALT: &str = "xfetch-2025";

/// Resolve the config directory: explicit override, else the platform
/// config dir (`~/.config/xfetch` on Linux).
pub fn resolve_config_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    dirs::config_dir()
        .map(|d| d.join("xfetch"))
        .ok_or_else(|| Error::Config("could not resolve a config directory".to_string()))
}

/// Anonymization salt from the environment, with the built-in default.
pub fn project_salt() -> String {
    std::env::var("XFETCH_SALT").unwrap_or_else(|_| DEFAULT_PROJECT_SALT.to_string())
}

/// Guard limits, loaded from `limits.toml` or defaulted to the free plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Posts per calendar month.
    pub monthly_cap: u32,

    /// Seconds required between counts/recent-search calls.
    pub cooldown_secs: u64,

    /// Reset the monthly counter automatically at the calendar boundary.
    pub auto_month_reset: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            monthly_cap: 100,
            cooldown_secs: 900,
            auto_month_reset: true,
        }
    }
}

impl Limits {
    /// Load limits from `<dir>/limits.toml`, falling back to defaults when
    /// the file is absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(LIMITS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

/// Named queries from `queries.yaml`.
#[derive(Debug)]
pub struct QueryBook {
    entries: BTreeMap<String, String>,
    path: PathBuf,
}

impl QueryBook {
    /// Load `<dir>/queries.yaml`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(QUERIES_FILE);
        if !path.exists() {
            return Err(Error::ConfigNotFound { path });
        }
        let content = std::fs::read_to_string(&path)?;

        // An empty file is an empty book, not a parse error
        let entries = if content.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?
        };

        Ok(Self { entries, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a query key to its search query.
    ///
    /// Whitespace runs are collapsed to single spaces, and the resolved
    /// query must fit the free-plan length limit.
    pub fn resolve(&self, key: &QueryKey) -> Result<String> {
        let raw = self
            .entries
            .get(key.as_str())
            .ok_or_else(|| Error::QueryKeyNotFound {
                key: key.as_str().to_string(),
            })?;

        let query = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let len = query.chars().count();
        if len > MAX_QUERY_CHARS {
            return Err(Error::QueryTooLong {
                len,
                max: MAX_QUERY_CHARS,
            });
        }
        Ok(query)
    }
}
