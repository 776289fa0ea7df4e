//! Query key newtype.

use serde::{Deserialize, Serialize};

/// A named query key resolving to externally configured search parameters
/// (e.g. `spectacle_en` in `queries.yaml`).
///
/// Keys are used verbatim in output file names, so they are restricted to
/// `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(pub String);

impl QueryKey {
    /// Validate and wrap a raw key string.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("query key must not be empty".to_string());
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!(
                "query key '{}' contains characters outside [A-Za-z0-9_-]",
                raw
            ));
        }
        Ok(QueryKey(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for QueryKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryKey::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys_accepted() {
        assert!(QueryKey::parse("spectacle_en").is_ok());
        assert!(QueryKey::parse("rizin-2025").is_ok());
    }

    #[test]
    fn invalid_keys_rejected() {
        assert!(QueryKey::parse("").is_err());
        assert!(QueryKey::parse("has space").is_err());
        assert!(QueryKey::parse("../escape").is_err());
    }
}
