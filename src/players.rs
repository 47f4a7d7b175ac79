use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Account id to display name, read from a flat JSON object.
#[derive(Debug, Clone, Default)]
pub struct PlayerNames {
    names: HashMap<String, String>,
}

impl PlayerNames {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read player names {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse player names {}", path.display()))
    }

    /// Missing file means no names; a malformed one is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "player names file missing, showing account ids");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let names = serde_json::from_str::<HashMap<String, String>>(raw.trim())
            .context("invalid player names json")?;
        Ok(Self { names })
    }

    pub fn display<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.names
            .get(user_id)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(user_id)
    }
}

impl FromIterator<(String, String)> for PlayerNames {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_fall_back_to_raw_id() {
        let names = PlayerNames::parse(r#"{"acc-1":"Jan","acc-2":""}"#).unwrap();
        assert_eq!(names.display("acc-1"), "Jan");
        assert_eq!(names.display("acc-2"), "acc-2");
        assert_eq!(names.display("acc-3"), "acc-3");
    }
}
