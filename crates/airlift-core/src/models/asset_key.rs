//! Internal asset identifiers.

use crate::error::{AirliftError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an internal data asset, independent of orchestrator task ids.
///
/// A key is an ordered path of components. Its user-facing form joins the
/// components with `/` (`warehouse/table`). That form cannot represent a
/// component that itself contains `/`: such a key prints fine but parses back
/// as a longer path. Persisted keys are path lists and are not affected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(Vec<String>);

impl AssetKey {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(path.into_iter().map(Into::into).collect())
    }

    /// Parse the `/`-separated user form.
    pub fn from_user_string(value: &str) -> Self {
        Self::new(value.split('/'))
    }

    /// Like `from_user_string`, but rejects empty input and empty components
    /// (`a//b`, `/a`, `a/`).
    pub fn parse_user_string(value: &str) -> Result<Self> {
        if value.split('/').any(str::is_empty) {
            return Err(AirliftError::invariant(
                "AssetKey",
                format!("'{}' has an empty path component", value),
            ));
        }
        Ok(Self::from_user_string(value))
    }

    pub fn path(&self) -> &[String] {
        &self.0
    }

    pub fn to_user_string(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_string())
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::from_user_string(value)
    }
}
