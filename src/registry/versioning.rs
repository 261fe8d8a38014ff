//! Semantic versions for model artifacts

use crate::error::{MortalityError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic version, serialized as `"major.minor.patch"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse from string (e.g., "1.2.3")
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(MortalityError::Validation(format!("Invalid version format: {}", s)));
        }

        let component = |name: &str, raw: &str| {
            raw.parse::<u32>().map_err(|_| {
                MortalityError::Validation(format!("Invalid {} version: {}", name, raw))
            })
        };

        Ok(Self {
            major: component("major", parts[0])?,
            minor: component("minor", parts[1])?,
            patch: component("patch", parts[2])?,
        })
    }

    pub fn bump_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl TryFrom<String> for ModelVersion {
    type Error = MortalityError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ModelVersion> for String {
    fn from(v: ModelVersion) -> Self {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v = ModelVersion::parse("2.10.3").unwrap();
        assert_eq!(v, ModelVersion::new(2, 10, 3));
        assert_eq!(v.to_string(), "2.10.3");
        assert!(ModelVersion::parse("1.2").is_err());
        assert!(ModelVersion::parse("1.x.0").is_err());
    }

    #[test]
    fn test_bumps_and_ordering() {
        let v = ModelVersion::default();
        assert_eq!(v.bump_minor(), ModelVersion::new(1, 1, 0));
        assert_eq!(v.bump_major(), ModelVersion::new(2, 0, 0));
        assert!(ModelVersion::new(1, 10, 0) > ModelVersion::new(1, 9, 5));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&ModelVersion::new(1, 3, 0)).unwrap();
        assert_eq!(json, "\"1.3.0\"");
        let back: ModelVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelVersion::new(1, 3, 0));
    }
}
