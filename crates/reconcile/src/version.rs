//! Product version gating
//!
//! Versions are four numeric components, `major.minor.patch.build`, as the
//! remote product reports them. Shorter strings pad with zeros.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A product version, ordered component-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Whether a constraint with minimum version `min` is satisfied
    pub fn satisfies(&self, min: Option<&Version>) -> bool {
        min.is_none_or(|min| compare(self, min) != Ordering::Less)
    }
}

/// Component-wise comparison of two versions
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || Error::InvalidVersion(s.to_string());

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 4 {
            return Err(invalid());
        }

        let mut components = [0u32; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }

        let [major, minor, patch, build] = components;
        Ok(Self::new(major, minor, patch, build))
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_full_and_short() {
        assert_eq!(v("9.2.0.0"), Version::new(9, 2, 0, 0));
        assert_eq!(v("9.2"), Version::new(9, 2, 0, 0));
        assert_eq!(v("10"), Version::new(10, 0, 0, 0));
        assert_eq!(v(" 9.1.0.3 "), Version::new(9, 1, 0, 3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Version>().is_err());
        assert!("9.x".parse::<Version>().is_err());
        assert!("1.2.3.4.5".parse::<Version>().is_err());
        assert!("9..1".parse::<Version>().is_err());
    }

    #[test]
    fn test_compare_is_component_wise() {
        assert_eq!(compare(&v("9.0.0.0"), &v("9.2.0.0")), Ordering::Less);
        assert_eq!(compare(&v("9.2.0.0"), &v("9.2")), Ordering::Equal);
        assert_eq!(compare(&v("10.0"), &v("9.9.9.9")), Ordering::Greater);
        assert_eq!(compare(&v("9.2.0.1"), &v("9.2.0.0")), Ordering::Greater);
    }

    #[test]
    fn test_satisfies() {
        let min = v("9.2.0.0");
        assert!(!v("9.0.0.0").satisfies(Some(&min)));
        assert!(v("9.2.0.0").satisfies(Some(&min)));
        assert!(v("9.3").satisfies(Some(&min)));
        assert!(v("1.0").satisfies(None));
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(v("9.2").to_string(), "9.2.0.0");
        let json = serde_json::to_string(&v("9.1.0.0")).unwrap();
        assert_eq!(json, r#""9.1.0.0""#);
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("9.1"));
    }
}
