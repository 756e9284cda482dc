//! Engine API version numbers

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `major.minor` Engine API version, ordered numerically
///
/// `1.9 < 1.24 < 1.45`, unlike a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    major: u32,
    minor: u32,
}

impl ApiVersion {
    /// Version requested when nothing else is configured
    pub const DEFAULT: ApiVersion = ApiVersion::new(1, 45);

    /// Oldest version this client will talk to
    pub const MINIMUM: ApiVersion = ApiVersion::new(1, 24);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Fail unless this version is at least `minimum`
    ///
    /// `feature` names the operation in the error message.
    pub fn require(&self, minimum: ApiVersion, feature: &str) -> Result<()> {
        if *self < minimum {
            return Err(ConfigError::InvalidVersion {
                feature: feature.to_string(),
                required: minimum,
                actual: *self,
            });
        }
        Ok(())
    }

    /// Path prefix for versioned endpoints, e.g. `/v1.45`
    pub fn path_prefix(&self) -> String {
        format!("/v{}", self)
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid =
            || ConfigError::Invalid(format!("invalid API version '{}', expected MAJOR.MINOR", s));
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (major, minor) = trimmed.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}
