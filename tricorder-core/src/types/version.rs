//! Response versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TricorderError;

/// Response format version requested in the URL path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    /// `0`: the first response format.
    #[serde(rename = "0")]
    V0,
    /// `latest`: alias for the newest format.
    #[serde(rename = "latest")]
    Latest,
}

impl ApiVersion {
    /// Path segments accepted as versions.
    pub const SUPPORTED: &'static [&'static str] = &["latest", "0"];

    /// Returns the path segment for this version.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V0 => "0",
            ApiVersion::Latest => "latest",
        }
    }

    /// Message returned for an unsupported version segment.
    pub fn unsupported_message(raw: &str) -> String {
        format!(
            "`{}` is not a supported version. Valid versions are: `latest`, `0`.",
            raw
        )
    }

    /// Resolves aliases to a concrete format version.
    pub fn resolve(self) -> ApiVersion {
        match self {
            ApiVersion::Latest => ApiVersion::V0,
            other => other,
        }
    }
}

impl FromStr for ApiVersion {
    type Err = TricorderError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "0" => Ok(ApiVersion::V0),
            "latest" => Ok(ApiVersion::Latest),
            other => Err(TricorderError::ValidationError(Self::unsupported_message(
                other,
            ))),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
