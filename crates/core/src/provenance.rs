//! Provenance — where a message came from.

use serde::{Deserialize, Serialize};

/// Origin tag recorded for every stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Recalled history (already persisted)
    Memory,
    /// New user input
    User,
    /// New generated response
    Response,
    /// Injected context, never persisted
    Context,
}

impl Provenance {
    /// Messages with this provenance belong to the unsaved delta.
    pub fn is_unsaved(self) -> bool {
        matches!(self, Self::User | Self::Response)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::User => "user",
            Self::Response => "response",
            Self::Context => "context",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "user" | "input" => Ok(Self::User),
            "response" => Ok(Self::Response),
            "context" => Ok(Self::Context),
            other => Err(format!("unknown message source '{other}'")),
        }
    }
}
