use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two chat participants. No other identity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Identity {
    #[serde(rename = "J")]
    J,
    #[serde(rename = "a")]
    A,
}

impl Identity {
    pub const ALL: [Identity; 2] = [Identity::J, Identity::A];

    /// The other participant.
    pub fn partner(self) -> Self {
        match self {
            Identity::J => Identity::A,
            Identity::A => Identity::J,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Identity::J => "J",
            Identity::A => "a",
        }
    }

    /// Whether a message id was minted by this identity (`<identity>-...`).
    pub fn owns_message_id(self, id: &str) -> bool {
        id.starts_with(self.as_str())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIdentity(pub String);

impl fmt::Display for UnknownIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown identity {:?}", self.0)
    }
}

impl std::error::Error for UnknownIdentity {}

impl FromStr for Identity {
    type Err = UnknownIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "J" => Ok(Identity::J),
            "a" => Ok(Identity::A),
            other => Err(UnknownIdentity(other.to_string())),
        }
    }
}
