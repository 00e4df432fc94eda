use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What `set_moderator(.., false)` does to a person currently at moderator level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemotionPolicy {
    /// Leave the power-level document untouched. Existing deployments rely on
    /// moderators never being demoted by a sync pass.
    #[default]
    Preserve,
    /// Remove the person's moderator entry.
    Enforce,
}

impl DemotionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemotionPolicy::Preserve => "preserve",
            DemotionPolicy::Enforce => "enforce",
        }
    }
}

impl fmt::Display for DemotionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemotionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(DemotionPolicy::Preserve),
            "enforce" => Ok(DemotionPolicy::Enforce),
            other => Err(format!(
                "invalid demotion policy '{other}'. expected one of: preserve | enforce"
            )),
        }
    }
}
