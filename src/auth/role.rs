use std::fmt;
use std::str::FromStr;

/// Caller role as asserted by the upstream gateway. Controls which projects
/// a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    Manager,
    GroupManager,
    Member,
}

impl Role {
    /// Whether this role sees every project regardless of group.
    pub fn is_unrestricted(self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::GroupManager => "group-manager",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "group-manager" => Ok(Self::GroupManager),
            "member" => Ok(Self::Member),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}
