//! Permission levels and access-level ordering.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// GitLab access level.
///
/// Ranks increase in declaration order: No < Guest < ... < Admin.
/// `No` is special for branch protection: "no one" is the most restrictive
/// policy there is, see [`Permission::is_stricter_or_same`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Permission {
    /// No access.
    No,
    /// Guest access.
    Guest,
    /// Reporter access.
    Reporter,
    /// Developer access.
    Developer,
    /// Maintainer access.
    Maintainer,
    /// Owner access.
    Owner,
    /// Instance administrator.
    Admin,
}

impl Permission {
    /// All permissions in rank order.
    pub const ALL: [Permission; 7] = [
        Permission::No,
        Permission::Guest,
        Permission::Reporter,
        Permission::Developer,
        Permission::Maintainer,
        Permission::Owner,
        Permission::Admin,
    ];

    /// Numeric access level used on the wire.
    pub fn rank(&self) -> u32 {
        match self {
            Permission::No => 0,
            Permission::Guest => 10,
            Permission::Reporter => 20,
            Permission::Developer => 30,
            Permission::Maintainer => 40,
            Permission::Owner => 50,
            Permission::Admin => 60,
        }
    }

    /// Look up a permission by its numeric access level.
    pub fn from_rank(rank: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.rank() == rank)
            .ok_or_else(|| ClientError::InvalidPermission(rank.to_string()))
    }

    /// Parse a raw access-level code such as `"40"`.
    pub fn from_access_level(code: &str) -> Result<Self> {
        let rank = code
            .trim()
            .parse::<u32>()
            .map_err(|_| ClientError::InvalidPermission(code.to_string()))?;
        Self::from_rank(rank)
    }

    /// The access level as it is sent to the API.
    pub fn access_level(&self) -> String {
        self.rank().to_string()
    }

    /// Rank difference between `self` and `other`.
    pub fn compare(&self, other: Permission) -> i32 {
        self.rank() as i32 - other.rank() as i32
    }

    /// Returns true if `self` restricts at least as much as `other`.
    ///
    /// `No` is stricter-or-same than everything; nothing but `No` itself is
    /// stricter-or-same than `No`. Otherwise a higher rank is stricter.
    pub fn is_stricter_or_same(&self, other: Permission) -> bool {
        if *self == Permission::No {
            return true;
        }
        if other == Permission::No {
            return false;
        }
        self.compare(other) >= 0
    }
}

impl TryFrom<u32> for Permission {
    type Error = ClientError;

    fn try_from(rank: u32) -> Result<Self> {
        Self::from_rank(rank)
    }
}

impl From<Permission> for u32 {
    fn from(p: Permission) -> Self {
        p.rank()
    }
}

impl FromStr for Permission {
    type Err = ClientError;

    /// Accepts either a numeric access level (`"30"`) or a name (`"developer"`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
            return Self::from_access_level(s);
        }
        match s.to_lowercase().as_str() {
            "no" | "none" => Ok(Permission::No),
            "guest" => Ok(Permission::Guest),
            "reporter" => Ok(Permission::Reporter),
            "developer" => Ok(Permission::Developer),
            "maintainer" => Ok(Permission::Maintainer),
            "owner" => Ok(Permission::Owner),
            "admin" => Ok(Permission::Admin),
            _ => Err(ClientError::InvalidPermission(s.to_string())),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::No => "no",
            Permission::Guest => "guest",
            Permission::Reporter => "reporter",
            Permission::Developer => "developer",
            Permission::Maintainer => "maintainer",
            Permission::Owner => "owner",
            Permission::Admin => "admin",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_permission() -> impl Strategy<Value = Permission> {
        (0..Permission::ALL.len()).prop_map(|i| Permission::ALL[i])
    }

    #[test]
    fn test_ranks_increase_in_declaration_order() {
        for pair in Permission::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_stricter_or_same() {
        assert!(Permission::Maintainer.is_stricter_or_same(Permission::Developer));
        assert!(Permission::Developer.is_stricter_or_same(Permission::Developer));
        assert!(!Permission::Guest.is_stricter_or_same(Permission::Developer));
        assert!(!Permission::Admin.is_stricter_or_same(Permission::No));
    }

    #[test]
    fn test_compare() {
        assert_eq!(Permission::Maintainer.compare(Permission::Developer), 10);
        assert_eq!(Permission::Guest.compare(Permission::Owner), -40);
        assert_eq!(Permission::Reporter.compare(Permission::Reporter), 0);
    }

    #[test]
    fn test_from_access_level() {
        assert_eq!(Permission::from_access_level("0").unwrap(), Permission::No);
        assert_eq!(
            Permission::from_access_level("40").unwrap(),
            Permission::Maintainer
        );
        assert!(matches!(
            Permission::from_access_level("35"),
            Err(ClientError::InvalidPermission(_))
        ));
        assert!(Permission::from_access_level("dev").is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("30".parse::<Permission>().unwrap(), Permission::Developer);
        assert_eq!(
            "Maintainer".parse::<Permission>().unwrap(),
            Permission::Maintainer
        );
        assert_eq!("none".parse::<Permission>().unwrap(), Permission::No);
        assert!("".parse::<Permission>().is_err());
        assert!("superuser".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_numeric_access_level() {
        let json = serde_json::to_string(&Permission::Maintainer).unwrap();
        assert_eq!(json, "40");
        let parsed: Permission = serde_json::from_str("30").unwrap();
        assert_eq!(parsed, Permission::Developer);
        assert!(serde_json::from_str::<Permission>("31").is_err());
    }

    proptest! {
        #[test]
        fn prop_stricter_or_same_is_reflexive(p in any_permission()) {
            prop_assert!(p.is_stricter_or_same(p));
        }

        #[test]
        fn prop_no_is_stricter_or_same_than_all(q in any_permission()) {
            prop_assert!(Permission::No.is_stricter_or_same(q));
        }

        #[test]
        fn prop_only_no_is_stricter_or_same_than_no(q in any_permission()) {
            prop_assert_eq!(q.is_stricter_or_same(Permission::No), q == Permission::No);
        }

        #[test]
        fn prop_compare_is_antisymmetric(p in any_permission(), q in any_permission()) {
            prop_assert_eq!(p.compare(q), -q.compare(p));
        }
    }
}
