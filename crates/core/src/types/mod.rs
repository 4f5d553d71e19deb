//! Shared type definitions and newtypes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire representation of the unauthenticated user
pub const GUEST_SENTINEL: &str = "guest";

/// Account identifier.
///
/// Id `0` is never issued by the database (rowids start at 1) and is
/// reserved for the guest sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    pub const GUEST: AccountId = AccountId(0);

    pub fn new(id: i64) -> Self {
        AccountId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Guests get functional replies but nothing is persisted for them
    pub fn is_guest(&self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_guest() {
            write!(f, "{}", GUEST_SENTINEL)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for AccountId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(GUEST_SENTINEL) {
            return Ok(AccountId::GUEST);
        }
        s.parse::<i64>()
            .map(AccountId)
            .map_err(|_| crate::Error::Validation(format!("invalid account id '{}'", s)))
    }
}

/// Where a point delta came from (stored as text in the ledger)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    Registration,
    JobApplication,
    Review,
    ProfileStep,
    Badge,
    Assessment,
    LevelUp,
    Manual,
}

impl PointSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointSource::Registration => "registration",
            PointSource::JobApplication => "job_application",
            PointSource::Review => "review",
            PointSource::ProfileStep => "profile_step",
            PointSource::Badge => "badge",
            PointSource::Assessment => "assessment",
            PointSource::LevelUp => "level_up",
            PointSource::Manual => "manual",
        }
    }
}

impl FromStr for PointSource {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(PointSource::Registration),
            "job_application" => Ok(PointSource::JobApplication),
            "review" => Ok(PointSource::Review),
            "profile_step" => Ok(PointSource::ProfileStep),
            "badge" => Ok(PointSource::Badge),
            "assessment" => Ok(PointSource::Assessment),
            "level_up" => Ok(PointSource::LevelUp),
            "manual" => Ok(PointSource::Manual),
            other => Err(crate::Error::Validation(format!("unknown point source '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_sentinel_parses() {
        assert_eq!("guest".parse::<AccountId>().unwrap(), AccountId::GUEST);
        assert_eq!(" Guest ".parse::<AccountId>().unwrap(), AccountId::GUEST);
        assert!(AccountId::GUEST.is_guest());
        assert_eq!(AccountId::GUEST.to_string(), "guest");
    }

    #[test]
    fn test_numeric_account_id() {
        let id: AccountId = "42".parse().unwrap();
        assert_eq!(id, AccountId(42));
        assert!(!id.is_guest());
        assert!("abc".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_point_source_labels() {
        assert_eq!(PointSource::LevelUp.as_str(), "level_up");
        assert_eq!("level_up".parse::<PointSource>().unwrap(), PointSource::LevelUp);
        assert_eq!(
            serde_json::to_string(&PointSource::LevelUp).unwrap(),
            "\"level_up\""
        );
        assert!("bonus".parse::<PointSource>().is_err());
    }
}
