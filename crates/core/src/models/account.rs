//! Account models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Registered account as the engine sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub points: i64,
    pub level: u32,
    /// 0-100
    pub profile_completion: u8,
    #[serde(default)]
    pub reviews_today: u32,
    #[serde(default)]
    pub last_review_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Validation("name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(crate::Error::Validation(format!("invalid email '{}'", self.email)));
        }
        if self.password.is_empty() {
            return Err(crate::Error::Validation("password is required".to_string()));
        }
        Ok(())
    }
}

/// The four profile sections; each one is a quarter of profile completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStep {
    BasicInfo,
    Experience,
    Skills,
    Preferences,
}

impl ProfileStep {
    pub const ALL: [ProfileStep; 4] = [
        ProfileStep::BasicInfo,
        ProfileStep::Experience,
        ProfileStep::Skills,
        ProfileStep::Preferences,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStep::BasicInfo => "basic_info",
            ProfileStep::Experience => "experience",
            ProfileStep::Skills => "skills",
            ProfileStep::Preferences => "preferences",
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| crate::Error::Validation(format!("unknown profile step '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_validation() {
        let ok = NewAccount {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password: "secret".into(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = NewAccount { email: "nope".into(), ..ok.clone() };
        assert!(bad_email.validate().is_err());

        let no_name = NewAccount { name: "  ".into(), ..ok };
        assert!(no_name.validate().is_err());
    }

    #[test]
    fn test_unknown_profile_step() {
        assert_eq!(ProfileStep::parse("skills").unwrap(), ProfileStep::Skills);
        assert!(ProfileStep::parse("hobbies").is_err());
    }
}
