use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("email is not valid: {0}")]
    InvalidEmail(String),

    #[error("display name cannot be empty")]
    EmptyName,

    #[error("unknown subscription tier: {0}")]
    UnknownTier(String),
}

/// Subscription tier attached to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Pro,
}

impl SubscriptionTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Pro => "pro",
        }
    }

    /// Parses the persisted tier name.
    ///
    /// # Errors
    ///
    /// Returns `UserError::UnknownTier` for names outside `free|basic|pro`.
    pub fn parse(s: &str) -> Result<Self, UserError> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            other => Err(UserError::UnknownTier(other.to_string())),
        }
    }

    /// Daily AI question-generation requests allowed for this tier.
    #[must_use]
    pub fn daily_generation_cap(self) -> u32 {
        match self {
            SubscriptionTier::Free => 3,
            SubscriptionTier::Basic => 20,
            SubscriptionTier::Pro => 100,
        }
    }
}

/// Identity details supplied by a verified sign-in (e.g. Google OAuth).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
}

impl VerifiedIdentity {
    /// Normalize and validate the identity before it reaches storage.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when the email or name is unusable.
    pub fn validate(self) -> Result<Self, UserError> {
        let email = self.email.trim().to_lowercase();
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(UserError::InvalidEmail(self.email));
        }
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        let google_id = self
            .google_id
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        Ok(Self {
            email,
            name,
            google_id,
        })
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub google_id: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_normalizes_email_and_name() {
        let identity = VerifiedIdentity {
            email: "  Ada@Example.COM ".into(),
            name: " Ada ".into(),
            google_id: Some("  ".into()),
        }
        .validate()
        .unwrap();

        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.name, "Ada");
        assert_eq!(identity.google_id, None);
    }

    #[test]
    fn identity_rejects_bad_email() {
        let err = VerifiedIdentity {
            email: "not-an-email".into(),
            name: "x".into(),
            google_id: None,
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, UserError::InvalidEmail(_)));
    }

    #[test]
    fn tier_round_trips_through_storage_name() {
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Basic,
            SubscriptionTier::Pro,
        ] {
            assert_eq!(SubscriptionTier::parse(tier.as_str()).unwrap(), tier);
        }
        assert!(SubscriptionTier::parse("gold").is_err());
    }
}
