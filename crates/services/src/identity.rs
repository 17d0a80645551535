//! Verification of sign-in credentials before an account is created or touched.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use prep_core::model::VerifiedIdentity;

use crate::error::AuthError;

pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Which sign-in credentials are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoginPolicy {
    /// Google ID tokens issued to this OAuth client id.
    Google { client_id: String },
    /// Plain identities from the request body. Development only.
    TrustClient,
    /// No credentials are accepted.
    #[default]
    Disabled,
}

impl LoginPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginPolicy::Google { .. } => "google",
            LoginPolicy::TrustClient => "trust_client",
            LoginPolicy::Disabled => "disabled",
        }
    }
}

/// Body of a sign-in request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LoginCredentials {
    GoogleIdToken { id_token: String },
    Identity(VerifiedIdentity),
}

/// Claims returned by Google's `tokeninfo` endpoint. Numbers and booleans arrive as
/// strings there, so those stay loosely typed.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenInfo {
    aud: String,
    iss: String,
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exp: Value,
}

impl TokenInfo {
    pub(crate) fn into_identity(
        self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, AuthError> {
        if self.aud != client_id {
            return Err(AuthError::IdToken("issued to another client".into()));
        }
        if !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            return Err(AuthError::IdToken(format!("unexpected issuer {}", self.iss)));
        }
        let expires = match &self.exp {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        if expires.is_none_or(|exp| exp <= now.timestamp()) {
            return Err(AuthError::IdToken("expired".into()));
        }

        let verified = matches!(&self.email_verified, Value::Bool(true))
            || self.email_verified.as_str() == Some("true");
        let email = match self.email {
            Some(email) if verified => email,
            _ => return Err(AuthError::IdToken("email is not verified".into())),
        };
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(VerifiedIdentity {
            email,
            name,
            google_id: Some(self.sub),
        })
    }
}

/// Turns request credentials into a `VerifiedIdentity` according to a `LoginPolicy`.
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    policy: LoginPolicy,
    client: reqwest::Client,
    tokeninfo_url: String,
}

impl Default for IdentityVerifier {
    fn default() -> Self {
        Self::new(LoginPolicy::Disabled)
    }
}

impl IdentityVerifier {
    #[must_use]
    pub fn new(policy: LoginPolicy) -> Self {
        Self {
            policy,
            client: reqwest::Client::new(),
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &LoginPolicy {
        &self.policy
    }

    /// # Errors
    ///
    /// Returns `AuthError::UnverifiedIdentity` for plain identities unless the policy
    /// trusts them, `AuthError::IdToken` for tokens Google rejects or that fail the
    /// claim checks, and `AuthError::GoogleNotConfigured` for ID tokens without a
    /// configured client id.
    pub async fn verify(
        &self,
        credentials: LoginCredentials,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, AuthError> {
        match (&self.policy, credentials) {
            (LoginPolicy::TrustClient, LoginCredentials::Identity(identity)) => Ok(identity),
            (LoginPolicy::Google { client_id }, LoginCredentials::GoogleIdToken { id_token }) => {
                self.token_info(&id_token).await?.into_identity(client_id, now)
            }
            (_, LoginCredentials::GoogleIdToken { .. }) => Err(AuthError::GoogleNotConfigured),
            (_, LoginCredentials::Identity(_)) => Err(AuthError::UnverifiedIdentity),
        }
    }

    async fn token_info(&self, id_token: &str) -> Result<TokenInfo, AuthError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await?;
        if response.status().is_client_error() {
            return Err(AuthError::IdToken("rejected by Google".into()));
        }
        Ok(response.error_for_status()?.json::<TokenInfo>().await?)
    }
}
