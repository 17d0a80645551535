use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use prep_core::model::{User, VerifiedIdentity};
use storage::repository::{AuthTokenRepository, UserRepository};

use crate::Clock;
use crate::error::AuthError;
use crate::identity::{IdentityVerifier, LoginCredentials};

/// Lifetime of an issued bearer token.
pub const TOKEN_TTL_DAYS: i64 = 30;

/// A freshly issued bearer token. The plain token is only ever returned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Signs users in with a verified identity and resolves bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    secret: Arc<str>,
    verifier: IdentityVerifier,
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn AuthTokenRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        secret: impl Into<Arc<str>>,
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn AuthTokenRepository>,
    ) -> Self {
        Self {
            clock,
            secret: secret.into(),
            verifier: IdentityVerifier::default(),
            users,
            tokens,
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: IdentityVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Verify sign-in credentials, then sign the user in.
    ///
    /// # Errors
    ///
    /// Returns the verifier's `AuthError` for credentials the login policy does not
    /// accept, and the errors of [`AuthService::login`].
    pub async fn sign_in(&self, credentials: LoginCredentials) -> Result<LoginSession, AuthError> {
        let identity = match self.verifier.verify(credentials, self.clock.now()).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(
                    policy = self.verifier.policy().as_str(),
                    error = %err,
                    "sign-in rejected"
                );
                return Err(err);
            }
        };
        self.login(identity).await
    }

    /// Create or refresh the user and issue a token. The identity must already be
    /// verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Identity` for malformed identities, or storage errors.
    pub async fn login(&self, identity: VerifiedIdentity) -> Result<LoginSession, AuthError> {
        let identity = identity.validate()?;
        let now = self.clock.now();
        let user = self.users.upsert_identity(&identity, now).await?;

        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let expires_at = now + Duration::days(TOKEN_TTL_DAYS);
        self.tokens
            .insert_token(&self.digest(&token), user.id, now, expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "user signed in");
        Ok(LoginSession {
            token,
            expires_at,
            user,
        })
    }

    /// Resolve the user behind a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingToken` when no token was sent and
    /// `AuthError::InvalidToken` for unknown, expired or orphaned tokens.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<User, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let user_id = self
            .tokens
            .find_token_user(&self.digest(token), self.clock.now())
            .await?
            .ok_or(AuthError::InvalidToken)?;
        self.users
            .get_user(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Revoke a token. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` on repository failures.
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let removed = self.tokens.delete_token(&self.digest(token.trim())).await?;
        tracing::debug!(removed, "token revoked");
        Ok(removed)
    }

    fn digest(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LoginPolicy;
    use prep_core::model::UserId;
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository, clock: Clock) -> AuthService {
        AuthService::new(
            clock,
            "test-secret",
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn identity() -> VerifiedIdentity {
        VerifiedIdentity {
            email: "Lee@Example.com".into(),
            name: "Lee".into(),
            google_id: Some("google-42".into()),
        }
    }

    #[tokio::test]
    async fn login_issues_a_token_that_authenticates() {
        let repo = InMemoryRepository::new();
        let auth = service(&repo, fixed_clock());

        let login = auth.login(identity()).await.unwrap();
        assert_eq!(login.token.len(), 64);
        assert_eq!(login.expires_at, fixed_now() + Duration::days(30));
        assert_eq!(login.user.email, "lee@example.com");

        let user = auth.authenticate(Some(&login.token)).await.unwrap();
        assert_eq!(user.id, login.user.id);
    }

    #[tokio::test]
    async fn tokens_are_stored_hashed() {
        let repo = InMemoryRepository::new();
        let auth = service(&repo, fixed_clock());
        let login = auth.login(identity()).await.unwrap();

        assert_eq!(repo.find_token_user(&login.token, fixed_now()).await.unwrap(), None);
        assert_eq!(
            repo.find_token_user(&auth.digest(&login.token), fixed_now())
                .await
                .unwrap(),
            Some(login.user.id)
        );
    }

    #[tokio::test]
    async fn missing_unknown_and_expired_tokens_are_rejected() {
        let repo = InMemoryRepository::new();
        let auth = service(&repo, fixed_clock());
        let login = auth.login(identity()).await.unwrap();

        assert!(matches!(auth.authenticate(None).await, Err(AuthError::MissingToken)));
        assert!(matches!(auth.authenticate(Some("  ")).await, Err(AuthError::MissingToken)));
        assert!(matches!(
            auth.authenticate(Some("nope")).await,
            Err(AuthError::InvalidToken)
        ));

        let later = service(&repo, Clock::fixed(fixed_now() + Duration::days(31)));
        assert!(matches!(
            later.authenticate(Some(&login.token)).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let repo = InMemoryRepository::new();
        let auth = service(&repo, fixed_clock());
        let login = auth.login(identity()).await.unwrap();

        assert!(auth.logout(&login.token).await.unwrap());
        assert!(!auth.logout(&login.token).await.unwrap());
        assert!(matches!(
            auth.authenticate(Some(&login.token)).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn sign_in_follows_the_login_policy() {
        let repo = InMemoryRepository::new();
        let credentials = || LoginCredentials::Identity(identity());

        let locked = service(&repo, fixed_clock());
        assert!(matches!(
            locked.sign_in(credentials()).await,
            Err(AuthError::UnverifiedIdentity)
        ));
        assert!(repo.get_user(UserId::new(1)).await.unwrap().is_none());

        let trusting = service(&repo, fixed_clock())
            .with_verifier(IdentityVerifier::new(LoginPolicy::TrustClient));
        let login = trusting.sign_in(credentials()).await.unwrap();
        assert_eq!(login.user.email, "lee@example.com");
    }

    #[tokio::test]
    async fn bad_identity_is_rejected() {
        let repo = InMemoryRepository::new();
        let auth = service(&repo, fixed_clock());
        let mut bad = identity();
        bad.email = "not-an-email".into();
        assert!(matches!(auth.login(bad).await, Err(AuthError::Identity(_))));
    }
}
