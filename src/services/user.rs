use std::sync::Arc;
use tracing::{debug, info};

use crate::CacheSystem;
use crate::cache_keys;
use crate::cache_manager::CacheManager;
use crate::config::CacheStrategy;
use crate::domain::{Account, AccountUpdate, AuthToken, Credentials, Profile, ProfilePatch};
use crate::error::{ServiceError, ServiceResult};
use crate::profile_cache::ProfileCache;
use crate::repository::{TokenIssuer, UserRepository};

const PASSWORD_MIN: usize = 8;

fn validate_credentials(credentials: &Credentials) -> ServiceResult<()> {
    if !credentials.email.contains('@') {
        return Err(ServiceError::BadRequest("invalid email".into()));
    }
    if credentials.password.chars().count() < PASSWORD_MIN {
        return Err(ServiceError::BadRequest(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}

/// Accounts, tokens and profiles
///
/// Email → token entries short-circuit registration conflicts and repeated
/// logins. Profile reads go through the [`ProfileCache`], and every account or
/// profile mutation invalidates through it.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenIssuer>,
    cache: Arc<CacheManager>,
    profiles: ProfileCache,
}

impl UserService {
    #[must_use]
    pub fn new(
        system: &CacheSystem,
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        let cache = Arc::clone(system.cache_manager());
        let profiles = ProfileCache::new(
            Arc::clone(&cache),
            Arc::clone(system.ledger()),
            Arc::clone(&users),
        );
        Self {
            users,
            tokens,
            cache,
            profiles,
        }
    }

    #[must_use]
    pub const fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    fn cache_token(&self, email: &str, token: &str) {
        let ttl = self.cache.ttl_for(CacheStrategy::AuthToken);
        self.cache
            .set_with_ttl(&cache_keys::auth_email_to_token(email), token, ttl);
    }

    /// # Errors
    ///
    /// `BadRequest` for malformed credentials, `Conflict` if the email is
    /// taken, or the repository/issuer error.
    pub async fn register(&self, credentials: &Credentials) -> ServiceResult<AuthToken> {
        validate_credentials(credentials)?;

        let token_key = cache_keys::auth_email_to_token(&credentials.email);
        if self.cache.get(&token_key).is_some() {
            return Err(ServiceError::Conflict);
        }

        let account = self
            .users
            .create(credentials)
            .await?
            .ok_or(ServiceError::Conflict)?;
        let token = self.tokens.issue(&account.id)?;

        self.cache_token(&account.email, &token);
        self.profiles.invalidate(&account.id, None);
        info!(id = %account.id, "User registered");

        Ok(AuthToken {
            email: account.email,
            token,
        })
    }

    /// # Errors
    ///
    /// `BadRequest` for malformed credentials, `NotFound` for an unknown
    /// email, `Unauthorized` for a wrong password, or the repository/issuer
    /// error.
    pub async fn login(&self, credentials: &Credentials) -> ServiceResult<AuthToken> {
        validate_credentials(credentials)?;

        let account = self
            .users
            .find_by_email(&credentials.email)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if !self.users.verify_password(&account.id, &credentials.password).await? {
            return Err(ServiceError::Unauthorized);
        }

        if let Some(token) = self.cache.get(&cache_keys::auth_email_to_token(&account.email)) {
            debug!(id = %account.id, "Serving cached token");
            return Ok(AuthToken {
                email: account.email,
                token,
            });
        }

        let token = self.tokens.issue(&account.id)?;
        self.cache_token(&account.email, &token);
        Ok(AuthToken {
            email: account.email,
            token,
        })
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id, or the repository error.
    pub async fn update(&self, update: &AccountUpdate) -> ServiceResult<Account> {
        let previous = self
            .users
            .update_account(update)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let stale_email = (previous.email != update.email).then_some(previous.email.as_str());
        self.profiles.invalidate(&update.id, stale_email);

        Ok(Account {
            id: update.id.clone(),
            email: update.email.clone(),
        })
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id, or the repository error.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        let account = self.users.delete(id).await?.ok_or(ServiceError::NotFound)?;
        self.profiles.invalidate(id, Some(&account.email));
        info!(id = %id, "User deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id, the repository error, or a cache fault.
    pub async fn get_profile(&self, id: &str) -> ServiceResult<Profile> {
        self.profiles.get(id).await?.ok_or(ServiceError::NotFound)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Conflict` if the new email is in use,
    /// the repository error, or a cache fault.
    pub async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> ServiceResult<Profile> {
        let current = match self.profiles.cached(id)? {
            Some(profile) => profile,
            None => self
                .users
                .get_profile(id)
                .await?
                .ok_or(ServiceError::NotFound)?,
        };

        let mut stale_email = None;
        if let Some(email) = patch.email.as_deref().filter(|email| *email != current.email) {
            if self.cache.get(&cache_keys::auth_email_to_token(email)).is_some()
                || self.users.find_by_email(email).await?.is_some()
            {
                return Err(ServiceError::Conflict);
            }
            stale_email = Some(current.email.clone());
        }

        let mut updated = current;
        patch.apply(&mut updated);
        self.users.update_profile(&updated).await?;
        self.profiles.invalidate(id, stale_email.as_deref());

        Ok(updated)
    }
}
