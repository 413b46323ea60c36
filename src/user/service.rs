//! Credential verification and session issuance.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64ct::{Base64, Encoding};

use crate::crypto::SymmetricCipher;
use crate::database::Database;
use crate::error::{Result, ServerError};
use crate::session::SessionPayload;
use crate::user::{Options, User, UserRepository};

/// Joins the plaintext username and the ciphered token inside a composite
/// token. Rejected inside usernames at provisioning time.
pub const TOKEN_SEPARATOR: &str = "*****";

/// Server-side token lifetime: one week, in milliseconds.
pub const SESSION_TIMEOUT_MS: i64 = 604_800_000;

/// Authentication manager.
#[derive(Clone)]
pub struct AuthService {
    pub repo: UserRepository,
    crypto: Arc<SymmetricCipher>,
}

impl AuthService {
    /// Create a new [`AuthService`].
    pub fn new(db: Database, crypto: Arc<SymmetricCipher>) -> Self {
        Self {
            repo: UserRepository::new(db),
            crypto,
        }
    }

    fn epoch_millis() -> Result<i64> {
        Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as i64)
    }

    /// Verify credentials against the enabled rows and mint a session.
    ///
    /// Zero matches and more than one match both collapse to
    /// [`ServerError::InvalidCredentials`]: a multiple match means the store
    /// lost credential uniqueness and must not silently pick a row.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionPayload> {
        let users = self.repo.enabled_users().await?;

        // Fields are ciphered with random nonces, so matching happens on the
        // decrypted values. Rows that fail to decrypt count as non-matches.
        let matched: Vec<&User> = users
            .iter()
            .filter(|user| {
                let name = self.crypto.decrypt_from_hex(&user.username).ok();
                let pass = self.crypto.decrypt_from_hex(&user.password).ok();
                name.as_deref() == Some(username)
                    && pass.as_deref() == Some(password)
            })
            .collect();

        let [user] = matched.as_slice() else {
            return Err(ServerError::InvalidCredentials);
        };

        let now = Self::epoch_millis()?;
        let token = self
            .crypto
            .encrypt_and_hex(Base64::encode_string(now.to_string().as_bytes()))?;
        let expiration = now + SESSION_TIMEOUT_MS;

        self.repo.set_token(user.user_id, &token, expiration).await?;

        // A failure past this point leaves the token persisted while the
        // caller sees an error. Resolved by the next login attempt.
        self.establish(user, &token).await
    }

    /// Validate a client-held composite token, revoking it when expired.
    pub async fn validate_token(
        &self,
        composite: &str,
    ) -> Result<SessionPayload> {
        let parts: Vec<&str> = composite.split(TOKEN_SEPARATOR).collect();
        let [username, raw_token] = parts.as_slice() else {
            return Err(ServerError::MalformedToken);
        };
        if username.is_empty() || raw_token.is_empty() {
            return Err(ServerError::MalformedToken);
        }

        let candidates = self.repo.find_by_token(raw_token).await?;
        let matched: Vec<&User> = candidates
            .iter()
            .filter(|user| {
                self.crypto.decrypt_from_hex(&user.username).ok().as_deref()
                    == Some(*username)
            })
            .collect();

        let [user] = matched.as_slice() else {
            return Err(ServerError::InvalidCredentials);
        };

        let now = Self::epoch_millis()?;
        if now >= user.token_expiration.unwrap_or(0) {
            self.repo.clear_token(user.user_id).await?;
            return Err(ServerError::ExpiredToken);
        }

        // Still valid: resolve options and payload with the existing token.
        // No re-issue happens here.
        self.establish(user, raw_token).await
    }

    /// Resolve options and build the session payload for a matched row.
    pub async fn establish(
        &self,
        user: &User,
        raw_token: &str,
    ) -> Result<SessionPayload> {
        let username = self.crypto.decrypt_from_hex(&user.username)?;
        let realname = self.crypto.decrypt_from_hex(&user.realname)?;
        let options = self
            .options_for_user(user.user_id, user.admin == 1)
            .await?;

        Ok(SessionPayload {
            user_id: user.user_id,
            username: username.clone(),
            realname,
            admin: user.admin,
            token: format!("{username}{TOKEN_SEPARATOR}{raw_token}"),
            timeout: SESSION_TIMEOUT_MS,
            options,
        })
    }

    /// Return the user's Options record, seeding the defaults on first
    /// resolution.
    ///
    /// Check-then-insert: two concurrent first-time callers for the same
    /// user can both pass the check and insert twice. Accepted, sequential
    /// callers stay idempotent.
    pub async fn options_for_user(
        &self,
        user_id: i64,
        is_admin: bool,
    ) -> Result<Options> {
        if let Some(options) = self.repo.options_by_user(user_id).await? {
            return Ok(options);
        }

        let sections = self.repo.visible_sections(is_admin).await?;
        let sections_json = serde_json::to_string(&sections)?;
        self.repo.seed_default_options(user_id, &sections_json).await?;

        self.repo
            .options_by_user(user_id)
            .await?
            .ok_or(ServerError::Sql(sqlx::Error::RowNotFound))
    }

    /// Provision a user, ciphering the identity fields.
    pub async fn create_user(
        &self,
        username: &str,
        realname: &str,
        password: &str,
        admin: bool,
    ) -> Result<i64> {
        let username_cipher = self.crypto.encrypt_and_hex(username)?;
        let realname_cipher = self.crypto.encrypt_and_hex(realname)?;
        let password_cipher = self.crypto.encrypt_and_hex(password)?;

        self.repo
            .insert(
                &username_cipher,
                &realname_cipher,
                &password_cipher,
                admin as i64,
                1,
            )
            .await
    }
}
