#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database-backed identity and session gateway.
//!
//! Replaces the original deployment's managed identity provider with the
//! same consumed contract: create/verify principals, mint and destroy
//! session tokens, and resolve the current principal from a token. The
//! principal is always resolved per request and passed explicitly — there
//! is no process-wide "current user".
//!
//! Passwords are stored as hex-encoded salted SHA-256 digests; session
//! tokens are opaque UUIDs with a fixed expiry.

use chrono::{DateTime, Duration, Utc};
use relief_map_database::{DbError, queries};
use relief_map_database_models::{PrincipalRow, ResourcePrefs, SessionRow};
use relief_map_incident_models::Role;
use sha2::{Digest, Sha256};
use switchy_database::Database;

/// How long a session stays valid.
const SESSION_TTL_DAYS: i64 = 7;

/// Minimum accepted password length.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Errors from identity and session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The email/password pair did not match a principal.
    ///
    /// Deliberately carries no detail about which half was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// A principal with this email already exists.
    #[error("An account with this email already exists")]
    EmailTaken,

    /// The password is too short.
    #[error("Password must be at least {MIN_PASSWORD_CHARS} characters")]
    PasswordTooShort,

    /// The referenced principal does not exist.
    #[error("Principal not found: {id}")]
    PrincipalNotFound {
        /// The missing principal id.
        id: String,
    },
}

/// A minted session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session token for the cookie.
    pub secret: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

/// Creates a new principal with the given role and returns it.
///
/// The role is validated into the closed [`Role`] enum by the caller's
/// deserialization; unknown roles never reach this function as strings.
///
/// # Errors
///
/// Returns [`AuthError::EmailTaken`] when the email is already registered,
/// [`AuthError::PasswordTooShort`] for short passwords, or a database
/// error.
pub async fn create_principal(
    db: &dyn Database,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> Result<PrincipalRow, AuthError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::PasswordTooShort);
    }

    if queries::get_principal_by_email(db, email).await?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let salt = uuid::Uuid::new_v4().simple().to_string();
    let password_hash = hash_password(password, &salt);

    let principal = PrincipalRow {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        prefs: ResourcePrefs {
            role,
            ..ResourcePrefs::default()
        },
        created_at: relief_map_database::now_rfc3339(),
    };

    queries::insert_principal(db, &principal, &password_hash, &salt).await?;

    log::info!("Created principal {} with role {role}", principal.id);

    Ok(principal)
}

/// Verifies an email/password pair and mints a new session.
///
/// # Errors
///
/// Returns [`AuthError::InvalidCredentials`] when the pair doesn't match
/// (whether the email is unknown or the password wrong), or a database
/// error.
pub async fn create_session(
    db: &dyn Database,
    email: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let Some(creds) = queries::get_principal_by_email(db, email).await? else {
        return Err(AuthError::InvalidCredentials);
    };

    if hash_password(password, &creds.salt) != creds.password_hash {
        return Err(AuthError::InvalidCredentials);
    }

    let now = Utc::now();
    let expires_at = now + Duration::days(SESSION_TTL_DAYS);
    let session = SessionRow {
        secret: uuid::Uuid::new_v4().to_string(),
        principal_id: creds.principal.id,
        created_at: now.to_rfc3339(),
        expires_at: expires_at.to_rfc3339(),
    };

    queries::insert_session(db, &session).await?;

    Ok(Session {
        secret: session.secret,
        expires_at,
    })
}

/// Destroys a session. Destroying an unknown token is a no-op.
///
/// # Errors
///
/// Returns a database error.
pub async fn destroy_session(db: &dyn Database, token: &str) -> Result<(), AuthError> {
    queries::delete_session(db, token).await?;
    Ok(())
}

/// Resolves the principal for a session token.
///
/// Returns `None` for unknown or expired tokens; expired sessions are
/// cleaned up on the way out.
///
/// # Errors
///
/// Returns a database error.
pub async fn current_principal(
    db: &dyn Database,
    token: &str,
) -> Result<Option<PrincipalRow>, AuthError> {
    let Some(session) = queries::get_session(db, token).await? else {
        return Ok(None);
    };

    let expired = DateTime::parse_from_rfc3339(&session.expires_at)
        .map_or(true, |expires| expires <= Utc::now());
    if expired {
        queries::delete_session(db, token).await?;
        return Ok(None);
    }

    Ok(queries::get_principal(db, &session.principal_id).await?)
}

/// Replaces a principal's preference bag.
///
/// # Errors
///
/// Returns [`AuthError::PrincipalNotFound`] for an unknown principal, or a
/// database error.
pub async fn set_prefs(
    db: &dyn Database,
    principal_id: &str,
    prefs: &ResourcePrefs,
) -> Result<(), AuthError> {
    if queries::get_principal(db, principal_id).await?.is_none() {
        return Err(AuthError::PrincipalNotFound {
            id: principal_id.to_string(),
        });
    }

    queries::update_principal_prefs(db, principal_id, prefs).await?;
    Ok(())
}

/// Hashes a password with the given salt (hex-encoded SHA-256).
#[must_use]
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_map_database::open_in_memory;

    #[test]
    fn same_password_different_salt_differs() {
        let a = hash_password("hunter22", "salt-a");
        let b = hash_password("hunter22", "salt-b");
        assert_ne!(a, b);
        assert_eq!(a, hash_password("hunter22", "salt-a"));
    }

    #[tokio::test]
    async fn signup_then_login_round_trip() {
        let db = open_in_memory().await.unwrap();
        let principal =
            create_principal(db.as_ref(), "ada@example.com", "hunter22", "Ada", Role::Volunteer)
                .await
                .unwrap();
        assert_eq!(principal.prefs.role, Role::Volunteer);

        let session = create_session(db.as_ref(), "ada@example.com", "hunter22")
            .await
            .unwrap();
        let resolved = current_principal(db.as_ref(), &session.secret)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, principal.id);
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let db = open_in_memory().await.unwrap();
        create_principal(db.as_ref(), "ada@example.com", "hunter22", "Ada", Role::Community)
            .await
            .unwrap();
        let err = create_principal(db.as_ref(), "ada@example.com", "hunter23", "Eve", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn short_password_rejected() {
        let db = open_in_memory().await.unwrap();
        let err = create_principal(db.as_ref(), "ada@example.com", "abc", "Ada", Role::Community)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooShort));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_identical() {
        let db = open_in_memory().await.unwrap();
        create_principal(db.as_ref(), "ada@example.com", "hunter22", "Ada", Role::Community)
            .await
            .unwrap();

        let wrong_password = create_session(db.as_ref(), "ada@example.com", "wrong1")
            .await
            .unwrap_err();
        let unknown_email = create_session(db.as_ref(), "eve@example.com", "hunter22")
            .await
            .unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn destroyed_session_no_longer_resolves() {
        let db = open_in_memory().await.unwrap();
        create_principal(db.as_ref(), "ada@example.com", "hunter22", "Ada", Role::Community)
            .await
            .unwrap();
        let session = create_session(db.as_ref(), "ada@example.com", "hunter22")
            .await
            .unwrap();

        destroy_session(db.as_ref(), &session.secret).await.unwrap();
        assert!(
            current_principal(db.as_ref(), &session.secret)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn expired_session_resolves_to_none() {
        let db = open_in_memory().await.unwrap();
        let principal =
            create_principal(db.as_ref(), "ada@example.com", "hunter22", "Ada", Role::Community)
                .await
                .unwrap();

        let expired = SessionRow {
            secret: "stale-token".to_string(),
            principal_id: principal.id,
            created_at: (Utc::now() - Duration::days(8)).to_rfc3339(),
            expires_at: (Utc::now() - Duration::days(1)).to_rfc3339(),
        };
        queries::insert_session(db.as_ref(), &expired).await.unwrap();

        assert!(
            current_principal(db.as_ref(), "stale-token")
                .await
                .unwrap()
                .is_none()
        );
        // Cleaned up on resolution.
        assert!(
            queries::get_session(db.as_ref(), "stale-token")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn set_prefs_requires_existing_principal() {
        let db = open_in_memory().await.unwrap();
        let err = set_prefs(db.as_ref(), "ghost", &ResourcePrefs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PrincipalNotFound { .. }));
    }
}
