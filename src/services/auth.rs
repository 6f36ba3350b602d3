//! Connection authenticator — resolves an optional credential to an identity.
//!
//! DESIGN
//! ======
//! Verification failures are never fatal to the connection. A missing,
//! unknown, or expired token downgrades to the anonymous identity so
//! share-a-link collaboration works without login; whether that identity
//! may actually enter a board is decided later by the board access check.

use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

/// Sentinel wire id for unauthenticated sessions.
pub const ANONYMOUS_ID: &str = "anonymous";

/// Display name shown for unauthenticated sessions.
pub const ANONYMOUS_NAME: &str = "Anonymous User";

/// The identity attached to a connection for its whole lifetime.
///
/// Resolved once at connect time and consumed uniformly downstream —
/// handlers branch on the variant here instead of scattering null checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated { id: Uuid, name: String, email: String },
    Anonymous,
}

impl Identity {
    /// Wire-format user id: the UUID, or the anonymous sentinel.
    #[must_use]
    pub fn user_id(&self) -> String {
        match self {
            Self::Authenticated { id, .. } => id.to_string(),
            Self::Anonymous => ANONYMOUS_ID.to_string(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Authenticated { name, .. } => name,
            Self::Anonymous => ANONYMOUS_NAME,
        }
    }

    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::Authenticated { email, .. } => email,
            Self::Anonymous => "",
        }
    }

    /// The real user id, when there is one. Anonymous identities can never
    /// match an owner or collaborator entry.
    #[must_use]
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::Authenticated { id, .. } => Some(*id),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Resolve a connection credential to an identity. Never fails: every
/// failure mode logs and downgrades to [`Identity::Anonymous`].
pub async fn authenticate(pool: &PgPool, token: Option<&str>) -> Identity {
    let Some(token) = token else {
        info!("no token provided; continuing as anonymous");
        return Identity::Anonymous;
    };

    match lookup_token(pool, token).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            info!("unknown or expired token; continuing as anonymous");
            Identity::Anonymous
        }
        Err(e) => {
            warn!(error = %e, "token verification failed; continuing as anonymous");
            Identity::Anonymous
        }
    }
}

/// Validate a session token against the identity store, minus any secret
/// fields.
async fn lookup_token(pool: &PgPool, token: &str) -> Result<Option<Identity>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.name, u.email
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Identity::Authenticated { id: r.get("id"), name: r.get("name"), email: r.get("email") }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
