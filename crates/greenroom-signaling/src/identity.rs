//! Identity gate: the seam to the external identity/billing provider.
//!
//! The core trusts the provider's verdicts and nothing else: tokens are
//! validated against the provider's signing secret, user existence is
//! checked through its admin surface, and room creation is gated on its
//! subscription record. All three are suspension points; callers must not
//! hold a room lock across them.

use async_trait::async_trait;
use serde::Deserialize;

use greenroom_common::auth;
use greenroom_common::error::SignalError;

/// A verified user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityGate: Send + Sync {
    /// Resolve a caller-supplied bearer credential to a verified identity.
    async fn resolve_token(&self, access_token: &str) -> Result<Identity, SignalError>;

    /// Admin-side existence check for a user id. `None` means the id is
    /// unknown to the provider.
    async fn lookup_user(&self, uid: &str) -> Result<Option<Identity>, SignalError>;

    /// Business policy check for room creation. Distinct from
    /// authentication: a valid user can still be refused here.
    async fn room_creation_allowed(&self, identity: &Identity) -> Result<bool, SignalError>;
}

/// Production gate: local JWT validation plus REST calls against the
/// provider (admin user lookup, subscription profile).
pub struct HttpIdentityGate {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    jwt_secret: String,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    subscription_end_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl HttpIdentityGate {
    pub fn new(base_url: &str, service_key: &str, jwt_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            jwt_secret: jwt_secret.to_string(),
        }
    }
}

#[async_trait]
impl IdentityGate for HttpIdentityGate {
    async fn resolve_token(&self, access_token: &str) -> Result<Identity, SignalError> {
        let claims = auth::validate_token(access_token, &self.jwt_secret)
            .map_err(|_| SignalError::InvalidToken)?;
        Ok(Identity {
            id: claims.sub,
            email: claims.email,
        })
    }

    async fn lookup_user(&self, uid: &str) -> Result<Option<Identity>, SignalError> {
        let url = format!("{}/auth/v1/admin/users/{uid}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| SignalError::Identity(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SignalError::Identity(format!(
                "user lookup returned {}",
                response.status()
            )));
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| SignalError::Identity(e.to_string()))?;
        Ok(Some(Identity {
            id: user.id,
            email: user.email,
        }))
    }

    async fn room_creation_allowed(&self, identity: &Identity) -> Result<bool, SignalError> {
        let url = format!(
            "{}/rest/v1/profile?select=subscription_end_at&id=eq.{}",
            self.base_url, identity.id
        );
        let rows: Vec<ProfileRow> = self
            .http
            .get(&url)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| SignalError::Identity(e.to_string()))?
            .json()
            .await
            .map_err(|e| SignalError::Identity(e.to_string()))?;

        // No profile row: the user never subscribed, creation stays open.
        // With a row, creation is refused once the subscription has lapsed.
        let allowed = match rows.first().and_then(|row| row.subscription_end_at) {
            Some(end) => end >= chrono::Utc::now(),
            None => true,
        };
        Ok(allowed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scriptable gate for session-handler tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub struct StaticIdentityGate {
        /// token → identity
        tokens: Mutex<HashMap<String, Identity>>,
        /// uid → identity
        users: Mutex<HashMap<String, Identity>>,
        pub creation_allowed: bool,
    }

    impl StaticIdentityGate {
        pub fn new() -> Self {
            Self {
                tokens: Mutex::new(HashMap::new()),
                users: Mutex::new(HashMap::new()),
                creation_allowed: true,
            }
        }

        pub fn with_user(self, uid: &str, token: Option<&str>) -> Self {
            let identity = Identity {
                id: uid.to_string(),
                email: Some(format!("{uid}@example.com")),
            };
            self.users
                .lock()
                .expect("lock")
                .insert(uid.to_string(), identity.clone());
            if let Some(token) = token {
                self.tokens
                    .lock()
                    .expect("lock")
                    .insert(token.to_string(), identity);
            }
            self
        }

        pub fn refusing_creation(mut self) -> Self {
            self.creation_allowed = false;
            self
        }
    }

    #[async_trait]
    impl IdentityGate for StaticIdentityGate {
        async fn resolve_token(&self, access_token: &str) -> Result<Identity, SignalError> {
            self.tokens
                .lock()
                .expect("lock")
                .get(access_token)
                .cloned()
                .ok_or(SignalError::InvalidToken)
        }

        async fn lookup_user(&self, uid: &str) -> Result<Option<Identity>, SignalError> {
            Ok(self.users.lock().expect("lock").get(uid).cloned())
        }

        async fn room_creation_allowed(&self, _identity: &Identity) -> Result<bool, SignalError> {
            Ok(self.creation_allowed)
        }
    }
}
