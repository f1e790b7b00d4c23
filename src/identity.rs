//! Session identity.
//!
//! An [`IdentityProvider`] turns either a pre-provisioned token or nothing at
//! all (anonymous sign-in) into a [`Session`]. [`establish_session`] tries the
//! token first and falls back to anonymous sign-in when it is rejected.
//!
//! Two providers exist: [`LocalIdentity`] for offline use, and
//! [`FirebaseIdentity`] for a Firebase-compatible identity toolkit REST API.
//! Both also implement [`AccountService`] for the signup and login forms.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::IdentityError;

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Identity of the signed-in user, recorded as `updatedBy` on saves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal: Principal,
    /// Bearer token for store requests, when the provider issues one.
    pub id_token: Option<String>,
    pub anonymous: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_token(&self, token: &str) -> Result<Session, IdentityError>;

    async fn sign_in_anonymously(&self) -> Result<Session, IdentityError>;
}

/// Account operations behind the signup and login forms.
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError>;

    async fn sign_in(&self, identifier: &str, password: &str) -> Result<Session, IdentityError>;
}

/// Sign in with `token` when given, falling back to anonymous sign-in if the
/// token is rejected.
pub async fn establish_session(
    provider: &dyn IdentityProvider,
    token: Option<&str>,
) -> Result<Session, IdentityError> {
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        match provider.sign_in_with_token(token).await {
            Ok(session) => {
                tracing::info!(principal = %session.principal, "Signed in with token");
                return Ok(session);
            }
            Err(error) => {
                tracing::warn!(error = %error, "Token sign-in failed, falling back to anonymous");
            }
        }
    }
    let session = provider.sign_in_anonymously().await?;
    tracing::info!(principal = %session.principal, "Signed in anonymously");
    Ok(session)
}

// ────────────────────────────────────────────────────────────────────────────
// LocalIdentity
// ────────────────────────────────────────────────────────────────────────────

/// Offline identity: anonymous sessions get a random id, a token names its
/// principal directly. Nothing is verified.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalIdentity;

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in_with_token(&self, token: &str) -> Result<Session, IdentityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::Rejected("empty token".into()));
        }
        Ok(Session {
            principal: Principal::new(token),
            id_token: None,
            anonymous: false,
        })
    }

    async fn sign_in_anonymously(&self) -> Result<Session, IdentityError> {
        Ok(Session {
            principal: Principal::new(uuid::Uuid::new_v4().simple().to_string()),
            id_token: None,
            anonymous: true,
        })
    }
}

#[async_trait]
impl AccountService for LocalIdentity {
    async fn register(
        &self,
        username: &str,
        _email: &str,
        _password: &str,
    ) -> Result<Session, IdentityError> {
        Ok(Session {
            principal: Principal::new(username),
            id_token: None,
            anonymous: false,
        })
    }

    async fn sign_in(&self, identifier: &str, _password: &str) -> Result<Session, IdentityError> {
        Ok(Session {
            principal: Principal::new(identifier),
            id_token: None,
            anonymous: false,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FirebaseIdentity
// ────────────────────────────────────────────────────────────────────────────

/// Identity toolkit REST client (`{base}/accounts:{method}?key={api_key}`).
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    id_token: Option<String>,
    local_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }
        let text = resp.text().await.unwrap_or_default();
        // The toolkit reports rejected credentials as 400 with an error code.
        if status == reqwest::StatusCode::BAD_REQUEST {
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&text) {
                return Err(IdentityError::Rejected(envelope.error.message));
            }
        }
        Err(IdentityError::Status {
            status: status.as_u16(),
            body: text,
        })
    }

    fn session_from(resp: AuthResponse, anonymous: bool) -> Result<Session, IdentityError> {
        let local_id = resp.local_id.ok_or(IdentityError::MissingField("localId"))?;
        Ok(Session {
            principal: Principal::new(local_id),
            id_token: resp.id_token,
            anonymous,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in_with_token(&self, token: &str) -> Result<Session, IdentityError> {
        let resp: AuthResponse = self
            .call(
                "signInWithCustomToken",
                json!({ "token": token, "returnSecureToken": true }),
            )
            .await?;
        let id_token = resp.id_token.ok_or(IdentityError::MissingField("idToken"))?;
        // Custom-token sign-in does not return the uid; look it up.
        let lookup: LookupResponse = self
            .call("lookup", json!({ "idToken": id_token }))
            .await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or(IdentityError::MissingField("users"))?;
        Ok(Session {
            principal: Principal::new(user.local_id),
            id_token: Some(id_token),
            anonymous: false,
        })
    }

    async fn sign_in_anonymously(&self) -> Result<Session, IdentityError> {
        let resp: AuthResponse = self
            .call("signUp", json!({ "returnSecureToken": true }))
            .await?;
        Self::session_from(resp, true)
    }
}

#[async_trait]
impl AccountService for FirebaseIdentity {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let resp: AuthResponse = self
            .call(
                "signUp",
                json!({
                    "email": email,
                    "password": password,
                    "displayName": username,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Self::session_from(resp, false)
    }

    async fn sign_in(&self, identifier: &str, password: &str) -> Result<Session, IdentityError> {
        let resp: AuthResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": identifier,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Self::session_from(resp, false)
    }
}
