//! Reqwest-backed identity service client.
//!
//! Owns transport details only: URL building, bearer headers, timeout and
//! status mapping, and normalizing the service's `_id` into `id`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Credentials, Identity, IdentityClient, IdentityError, Role, Session, UserInput};

/// Identity as the remote service serializes it
#[derive(Debug, Deserialize)]
struct IdentityDto {
    #[serde(rename = "_id", default)]
    native_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    user_name: String,
    #[serde(default)]
    email: Option<String>,
    role: Role,
}

/// Mutation endpoints wrap the user as `{ "message": ..., "user": {...} }`,
/// lookups return it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdentityEnvelope {
    Wrapped { user: IdentityDto },
    Bare(IdentityDto),
}

#[derive(Debug, Deserialize)]
struct LoginDto {
    token: String,
    user: IdentityDto,
}

impl IdentityDto {
    fn into_identity(self) -> Result<Identity, IdentityError> {
        let id = self.native_id.or(self.id).ok_or_else(|| {
            IdentityError::MalformedResponse(format!(
                "identity '{}' carries neither _id nor id",
                self.user_name
            ))
        })?;
        Ok(Identity {
            id,
            user_name: self.user_name,
            email: self.email,
            role: self.role,
        })
    }
}

impl IdentityEnvelope {
    fn into_identity(self) -> Result<Identity, IdentityError> {
        match self {
            IdentityEnvelope::Wrapped { user } => user.into_identity(),
            IdentityEnvelope::Bare(user) => user.into_identity(),
        }
    }
}

/// How a non-success status should be read
#[derive(Debug, Clone, Copy)]
enum CallKind {
    Lookup,
    Authenticated,
    Login,
}

pub struct HttpIdentityClient {
    client: Client,
    base_url: Url,
}

impl HttpIdentityClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                IdentityError::Unreachable(format!(
                    "identity service url '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: CallKind,
        subject: &str,
    ) -> Result<T, IdentityError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref(), kind, subject));
        }

        serde_json::from_slice(body.as_ref()).map_err(|e| {
            IdentityError::MalformedResponse(format!("unexpected payload for {}: {}", subject, e))
        })
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn fetch_by_id(&self, id: &str) -> Result<Identity, IdentityError> {
        let url = self.endpoint(&["users", id])?;
        let envelope: IdentityEnvelope = self
            .send(self.client.get(url), CallKind::Lookup, id)
            .await?;
        envelope.into_identity()
    }

    async fn fetch_all(&self) -> Result<Vec<Identity>, IdentityError> {
        let url = self.endpoint(&["users"])?;
        let users: Vec<IdentityDto> = self
            .send(self.client.get(url), CallKind::Lookup, "users")
            .await?;
        users.into_iter().map(IdentityDto::into_identity).collect()
    }

    async fn create(&self, input: &UserInput) -> Result<Identity, IdentityError> {
        let url = self.endpoint(&["users"])?;
        let envelope: IdentityEnvelope = self
            .send(self.client.post(url).json(input), CallKind::Lookup, "users")
            .await?;
        envelope.into_identity()
    }

    async fn update(&self, token: &str, input: &UserInput) -> Result<Identity, IdentityError> {
        let url = self.endpoint(&["users"])?;
        let request = self.client.put(url).bearer_auth(token).json(input);
        let envelope: IdentityEnvelope = self
            .send(request, CallKind::Authenticated, "current user")
            .await?;
        envelope.into_identity()
    }

    async fn delete(&self, token: &str, id: &str) -> Result<Identity, IdentityError> {
        let url = self.endpoint(&["users", id])?;
        let request = self.client.delete(url).bearer_auth(token);
        let envelope: IdentityEnvelope = self.send(request, CallKind::Authenticated, id).await?;
        envelope.into_identity()
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, IdentityError> {
        let url = self.endpoint(&["auth", "login"])?;
        let login: LoginDto = self
            .send(
                self.client.post(url).json(credentials),
                CallKind::Login,
                &credentials.username,
            )
            .await?;
        Ok(Session {
            token: login.token,
            user: login.user.into_identity()?,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> IdentityError {
    if error.is_timeout() {
        IdentityError::Unreachable(format!("identity service timed out: {}", error))
    } else if error.is_decode() {
        IdentityError::MalformedResponse(error.to_string())
    } else {
        IdentityError::Unreachable(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8], kind: CallKind, subject: &str) -> IdentityError {
    let message = error_message(body).unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::NOT_FOUND => IdentityError::NotFound(subject.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => match kind {
            CallKind::Login => IdentityError::InvalidCredentials,
            CallKind::Lookup | CallKind::Authenticated => IdentityError::Unauthorized(message),
        },
        s if s.is_server_error() => {
            IdentityError::Unreachable(format!("identity service returned {}: {}", s, message))
        }
        s => IdentityError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// Pull a human-readable message out of an error body if there is one
fn error_message(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.message.or(parsed.error),
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
    }
}
