//! Password login, session refresh and profile lookup against the identity
//! provider.
//!
//! Every call carries the provider's public anon key as `apikey`; the token
//! calls also use it as the bearer token.

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::AuthError;
use crate::storage::AuthConfig;

/// What a successful password login yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSession {
    pub user_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

/// Profile row for the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Response body as returned by the provider.
    pub raw: String,
    pub personal_code: Option<String>,
}

#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl AuthClient {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }

    /// `POST /auth/v1/token?grant_type=password`.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AuthError> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let resp = self
            .with_headers(self.http.post(&url), &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: serde_json::Value = ensure_success("login", resp).await?.json().await?;
        let session = session_from(&body)?;
        info!(user_id = %session.user_id, "login succeeded");
        Ok(session)
    }

    /// `POST /auth/v1/token?grant_type=refresh_token`: trade a refresh
    /// token for a new session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginSession, AuthError> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let resp = self
            .with_headers(self.http.post(&url), &self.anon_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let body: serde_json::Value = ensure_success("refresh", resp).await?.json().await?;
        let session = session_from(&body)?;
        debug!(user_id = %session.user_id, "session refreshed");
        Ok(session)
    }

    /// `GET /rest/v1/profiles?select=personal_code&id=eq.<user_id>`.
    ///
    /// Uses the session's access token when there is one.
    pub async fn fetch_profile(&self, session: &LoginSession) -> Result<Profile, AuthError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let bearer = if session.access_token.is_empty() {
            &self.anon_key
        } else {
            &session.access_token
        };
        let filter = format!("eq.{}", session.user_id);
        let resp = self
            .with_headers(self.http.get(&url), bearer)
            .query(&[("select", "personal_code"), ("id", filter.as_str())])
            .send()
            .await?;
        let raw = ensure_success("profile", resp).await?.text().await?;
        info!(profile = %raw, "profile data");

        let personal_code = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v[0]["personal_code"].as_str().map(str::to_string));
        Ok(Profile { raw, personal_code })
    }

    fn with_headers(&self, req: RequestBuilder, bearer: &str) -> RequestBuilder {
        req.header("Authorization", format!("Bearer {bearer}"))
            .header("apikey", &self.anon_key)
    }
}

fn session_from(body: &serde_json::Value) -> Result<LoginSession, AuthError> {
    let user_id = body["user"]["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or(AuthError::MissingUserId)?
        .to_string();
    Ok(LoginSession {
        user_id,
        access_token: body["access_token"].as_str().unwrap_or_default().to_string(),
        refresh_token: body["refresh_token"].as_str().unwrap_or_default().to_string(),
    })
}

async fn ensure_success(endpoint: &'static str, resp: Response) -> Result<Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AuthError::Status {
        endpoint,
        status: status.as_u16(),
        body,
    })
}
