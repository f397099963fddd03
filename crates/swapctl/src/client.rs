//! HTTP client for the SkillSwap API.
//!
//! Every path is relative to the configured base URL, which already carries
//! the `/api` prefix. Responses are bare JSON bodies.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use swap_core::{
    Error, MatchProposal, RequestId, Session, SessionId, Skill, SkillDirection, SkillId,
    SkillProfileEntry, SkillUsers, SwapRequest, SwapRequestDraft,
};
use thiserror::Error;
use tracing::debug;

use crate::remote::{NewSkillEntry, RatingPayload, Remote, RequestAction, SessionAction};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("SkillSwap API not reachable at {addr}\n  → check that the server is running\n  → or set SKILLSWAP_API_URL / --api-url")]
    ConnectionFailed { addr: String },

    #[error("request to {addr} timed out")]
    Timeout { addr: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}\n  → check SKILLSWAP_TOKEN env var or --token flag")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        let addr = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if e.is_connect() {
            ClientError::ConnectionFailed { addr }
        } else if e.is_timeout() {
            ClientError::Timeout { addr }
        } else if e.is_decode() {
            ClientError::InvalidResponse(e.to_string())
        } else {
            ClientError::HttpError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

impl From<ClientError> for Error {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::BadRequest(message) => Error::Validation(message),
            ClientError::Unauthorized(_) => Error::UnauthorizedActor {
                entity: "resource",
                action: "access",
                allowed: "authorized user",
            },
            ClientError::NotFound(message) => Error::NotFound(message),
            ClientError::Conflict(message) => Error::InvalidTransition {
                entity: "resource",
                action: "change",
                state: message,
            },
            ClientError::HttpError { status, message } if (400..500).contains(&status) => {
                Error::Validation(format!("HTTP {status}: {message}"))
            }
            other @ (ClientError::ConnectionFailed { .. }
            | ClientError::Timeout { .. }
            | ClientError::HttpError { .. }
            | ClientError::InvalidResponse(_)) => Error::RemoteUnavailable(other.to_string()),
        }
    }
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(alias = "message")]
    pub error: String,
}

/// HTTP client for the SkillSwap API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            http: build_http(DEFAULT_TIMEOUT),
        }
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_http(timeout);
        self
    }

    /// Returns the API base URL (for error messages).
    pub fn addr(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers with optional auth token.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    /// Handle error response from API.
    async fn handle_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.error)
            .unwrap_or_else(|_| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    trimmed.to_string()
                }
            });

        match status.as_u16() {
            400 | 422 => ClientError::BadRequest(message),
            401 | 403 => ClientError::Unauthorized(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            code => ClientError::HttpError {
                status: code,
                message,
            },
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.headers(self.headers()).send().await?;
        if !response.status().is_success() {
            return Err(self.handle_error(response).await);
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// GET {path}
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        debug!(method = "GET", path, "api call");
        self.fetch(self.http.get(self.url(path))).await
    }

    /// PUT {path} with no body; parameters travel in the query string.
    pub async fn put<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        debug!(method = "PUT", path, "api call");
        self.fetch(self.http.put(self.url(path))).await
    }

    fn skills_path(direction: SkillDirection) -> &'static str {
        match direction {
            SkillDirection::Teach => "/skills/teach",
            SkillDirection::Learn => "/skills/learn",
        }
    }
}

fn build_http(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// `key=value&...` with each value percent-encoded.
fn query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl Remote for ApiClient {
    async fn list_skills(
        &self,
        direction: SkillDirection,
    ) -> swap_core::Result<Vec<SkillProfileEntry>> {
        Ok(self.get(Self::skills_path(direction)).await?)
    }

    async fn add_skill(
        &self,
        direction: SkillDirection,
        entry: &NewSkillEntry,
    ) -> swap_core::Result<SkillProfileEntry> {
        let path = Self::skills_path(direction);
        debug!(method = "POST", path, skill = %entry.skill_name, "api call");
        Ok(self.fetch(self.http.post(self.url(path)).json(entry)).await?)
    }

    async fn remove_skill(
        &self,
        direction: SkillDirection,
        skill_id: SkillId,
    ) -> swap_core::Result<()> {
        let path = format!("{}/{}", Self::skills_path(direction), skill_id);
        debug!(method = "DELETE", path = %path, "api call");
        self.send(self.http.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn all_skills(&self) -> swap_core::Result<Vec<Skill>> {
        Ok(self.get("/skills").await?)
    }

    async fn search_skills(&self, query_text: &str) -> swap_core::Result<Vec<Skill>> {
        let path = format!("/skills/search?{}", query(&[("query", query_text)]));
        Ok(self.get(&path).await?)
    }

    async fn skills_by_category(&self, category: &str) -> swap_core::Result<Vec<Skill>> {
        let path = format!("/skills/category/{}", urlencoding::encode(category));
        Ok(self.get(&path).await?)
    }

    async fn matches(&self) -> swap_core::Result<Vec<MatchProposal>> {
        Ok(self.get("/matches").await?)
    }

    async fn users_by_skill(&self, skill_id: SkillId) -> swap_core::Result<SkillUsers> {
        Ok(self.get(&format!("/matches/skill/{skill_id}")).await?)
    }

    async fn create_request(&self, draft: &SwapRequestDraft) -> swap_core::Result<SwapRequest> {
        debug!(method = "POST", path = "/swap-requests", receiver_id = %draft.receiver_id, "api call");
        Ok(self
            .fetch(self.http.post(self.url("/swap-requests")).json(draft))
            .await?)
    }

    async fn sent_requests(&self) -> swap_core::Result<Vec<SwapRequest>> {
        Ok(self.get("/swap-requests/sent").await?)
    }

    async fn received_requests(&self) -> swap_core::Result<Vec<SwapRequest>> {
        Ok(self.get("/swap-requests/received").await?)
    }

    async fn get_request(&self, id: RequestId) -> swap_core::Result<SwapRequest> {
        Ok(self.get(&format!("/swap-requests/{id}")).await?)
    }

    async fn transition_request(
        &self,
        id: RequestId,
        action: RequestAction,
    ) -> swap_core::Result<SwapRequest> {
        Ok(self
            .put(&format!("/swap-requests/{id}/{}", action.as_str()))
            .await?)
    }

    async fn list_sessions(&self) -> swap_core::Result<Vec<Session>> {
        Ok(self.get("/sessions").await?)
    }

    async fn get_session(&self, id: SessionId) -> swap_core::Result<Session> {
        Ok(self.get(&format!("/sessions/{id}")).await?)
    }

    async fn create_session_from_request(
        &self,
        request_id: RequestId,
    ) -> swap_core::Result<Session> {
        let path = format!("/sessions/create-from-request/{request_id}");
        debug!(method = "POST", path = %path, "api call");
        Ok(self.fetch(self.http.post(self.url(&path))).await?)
    }

    async fn schedule_session(
        &self,
        id: SessionId,
        when: DateTime<Utc>,
        duration_minutes: u32,
    ) -> swap_core::Result<Session> {
        let when = when.format("%Y-%m-%dT%H:%M:%S").to_string();
        let duration = duration_minutes.to_string();
        let path = format!(
            "/sessions/{id}/schedule?{}",
            query(&[("scheduledDate", &when), ("duration", &duration)])
        );
        Ok(self.put(&path).await?)
    }

    async fn set_meeting(
        &self,
        id: SessionId,
        meeting_url: &str,
        meeting_platform: Option<&str>,
    ) -> swap_core::Result<Session> {
        let path = format!(
            "/sessions/{id}/meeting-url?{}",
            query(&[
                ("meetingUrl", meeting_url),
                ("meetingPlatform", meeting_platform.unwrap_or("")),
            ])
        );
        Ok(self.put(&path).await?)
    }

    async fn transition_session(
        &self,
        id: SessionId,
        action: SessionAction,
    ) -> swap_core::Result<Session> {
        Ok(self
            .put(&format!("/sessions/{id}/{}", action.as_str()))
            .await?)
    }

    async fn update_notes(&self, id: SessionId, notes: &str) -> swap_core::Result<Session> {
        let path = format!("/sessions/{id}/notes?{}", query(&[("notes", notes)]));
        Ok(self.put(&path).await?)
    }

    async fn share_resources(&self, id: SessionId, resources: &str) -> swap_core::Result<Session> {
        let path = format!(
            "/sessions/{id}/resources?{}",
            query(&[("resources", resources)])
        );
        Ok(self.put(&path).await?)
    }

    async fn rate_session(
        &self,
        id: SessionId,
        rating: &RatingPayload,
    ) -> swap_core::Result<Session> {
        let path = format!("/sessions/{id}/rate");
        debug!(method = "PUT", path = %path, rating = rating.rating, "api call");
        Ok(self.fetch(self.http.put(self.url(&path)).json(rating)).await?)
    }
}
