//! Contract with the SkillSwap API.
//!
//! The remote collaborator owns every persisted entity. Implementations map
//! their own failures into [`swap_core::Error`]; anything ambiguous (server
//! errors, dropped connections, timeouts, bodies that do not decode) must
//! surface as `RemoteUnavailable`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swap_core::{
    MatchProposal, RequestId, Result, Session, SessionId, Skill, SkillDirection, SkillId,
    SkillProfileEntry, SkillUsers, SwapRequest, SwapRequestDraft,
};

/// Body of `POST /skills/{teach,learn}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSkillEntry {
    pub skill_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

/// Body of `PUT /sessions/{id}/rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingPayload {
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Accept,
    Reject,
    Cancel,
}

impl RequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Complete,
    Cancel,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

#[async_trait]
pub trait Remote: Send + Sync {
    // --- Skills ---

    async fn list_skills(&self, direction: SkillDirection) -> Result<Vec<SkillProfileEntry>>;

    async fn add_skill(
        &self,
        direction: SkillDirection,
        entry: &NewSkillEntry,
    ) -> Result<SkillProfileEntry>;

    async fn remove_skill(&self, direction: SkillDirection, skill_id: SkillId) -> Result<()>;

    async fn all_skills(&self) -> Result<Vec<Skill>>;

    async fn search_skills(&self, query: &str) -> Result<Vec<Skill>>;

    async fn skills_by_category(&self, category: &str) -> Result<Vec<Skill>>;

    // --- Matches ---

    /// Proposals in the order the collaborator ranked them.
    async fn matches(&self) -> Result<Vec<MatchProposal>>;

    /// Users who teach and users who want to learn `skill_id`.
    async fn users_by_skill(&self, skill_id: SkillId) -> Result<SkillUsers>;

    // --- Swap requests ---

    async fn create_request(&self, draft: &SwapRequestDraft) -> Result<SwapRequest>;

    async fn sent_requests(&self) -> Result<Vec<SwapRequest>>;

    async fn received_requests(&self) -> Result<Vec<SwapRequest>>;

    async fn get_request(&self, id: RequestId) -> Result<SwapRequest>;

    async fn transition_request(&self, id: RequestId, action: RequestAction)
        -> Result<SwapRequest>;

    // --- Sessions ---

    async fn list_sessions(&self) -> Result<Vec<Session>>;

    async fn get_session(&self, id: SessionId) -> Result<Session>;

    async fn create_session_from_request(&self, request_id: RequestId) -> Result<Session>;

    async fn schedule_session(
        &self,
        id: SessionId,
        when: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<Session>;

    async fn set_meeting(
        &self,
        id: SessionId,
        meeting_url: &str,
        meeting_platform: Option<&str>,
    ) -> Result<Session>;

    async fn transition_session(&self, id: SessionId, action: SessionAction) -> Result<Session>;

    async fn update_notes(&self, id: SessionId, notes: &str) -> Result<Session>;

    async fn share_resources(&self, id: SessionId, resources: &str) -> Result<Session>;

    async fn rate_session(&self, id: SessionId, rating: &RatingPayload) -> Result<Session>;
}
