//! Core types for the skill swap workflow.
//!
//! Field names follow the SkillSwap API wire format (camelCase JSON,
//! SCREAMING_SNAKE_CASE status strings). Decoding also accepts the backend's
//! offset-less timestamps and nested skill/request objects.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifier of a registered user.
    UserId
);
id_type!(
    /// Identifier of a canonical skill shared across users.
    SkillId
);
id_type!(
    /// Identifier of a user's teach/learn profile entry.
    EntryId
);
id_type!(
    /// Identifier of a swap request.
    RequestId
);
id_type!(
    /// Identifier of a learning session.
    SessionId
);

/// Parse an API timestamp. RFC 3339 values keep their offset; bare
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` values (either `T` or a space) are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Serde adapter for [`parse_timestamp`]. Serializes as RFC 3339.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        dt.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) => super::parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'"))),
        }
    }
}

/// `null` reads as an empty string.
fn string_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

// --- Enumerations ---

/// Which of a user's two skill collections an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillDirection {
    /// Skills the user offers to teach.
    Teach,
    /// Skills the user wants to learn.
    Learn,
}

impl SkillDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teach => "teach",
            Self::Learn => "learn",
        }
    }
}

impl std::fmt::Display for SkillDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Swap request lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a user plays on a swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRole {
    Sender,
    Receiver,
}

impl RequestRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

// --- Core Types ---

/// A canonical skill, shared across users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A skill reference carried by a match payload. The id may be missing, in
/// which case the name is resolved against the user's own entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSkill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SkillId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Minimal public view of another user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: UserId,
    #[serde(default, deserialize_with = "string_or_null")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Average rating received from past sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl UserRef {
    pub fn new(id: impl Into<UserId>, first_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: None,
            rating: None,
        }
    }

    /// First and last name joined, or the first name alone.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// One entry in a user's teach or learn collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProfileEntry {
    pub id: EntryId,
    pub skill: Skill,
    /// Self-assessed level, 1 (beginner) to 5 (master).
    pub level: u8,
    /// Learning goal or teaching experience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// An externally computed suggestion pairing the current user with another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchProposal {
    pub user: UserRef,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub match_description: String,
    #[serde(
        default,
        alias = "mutualTeachSkill",
        skip_serializing_if = "Option::is_none"
    )]
    pub skill_they_can_teach_you: Option<MatchSkill>,
    #[serde(
        default,
        alias = "mutualLearnSkill",
        skip_serializing_if = "Option::is_none"
    )]
    pub skill_you_can_teach_them: Option<MatchSkill>,
}

/// Everyone who teaches or wants to learn one skill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillUsers {
    #[serde(default)]
    pub teachers: Vec<UserRef>,
    #[serde(default)]
    pub learners: Vec<UserRef>,
}

/// A submittable swap request, produced by the match resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequestDraft {
    pub receiver_id: UserId,
    /// Skill the sender will teach.
    pub teach_skill_id: SkillId,
    /// Skill the sender wants to learn.
    pub learn_skill_id: SkillId,
    pub message: String,
}

/// A directional proposal from sender to receiver to exchange two skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SwapRequestWire")]
pub struct SwapRequest {
    pub id: RequestId,
    pub sender: UserRef,
    pub receiver: UserRef,
    /// Skill the sender will teach. Fixed at creation.
    pub teach_skill_id: SkillId,
    /// Skill the sender wants to learn. Fixed at creation.
    pub learn_skill_id: SkillId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teach_skill_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_skill_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Decoding form of [`SwapRequest`]: skills arrive either as flat ids and
/// names or as nested `teachSkill`/`learnSkill` objects.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequestWire {
    id: RequestId,
    sender: UserRef,
    receiver: UserRef,
    #[serde(default)]
    teach_skill_id: Option<SkillId>,
    #[serde(default)]
    learn_skill_id: Option<SkillId>,
    #[serde(default)]
    teach_skill: Option<MatchSkill>,
    #[serde(default)]
    learn_skill: Option<MatchSkill>,
    #[serde(default)]
    teach_skill_name: Option<String>,
    #[serde(default)]
    learn_skill_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    status: RequestStatus,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    updated_at: Option<DateTime<Utc>>,
}

fn flatten_skill(
    id: Option<SkillId>,
    nested: Option<MatchSkill>,
    name: Option<String>,
) -> Option<(SkillId, Option<String>)> {
    let id = id.or(nested.as_ref().and_then(|s| s.id))?;
    Some((id, name.or(nested.map(|s| s.name))))
}

impl TryFrom<SwapRequestWire> for SwapRequest {
    type Error = String;

    fn try_from(wire: SwapRequestWire) -> std::result::Result<Self, Self::Error> {
        let id = wire.id;
        let (teach_skill_id, teach_skill_name) =
            flatten_skill(wire.teach_skill_id, wire.teach_skill, wire.teach_skill_name)
                .ok_or_else(|| format!("swap request {id} has no teach skill id"))?;
        let (learn_skill_id, learn_skill_name) =
            flatten_skill(wire.learn_skill_id, wire.learn_skill, wire.learn_skill_name)
                .ok_or_else(|| format!("swap request {id} has no learn skill id"))?;
        Ok(Self {
            id,
            sender: wire.sender,
            receiver: wire.receiver,
            teach_skill_id,
            learn_skill_id,
            teach_skill_name,
            learn_skill_name,
            message: wire.message,
            status: wire.status,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

/// A participant's rating of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRating {
    pub by: UserId,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// A learning session instantiated from an accepted swap request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SessionWire")]
pub struct Session {
    pub id: SessionId,
    pub source_request_id: RequestId,
    /// Sender and receiver of the source request, in that order.
    pub participants: [UserId; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<DateTime<Utc>>,
    /// Planned duration in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_resources: Option<String>,
    /// Participants who have confirmed completion.
    #[serde(default)]
    pub confirmed_by: BTreeSet<UserId>,
    #[serde(default)]
    pub ratings: Vec<SessionRating>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Decoding form of [`Session`]: the source request arrives either as
/// `sourceRequestId` plus `participants` or as a nested `swapRequest`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionWire {
    id: SessionId,
    #[serde(default)]
    source_request_id: Option<RequestId>,
    #[serde(default)]
    participants: Option<[UserId; 2]>,
    #[serde(default)]
    swap_request: Option<SwapRequest>,
    #[serde(default)]
    title: Option<String>,
    status: SessionStatus,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    meeting_url: Option<String>,
    #[serde(default)]
    meeting_platform: Option<String>,
    #[serde(default)]
    session_notes: Option<String>,
    #[serde(default)]
    shared_resources: Option<String>,
    #[serde(default)]
    confirmed_by: BTreeSet<UserId>,
    #[serde(default)]
    ratings: Vec<SessionRating>,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionWire> for Session {
    type Error = String;

    fn try_from(wire: SessionWire) -> std::result::Result<Self, Self::Error> {
        let id = wire.id;
        let nested = wire.swap_request.as_ref();
        let source_request_id = wire
            .source_request_id
            .or(nested.map(|r| r.id))
            .ok_or_else(|| format!("session {id} has no source request"))?;
        let participants = wire
            .participants
            .or(nested.map(|r| [r.sender.id, r.receiver.id]))
            .ok_or_else(|| format!("session {id} has no participants"))?;
        Ok(Self {
            id,
            source_request_id,
            participants,
            title: wire.title,
            status: wire.status,
            scheduled_date: wire.scheduled_date,
            duration: wire.duration,
            meeting_url: wire.meeting_url,
            meeting_platform: wire.meeting_platform,
            session_notes: wire.session_notes,
            shared_resources: wire.shared_resources,
            confirmed_by: wire.confirmed_by,
            ratings: wire.ratings,
            created_at: wire.created_at,
            completed_at: wire.completed_at,
        })
    }
}

impl Session {
    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// The other participant, if `user` is one of the two.
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        match self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }
}
