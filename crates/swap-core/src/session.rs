//! Session lifecycle.
//!
//! ```text
//! CREATED ──schedule──▶ SCHEDULED ──start──▶ IN_PROGRESS
//! CREATED ──start──▶ IN_PROGRESS
//! SCHEDULED | IN_PROGRESS ──complete (both participants)──▶ COMPLETED
//! any non-terminal ──cancel──▶ CANCELLED
//! ```
//!
//! Completion needs a confirmation from each participant. The first
//! confirmation leaves the status unchanged; the second moves the session to
//! COMPLETED and stamps `completed_at`.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::{
    RequestId, Session, SessionId, SessionRating, SessionStatus, SwapRequest, UserId,
};
use crate::validate;

const ENTITY: &str = "session";

/// Outcome of a completion confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The actor's confirmation is recorded; the partner has not confirmed yet.
    AwaitingPartner,
    /// Both participants confirmed; the session is COMPLETED.
    Completed,
}

/// One session per accepted swap request.
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    by_request: HashMap<RequestId, SessionId>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_for(&self, request_id: RequestId) -> Option<SessionId> {
        self.by_request.get(&request_id).copied()
    }

    /// Check that a session may be opened for `request` without creating it.
    pub fn ensure_can_create(&self, request: &SwapRequest) -> Result<()> {
        if !request.can_open_session() {
            return Err(Error::InvalidTransition {
                entity: "swap request",
                action: "open a session for",
                state: request.status.to_string(),
            });
        }
        if self.by_request.contains_key(&request.id) {
            return Err(Error::DuplicateSession(request.id));
        }
        Ok(())
    }

    /// Create the session for an accepted request and register it.
    pub fn create_from_request(
        &mut self,
        id: SessionId,
        request: &SwapRequest,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        self.ensure_can_create(request)?;
        let title = match (&request.teach_skill_name, &request.learn_skill_name) {
            (Some(teach), Some(learn)) => Some(format!("Skill Swap: {teach} ↔ {learn}")),
            _ => None,
        };
        let session = Session {
            id,
            source_request_id: request.id,
            participants: [request.sender.id, request.receiver.id],
            title,
            status: SessionStatus::Created,
            scheduled_date: None,
            duration: None,
            meeting_url: None,
            meeting_platform: None,
            session_notes: None,
            shared_resources: None,
            confirmed_by: BTreeSet::new(),
            ratings: Vec::new(),
            created_at: now,
            completed_at: None,
        };
        self.by_request.insert(request.id, id);
        Ok(session)
    }

    /// Register a session fetched from the remote collaborator.
    ///
    /// Re-registering the same session is a no-op; a second session for the
    /// same request is rejected.
    pub fn register(&mut self, session: &Session) -> Result<()> {
        match self.by_request.get(&session.source_request_id) {
            Some(existing) if *existing != session.id => {
                Err(Error::DuplicateSession(session.source_request_id))
            }
            _ => {
                self.by_request.insert(session.source_request_id, session.id);
                Ok(())
            }
        }
    }

    pub fn clear(&mut self) {
        self.by_request.clear();
    }
}

impl Session {
    fn require_participant(&self, actor: UserId, action: &'static str) -> Result<()> {
        if self.is_participant(actor) {
            Ok(())
        } else {
            Err(Error::UnauthorizedActor {
                entity: ENTITY,
                action,
                allowed: "session participants",
            })
        }
    }

    fn require_state(&self, action: &'static str, allowed: &[SessionStatus]) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn require_open(&self, action: &'static str) -> Result<()> {
        if self.status.is_terminal() {
            Err(self.invalid(action))
        } else {
            Ok(())
        }
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            entity: ENTITY,
            action,
            state: self.status.to_string(),
        }
    }

    /// Set or move the meeting time. Legal from CREATED or SCHEDULED.
    pub fn schedule(
        &mut self,
        actor: UserId,
        when: DateTime<Utc>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.require_state("schedule", &[SessionStatus::Created, SessionStatus::Scheduled])?;
        self.require_participant(actor, "schedule")?;
        if when < now {
            return Err(Error::validation(format!(
                "scheduled time {} is in the past",
                when.format("%Y-%m-%d %H:%M")
            )));
        }
        let duration = u32::try_from(duration_minutes)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                Error::validation(format!(
                    "duration must be a positive number of minutes, got {duration_minutes}"
                ))
            })?;
        self.scheduled_date = Some(when);
        self.duration = Some(duration);
        self.status = SessionStatus::Scheduled;
        Ok(())
    }

    /// Set the meeting link. An empty URL clears it.
    pub fn attach_meeting(
        &mut self,
        actor: UserId,
        meeting_url: &str,
        meeting_platform: Option<&str>,
    ) -> Result<()> {
        self.require_open("attach a meeting to")?;
        self.require_participant(actor, "attach a meeting to")?;
        validate::meeting_url(meeting_url)?;
        let url = meeting_url.trim();
        if url.is_empty() {
            self.meeting_url = None;
            self.meeting_platform = None;
        } else {
            self.meeting_url = Some(url.to_string());
            self.meeting_platform = meeting_platform
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from);
        }
        Ok(())
    }

    pub fn start(&mut self, actor: UserId) -> Result<()> {
        self.require_state("start", &[SessionStatus::Created, SessionStatus::Scheduled])?;
        self.require_participant(actor, "start")?;
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    pub fn can_join(&self) -> bool {
        self.meeting_url.is_some()
            && matches!(
                self.status,
                SessionStatus::Created | SessionStatus::Scheduled | SessionStatus::InProgress
            )
    }

    /// Meeting link for a participant. Joining is not a transition.
    pub fn join(&self, actor: UserId) -> Result<&str> {
        self.require_participant(actor, "join")?;
        match self.meeting_url.as_deref() {
            Some(url) if self.can_join() => Ok(url),
            Some(_) => Err(self.invalid("join")),
            None => Err(Error::NotFound(format!(
                "meeting link for session {}",
                self.id
            ))),
        }
    }

    /// Replace the free-text notes. Length limits are the caller's concern.
    pub fn annotate(&mut self, actor: UserId, notes: &str) -> Result<()> {
        self.require_open("annotate")?;
        self.require_participant(actor, "annotate")?;
        self.session_notes = Some(notes.to_string());
        Ok(())
    }

    pub fn share_resources(&mut self, actor: UserId, resources: &str) -> Result<()> {
        self.require_open("share resources on")?;
        self.require_participant(actor, "share resources on")?;
        self.shared_resources = Some(resources.to_string());
        Ok(())
    }

    /// Record `actor`'s completion confirmation.
    pub fn complete(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<Completion> {
        self.require_state(
            "complete",
            &[SessionStatus::Scheduled, SessionStatus::InProgress],
        )?;
        self.require_participant(actor, "complete")?;
        self.confirmed_by.insert(actor);
        if self.participants.iter().all(|p| self.confirmed_by.contains(p)) {
            self.status = SessionStatus::Completed;
            self.completed_at = Some(now);
            Ok(Completion::Completed)
        } else {
            Ok(Completion::AwaitingPartner)
        }
    }

    pub fn has_confirmed(&self, user: UserId) -> bool {
        self.confirmed_by.contains(&user)
    }

    pub fn cancel(&mut self, actor: UserId) -> Result<()> {
        self.require_open("cancel")?;
        self.require_participant(actor, "cancel")?;
        self.status = SessionStatus::Cancelled;
        Ok(())
    }

    /// Rate a completed session. A participant's later rating replaces the earlier one.
    pub fn rate(&mut self, actor: UserId, rating: u8, feedback: Option<&str>) -> Result<()> {
        validate::rating(rating)?;
        self.require_state("rate", &[SessionStatus::Completed])?;
        self.require_participant(actor, "rate")?;
        let feedback = feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from);
        self.ratings.retain(|r| r.by != actor);
        self.ratings.push(SessionRating {
            by: actor,
            rating,
            feedback,
        });
        Ok(())
    }

    pub fn rating_by(&self, user: UserId) -> Option<&SessionRating> {
        self.ratings.iter().find(|r| r.by == user)
    }
}
