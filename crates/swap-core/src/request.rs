//! Swap request lifecycle.
//!
//! ```text
//! PENDING ──accept (receiver)──▶ ACCEPTED
//!         ──reject (receiver)──▶ REJECTED
//!         ──cancel (sender)────▶ CANCELLED
//! ```
//!
//! Terminal states admit no transition. A failed transition leaves the
//! request untouched.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::{
    RequestId, RequestRole, RequestStatus, SwapRequest, SwapRequestDraft, UserId, UserRef,
};
use crate::validate;

const ENTITY: &str = "swap request";

/// Reject drafts the remote collaborator would otherwise accept blindly.
pub fn validate_draft(sender: UserId, draft: &SwapRequestDraft) -> Result<()> {
    if draft.teach_skill_id == draft.learn_skill_id {
        return Err(Error::validation("teach and learn skill must differ"));
    }
    if draft.receiver_id == sender {
        return Err(Error::validation("cannot send a swap request to yourself"));
    }
    validate::message(&draft.message)
}

impl SwapRequest {
    /// Build a new PENDING request from a validated draft.
    pub fn create(
        id: RequestId,
        sender: UserRef,
        receiver: UserRef,
        draft: SwapRequestDraft,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validate_draft(sender.id, &draft)?;
        if receiver.id != draft.receiver_id {
            return Err(Error::validation(format!(
                "receiver {} does not match draft receiver {}",
                receiver.id, draft.receiver_id
            )));
        }
        Ok(Self {
            id,
            sender,
            receiver,
            teach_skill_id: draft.teach_skill_id,
            learn_skill_id: draft.learn_skill_id,
            teach_skill_name: None,
            learn_skill_name: None,
            message: Some(draft.message),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: None,
        })
    }

    pub fn role_of(&self, user: UserId) -> Option<RequestRole> {
        if self.sender.id == user {
            Some(RequestRole::Sender)
        } else if self.receiver.id == user {
            Some(RequestRole::Receiver)
        } else {
            None
        }
    }

    /// The other party on the request, if `user` is one of them.
    pub fn counterpart(&self, user: UserId) -> Option<&UserRef> {
        match self.role_of(user)? {
            RequestRole::Sender => Some(&self.receiver),
            RequestRole::Receiver => Some(&self.sender),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Only an accepted request may back a session.
    pub fn can_open_session(&self) -> bool {
        self.status == RequestStatus::Accepted
    }

    pub fn accept(&mut self, actor: UserId) -> Result<()> {
        self.transition(actor, "accept", RequestRole::Receiver, RequestStatus::Accepted)
    }

    pub fn reject(&mut self, actor: UserId) -> Result<()> {
        self.transition(actor, "reject", RequestRole::Receiver, RequestStatus::Rejected)
    }

    pub fn cancel(&mut self, actor: UserId) -> Result<()> {
        self.transition(actor, "cancel", RequestRole::Sender, RequestStatus::Cancelled)
    }

    fn transition(
        &mut self,
        actor: UserId,
        action: &'static str,
        allowed: RequestRole,
        to: RequestStatus,
    ) -> Result<()> {
        if self.status != RequestStatus::Pending {
            return Err(Error::InvalidTransition {
                entity: ENTITY,
                action,
                state: self.status.to_string(),
            });
        }
        if self.role_of(actor) != Some(allowed) {
            return Err(Error::UnauthorizedActor {
                entity: ENTITY,
                action,
                allowed: allowed.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }
}
