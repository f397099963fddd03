//! Turns a match proposal into a submittable swap request draft.
//!
//! Resolution runs in two steps: [`resolve_pair`] binds the loosely typed
//! match skills to the user's own entries by name, then [`ResolvedSkillPair::draft`]
//! builds the request payload. `teach_skill_id` is always the skill the
//! current user teaches and `learn_skill_id` the skill they learn.

use crate::error::{Error, Result};
use crate::profile::find_by_skill_name;
use crate::types::{MatchProposal, SkillDirection, SkillProfileEntry, SwapRequestDraft};

/// The user's own entries behind both sides of a match.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSkillPair<'a> {
    /// Entry the current user will teach (the match's skill-you-can-teach-them).
    pub teach: &'a SkillProfileEntry,
    /// Entry the current user will learn (the match's skill-they-can-teach-you).
    pub learn: &'a SkillProfileEntry,
}

/// Bind both sides of a match to entries in the user's teach and learn lists.
pub fn resolve_pair<'a>(
    proposal: &MatchProposal,
    teach_skills: &'a [SkillProfileEntry],
    learn_skills: &'a [SkillProfileEntry],
) -> Result<ResolvedSkillPair<'a>> {
    let (Some(you_teach), Some(they_teach)) = (
        proposal.skill_you_can_teach_them.as_ref(),
        proposal.skill_they_can_teach_you.as_ref(),
    ) else {
        return Err(Error::IncompleteMatch);
    };

    let teach = find_by_skill_name(teach_skills, &you_teach.name).ok_or_else(|| {
        Error::UnregisteredSkill {
            direction: SkillDirection::Teach,
            skill_name: you_teach.name.clone(),
        }
    })?;
    let learn = find_by_skill_name(learn_skills, &they_teach.name).ok_or_else(|| {
        Error::UnregisteredSkill {
            direction: SkillDirection::Learn,
            skill_name: they_teach.name.clone(),
        }
    })?;

    Ok(ResolvedSkillPair { teach, learn })
}

impl ResolvedSkillPair<'_> {
    /// Build the draft, falling back to [`default_message`] when `message`
    /// is absent or blank.
    pub fn draft(&self, proposal: &MatchProposal, message: Option<&str>) -> SwapRequestDraft {
        let message = match message.map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => default_message(
                &proposal.user.first_name,
                &self.teach.skill.name,
                &self.learn.skill.name,
            ),
        };
        SwapRequestDraft {
            receiver_id: proposal.user.id,
            teach_skill_id: self.teach.skill.id,
            learn_skill_id: self.learn.skill.id,
            message,
        }
    }
}

/// Resolve a match against the user's skill lists in one call.
pub fn resolve(
    proposal: &MatchProposal,
    teach_skills: &[SkillProfileEntry],
    learn_skills: &[SkillProfileEntry],
    message: Option<&str>,
) -> Result<SwapRequestDraft> {
    resolve_pair(proposal, teach_skills, learn_skills).map(|pair| pair.draft(proposal, message))
}

/// Greeting used when the sender leaves the message empty.
pub fn default_message(first_name: &str, you_teach: &str, they_teach: &str) -> String {
    format!(
        "Hi {first_name}! I can teach you {you_teach} and would love to learn {they_teach} from you. Let's swap skills!"
    )
}
