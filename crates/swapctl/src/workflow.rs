//! Workflow orchestrator.
//!
//! The only entry point presentation code talks to. Holds a local cache of
//! the user's profile, swap requests and sessions; the remote collaborator is
//! authoritative. Each mutating operation runs the core transition against a
//! clone of the cached entity first, so definite failures never reach the
//! network. The cache is written only after the remote confirms.
//!
//! When the remote result is ambiguous (`RemoteUnavailable`) or proves the
//! cached entity wrong (`NotFound`, `InvalidTransition`, `UnauthorizedActor`)
//! the affected entry is evicted and the next read re-fetches it. A local
//! state check that fails against a cached copy re-reads the entity once
//! before rejecting. Nothing is synthesized locally.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use swap_core::{
    request, resolver, validate, Completion, Error, ErrorKind, MatchProposal, RequestId,
    RequestStatus, Result, Session, SessionId, SessionIndex, SessionStatus, Skill,
    SkillDirection, SkillId, SkillProfile, SkillProfileEntry, SkillUsers, SwapRequest, UserId,
    UserRef,
};
use tracing::{debug, info, warn};

use crate::remote::{NewSkillEntry, RatingPayload, Remote, RequestAction, SessionAction};

/// The signed-in user every operation acts as.
#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    pub user: UserRef,
}

impl UserContext {
    pub fn new(user: UserRef) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

#[derive(Debug)]
pub struct Workflow<R> {
    remote: R,
    ctx: UserContext,
    notes_max_chars: usize,
    profile: Option<SkillProfile>,
    requests: HashMap<RequestId, SwapRequest>,
    requests_loaded: bool,
    sessions: HashMap<SessionId, Session>,
    sessions_loaded: bool,
    index: SessionIndex,
}

/// Remote failures after which the cached entity can no longer be trusted.
fn should_evict(e: &Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::RemoteUnavailable
            | ErrorKind::NotFound
            | ErrorKind::InvalidTransition
            | ErrorKind::UnauthorizedActor
    )
}

fn newest_first(requests: &mut [SwapRequest]) {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl<R: Remote> Workflow<R> {
    pub fn new(remote: R, ctx: UserContext) -> Self {
        Self {
            remote,
            ctx,
            notes_max_chars: validate::MAX_NOTES_CHARS,
            profile: None,
            requests: HashMap::new(),
            requests_loaded: false,
            sessions: HashMap::new(),
            sessions_loaded: false,
            index: SessionIndex::new(),
        }
    }

    /// Cap applied to session notes before they are sent.
    pub fn with_notes_limit(mut self, max_chars: usize) -> Self {
        self.notes_max_chars = max_chars;
        self
    }

    pub fn user(&self) -> &UserRef {
        &self.ctx.user
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn me(&self) -> UserId {
        self.ctx.user_id()
    }

    // --- Skill profile ---

    pub async fn refresh_profile(&mut self) -> Result<&SkillProfile> {
        self.profile = None;
        let teach = self.remote.list_skills(SkillDirection::Teach).await?;
        let learn = self.remote.list_skills(SkillDirection::Learn).await?;
        let mut profile = SkillProfile::new();
        profile.replace_all(SkillDirection::Teach, teach)?;
        profile.replace_all(SkillDirection::Learn, learn)?;
        debug!(
            teach = profile.teach_skills().len(),
            learn = profile.learn_skills().len(),
            "profile loaded"
        );
        Ok(self.profile.insert(profile))
    }

    /// The cached profile, fetched on first use.
    pub async fn profile(&mut self) -> Result<&SkillProfile> {
        if self.profile.is_none() {
            self.refresh_profile().await?;
        }
        self.profile
            .as_ref()
            .ok_or_else(|| Error::NotFound("skill profile".to_string()))
    }

    fn settle_profile<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if should_evict(e) {
                warn!(error = %e, "evicting cached skill profile");
                self.profile = None;
            }
        }
        result
    }

    pub async fn add_skill(
        &mut self,
        direction: SkillDirection,
        entry: NewSkillEntry,
    ) -> Result<SkillProfileEntry> {
        validate::level(entry.level)?;
        validate::skill_name(&entry.skill_name)?;
        if let Some(existing) = self
            .profile()
            .await?
            .find_by_skill_name(direction, &entry.skill_name)
        {
            return Err(Error::DuplicateSkill {
                skill_id: existing.skill.id,
                direction,
            });
        }

        let result = self.remote.add_skill(direction, &entry).await;
        let added = self.settle_profile(result)?;

        let stale = match self.profile.as_mut() {
            Some(profile) => {
                let _ = profile.remove_skill(direction, added.skill.id);
                profile
                    .add_skill(direction, added.clone(), added.created_at)
                    .is_err()
            }
            None => false,
        };
        if stale {
            self.profile = None;
        }
        info!(%direction, skill = %added.skill.name, "skill added");
        Ok(added)
    }

    pub async fn remove_skill(&mut self, direction: SkillDirection, skill_id: SkillId) -> Result<()> {
        if !self.profile().await?.contains(direction, skill_id) {
            return Err(Error::NotFound(format!(
                "skill {skill_id} in {direction} list"
            )));
        }
        let result = self.remote.remove_skill(direction, skill_id).await;
        self.settle_profile(result)?;
        if let Some(profile) = self.profile.as_mut() {
            let _ = profile.remove_skill(direction, skill_id);
        }
        info!(%direction, %skill_id, "skill removed");
        Ok(())
    }

    // --- Skill catalog ---

    pub async fn all_skills(&self) -> Result<Vec<Skill>> {
        self.remote.all_skills().await
    }

    /// A blank query lists the whole catalog.
    pub async fn search_skills(&self, query: &str) -> Result<Vec<Skill>> {
        let query = query.trim();
        if query.is_empty() {
            return self.all_skills().await;
        }
        self.remote.search_skills(query).await
    }

    pub async fn skills_by_category(&self, category: &str) -> Result<Vec<Skill>> {
        self.remote.skills_by_category(category.trim()).await
    }

    // --- Matches ---

    /// Proposals exactly as the collaborator ranked and described them.
    pub async fn matches(&self) -> Result<Vec<MatchProposal>> {
        self.remote.matches().await
    }

    /// Who teaches and who wants to learn a catalog skill.
    pub async fn users_by_skill(&self, skill_id: SkillId) -> Result<SkillUsers> {
        self.remote.users_by_skill(skill_id).await
    }

    // --- Swap requests ---

    /// Resolve a match against the user's profile and submit the request.
    pub async fn request_swap(
        &mut self,
        proposal: &MatchProposal,
        message: Option<&str>,
    ) -> Result<SwapRequest> {
        let me = self.me();
        let profile = self.profile().await?;
        let draft = resolver::resolve(
            proposal,
            profile.teach_skills(),
            profile.learn_skills(),
            message,
        )?;
        request::validate_draft(me, &draft)?;

        self.ensure_requests_loaded().await?;
        let already_pending = self.requests.values().any(|r| {
            r.status == RequestStatus::Pending
                && r.sender.id == me
                && r.receiver.id == draft.receiver_id
        });
        if already_pending {
            return Err(Error::Validation(format!(
                "a pending request to user {} already exists",
                draft.receiver_id
            )));
        }

        let result = self.remote.create_request(&draft).await;
        let created = self.settle_request(None, result)?;
        info!(
            request_id = %created.id,
            receiver_id = %created.receiver.id,
            teach_skill_id = %created.teach_skill_id,
            learn_skill_id = %created.learn_skill_id,
            "swap request sent"
        );
        Ok(created)
    }

    pub async fn refresh_requests(&mut self) -> Result<()> {
        self.requests_loaded = false;
        let sent = self.remote.sent_requests().await?;
        let received = self.remote.received_requests().await?;
        self.requests = sent
            .into_iter()
            .chain(received)
            .map(|r| (r.id, r))
            .collect();
        self.requests_loaded = true;
        debug!(count = self.requests.len(), "swap requests loaded");
        Ok(())
    }

    async fn ensure_requests_loaded(&mut self) -> Result<()> {
        if !self.requests_loaded {
            self.refresh_requests().await?;
        }
        Ok(())
    }

    /// Requests the user sent, newest first.
    pub async fn sent_requests(&mut self) -> Result<Vec<SwapRequest>> {
        self.requests_where(|me, r| r.sender.id == me).await
    }

    /// Requests addressed to the user, newest first.
    pub async fn received_requests(&mut self) -> Result<Vec<SwapRequest>> {
        self.requests_where(|me, r| r.receiver.id == me).await
    }

    async fn requests_where(
        &mut self,
        keep: impl Fn(UserId, &SwapRequest) -> bool,
    ) -> Result<Vec<SwapRequest>> {
        self.ensure_requests_loaded().await?;
        let me = self.me();
        let mut out: Vec<SwapRequest> = self
            .requests
            .values()
            .filter(|r| keep(me, r))
            .cloned()
            .collect();
        newest_first(&mut out);
        Ok(out)
    }

    /// A single request, from cache or fetched.
    pub async fn request(&mut self, id: RequestId) -> Result<SwapRequest> {
        if let Some(cached) = self.requests.get(&id) {
            return Ok(cached.clone());
        }
        let result = self.remote.get_request(id).await;
        self.settle_request(Some(id), result)
    }

    /// Run `check` against a copy of the request. A state conflict found on
    /// a cached copy is re-checked against a fresh read.
    async fn checked_request<T>(
        &mut self,
        id: RequestId,
        check: impl Fn(&mut SwapRequest) -> Result<T>,
    ) -> Result<T> {
        let cached = self.requests.contains_key(&id);
        let mut local = self.request(id).await?;
        match check(&mut local) {
            Err(e) if cached && e.kind() == ErrorKind::InvalidTransition => {
                debug!(request_id = %id, error = %e, "re-reading cached swap request");
                let result = self.remote.get_request(id).await;
                let mut fresh = self.settle_request(Some(id), result)?;
                check(&mut fresh)
            }
            other => other,
        }
    }

    fn settle_request(
        &mut self,
        id: Option<RequestId>,
        result: Result<SwapRequest>,
    ) -> Result<SwapRequest> {
        match result {
            Ok(request) => {
                self.requests.insert(request.id, request.clone());
                Ok(request)
            }
            Err(e) => {
                if should_evict(&e) {
                    warn!(request_id = ?id, error = %e, "evicting cached swap request");
                    if let Some(id) = id {
                        self.requests.remove(&id);
                    }
                    self.requests_loaded = false;
                }
                Err(e)
            }
        }
    }

    pub async fn accept(&mut self, id: RequestId) -> Result<SwapRequest> {
        self.transition_request(id, RequestAction::Accept).await
    }

    pub async fn reject(&mut self, id: RequestId) -> Result<SwapRequest> {
        self.transition_request(id, RequestAction::Reject).await
    }

    pub async fn cancel_request(&mut self, id: RequestId) -> Result<SwapRequest> {
        self.transition_request(id, RequestAction::Cancel).await
    }

    async fn transition_request(
        &mut self,
        id: RequestId,
        action: RequestAction,
    ) -> Result<SwapRequest> {
        let me = self.me();
        self.checked_request(id, |r| match action {
            RequestAction::Accept => r.accept(me),
            RequestAction::Reject => r.reject(me),
            RequestAction::Cancel => r.cancel(me),
        })
        .await?;

        let result = self.remote.transition_request(id, action).await;
        let updated = self.settle_request(Some(id), result)?;
        info!(request_id = %id, status = %updated.status, action = action.as_str(), "swap request updated");
        Ok(updated)
    }

    // --- Sessions ---

    /// Create the session backing an accepted request.
    pub async fn open_session(&mut self, request_id: RequestId) -> Result<Session> {
        let me = self.me();
        self.ensure_sessions_loaded().await?;
        let index = self.index.clone();
        self.checked_request(request_id, |r| {
            if r.role_of(me).is_none() {
                return Err(Error::UnauthorizedActor {
                    entity: "swap request",
                    action: "open a session for",
                    allowed: "sender or receiver",
                });
            }
            index.ensure_can_create(r)
        })
        .await?;

        let result = self.remote.create_session_from_request(request_id).await;
        let session = self.settle_session(None, result)?;
        info!(session_id = %session.id, %request_id, "session opened");
        Ok(session)
    }

    /// The session backing an accepted request, opened only if none exists.
    pub async fn ensure_session(&mut self, request_id: RequestId) -> Result<Session> {
        self.ensure_sessions_loaded().await?;
        match self.index.session_for(request_id) {
            Some(id) => self.session(id).await,
            None => self.open_session(request_id).await,
        }
    }

    pub async fn refresh_sessions(&mut self) -> Result<()> {
        self.sessions_loaded = false;
        let fetched = self.remote.list_sessions().await?;
        self.sessions.clear();
        self.index.clear();
        for session in fetched {
            self.cache_session(session);
        }
        self.sessions_loaded = true;
        debug!(count = self.sessions.len(), "sessions loaded");
        Ok(())
    }

    async fn ensure_sessions_loaded(&mut self) -> Result<()> {
        if !self.sessions_loaded {
            self.refresh_sessions().await?;
        }
        Ok(())
    }

    /// All of the user's sessions, most recent first.
    pub async fn sessions(&mut self) -> Result<Vec<Session>> {
        self.ensure_sessions_loaded().await?;
        let mut out: Vec<Session> = self.sessions.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    /// A single session, from cache or fetched.
    pub async fn session(&mut self, id: SessionId) -> Result<Session> {
        if let Some(cached) = self.sessions.get(&id) {
            return Ok(cached.clone());
        }
        let result = self.remote.get_session(id).await;
        self.settle_session(Some(id), result)
    }

    fn cache_session(&mut self, session: Session) {
        if let Err(e) = self.index.register(&session) {
            warn!(session_id = %session.id, error = %e, "conflicting session for request");
            self.sessions_loaded = false;
        }
        self.sessions.insert(session.id, session);
    }

    fn settle_session(&mut self, id: Option<SessionId>, result: Result<Session>) -> Result<Session> {
        match result {
            Ok(session) => {
                self.cache_session(session.clone());
                Ok(session)
            }
            Err(e) => {
                if should_evict(&e) {
                    warn!(session_id = ?id, error = %e, "evicting cached session");
                    if let Some(id) = id {
                        self.sessions.remove(&id);
                    }
                    self.sessions_loaded = false;
                }
                Err(e)
            }
        }
    }

    /// Run `apply` against a copy of the session. A state conflict found on
    /// a cached copy is re-checked against a fresh read.
    async fn check_session<T>(
        &mut self,
        id: SessionId,
        apply: impl Fn(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let cached = self.sessions.contains_key(&id);
        let mut local = self.session(id).await?;
        match apply(&mut local) {
            Err(e) if cached && e.kind() == ErrorKind::InvalidTransition => {
                debug!(session_id = %id, error = %e, "re-reading cached session");
                let result = self.remote.get_session(id).await;
                let mut fresh = self.settle_session(Some(id), result)?;
                apply(&mut fresh)
            }
            other => other,
        }
    }

    pub async fn schedule(
        &mut self,
        id: SessionId,
        when: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Session> {
        let me = self.me();
        let now = Utc::now();
        let duration = self
            .check_session(id, |s| {
                s.schedule(me, when, duration_minutes, now)?;
                s.duration
                    .ok_or_else(|| Error::Validation("duration not set".to_string()))
            })
            .await?;

        let result = self.remote.schedule_session(id, when, duration).await;
        let session = self.settle_session(Some(id), result)?;
        info!(session_id = %id, scheduled = %when, duration, "session scheduled");
        Ok(session)
    }

    pub async fn attach_meeting(
        &mut self,
        id: SessionId,
        meeting_url: &str,
        meeting_platform: Option<&str>,
    ) -> Result<Session> {
        let me = self.me();
        self.check_session(id, |s| s.attach_meeting(me, meeting_url, meeting_platform))
            .await?;

        let result = self
            .remote
            .set_meeting(id, meeting_url.trim(), meeting_platform)
            .await;
        let session = self.settle_session(Some(id), result)?;
        info!(session_id = %id, "meeting link updated");
        Ok(session)
    }

    pub async fn start(&mut self, id: SessionId) -> Result<Session> {
        let me = self.me();
        self.check_session(id, |s| s.start(me)).await?;
        let result = self.remote.transition_session(id, SessionAction::Start).await;
        let session = self.settle_session(Some(id), result)?;
        info!(session_id = %id, "session started");
        Ok(session)
    }

    /// The meeting link to open. No state change.
    pub async fn join(&mut self, id: SessionId) -> Result<String> {
        let me = self.me();
        let session = self.session(id).await?;
        session.join(me).map(String::from)
    }

    pub async fn annotate(&mut self, id: SessionId, notes: &str) -> Result<Session> {
        validate::session_notes(notes, self.notes_max_chars)?;
        let me = self.me();
        self.check_session(id, |s| s.annotate(me, notes)).await?;
        let result = self.remote.update_notes(id, notes).await;
        self.settle_session(Some(id), result)
    }

    pub async fn share_resources(&mut self, id: SessionId, resources: &str) -> Result<Session> {
        let me = self.me();
        self.check_session(id, |s| s.share_resources(me, resources))
            .await?;
        let result = self.remote.share_resources(id, resources).await;
        self.settle_session(Some(id), result)
    }

    /// Confirm completion. The session completes once both participants confirmed.
    pub async fn complete(&mut self, id: SessionId) -> Result<Completion> {
        let me = self.me();
        let now = Utc::now();
        self.check_session(id, |s| s.complete(me, now)).await?;

        let result = self
            .remote
            .transition_session(id, SessionAction::Complete)
            .await;
        let session = self.settle_session(Some(id), result)?;
        let outcome = if session.status == SessionStatus::Completed {
            Completion::Completed
        } else {
            Completion::AwaitingPartner
        };
        info!(session_id = %id, ?outcome, "completion confirmed");
        Ok(outcome)
    }

    pub async fn cancel_session(&mut self, id: SessionId) -> Result<Session> {
        let me = self.me();
        self.check_session(id, |s| s.cancel(me)).await?;
        let result = self.remote.transition_session(id, SessionAction::Cancel).await;
        let session = self.settle_session(Some(id), result)?;
        info!(session_id = %id, "session cancelled");
        Ok(session)
    }

    pub async fn rate(
        &mut self,
        id: SessionId,
        rating: u8,
        feedback: Option<&str>,
    ) -> Result<Session> {
        let me = self.me();
        self.check_session(id, |s| s.rate(me, rating, feedback))
            .await?;

        let payload = RatingPayload {
            rating,
            feedback: feedback
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from),
        };
        let result = self.remote.rate_session(id, &payload).await;
        let session = self.settle_session(Some(id), result)?;
        info!(session_id = %id, rating, "session rated");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;
    use swap_core::{EntryId, MatchSkill};

    const ME: UserId = UserId(1);
    const ANA: UserId = UserId(9);

    fn skill(id: i64, name: &str) -> Skill {
        Skill {
            id: SkillId(id),
            name: name.to_string(),
            category: "General".to_string(),
            description: None,
        }
    }

    fn entry(id: i64, skill_id: i64, name: &str) -> SkillProfileEntry {
        SkillProfileEntry {
            id: EntryId(id),
            skill: skill(skill_id, name),
            level: 3,
            goal: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn named(name: &str) -> MatchSkill {
        MatchSkill {
            id: None,
            name: name.to_string(),
            category: None,
            description: None,
        }
    }

    fn ana_match() -> MatchProposal {
        MatchProposal {
            user: UserRef::new(ANA, "Ana"),
            match_score: 8.0,
            match_description: "Perfect skill swap match!".to_string(),
            skill_they_can_teach_you: Some(named("Guitar")),
            skill_you_can_teach_them: Some(named("React")),
        }
    }

    #[derive(Default)]
    struct FakeState {
        teach: Vec<SkillProfileEntry>,
        learn: Vec<SkillProfileEntry>,
        catalog: Vec<Skill>,
        matches: Vec<MatchProposal>,
        skill_users: HashMap<SkillId, SkillUsers>,
        requests: HashMap<RequestId, SwapRequest>,
        sessions: HashMap<SessionId, Session>,
        index: SessionIndex,
        next_id: i64,
        calls: usize,
        fail_next: Option<Error>,
    }

    impl FakeState {
        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            1000 + self.next_id
        }

        fn request_mut(&mut self, id: RequestId) -> Result<&mut SwapRequest> {
            self.requests
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("swap request {id}")))
        }

        fn session_mut(&mut self, id: SessionId) -> Result<&mut Session> {
            self.sessions
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("session {id}")))
        }
    }

    /// In-memory collaborator applying the same transitions as a real server.
    struct FakeRemote {
        actor: UserRef,
        state: Mutex<FakeState>,
    }

    impl FakeRemote {
        fn new(actor: UserRef) -> Self {
            Self {
                actor,
                state: Mutex::new(FakeState::default()),
            }
        }

        fn call<T>(&self, f: impl FnOnce(&mut FakeState, &UserRef) -> Result<T>) -> Result<T> {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            if let Some(e) = state.fail_next.take() {
                return Err(e);
            }
            f(&mut state, &self.actor)
        }

        fn calls(&self) -> usize {
            self.state.lock().unwrap().calls
        }

        fn fail_next(&self, e: Error) {
            self.state.lock().unwrap().fail_next = Some(e);
        }

        fn seed(&self, f: impl FnOnce(&mut FakeState)) {
            f(&mut self.state.lock().unwrap());
        }
    }

    #[async_trait]
    impl Remote for FakeRemote {
        async fn list_skills(&self, direction: SkillDirection) -> Result<Vec<SkillProfileEntry>> {
            self.call(|s, _| {
                Ok(match direction {
                    SkillDirection::Teach => s.teach.clone(),
                    SkillDirection::Learn => s.learn.clone(),
                })
            })
        }

        async fn add_skill(
            &self,
            direction: SkillDirection,
            new: &NewSkillEntry,
        ) -> Result<SkillProfileEntry> {
            self.call(|s, _| {
                let skill = match s.catalog.iter().find(|k| k.name == new.skill_name) {
                    Some(k) => k.clone(),
                    None => {
                        let id = s.next_id();
                        let k = skill(id, &new.skill_name);
                        s.catalog.push(k.clone());
                        k
                    }
                };
                let created = SkillProfileEntry {
                    id: EntryId(s.next_id()),
                    skill,
                    level: new.level,
                    goal: new.goal.clone(),
                    created_at: Utc::now(),
                };
                match direction {
                    SkillDirection::Teach => s.teach.push(created.clone()),
                    SkillDirection::Learn => s.learn.push(created.clone()),
                }
                Ok(created)
            })
        }

        async fn remove_skill(&self, direction: SkillDirection, skill_id: SkillId) -> Result<()> {
            self.call(|s, _| {
                let list = match direction {
                    SkillDirection::Teach => &mut s.teach,
                    SkillDirection::Learn => &mut s.learn,
                };
                let before = list.len();
                list.retain(|e| e.skill.id != skill_id);
                if list.len() == before {
                    return Err(Error::NotFound(format!("skill {skill_id}")));
                }
                Ok(())
            })
        }

        async fn all_skills(&self) -> Result<Vec<Skill>> {
            self.call(|s, _| Ok(s.catalog.clone()))
        }

        async fn search_skills(&self, query: &str) -> Result<Vec<Skill>> {
            let query = query.to_lowercase();
            self.call(|s, _| {
                Ok(s.catalog
                    .iter()
                    .filter(|k| k.name.to_lowercase().contains(&query))
                    .cloned()
                    .collect())
            })
        }

        async fn skills_by_category(&self, category: &str) -> Result<Vec<Skill>> {
            self.call(|s, _| {
                Ok(s.catalog
                    .iter()
                    .filter(|k| k.category == category)
                    .cloned()
                    .collect())
            })
        }

        async fn matches(&self) -> Result<Vec<MatchProposal>> {
            self.call(|s, _| Ok(s.matches.clone()))
        }

        async fn users_by_skill(&self, skill_id: SkillId) -> Result<SkillUsers> {
            self.call(|s, _| {
                s.skill_users
                    .get(&skill_id)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("skill {skill_id}")))
            })
        }

        async fn create_request(&self, draft: &swap_core::SwapRequestDraft) -> Result<SwapRequest> {
            self.call(|s, actor| {
                let id = RequestId(s.next_id());
                let receiver = UserRef::new(draft.receiver_id, "Ana");
                let created =
                    SwapRequest::create(id, actor.clone(), receiver, draft.clone(), Utc::now())?;
                s.requests.insert(id, created.clone());
                Ok(created)
            })
        }

        async fn sent_requests(&self) -> Result<Vec<SwapRequest>> {
            self.call(|s, actor| {
                Ok(s.requests
                    .values()
                    .filter(|r| r.sender.id == actor.id)
                    .cloned()
                    .collect())
            })
        }

        async fn received_requests(&self) -> Result<Vec<SwapRequest>> {
            self.call(|s, actor| {
                Ok(s.requests
                    .values()
                    .filter(|r| r.receiver.id == actor.id)
                    .cloned()
                    .collect())
            })
        }

        async fn get_request(&self, id: RequestId) -> Result<SwapRequest> {
            self.call(|s, _| s.request_mut(id).map(|r| r.clone()))
        }

        async fn transition_request(
            &self,
            id: RequestId,
            action: RequestAction,
        ) -> Result<SwapRequest> {
            self.call(|s, actor| {
                let request = s.request_mut(id)?;
                match action {
                    RequestAction::Accept => request.accept(actor.id)?,
                    RequestAction::Reject => request.reject(actor.id)?,
                    RequestAction::Cancel => request.cancel(actor.id)?,
                }
                Ok(request.clone())
            })
        }

        async fn list_sessions(&self) -> Result<Vec<Session>> {
            self.call(|s, _| Ok(s.sessions.values().cloned().collect()))
        }

        async fn get_session(&self, id: SessionId) -> Result<Session> {
            self.call(|s, _| s.session_mut(id).map(|x| x.clone()))
        }

        async fn create_session_from_request(&self, request_id: RequestId) -> Result<Session> {
            self.call(|s, _| {
                let request = s.request_mut(request_id)?.clone();
                let id = SessionId(s.next_id());
                let session = s.index.create_from_request(id, &request, Utc::now())?;
                s.sessions.insert(id, session.clone());
                Ok(session)
            })
        }

        async fn schedule_session(
            &self,
            id: SessionId,
            when: DateTime<Utc>,
            duration_minutes: u32,
        ) -> Result<Session> {
            self.call(|s, actor| {
                let session = s.session_mut(id)?;
                session.schedule(actor.id, when, i64::from(duration_minutes), Utc::now())?;
                Ok(session.clone())
            })
        }

        async fn set_meeting(
            &self,
            id: SessionId,
            meeting_url: &str,
            meeting_platform: Option<&str>,
        ) -> Result<Session> {
            self.call(|s, actor| {
                let session = s.session_mut(id)?;
                session.attach_meeting(actor.id, meeting_url, meeting_platform)?;
                Ok(session.clone())
            })
        }

        async fn transition_session(&self, id: SessionId, action: SessionAction) -> Result<Session> {
            self.call(|s, actor| {
                let session = s.session_mut(id)?;
                match action {
                    SessionAction::Start => session.start(actor.id)?,
                    SessionAction::Complete => {
                        session.complete(actor.id, Utc::now())?;
                    }
                    SessionAction::Cancel => session.cancel(actor.id)?,
                }
                Ok(session.clone())
            })
        }

        async fn update_notes(&self, id: SessionId, notes: &str) -> Result<Session> {
            self.call(|s, actor| {
                let session = s.session_mut(id)?;
                session.annotate(actor.id, notes)?;
                Ok(session.clone())
            })
        }

        async fn share_resources(&self, id: SessionId, resources: &str) -> Result<Session> {
            self.call(|s, actor| {
                let session = s.session_mut(id)?;
                session.share_resources(actor.id, resources)?;
                Ok(session.clone())
            })
        }

        async fn rate_session(&self, id: SessionId, rating: &RatingPayload) -> Result<Session> {
            self.call(|s, actor| {
                let session = s.session_mut(id)?;
                session.rate(actor.id, rating.rating, rating.feedback.as_deref())?;
                Ok(session.clone())
            })
        }
    }

    fn workflow_as(user: UserRef) -> Workflow<FakeRemote> {
        let remote = FakeRemote::new(user.clone());
        remote.seed(|s| {
            s.teach.push(entry(11, 1, "React"));
            s.learn.push(entry(12, 2, "Guitar"));
            s.catalog = vec![skill(1, "React"), skill(2, "Guitar")];
            s.matches.push(ana_match());
        });
        Workflow::new(remote, UserContext::new(user))
    }

    fn me() -> Workflow<FakeRemote> {
        workflow_as(UserRef::new(ME, "Sam"))
    }

    /// A request from ANA to ME, already stored remotely.
    fn seed_incoming(workflow: &Workflow<FakeRemote>) -> RequestId {
        let id = RequestId(500);
        let draft = swap_core::SwapRequestDraft {
            receiver_id: ME,
            teach_skill_id: SkillId(2),
            learn_skill_id: SkillId(1),
            message: "Hi Sam".to_string(),
        };
        let request = SwapRequest::create(
            id,
            UserRef::new(ANA, "Ana"),
            UserRef::new(ME, "Sam"),
            draft,
            Utc::now(),
        )
        .unwrap();
        workflow.remote().seed(|s| {
            s.requests.insert(id, request);
        });
        id
    }

    async fn open_accepted(workflow: &mut Workflow<FakeRemote>) -> SessionId {
        let request_id = seed_incoming(workflow);
        workflow.accept(request_id).await.unwrap();
        workflow.open_session(request_id).await.unwrap().id
    }

    // --- Profile ---

    #[tokio::test]
    async fn add_skill_caches_remote_entry() {
        let mut wf = me();
        let added = wf
            .add_skill(
                SkillDirection::Learn,
                NewSkillEntry {
                    skill_name: "Spanish".to_string(),
                    category: "Languages".to_string(),
                    description: None,
                    level: 1,
                    goal: Some("Travel".to_string()),
                },
            )
            .await
            .unwrap();
        let profile = wf.profile().await.unwrap();
        assert!(profile.contains(SkillDirection::Learn, added.skill.id));
        assert_eq!(profile.learn_skills().len(), 2);
    }

    #[tokio::test]
    async fn add_skill_duplicate_name_never_reaches_remote() {
        let mut wf = me();
        wf.refresh_profile().await.unwrap();
        let calls = wf.remote().calls();
        let err = wf
            .add_skill(
                SkillDirection::Teach,
                NewSkillEntry {
                    skill_name: "React".to_string(),
                    category: String::new(),
                    description: None,
                    level: 4,
                    goal: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSkill { skill_id: SkillId(1), .. }));
        assert_eq!(wf.remote().calls(), calls);
    }

    #[tokio::test]
    async fn remove_unknown_skill_is_not_found() {
        let mut wf = me();
        let err = wf
            .remove_skill(SkillDirection::Teach, SkillId(99))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn remove_skill_updates_cache() {
        let mut wf = me();
        wf.remove_skill(SkillDirection::Learn, SkillId(2)).await.unwrap();
        assert!(wf.profile().await.unwrap().learn_skills().is_empty());
    }

    #[tokio::test]
    async fn blank_search_lists_catalog() {
        let wf = me();
        assert_eq!(wf.search_skills("  ").await.unwrap().len(), 2);
        assert_eq!(wf.search_skills("gui").await.unwrap()[0].name, "Guitar");
    }

    #[tokio::test]
    async fn users_by_skill_lists_teachers_and_learners() {
        let wf = me();
        wf.remote().seed(|s| {
            s.skill_users.insert(
                SkillId(2),
                SkillUsers {
                    teachers: vec![UserRef::new(ANA, "Ana")],
                    learners: vec![UserRef::new(ME, "Sam")],
                },
            );
        });
        let users = wf.users_by_skill(SkillId(2)).await.unwrap();
        assert_eq!(users.teachers[0].id, ANA);
        assert_eq!(users.learners[0].id, ME);

        let err = wf.users_by_skill(SkillId(99)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // --- Requests ---

    #[tokio::test]
    async fn request_swap_resolves_match_direction() {
        let mut wf = me();
        let proposal = wf.matches().await.unwrap().remove(0);
        let created = wf.request_swap(&proposal, None).await.unwrap();

        assert_eq!(created.status, RequestStatus::Pending);
        assert_eq!(created.receiver.id, ANA);
        assert_eq!(created.teach_skill_id, SkillId(1));
        assert_eq!(created.learn_skill_id, SkillId(2));
        assert_eq!(
            created.message.as_deref(),
            Some("Hi Ana! I can teach you React and would love to learn Guitar from you. Let's swap skills!")
        );
        assert_eq!(wf.sent_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn request_swap_unregistered_skill_makes_no_request() {
        let mut wf = me();
        wf.remote().seed(|s| s.learn.clear());
        let err = wf.request_swap(&ana_match(), None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnregisteredSkill {
                direction: SkillDirection::Learn,
                ..
            }
        ));
        assert!(wf.remote().state.lock().unwrap().requests.is_empty());
    }

    #[tokio::test]
    async fn second_pending_request_to_same_user_is_rejected() {
        let mut wf = me();
        wf.request_swap(&ana_match(), Some("hello")).await.unwrap();
        let err = wf.request_swap(&ana_match(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn receiver_accepts_request() {
        let mut wf = me();
        let id = seed_incoming(&wf);
        let accepted = wf.accept(id).await.unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(wf.received_requests().await.unwrap()[0].status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn receiver_cannot_cancel_and_remote_is_not_called() {
        let mut wf = me();
        let id = seed_incoming(&wf);
        wf.request(id).await.unwrap();
        let calls = wf.remote().calls();

        let err = wf.cancel_request(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnauthorizedActor);
        assert_eq!(wf.remote().calls(), calls);
    }

    #[tokio::test]
    async fn unavailable_remote_evicts_instead_of_fabricating() {
        let mut wf = me();
        let id = seed_incoming(&wf);
        wf.request(id).await.unwrap();

        wf.remote()
            .fail_next(Error::RemoteUnavailable("connection reset".to_string()));
        let err = wf.accept(id).await.unwrap_err();
        assert!(err.is_retryable());

        // Next read goes back to the remote, which never applied the change.
        let calls = wf.remote().calls();
        let fetched = wf.request(id).await.unwrap();
        assert_eq!(fetched.status, RequestStatus::Pending);
        assert_eq!(wf.remote().calls(), calls + 1);
    }

    #[tokio::test]
    async fn definite_remote_error_is_surfaced_as_is() {
        let mut wf = me();
        let id = seed_incoming(&wf);
        wf.request(id).await.unwrap();
        wf.remote().fail_next(Error::InvalidTransition {
            entity: "resource",
            action: "change",
            state: "already accepted".to_string(),
        });
        let err = wf.accept(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn remote_conflict_evicts_stale_request() {
        let mut wf = me();
        let id = wf.request_swap(&ana_match(), None).await.unwrap().id;
        // Ana accepts from another device while the cache still says PENDING.
        wf.remote()
            .seed(|s| s.requests.get_mut(&id).unwrap().accept(ANA).unwrap());

        let err = wf.cancel_request(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            wf.sent_requests().await.unwrap()[0].status,
            RequestStatus::Accepted
        );

        let session = wf.open_session(id).await.unwrap();
        assert_eq!(session.source_request_id, id);
        assert_eq!(session.participants, [ME, ANA]);
    }

    #[tokio::test]
    async fn stale_cached_request_is_reread_before_rejecting() {
        let mut wf = me();
        let id = wf.request_swap(&ana_match(), None).await.unwrap().id;
        wf.remote()
            .seed(|s| s.requests.get_mut(&id).unwrap().accept(ANA).unwrap());

        let session = wf.open_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(wf.request(id).await.unwrap().status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn remote_denial_evicts_cached_request() {
        let mut wf = me();
        let id = seed_incoming(&wf);
        wf.request(id).await.unwrap();
        wf.remote().fail_next(Error::UnauthorizedActor {
            entity: "swap request",
            action: "accept",
            allowed: "receiver",
        });
        wf.accept(id).await.unwrap_err();

        let calls = wf.remote().calls();
        wf.request(id).await.unwrap();
        assert_eq!(wf.remote().calls(), calls + 1);
    }

    // --- Sessions ---

    #[tokio::test]
    async fn open_session_once_per_request() {
        let mut wf = me();
        let request_id = seed_incoming(&wf);
        wf.accept(request_id).await.unwrap();

        let session = wf.open_session(request_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Created);
        assert_eq!(session.participants, [ANA, ME]);

        let calls = wf.remote().calls();
        let err = wf.open_session(request_id).await.unwrap_err();
        assert_eq!(err, Error::DuplicateSession(request_id));
        assert_eq!(wf.remote().calls(), calls);
    }

    #[tokio::test]
    async fn ensure_session_reuses_session_created_on_accept() {
        let mut wf = me();
        let request_id = seed_incoming(&wf);
        wf.accept(request_id).await.unwrap();
        // Some servers create the session as part of accepting.
        wf.remote().seed(|s| {
            let request = s.requests[&request_id].clone();
            let session = s
                .index
                .create_from_request(SessionId(700), &request, Utc::now())
                .unwrap();
            s.sessions.insert(session.id, session);
        });

        let session = wf.ensure_session(request_id).await.unwrap();
        assert_eq!(session.id, SessionId(700));
        assert_eq!(wf.remote().state.lock().unwrap().sessions.len(), 1);
    }

    #[tokio::test]
    async fn ensure_session_opens_when_missing() {
        let mut wf = me();
        let request_id = seed_incoming(&wf);
        wf.accept(request_id).await.unwrap();

        let opened = wf.ensure_session(request_id).await.unwrap();
        let again = wf.ensure_session(request_id).await.unwrap();
        assert_eq!(opened.id, again.id);
        assert_eq!(wf.remote().state.lock().unwrap().sessions.len(), 1);
    }

    #[tokio::test]
    async fn open_session_on_pending_request_fails() {
        let mut wf = me();
        let request_id = seed_incoming(&wf);
        let err = wf.open_session(request_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn complete_on_created_session_is_invalid() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        let calls = wf.remote().calls();
        let err = wf.complete(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        // One re-read of the session, no transition call.
        assert_eq!(wf.remote().calls(), calls + 1);
        assert!(!wf.remote().state.lock().unwrap().sessions[&id].has_confirmed(ME));
    }

    #[tokio::test]
    async fn stale_cached_session_is_reread_before_rejecting() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        // Ana starts the session from another device.
        wf.remote()
            .seed(|s| s.sessions.get_mut(&id).unwrap().start(ANA).unwrap());

        assert_eq!(wf.complete(id).await.unwrap(), Completion::AwaitingPartner);
        assert_eq!(wf.session(id).await.unwrap().status, SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn completion_needs_both_participants() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        wf.schedule(id, Utc::now() + Duration::days(1), 60)
            .await
            .unwrap();
        wf.start(id).await.unwrap();

        assert_eq!(wf.complete(id).await.unwrap(), Completion::AwaitingPartner);
        assert_eq!(wf.session(id).await.unwrap().status, SessionStatus::InProgress);

        // Ana confirms on her side.
        wf.remote().seed(|s| {
            s.sessions
                .get_mut(&id)
                .unwrap()
                .complete(ANA, Utc::now())
                .unwrap();
        });
        wf.refresh_sessions().await.unwrap();
        let session = wf.session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn rate_after_completion() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        wf.start(id).await.unwrap();
        wf.remote().seed(|s| {
            s.sessions
                .get_mut(&id)
                .unwrap()
                .complete(ANA, Utc::now())
                .unwrap();
        });
        wf.refresh_sessions().await.unwrap();
        assert_eq!(wf.complete(id).await.unwrap(), Completion::Completed);

        let err = wf.rate(id, 6, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let rated = wf.rate(id, 5, Some("Great teacher")).await.unwrap();
        let rating = rated.rating_by(ME).unwrap();
        assert_eq!(rating.rating, 5);
        assert_eq!(rating.feedback.as_deref(), Some("Great teacher"));
    }

    #[tokio::test]
    async fn schedule_in_the_past_is_rejected_locally() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        let calls = wf.remote().calls();
        let err = wf
            .schedule(id, Utc::now() - Duration::hours(1), 30)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(wf.remote().calls(), calls);
    }

    #[tokio::test]
    async fn join_needs_meeting_link() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        assert_eq!(wf.join(id).await.unwrap_err().kind(), ErrorKind::NotFound);

        wf.attach_meeting(id, "https://meet.jit.si/skillswap-1", Some("Jitsi"))
            .await
            .unwrap();
        assert_eq!(wf.join(id).await.unwrap(), "https://meet.jit.si/skillswap-1");
    }

    #[tokio::test]
    async fn notes_over_limit_are_rejected() {
        let mut wf = me().with_notes_limit(10);
        let id = open_accepted(&mut wf).await;
        let err = wf.annotate(id, "far too many characters").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let session = wf.annotate(id, "chords").await.unwrap();
        assert_eq!(session.session_notes.as_deref(), Some("chords"));
    }

    #[tokio::test]
    async fn cancelled_session_rejects_further_changes() {
        let mut wf = me();
        let id = open_accepted(&mut wf).await;
        wf.cancel_session(id).await.unwrap();
        assert_eq!(
            wf.share_resources(id, "https://example.com")
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidTransition
        );
    }

    #[tokio::test]
    async fn outsider_cannot_touch_session() {
        let mut wf = workflow_as(UserRef::new(UserId(77), "Eve"));
        let request_id = seed_incoming(&wf);
        let session_id = SessionId(900);
        wf.remote().seed(|s| {
            let request = s.requests.get_mut(&request_id).unwrap();
            request.accept(ME).unwrap();
            let request = request.clone();
            let session = s
                .index
                .create_from_request(session_id, &request, Utc::now())
                .unwrap();
            s.sessions.insert(session_id, session);
        });
        let err = wf.start(session_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnauthorizedActor);
    }
}
