//! Output rendering for the swapctl CLI.
//!
//! Formats skills, matches, swap requests and sessions for terminal display.

use swap_core::{
    Completion, MatchProposal, Session, Skill, SkillDirection, SkillId, SkillProfileEntry,
    SkillUsers, SwapRequest, UserId, UserRef,
};

/// Print one of the user's skill lists.
pub fn print_skill_list(direction: SkillDirection, entries: &[SkillProfileEntry]) {
    let title = match direction {
        SkillDirection::Teach => "Skills you teach",
        SkillDirection::Learn => "Skills you want to learn",
    };
    println!("{title}:");
    if entries.is_empty() {
        println!("  (none)");
        return;
    }
    println!(
        "  {:<8}  {:<24}  {:<16}  {:<6}  {}",
        "SKILL", "NAME", "CATEGORY", "LEVEL", "GOAL"
    );
    for entry in entries {
        println!(
            "  {:<8}  {:<24}  {:<16}  {:<6}  {}",
            entry.skill.id.0,
            truncate(&entry.skill.name, 24),
            truncate(&entry.skill.category, 16),
            format_level(entry.level),
            entry.goal.as_deref().unwrap_or("-"),
        );
    }
}

/// Print catalog skills (search results, category listings).
pub fn print_catalog(skills: &[Skill]) {
    if skills.is_empty() {
        println!("No skills found.");
        return;
    }

    println!("{:<8}  {:<28}  {:<16}", "ID", "NAME", "CATEGORY");
    println!("{}", "-".repeat(56));
    for skill in skills {
        println!(
            "{:<8}  {:<28}  {:<16}",
            skill.id.0,
            truncate(&skill.name, 28),
            truncate(&skill.category, 16),
        );
    }
    println!();
    println!("{} skill(s)", skills.len());
}

/// Print match proposals in the order received. Score and description are shown verbatim.
pub fn print_matches(matches: &[MatchProposal]) {
    if matches.is_empty() {
        println!("No matches yet. Add skills you teach and want to learn.");
        return;
    }

    println!(
        "{:<8}  {:<20}  {:<6}  {:<20}  {:<20}",
        "USER", "NAME", "SCORE", "YOU TEACH", "YOU LEARN"
    );
    println!("{}", "-".repeat(82));
    for m in matches {
        println!(
            "{:<8}  {:<20}  {:<6}  {:<20}  {:<20}",
            m.user.id.0,
            truncate(&m.user.display_name(), 20),
            m.match_score,
            truncate(skill_name(m.skill_you_can_teach_them.as_ref()), 20),
            truncate(skill_name(m.skill_they_can_teach_you.as_ref()), 20),
        );
        if !m.match_description.is_empty() {
            println!("          {}", m.match_description);
        }
    }
}

/// Print who teaches and who wants to learn one skill.
pub fn print_skill_users(skill_id: SkillId, users: &SkillUsers) {
    println!("Skill {skill_id}");
    println!();
    print_user_group("Teachers", &users.teachers);
    println!();
    print_user_group("Learners", &users.learners);
}

fn print_user_group(title: &str, users: &[UserRef]) {
    println!("{title}:");
    if users.is_empty() {
        println!("  (none)");
        return;
    }
    println!("  {:<8}  {:<24}  {}", "USER", "NAME", "RATING");
    for user in users {
        println!(
            "  {:<8}  {:<24}  {}",
            user.id.0,
            truncate(&user.display_name(), 24),
            format_rating(user.rating),
        );
    }
}

fn format_rating(rating: Option<f64>) -> String {
    rating.map_or_else(|| "-".to_string(), |r| format!("{r:.1}"))
}

fn skill_name(skill: Option<&swap_core::MatchSkill>) -> &str {
    skill.map(|s| s.name.as_str()).unwrap_or("-")
}

/// Print confirmation after sending a request.
pub fn print_request_sent(request: &SwapRequest) {
    println!("Sent swap request: {}", request.id);
    println!("  To:      {}", request.receiver.display_name());
    println!("  Teach:   {}", skill_label(request.teach_skill_name.as_deref(), request.teach_skill_id.0));
    println!("  Learn:   {}", skill_label(request.learn_skill_name.as_deref(), request.learn_skill_id.0));
    println!("  Status:  {}", request.status);
}

/// Print swap requests from `me`'s point of view.
pub fn print_requests(me: UserId, requests: &[SwapRequest]) {
    if requests.is_empty() {
        println!("No swap requests found.");
        return;
    }

    println!(
        "{:<8}  {:<4}  {:<20}  {:<18}  {:<18}  {:<10}  {:<19}",
        "ID", "DIR", "WITH", "SENDER TEACHES", "SENDER LEARNS", "STATUS", "CREATED"
    );
    println!("{}", "-".repeat(110));
    for request in requests {
        let dir = if request.sender.id == me { "out" } else { "in" };
        let with = request
            .counterpart(me)
            .map(|u| u.display_name())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<4}  {:<20}  {:<18}  {:<18}  {:<10}  {:<19}",
            request.id.0,
            dir,
            truncate(&with, 20),
            truncate(&skill_label(request.teach_skill_name.as_deref(), request.teach_skill_id.0), 18),
            truncate(&skill_label(request.learn_skill_name.as_deref(), request.learn_skill_id.0), 18),
            request.status,
            format_time(&request.created_at),
        );
    }
    println!();
    println!("{} request(s)", requests.len());
}

fn skill_label(name: Option<&str>, id: i64) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("#{id}"),
    }
}

/// Print a list of sessions in tabular format.
pub fn print_sessions(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }

    println!(
        "{:<8}  {:<32}  {:<12}  {:<19}  {:<8}",
        "ID", "TITLE", "STATUS", "SCHEDULED", "MINUTES"
    );
    println!("{}", "-".repeat(86));
    for session in sessions {
        println!(
            "{:<8}  {:<32}  {:<12}  {:<19}  {:<8}",
            session.id.0,
            truncate(session.title.as_deref().unwrap_or("-"), 32),
            session.status,
            session
                .scheduled_date
                .as_ref()
                .map(format_time)
                .unwrap_or_else(|| "-".to_string()),
            session
                .duration
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    println!();
    println!("{} session(s)", sessions.len());
}

/// Print detailed information about a session.
pub fn print_session_details(me: UserId, session: &Session) {
    println!("Session: {}", session.id);
    println!();
    if let Some(ref title) = session.title {
        println!("  Title:          {}", title);
    }
    println!("  Status:         {}", session.status);
    println!("  Swap Request:   {}", session.source_request_id);
    if let Some(partner) = session.partner_of(me) {
        println!("  Partner:        {}", partner);
    }
    if let Some(ref when) = session.scheduled_date {
        println!("  Scheduled:      {}", format_time(when));
    }
    if let Some(duration) = session.duration {
        println!("  Duration:       {} min", duration);
    }
    if let Some(ref url) = session.meeting_url {
        match session.meeting_platform.as_deref() {
            Some(platform) => println!("  Meeting:        {} ({})", url, platform),
            None => println!("  Meeting:        {}", url),
        }
    }
    if let Some(ref notes) = session.session_notes {
        println!("  Notes:          {}", notes);
    }
    if let Some(ref resources) = session.shared_resources {
        println!("  Resources:      {}", resources);
    }
    if !session.confirmed_by.is_empty() && session.completed_at.is_none() {
        let who: Vec<String> = session.confirmed_by.iter().map(|u| u.to_string()).collect();
        println!("  Confirmed by:   {}", who.join(", "));
    }

    println!();
    println!("  Created:        {}", format_time(&session.created_at));
    if let Some(ref done) = session.completed_at {
        println!("  Completed:      {}", format_time(done));
    }

    if !session.ratings.is_empty() {
        println!();
        println!("  Ratings:");
        for rating in &session.ratings {
            println!(
                "    user {:<8}  {}  {}",
                rating.by,
                format_stars(rating.rating),
                rating.feedback.as_deref().unwrap_or("")
            );
        }
    }
}

pub fn print_completion(session_id: swap_core::SessionId, outcome: Completion) {
    match outcome {
        Completion::Completed => println!("Session {} completed.", session_id),
        Completion::AwaitingPartner => println!(
            "Completion confirmed for session {}; waiting for your partner to confirm.",
            session_id
        ),
    }
}

fn format_level(level: u8) -> &'static str {
    match level {
        1 => "1/5",
        2 => "2/5",
        3 => "3/5",
        4 => "4/5",
        5 => "5/5",
        _ => "?",
    }
}

fn format_stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "*".repeat(filled), ".".repeat(5 - filled))
}

fn format_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
