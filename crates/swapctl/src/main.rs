//! swapctl - CLI client for the SkillSwap API
//!
//! Manage your skills, browse matches, send and answer swap requests and
//! run learning sessions from the terminal.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use swap_core::{
    validate, Config, ConfigError, RequestId, SessionId, SkillDirection, SkillId, UserId, UserRef,
};
use swapctl::render;
use swapctl::{ApiClient, NewSkillEntry, UserContext, Workflow};
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// CLI client for the SkillSwap skill bartering service.
#[derive(Parser)]
#[command(name = "swapctl")]
#[command(about = "Trade skills with other learners: manage skills, matches, requests and sessions")]
#[command(version)]
struct Cli {
    /// API base URL including the /api prefix (default: http://localhost:8080/api)
    #[arg(long, global = true, env = "SKILLSWAP_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the API
    #[arg(long, global = true, env = "SKILLSWAP_TOKEN")]
    token: Option<String>,

    /// Your user id
    #[arg(long, global = true, env = "SKILLSWAP_USER_ID")]
    user_id: Option<i64>,

    /// Config file path (default: ~/.config/skillswap/config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the skills you teach and want to learn
    Skills {
        /// Only show one list: teach or learn
        #[arg(long, value_parser = parse_direction)]
        direction: Option<SkillDirection>,
    },

    /// Add a skill to your teach or learn list
    #[command(name = "skill-add")]
    SkillAdd {
        /// teach or learn
        #[arg(value_parser = parse_direction)]
        direction: SkillDirection,

        /// Skill name
        name: String,

        /// Skill category
        #[arg(long, default_value = "General")]
        category: String,

        /// Self-assessed level, 1 (beginner) to 5 (master)
        #[arg(long, default_value_t = 3)]
        level: u8,

        /// Learning goal or teaching experience
        #[arg(long)]
        goal: Option<String>,

        /// Skill description
        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a skill from your teach or learn list
    #[command(name = "skill-rm")]
    SkillRm {
        /// teach or learn
        #[arg(value_parser = parse_direction)]
        direction: SkillDirection,

        /// Skill ID
        skill_id: i64,
    },

    /// Search the skill catalog by name
    Search {
        /// Search text (omit to list everything)
        query: Option<String>,
    },

    /// List the skill catalog, optionally for one category
    Catalog {
        /// Category name
        category: Option<String>,
    },

    /// Show users whose skills complement yours
    Matches,

    /// Show who teaches and who wants to learn a skill
    #[command(name = "skill-users")]
    SkillUsers {
        /// Skill ID
        skill_id: i64,
    },

    /// Send a swap request to a matched user
    Request {
        /// User ID of the match
        user_id: i64,

        /// Personal message (default: a generated greeting)
        #[arg(long)]
        message: Option<String>,
    },

    /// List swap requests
    Requests {
        /// Only requests you sent
        #[arg(long, conflicts_with = "received")]
        sent: bool,

        /// Only requests you received
        #[arg(long)]
        received: bool,
    },

    /// Accept a received swap request
    Accept {
        /// Swap request ID
        request_id: i64,
    },

    /// Reject a received swap request
    Reject {
        /// Swap request ID
        request_id: i64,
    },

    /// Cancel a swap request you sent
    Cancel {
        /// Swap request ID
        request_id: i64,
    },

    /// List your sessions
    Sessions,

    /// Show detailed information about a session
    Session {
        /// Session ID
        session_id: i64,
    },

    /// Open the session for an accepted swap request
    Open {
        /// Swap request ID
        request_id: i64,
    },

    /// Schedule or reschedule a session
    Schedule {
        /// Session ID
        session_id: i64,

        /// Start time, RFC 3339 or YYYY-MM-DDTHH:MM (UTC)
        when: String,

        /// Duration in minutes
        minutes: i64,
    },

    /// Set the meeting link for a session (empty URL clears it)
    Meeting {
        /// Session ID
        session_id: i64,

        /// Meeting URL
        url: String,

        /// Meeting platform (Zoom, Google Meet, Jitsi, ...)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Mark a session as in progress
    Start {
        /// Session ID
        session_id: i64,
    },

    /// Print the meeting link for a session
    Join {
        /// Session ID
        session_id: i64,
    },

    /// Replace the session notes
    Notes {
        /// Session ID
        session_id: i64,

        /// Notes text
        notes: String,
    },

    /// Replace the shared resources of a session
    Resources {
        /// Session ID
        session_id: i64,

        /// Links or free text
        resources: String,
    },

    /// Confirm that a session took place
    Complete {
        /// Session ID
        session_id: i64,
    },

    /// Cancel a session
    #[command(name = "cancel-session")]
    CancelSession {
        /// Session ID
        session_id: i64,
    },

    /// Rate a completed session
    Rate {
        /// Session ID
        session_id: i64,

        /// Rating from 1 to 5
        rating: u8,

        /// Written feedback
        #[arg(long)]
        feedback: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workflow(#[from] swap_core::Error),

    #[error("no user id configured\n  → set user_id in the config file\n  → or set SKILLSWAP_USER_ID / --user-id")]
    MissingUser,

    #[error("no current match with user {0}\n  → run: swapctl matches")]
    NoMatch(i64),
}

fn parse_direction(s: &str) -> Result<SkillDirection, String> {
    match s.to_lowercase().as_str() {
        "teach" => Ok(SkillDirection::Teach),
        "learn" => Ok(SkillDirection::Learn),
        _ => Err(format!("invalid direction '{}', expected: teach, learn", s)),
    }
}

/// Merge flags and environment over the config file.
fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(ref url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ref token) = cli.token {
        config.token = Some(token.clone());
    }
    if let Some(id) = cli.user_id {
        config.user_id = Some(UserId(id));
    }
    Ok(config)
}

fn build_workflow(config: &Config) -> Result<Workflow<ApiClient>, CliError> {
    let user_id = config.user_id.ok_or(CliError::MissingUser)?;
    let client = ApiClient::new(&config.api_url, config.token.as_deref())
        .with_timeout(Duration::from_secs(config.request_timeout_sec));
    let user = UserRef::new(user_id, String::new());
    Ok(Workflow::new(client, UserContext::new(user)).with_notes_limit(config.notes_max_chars))
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    let mut wf = build_workflow(&config)?;
    let me = wf.user().id;

    match cli.command {
        Command::Skills { direction } => {
            let profile = wf.profile().await?;
            let directions = match direction {
                Some(d) => vec![d],
                None => vec![SkillDirection::Teach, SkillDirection::Learn],
            };
            for (i, d) in directions.into_iter().enumerate() {
                if i > 0 {
                    println!();
                }
                render::print_skill_list(d, profile.entries(d));
            }
        }
        Command::SkillAdd {
            direction,
            name,
            category,
            level,
            goal,
            description,
        } => {
            let entry = NewSkillEntry {
                skill_name: name.trim().to_string(),
                category,
                description,
                level,
                goal,
            };
            let added = wf.add_skill(direction, entry).await?;
            println!(
                "Added {} (skill {}) to your {} list.",
                added.skill.name, added.skill.id, direction
            );
        }
        Command::SkillRm {
            direction,
            skill_id,
        } => {
            wf.remove_skill(direction, SkillId(skill_id)).await?;
            println!("Removed skill {} from your {} list.", skill_id, direction);
        }
        Command::Search { query } => {
            let skills = wf.search_skills(query.as_deref().unwrap_or("")).await?;
            render::print_catalog(&skills);
        }
        Command::Catalog { category } => {
            let skills = match category {
                Some(c) => wf.skills_by_category(&c).await?,
                None => wf.all_skills().await?,
            };
            render::print_catalog(&skills);
        }
        Command::Matches => {
            let matches = wf.matches().await?;
            render::print_matches(&matches);
        }
        Command::SkillUsers { skill_id } => {
            let id = SkillId(skill_id);
            let users = wf.users_by_skill(id).await?;
            render::print_skill_users(id, &users);
        }
        Command::Request { user_id, message } => {
            let matches = wf.matches().await?;
            let proposal = matches
                .iter()
                .find(|m| m.user.id == UserId(user_id))
                .ok_or(CliError::NoMatch(user_id))?;
            let request = wf.request_swap(proposal, message.as_deref()).await?;
            render::print_request_sent(&request);
        }
        Command::Requests { sent, received } => {
            let requests = if sent {
                wf.sent_requests().await?
            } else if received {
                wf.received_requests().await?
            } else {
                let mut all = wf.received_requests().await?;
                all.extend(wf.sent_requests().await?);
                all
            };
            render::print_requests(me, &requests);
        }
        Command::Accept { request_id } => {
            let id = RequestId(request_id);
            let request = wf.accept(id).await?;
            println!("Accepted swap request {} ({}).", request.id, request.status);
            if config.accept_opens_session {
                match wf.ensure_session(id).await {
                    Ok(session) => println!("Session {} is ready.", session.id),
                    Err(e) => eprintln!("warning: could not open session: {}", e),
                }
            }
        }
        Command::Reject { request_id } => {
            let request = wf.reject(RequestId(request_id)).await?;
            println!("Rejected swap request {} ({}).", request.id, request.status);
        }
        Command::Cancel { request_id } => {
            let request = wf.cancel_request(RequestId(request_id)).await?;
            println!("Cancelled swap request {} ({}).", request.id, request.status);
        }
        Command::Sessions => {
            let sessions = wf.sessions().await?;
            render::print_sessions(&sessions);
        }
        Command::Session { session_id } => {
            let session = wf.session(SessionId(session_id)).await?;
            render::print_session_details(me, &session);
        }
        Command::Open { request_id } => {
            let session = wf.open_session(RequestId(request_id)).await?;
            render::print_session_details(me, &session);
        }
        Command::Schedule {
            session_id,
            when,
            minutes,
        } => {
            let when = validate::parse_schedule_time(&when)?;
            let session = wf.schedule(SessionId(session_id), when, minutes).await?;
            render::print_session_details(me, &session);
        }
        Command::Meeting {
            session_id,
            url,
            platform,
        } => {
            let session = wf
                .attach_meeting(SessionId(session_id), &url, platform.as_deref())
                .await?;
            render::print_session_details(me, &session);
        }
        Command::Start { session_id } => {
            let session = wf.start(SessionId(session_id)).await?;
            println!("Session {} is {}.", session.id, session.status);
        }
        Command::Join { session_id } => {
            let url = wf.join(SessionId(session_id)).await?;
            println!("{}", url);
        }
        Command::Notes { session_id, notes } => {
            wf.annotate(SessionId(session_id), &notes).await?;
            println!("Notes saved for session {}.", session_id);
        }
        Command::Resources {
            session_id,
            resources,
        } => {
            wf.share_resources(SessionId(session_id), &resources)
                .await?;
            println!("Resources shared on session {}.", session_id);
        }
        Command::Complete { session_id } => {
            let id = SessionId(session_id);
            let outcome = wf.complete(id).await?;
            render::print_completion(id, outcome);
        }
        Command::CancelSession { session_id } => {
            let session = wf.cancel_session(SessionId(session_id)).await?;
            println!("Session {} is {}.", session.id, session.status);
        }
        Command::Rate {
            session_id,
            rating,
            feedback,
        } => {
            wf.rate(SessionId(session_id), rating, feedback.as_deref())
                .await?;
            println!("Rated session {} {}/5.", session_id, rating);
        }
    }

    Ok(())
}
