//! SkillSwap client: remote contract, HTTP client and workflow orchestrator.

pub mod client;
pub mod remote;
pub mod render;
pub mod workflow;

pub use client::{ApiClient, ClientError};
pub use remote::{NewSkillEntry, RatingPayload, Remote, RequestAction, SessionAction};
pub use workflow::{UserContext, Workflow};
