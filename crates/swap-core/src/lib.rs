pub mod config;
pub mod error;
pub mod profile;
pub mod request;
pub mod resolver;
pub mod session;
pub mod types;
pub mod validate;

pub use config::{Config, ConfigError};
pub use error::{Error, ErrorKind, Result};
pub use profile::SkillProfile;
pub use resolver::{resolve, resolve_pair, ResolvedSkillPair};
pub use session::{Completion, SessionIndex};
pub use types::*;
