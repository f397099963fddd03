//! Input validators shared by the lifecycles and by presentation code.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const SKILL_NAME_CHARS: std::ops::RangeInclusive<usize> = 2..=100;
pub const MAX_MESSAGE_CHARS: usize = 500;
/// Caller-side cap for session notes; the session lifecycle does not enforce it.
pub const MAX_NOTES_CHARS: usize = 1000;

pub fn level(level: u8) -> Result<()> {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "level must be between {MIN_LEVEL} and {MAX_LEVEL}, got {level}"
        )))
    }
}

pub fn rating(rating: u8) -> Result<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )))
    }
}

pub fn skill_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if SKILL_NAME_CHARS.contains(&len) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "skill name must be {}-{} characters",
            SKILL_NAME_CHARS.start(),
            SKILL_NAME_CHARS.end()
        )))
    }
}

pub fn message(message: &str) -> Result<()> {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )))
    }
}

pub fn session_notes(notes: &str, max_chars: usize) -> Result<()> {
    if notes.chars().count() <= max_chars {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "session notes must be at most {max_chars} characters"
        )))
    }
}

/// An empty URL means "no meeting set" and is accepted.
pub fn meeting_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Ok(());
    }
    url::Url::parse(url.trim())
        .map(|_| ())
        .map_err(|e| Error::validation(format!("invalid meeting URL '{url}': {e}")))
}

/// Parse a schedule timestamp.
///
/// Accepts RFC 3339 (`2026-01-05T14:00:00Z`) or a bare local form
/// (`2026-01-05T14:00`, `2026-01-05 14:00:00`) interpreted as UTC.
pub fn parse_schedule_time(raw: &str) -> Result<DateTime<Utc>> {
    crate::types::parse_timestamp(raw)
        .ok_or_else(|| Error::validation(format!("unparseable schedule time '{}'", raw.trim())))
}
