//! The current user's teach and learn skill collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{SkillDirection, SkillId, SkillProfileEntry};
use crate::validate;

/// Two disjoint collections; a skill id appears at most once in each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProfile {
    teach_skills: Vec<SkillProfileEntry>,
    learn_skills: Vec<SkillProfileEntry>,
}

impl SkillProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, direction: SkillDirection) -> &[SkillProfileEntry] {
        match direction {
            SkillDirection::Teach => &self.teach_skills,
            SkillDirection::Learn => &self.learn_skills,
        }
    }

    pub fn teach_skills(&self) -> &[SkillProfileEntry] {
        &self.teach_skills
    }

    pub fn learn_skills(&self) -> &[SkillProfileEntry] {
        &self.learn_skills
    }

    fn entries_mut(&mut self, direction: SkillDirection) -> &mut Vec<SkillProfileEntry> {
        match direction {
            SkillDirection::Teach => &mut self.teach_skills,
            SkillDirection::Learn => &mut self.learn_skills,
        }
    }

    /// Append an entry, stamping `created_at = now`.
    pub fn add_skill(
        &mut self,
        direction: SkillDirection,
        mut entry: SkillProfileEntry,
        now: DateTime<Utc>,
    ) -> Result<&SkillProfileEntry> {
        validate::level(entry.level)?;
        validate::skill_name(&entry.skill.name)?;
        if self.contains(direction, entry.skill.id) {
            return Err(Error::DuplicateSkill {
                skill_id: entry.skill.id,
                direction,
            });
        }
        entry.created_at = now;
        let list = self.entries_mut(direction);
        list.push(entry);
        Ok(&list[list.len() - 1])
    }

    pub fn remove_skill(
        &mut self,
        direction: SkillDirection,
        skill_id: SkillId,
    ) -> Result<SkillProfileEntry> {
        let list = self.entries_mut(direction);
        let Some(pos) = list.iter().position(|e| e.skill.id == skill_id) else {
            return Err(Error::NotFound(format!(
                "skill {skill_id} in {direction} list"
            )));
        };
        Ok(list.remove(pos))
    }

    /// Case-sensitive exact match on the skill name; first hit wins.
    pub fn find_by_skill_name(
        &self,
        direction: SkillDirection,
        name: &str,
    ) -> Option<&SkillProfileEntry> {
        find_by_skill_name(self.entries(direction), name)
    }

    pub fn find_by_skill_id(
        &self,
        direction: SkillDirection,
        skill_id: SkillId,
    ) -> Option<&SkillProfileEntry> {
        self.entries(direction)
            .iter()
            .find(|e| e.skill.id == skill_id)
    }

    pub fn contains(&self, direction: SkillDirection, skill_id: SkillId) -> bool {
        self.find_by_skill_id(direction, skill_id).is_some()
    }

    /// Replace a whole collection with a freshly fetched one.
    ///
    /// Rejects input that repeats a skill id; the collection is left as it was.
    pub fn replace_all(
        &mut self,
        direction: SkillDirection,
        entries: Vec<SkillProfileEntry>,
    ) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.skill.id) {
                return Err(Error::DuplicateSkill {
                    skill_id: entry.skill.id,
                    direction,
                });
            }
        }
        *self.entries_mut(direction) = entries;
        Ok(())
    }
}

/// Case-sensitive exact match on `skill.name` over a slice of entries.
pub fn find_by_skill_name<'a>(
    entries: &'a [SkillProfileEntry],
    name: &str,
) -> Option<&'a SkillProfileEntry> {
    entries.iter().find(|e| e.skill.name == name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{EntryId, Skill};

    pub(crate) fn entry(entry_id: i64, skill_id: i64, name: &str) -> SkillProfileEntry {
        SkillProfileEntry {
            id: EntryId(entry_id),
            skill: Skill {
                id: SkillId(skill_id),
                name: name.to_string(),
                category: "Programming".to_string(),
                description: None,
            },
            level: 3,
            goal: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn add_skill_stamps_created_at() {
        let mut profile = SkillProfile::new();
        let now = Utc::now();
        let added = profile
            .add_skill(SkillDirection::Teach, entry(1, 1, "React"), now)
            .unwrap();
        assert_eq!(added.created_at, now);
        assert_eq!(profile.teach_skills().len(), 1);
        assert!(profile.learn_skills().is_empty());
    }

    #[test]
    fn add_skill_rejects_duplicate_in_same_list() {
        let mut profile = SkillProfile::new();
        let now = Utc::now();
        profile
            .add_skill(SkillDirection::Teach, entry(1, 1, "React"), now)
            .unwrap();
        let err = profile
            .add_skill(SkillDirection::Teach, entry(2, 1, "React"), now)
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateSkill {
                skill_id: SkillId(1),
                direction: SkillDirection::Teach
            }
        );
        assert_eq!(profile.teach_skills().len(), 1);
    }

    #[test]
    fn same_skill_may_be_taught_and_learned() {
        let mut profile = SkillProfile::new();
        let now = Utc::now();
        profile
            .add_skill(SkillDirection::Teach, entry(1, 7, "Chess"), now)
            .unwrap();
        profile
            .add_skill(SkillDirection::Learn, entry(2, 7, "Chess"), now)
            .unwrap();
        assert!(profile.contains(SkillDirection::Teach, SkillId(7)));
        assert!(profile.contains(SkillDirection::Learn, SkillId(7)));
    }

    #[test]
    fn add_skill_validates_level() {
        let mut profile = SkillProfile::new();
        let mut bad = entry(1, 1, "React");
        bad.level = 9;
        assert!(matches!(
            profile.add_skill(SkillDirection::Teach, bad, Utc::now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn remove_skill_missing_is_not_found() {
        let mut profile = SkillProfile::new();
        assert!(matches!(
            profile.remove_skill(SkillDirection::Learn, SkillId(4)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn remove_skill_returns_entry() {
        let mut profile = SkillProfile::new();
        profile
            .add_skill(SkillDirection::Learn, entry(1, 4, "Guitar"), Utc::now())
            .unwrap();
        let removed = profile.remove_skill(SkillDirection::Learn, SkillId(4)).unwrap();
        assert_eq!(removed.skill.name, "Guitar");
        assert!(profile.learn_skills().is_empty());
    }

    #[test]
    fn find_by_skill_name_is_case_sensitive() {
        let mut profile = SkillProfile::new();
        profile
            .add_skill(SkillDirection::Teach, entry(1, 1, "React"), Utc::now())
            .unwrap();
        assert!(profile.find_by_skill_name(SkillDirection::Teach, "React").is_some());
        assert!(profile.find_by_skill_name(SkillDirection::Teach, "react").is_none());
        assert!(profile.find_by_skill_name(SkillDirection::Learn, "React").is_none());
    }

    #[test]
    fn replace_all_rejects_duplicates() {
        let mut profile = SkillProfile::new();
        let err = profile
            .replace_all(
                SkillDirection::Teach,
                vec![entry(1, 1, "React"), entry(2, 1, "React")],
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSkill { .. }));
        assert!(profile.teach_skills().is_empty());
    }
}
