use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use super::work::WorkRecord;
use super::ModelError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub awards: Vec<String>,
}

/// A craft-heritage practitioner profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub skill_and_level: String,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bio: Bio,
    #[serde(default)]
    pub works: Vec<WorkRecord>,
}

impl PractitionerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            avatar: None,
            contact: String::new(),
            skill_and_level: String::new(),
            updated_at: None,
            bio: Bio::default(),
            works: Vec::new(),
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = contact.into();
        self
    }

    pub fn with_skill_and_level(mut self, skill: impl Into<String>) -> Self {
        self.skill_and_level = skill.into();
        self
    }

    pub fn with_bio(mut self, bio: Bio) -> Self {
        self.bio = bio;
        self
    }

    /// Adds or replaces a work, applying the work invariants.
    pub fn with_work(mut self, work: WorkRecord) -> Self {
        let work = work.normalized();
        match self.works.iter().position(|w| w.id == work.id) {
            Some(index) => self.works[index] = work,
            None => self.works.push(work),
        }
        self
    }

    /// Removes a work. The last remaining work cannot be removed.
    pub fn without_work(mut self, work_id: &str) -> Result<Self, ModelError> {
        let index = self
            .works
            .iter()
            .position(|w| w.id == work_id)
            .ok_or_else(|| ModelError::WorkNotFound(work_id.to_string()))?;
        if self.works.len() <= 1 {
            return Err(ModelError::LastWork(self.name.clone()));
        }
        self.works.remove(index);
        Ok(self)
    }

    pub fn work(&self, work_id: &str) -> Option<&WorkRecord> {
        self.works.iter().find(|w| w.id == work_id)
    }

    /// Avatar generated from the practitioner's initials.
    pub fn default_avatar(name: &str) -> String {
        format!(
            "https://api.dicebear.com/7.x/initials/svg?seed={}",
            urlencoding::encode(name)
        )
    }

    /// Case-insensitive match against name, skill, and work names/techniques.
    /// `query` must already be lowercased.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.skill_and_level.to_lowercase().contains(query)
            || self.works.iter().any(|w| w.matches(query))
    }
}

impl fmt::Display for PractitionerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.chars().count().max(1)))?;
        writeln!(f, "ID: {}", self.id)?;

        if !self.skill_and_level.is_empty() {
            writeln!(f, "Skill: {}", self.skill_and_level)?;
        }
        if !self.contact.is_empty() {
            writeln!(f, "Contact: {}", self.contact)?;
        }
        if let Some(date) = &self.bio.birth_date {
            writeln!(f, "Born: {}", date)?;
        }
        if let Some(place) = &self.bio.birth_place {
            writeln!(f, "Birthplace: {}", place)?;
        }
        if let Some(updated) = self.updated_at {
            writeln!(f, "Updated: {}", updated.format("%Y-%m-%d %H:%M"))?;
        }

        if !self.bio.experience.is_empty() {
            writeln!(f, "\nExperience:")?;
            for line in &self.bio.experience {
                writeln!(f, "  - {}", line)?;
            }
        }

        if !self.bio.awards.is_empty() {
            writeln!(f, "\nAwards:")?;
            for award in &self.bio.awards {
                writeln!(f, "  - {}", award)?;
            }
        }

        if !self.works.is_empty() {
            writeln!(f, "\nWorks:")?;
            for work in &self.works {
                writeln!(f, "  - {}", work)?;
            }
        }

        Ok(())
    }
}

/// Raw practitioner input as captured by an edit form, before the save-time
/// rules are applied.
#[derive(Debug, Clone, Default)]
pub struct PractitionerDraft {
    pub name: String,
    pub avatar: Option<String>,
    pub contact: String,
    pub skill_and_level: String,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    /// One experience entry per line.
    pub experience: String,
    pub awards: Vec<String>,
    pub works: Vec<WorkRecord>,
}

impl PractitionerDraft {
    pub fn from_record(record: &PractitionerRecord) -> Self {
        Self {
            name: record.name.clone(),
            avatar: record.avatar.clone(),
            contact: record.contact.clone(),
            skill_and_level: record.skill_and_level.clone(),
            birth_date: record.bio.birth_date.clone(),
            birth_place: record.bio.birth_place.clone(),
            experience: record.bio.experience.join("\n"),
            awards: record.bio.awards.clone(),
            works: record.works.clone(),
        }
    }

    /// Builds the record to save. `id` is the existing record's id when
    /// editing, `None` when creating.
    pub fn into_record(self, id: Option<String>) -> Result<PractitionerRecord, ModelError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ModelError::BlankName);
        }

        let avatar = match self.avatar {
            Some(avatar) if !avatar.trim().is_empty() => avatar,
            _ => PractitionerRecord::default_avatar(&name),
        };

        let experience = self
            .experience
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        let awards = self
            .awards
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let mut seen = HashSet::new();
        let works = self
            .works
            .into_iter()
            .map(|work| {
                let mut work = work.normalized();
                if !seen.insert(work.id.clone()) {
                    work.id = WorkRecord::fresh_id();
                    seen.insert(work.id.clone());
                }
                work
            })
            .collect();

        Ok(PractitionerRecord {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name,
            avatar: Some(avatar),
            contact: self.contact.trim().to_string(),
            skill_and_level: self.skill_and_level.trim().to_string(),
            updated_at: None,
            bio: Bio {
                birth_date: non_blank(self.birth_date),
                birth_place: non_blank(self.birth_place),
                experience,
                awards,
            },
            works,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> PractitionerDraft {
        PractitionerDraft {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_record_requires_name() {
        let result = draft("   ").into_record(None);
        assert!(matches!(result, Err(ModelError::BlankName)));
    }

    #[test]
    fn test_into_record_defaults_avatar_and_splits_experience() {
        let mut input = draft(" Yan Qiang ");
        input.experience = "first line\n\n  second line  \n".to_string();

        let record = input.into_record(None).unwrap();
        assert_eq!(record.name, "Yan Qiang");
        assert_eq!(
            record.avatar.as_deref(),
            Some("https://api.dicebear.com/7.x/initials/svg?seed=Yan%20Qiang")
        );
        assert_eq!(record.bio.experience, vec!["first line", "second line"]);
    }

    #[test]
    fn test_into_record_keeps_id_when_editing() {
        let record = draft("Li").into_record(Some("42".to_string())).unwrap();
        assert_eq!(record.id, "42");
    }

    #[test]
    fn test_into_record_reassigns_duplicate_work_ids() {
        let mut input = draft("Li");
        let work = WorkRecord::new("Bowl");
        input.works = vec![work.clone(), work.clone()];

        let record = input.into_record(None).unwrap();
        assert_eq!(record.works.len(), 2);
        assert_eq!(record.works[0].id, work.id);
        assert_ne!(record.works[0].id, record.works[1].id);
    }

    #[test]
    fn test_with_work_replaces_by_id() {
        let work = WorkRecord::new("Bowl");
        let record = PractitionerRecord::new("Li")
            .with_work(work.clone())
            .with_work(WorkRecord {
                name: "Big Bowl".to_string(),
                ..work.clone()
            });
        assert_eq!(record.works.len(), 1);
        assert_eq!(record.works[0].name, "Big Bowl");
    }

    #[test]
    fn test_without_work_keeps_last_work() {
        let work = WorkRecord::new("Bowl");
        let record = PractitionerRecord::new("Li").with_work(work.clone());
        let result = record.without_work(&work.id);
        assert!(matches!(result, Err(ModelError::LastWork(_))));
    }

    #[test]
    fn test_without_work_unknown_id() {
        let record = PractitionerRecord::new("Li").with_work(WorkRecord::new("Bowl"));
        let result = record.without_work("missing");
        assert!(matches!(result, Err(ModelError::WorkNotFound(_))));
    }

    #[test]
    fn test_draft_from_record_round_trips_fields() {
        let record = PractitionerRecord::new("Li")
            .with_contact("123")
            .with_bio(Bio {
                experience: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            });
        let input = PractitionerDraft::from_record(&record);
        assert_eq!(input.experience, "a\nb");
        assert_eq!(input.contact, "123");
    }

    #[test]
    fn test_updated_at_serializes_as_millis() {
        let mut record = PractitionerRecord::new("Li");
        record.updated_at = DateTime::from_timestamp_millis(1_700_000_000_123);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["updatedAt"], 1_700_000_000_123i64);
        assert_eq!(json["skillAndLevel"], "");
    }
}
