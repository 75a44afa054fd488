use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::topics::infer_topic_slug;
use crate::utils::{generate_id, slugify};

const SEED_CATALOG: &str = include_str!("../data/catalog.json");

/// Characters of a locked tutorial shown as a teaser.
pub const PREVIEW_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Free,
    Pro,
}

/// A single short-form learning card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bit {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    pub timestamp: i64,
    #[serde(default)]
    pub votes: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_slug: Option<String>,
}

impl Bit {
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    /// Topic the bit belongs to, explicit or inferred from its tags.
    pub fn topic(&self) -> String {
        infer_topic_slug(self)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_language(&self, language: &str) -> bool {
        self.language.as_deref() == Some(language)
    }

    pub fn is_locked(&self, signed_in: bool) -> bool {
        self.access == Access::Pro && !signed_in
    }
}

/// A longer-form markdown lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutorial {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub duration: String,
    pub level: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    #[serde(default)]
    pub is_premium: bool,
    pub timestamp: i64,
}

impl Tutorial {
    pub fn is_locked(&self, signed_in: bool) -> bool {
        self.is_premium && !signed_in
    }

    /// Opening characters of the lesson, cut on a char boundary.
    pub fn preview(&self) -> String {
        self.content.chars().take(PREVIEW_CHARS).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_time: String,
    pub github_url: String,
}

/// User-submitted fields of a new bit, typically a reviewed LLM draft.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    pub code_snippet: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub topic_slug: Option<String>,
}

/// All browsable content: bits, tutorials, projects and trivia facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub bits: Vec<Bit>,
    #[serde(default)]
    pub tutorials: Vec<Tutorial>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub facts: Vec<String>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn seed() -> Result<Self, AppError> {
        Ok(serde_json::from_str(SEED_CATALOG)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Folds previously persisted bits into the catalog.
    ///
    /// A saved bit replaces the catalog bit with the same id; unknown ids are
    /// appended in the order they were saved.
    pub fn merge_saved(&mut self, saved: Vec<Bit>) {
        for bit in saved {
            match self.bits.iter_mut().find(|b| b.id == bit.id) {
                Some(existing) => *existing = bit,
                None => self.bits.push(bit),
            }
        }
    }

    /// Looks a bit up by title slug, falling back to its id.
    pub fn find_bit(&self, slug_or_id: &str) -> Option<&Bit> {
        self.bits
            .iter()
            .find(|b| b.slug() == slug_or_id || b.id == slug_or_id)
    }

    pub fn bit_by_id(&self, id: &str) -> Option<&Bit> {
        self.bits.iter().find(|b| b.id == id)
    }

    pub fn find_tutorial(&self, slug: &str) -> Option<&Tutorial> {
        self.tutorials.iter().find(|t| t.slug == slug)
    }

    /// Publishes a draft under `author` and returns the stored bit.
    pub fn add_bit(&mut self, draft: BitDraft, author: &str, now: i64) -> Result<&Bit, AppError> {
        let title = draft.title.trim();
        let summary = draft.summary.trim();
        if title.is_empty() || summary.is_empty() {
            return Err(AppError::BadRequest(
                "Title and Summary are required.".to_string(),
            ));
        }

        let mut id = generate_id();
        while self.bit_by_id(&id).is_some() {
            id = generate_id();
        }

        let tags = draft
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        self.bits.push(Bit {
            id,
            title: title.to_string(),
            summary: summary.to_string(),
            content: draft.content,
            code_snippet: draft.code_snippet.filter(|s| !s.trim().is_empty()),
            language: Some(
                draft
                    .language
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| "text".to_string()),
            ),
            tags,
            author: author.to_string(),
            timestamp: now,
            votes: 0,
            difficulty: draft.difficulty.unwrap_or_default(),
            access: Access::Free,
            topic_slug: draft.topic_slug.filter(|s| !s.is_empty()),
        });

        self.bits
            .last()
            .ok_or_else(|| AppError::Internal("bit vanished after insert".to_string()))
    }

    /// Adds one vote to the bit and returns its new total.
    pub fn vote(&mut self, id: &str) -> Result<u32, AppError> {
        let bit = self
            .bits
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Bit {id}")))?;

        bit.votes += 1;
        Ok(bit.votes)
    }
}
