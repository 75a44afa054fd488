//! Topic registry and the tag heuristics that sort bits into topics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::content::Bit;
use crate::progress::Progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub slug: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub icon_key: &'static str,
    pub order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCategory {
    pub name: &'static str,
    pub description: &'static str,
    pub topic_slugs: &'static [&'static str],
    pub order: u32,
}

pub const TOPICS: &[Topic] = &[
    Topic {
        slug: "networking",
        label: "Networking",
        description: "Network fundamentals, protocols, and infrastructure",
        icon_key: "network",
        order: 1,
    },
    Topic {
        slug: "system-design",
        label: "System Design",
        description: "Designing scalable and distributed systems",
        icon_key: "cpu",
        order: 2,
    },
    Topic {
        slug: "database",
        label: "Database",
        description: "Database design, optimization, and querying",
        icon_key: "database",
        order: 3,
    },
    Topic {
        slug: "programming",
        label: "Programming",
        description: "Programming languages and best practices",
        icon_key: "code",
        order: 4,
    },
    Topic {
        slug: "devops",
        label: "DevOps",
        description: "Development operations and deployment",
        icon_key: "cog",
        order: 5,
    },
    Topic {
        slug: "security",
        label: "Security",
        description: "Security principles and practices",
        icon_key: "shield",
        order: 6,
    },
    Topic {
        slug: "general",
        label: "General",
        description: "General knowledge and miscellaneous topics",
        icon_key: "book",
        order: 7,
    },
];

pub const TOPIC_CATEGORIES: &[TopicCategory] = &[
    TopicCategory {
        name: "Networking & Infrastructure",
        description: "Network fundamentals, security, and deployment infrastructure",
        topic_slugs: &["networking", "devops", "security"],
        order: 1,
    },
    TopicCategory {
        name: "Development & Design",
        description: "Programming languages, databases, and system architecture",
        topic_slugs: &["programming", "database", "system-design"],
        order: 2,
    },
    TopicCategory {
        name: "General",
        description: "General knowledge and miscellaneous topics",
        topic_slugs: &["general"],
        order: 3,
    },
];

pub const FALLBACK_TOPIC: &str = "general";

/// One keyword rule: a bit matches if it carries any tag or is written in
/// any language listed.
struct TopicRule {
    slug: &'static str,
    tags: &'static [&'static str],
    languages: &'static [&'static str],
}

// First match wins.
const RULES: &[TopicRule] = &[
    TopicRule {
        slug: "networking",
        tags: &["networking", "http", "tcp", "udp", "dns", "subnetting", "load-balancing"],
        languages: &["network"],
    },
    TopicRule {
        slug: "security",
        tags: &["security", "authentication", "oauth", "jwt", "ssl", "encryption"],
        languages: &[],
    },
    TopicRule {
        slug: "database",
        tags: &["database", "sql", "mongodb", "postgresql", "redis", "indexing", "orm"],
        languages: &[],
    },
    TopicRule {
        slug: "system-design",
        tags: &["system-design"],
        languages: &[],
    },
    TopicRule {
        slug: "programming",
        tags: &[
            "programming",
            "react",
            "frontend",
            "async",
            "promises",
            "git",
            "version-control",
            "decorators",
            "context",
            "state-management",
        ],
        languages: &["javascript", "typescript", "css", "html", "python"],
    },
    TopicRule {
        slug: "devops",
        tags: &[
            "devops",
            "docker",
            "kubernetes",
            "nginx",
            "aws",
            "linux",
            "bash",
            "deployment",
            "infrastructure",
        ],
        languages: &[],
    },
];

impl TopicRule {
    fn matches(&self, bit: &Bit) -> bool {
        self.tags.iter().any(|tag| bit.has_tag(tag))
            || self.languages.iter().any(|lang| bit.is_language(lang))
    }
}

pub fn find_topic(slug: &str) -> Option<&'static Topic> {
    TOPICS.iter().find(|t| t.slug == slug)
}

/// Topic of a bit: its explicit `topic_slug`, else the first keyword rule
/// that matches its tags or language, else `general`.
pub fn infer_topic_slug(bit: &Bit) -> String {
    if let Some(slug) = bit.topic_slug.as_deref().filter(|s| !s.is_empty()) {
        return slug.to_string();
    }

    RULES
        .iter()
        .find(|rule| rule.matches(bit))
        .map_or(FALLBACK_TOPIC, |rule| rule.slug)
        .to_string()
}

/// Human label for a slug: `system-design` becomes `System Design`.
pub fn capitalize_slug(slug: &str) -> String {
    match slug {
        "devops" => "DevOps".to_string(),
        "system-design" => "System Design".to_string(),
        "javascript" => "JavaScript".to_string(),
        "typescript" => "TypeScript".to_string(),
        _ => slug
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    pub slug: String,
    pub label: String,
    pub count: usize,
}

/// Groups bits by topic, keeping first-seen order for each group.
pub fn group_by_topic(bits: &[Bit]) -> IndexMap<String, Vec<&Bit>> {
    let mut groups: IndexMap<String, Vec<&Bit>> = IndexMap::new();
    for bit in bits {
        groups.entry(bit.topic()).or_default().push(bit);
    }
    groups
}

/// Topics present in `bits`, most populated first.
pub fn derive_topics(bits: &[Bit]) -> Vec<TopicSummary> {
    let mut topics: Vec<TopicSummary> = group_by_topic(bits)
        .into_iter()
        .map(|(slug, members)| TopicSummary {
            label: capitalize_slug(&slug),
            count: members.len(),
            slug,
        })
        .collect();

    topics.sort_by(|a, b| b.count.cmp(&a.count));
    topics
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopicProgress {
    pub completed: usize,
    pub total: usize,
}

pub fn topic_progress(bits: &[Bit], progress: &Progress, slug: &str) -> TopicProgress {
    let members: Vec<&Bit> = bits.iter().filter(|b| b.topic() == slug).collect();

    TopicProgress {
        completed: members
            .iter()
            .filter(|b| progress.is_completed(&b.id))
            .count(),
        total: members.len(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicFilter {
    #[default]
    All,
    Unread,
    Completed,
    Locked,
}

/// Bits of one topic narrowed by the topic page filter.
pub fn filter_topic_bits<'a>(
    bits: &'a [Bit],
    slug: &str,
    progress: &Progress,
    filter: TopicFilter,
    signed_in: bool,
) -> Vec<&'a Bit> {
    bits.iter()
        .filter(|b| b.topic() == slug)
        .filter(|b| match filter {
            TopicFilter::All => true,
            TopicFilter::Unread => !progress.is_completed(&b.id),
            TopicFilter::Completed => progress.is_completed(&b.id),
            TopicFilter::Locked => b.is_locked(signed_in),
        })
        .collect()
}
