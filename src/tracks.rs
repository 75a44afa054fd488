//! Guided curricula: curated tracks plus tracks derived from topics.

use lazy_static::lazy_static;
use serde::Serialize;

use crate::content::{Bit, Difficulty};
use crate::progress::Progress;
use crate::topics::{capitalize_slug, group_by_topic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub topic_slug: String,
    pub level: Difficulty,
    pub is_pro: bool,
    pub bit_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
}

impl Track {
    #[allow(clippy::too_many_arguments)]
    fn curated(
        slug: &str,
        title: &str,
        description: &str,
        topic_slug: &str,
        level: Difficulty,
        is_pro: bool,
        bit_ids: &[&str],
        prerequisites: &[&str],
    ) -> Self {
        Self {
            id: format!("track-{slug}"),
            slug: slug.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            topic_slug: topic_slug.to_string(),
            level,
            is_pro,
            bit_ids: bit_ids.iter().map(|id| id.to_string()).collect(),
            prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_locked(&self, signed_in: bool) -> bool {
        self.is_pro && !signed_in
    }
}

lazy_static! {
    /// Hand-picked learning paths, in display order.
    pub static ref TRACKS: Vec<Track> = vec![
        Track::curated(
            "networking-basics",
            "Networking Basics",
            "Learn fundamental networking concepts from IP addressing to protocols",
            "networking",
            Difficulty::Beginner,
            false,
            &["1", "21", "15"],
            &[],
        ),
        Track::curated(
            "system-design-fundamentals",
            "System Design Fundamentals",
            "Master the basics of designing distributed systems",
            "system-design",
            Difficulty::Intermediate,
            true,
            &["3", "54", "56"],
            &["networking-basics"],
        ),
        Track::curated(
            "programming-essentials",
            "Programming Essentials",
            "Essential programming patterns and best practices across languages",
            "programming",
            Difficulty::Beginner,
            false,
            &["6", "2", "17"],
            &[],
        ),
    ];
}

pub fn find_track(slug: &str) -> Option<&'static Track> {
    TRACKS.iter().find(|t| t.slug == slug)
}

/// Bits of a track in track order; ids missing from `bits` are skipped.
pub fn resolve_bits<'a>(track: &Track, bits: &'a [Bit]) -> Vec<&'a Bit> {
    track
        .bit_ids
        .iter()
        .filter_map(|id| bits.iter().find(|b| &b.id == id))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

pub fn track_progress(track: &Track, progress: &Progress) -> TrackProgress {
    let total = track.bit_ids.len();
    let completed = track
        .bit_ids
        .iter()
        .filter(|id| progress.is_completed(id))
        .count();
    let percent = if total == 0 {
        0
    } else {
        ((completed * 200 + total) / (2 * total)) as u8
    };

    TrackProgress {
        completed,
        total,
        percent,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DerivedTrack<'a> {
    pub slug: String,
    pub title: String,
    pub bits: Vec<&'a Bit>,
}

/// One track per topic, largest first.
pub fn derive_tracks(bits: &[Bit]) -> Vec<DerivedTrack<'_>> {
    let mut tracks: Vec<DerivedTrack<'_>> = group_by_topic(bits)
        .into_iter()
        .map(|(slug, members)| DerivedTrack {
            title: capitalize_slug(&slug),
            slug,
            bits: members,
        })
        .collect();

    tracks.sort_by(|a, b| b.bits.len().cmp(&a.bits.len()));
    tracks
}
