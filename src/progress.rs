//! Per-user learning progress: XP, levels, streaks, badges and bookmarks.
//!
//! A [`Progress`] value is the whole JSON document stored for one user. Every
//! mutation goes through a method here so badge and level bookkeeping stay in
//! one place.

use serde::{Deserialize, Serialize};

use crate::content::Bit;
use crate::tracks::{Track, track_progress};
use crate::utils::day_of;

pub const XP_PER_LEVEL: u64 = 100;
pub const XP_READ: u64 = 10;
pub const XP_COMPLETE: u64 = 10;
pub const XP_QUIZ_WIN: u64 = 25;
pub const XP_VOTE: u64 = 2;

/// Longest single reading session credited, in seconds.
pub const MAX_READ_SECONDS: u64 = 24 * 60 * 60;

const HISTORY_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeRule {
    BitsRead(u32),
    Streak(u32),
    QuizzesWon(u32),
    Level(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    #[serde(skip)]
    pub rule: BadgeRule,
}

pub const BADGES: &[Badge] = &[
    Badge {
        id: "b_novice",
        name: "Hello World",
        description: "Read your first Bit.",
        icon: "code",
        color: "emerald",
        rule: BadgeRule::BitsRead(1),
    },
    Badge {
        id: "b_scholar",
        name: "Scholar",
        description: "Read 10 Bits.",
        icon: "brain",
        color: "blue",
        rule: BadgeRule::BitsRead(10),
    },
    Badge {
        id: "b_streak_3",
        name: "On Fire",
        description: "Maintain a 3-day streak.",
        icon: "fire",
        color: "orange",
        rule: BadgeRule::Streak(3),
    },
    Badge {
        id: "b_quiz_1",
        name: "Sharp Mind",
        description: "Win 1 Quiz Challenge.",
        icon: "medal",
        color: "purple",
        rule: BadgeRule::QuizzesWon(1),
    },
    Badge {
        id: "b_level_5",
        name: "Neural Master",
        description: "Reach Level 5.",
        icon: "zap",
        color: "amber",
        rule: BadgeRule::Level(5),
    },
];

impl Badge {
    fn earned_by(&self, progress: &Progress) -> bool {
        match self.rule {
            BadgeRule::BitsRead(n) => progress.bits_read >= n,
            BadgeRule::Streak(n) => progress.streak >= n,
            BadgeRule::QuizzesWon(n) => progress.quizzes_won >= n,
            BadgeRule::Level(n) => progress.level() >= n,
        }
    }
}

pub fn level_for(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL + 1).unwrap_or(u32::MAX)
}

/// One read session, kept for the weekly time-spent figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRecord {
    pub bit_id: String,
    pub at: i64,
    pub time_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Progress {
    pub xp: u64,
    pub bits_read: u32,
    pub quizzes_won: u32,
    pub streak: u32,
    pub last_login: i64,
    pub badges: Vec<String>,
    pub bookmarked_bits: Vec<String>,
    pub completed_bits: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_bit_id: Option<String>,
    pub history: Vec<ReadRecord>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            xp: 0,
            bits_read: 0,
            quizzes_won: 0,
            streak: 1,
            last_login: 0,
            badges: Vec::new(),
            bookmarked_bits: Vec::new(),
            completed_bits: Vec::new(),
            last_seen_bit_id: None,
            history: Vec::new(),
        }
    }
}

/// Outcome of an XP-granting action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub xp_gained: u64,
    pub xp: u64,
    pub level: u32,
    pub leveled_up: bool,
    pub new_badges: Vec<String>,
}

impl Progress {
    pub fn new(now: i64) -> Self {
        Self {
            last_login: now,
            ..Self::default()
        }
    }

    pub fn level(&self) -> u32 {
        level_for(self.xp)
    }

    pub fn is_completed(&self, bit_id: &str) -> bool {
        self.completed_bits.iter().any(|id| id == bit_id)
    }

    pub fn is_bookmarked(&self, bit_id: &str) -> bool {
        self.bookmarked_bits.iter().any(|id| id == bit_id)
    }

    /// Badges whose conditions now hold, appended to `badges`.
    fn unlock_badges(&mut self) -> Vec<String> {
        let fresh: Vec<String> = BADGES
            .iter()
            .filter(|badge| !self.badges.iter().any(|id| id == badge.id))
            .filter(|badge| badge.earned_by(self))
            .map(|badge| badge.id.to_string())
            .collect();

        self.badges.extend(fresh.iter().cloned());
        fresh
    }

    fn grant(&mut self, amount: u64) -> Award {
        let before = self.level();
        self.xp = self.xp.saturating_add(amount);
        let level = self.level();

        Award {
            xp_gained: amount,
            xp: self.xp,
            level,
            leveled_up: level > before,
            new_badges: self.unlock_badges(),
        }
    }

    /// Updates the daily streak for a visit at `now`.
    ///
    /// Returns true when the streak changed.
    pub fn check_in(&mut self, now: i64) -> bool {
        if self.last_login == 0 {
            self.last_login = now;
            self.unlock_badges();
            return false;
        }

        let last = day_of(self.last_login);
        let today = day_of(now);
        if today <= last {
            return false;
        }

        self.streak = if today.pred_opt() == Some(last) {
            self.streak + 1
        } else {
            1
        };
        self.last_login = now;
        self.unlock_badges();
        true
    }

    /// A bit was read to the end.
    pub fn record_read(&mut self, bit_id: &str, time_spent: u64, now: i64) -> Award {
        self.bits_read = self.bits_read.saturating_add(1);
        self.history.push(ReadRecord {
            bit_id: bit_id.to_string(),
            at: now,
            time_spent: time_spent.min(MAX_READ_SECONDS),
        });
        self.history.retain(|r| now - r.at <= HISTORY_WINDOW_MS);
        self.grant(XP_READ)
    }

    /// Marks a bit as learned. Only the first time earns XP.
    pub fn mark_completed(&mut self, bit_id: &str) -> Award {
        if self.is_completed(bit_id) {
            return Award {
                xp: self.xp,
                level: self.level(),
                ..Award::default()
            };
        }

        self.completed_bits.push(bit_id.to_string());
        self.last_seen_bit_id = Some(bit_id.to_string());
        self.grant(XP_COMPLETE)
    }

    pub fn record_quiz_win(&mut self) -> Award {
        self.quizzes_won += 1;
        self.grant(XP_QUIZ_WIN)
    }

    pub fn record_vote(&mut self) -> Award {
        self.grant(XP_VOTE)
    }

    /// Saves or unsaves a bit; returns whether it is now saved.
    pub fn toggle_bookmark(&mut self, bit_id: &str) -> bool {
        if self.is_bookmarked(bit_id) {
            self.bookmarked_bits.retain(|id| id != bit_id);
            false
        } else {
            self.bookmarked_bits.push(bit_id.to_string());
            true
        }
    }

    pub fn minutes_spent_since(&self, since: i64) -> u64 {
        let seconds: u64 = self
            .history
            .iter()
            .filter(|r| r.at >= since)
            .map(|r| r.time_spent)
            .fold(0, u64::saturating_add);
        seconds / 60
    }

    pub fn dashboard(&self, now: i64) -> Dashboard {
        let next_level = self.level() + 1;

        Dashboard {
            streak: self.streak,
            total_xp: self.xp,
            level: self.level(),
            bits_completed: self.bits_read,
            achievements_count: self.badges.len(),
            time_spent_week: self.minutes_spent_since(now - HISTORY_WINDOW_MS),
            next_milestone: Milestone {
                name: format!("Level {next_level}"),
                target: u64::from(next_level - 1) * XP_PER_LEVEL,
                current: self.xp,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub name: String,
    pub target: u64,
    pub current: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub streak: u32,
    pub total_xp: u64,
    pub level: u32,
    pub bits_completed: u32,
    pub achievements_count: usize,
    /// Minutes spent reading over the last seven days.
    pub time_spent_week: u64,
    pub next_milestone: Milestone,
}

/// First bit not yet learned, optionally within one topic.
pub fn next_bit_to_continue<'a>(
    bits: &'a [Bit],
    progress: &Progress,
    topic: Option<&str>,
) -> Option<&'a Bit> {
    bits.iter()
        .filter(|b| topic.is_none_or(|slug| b.topic() == slug))
        .find(|b| !progress.is_completed(&b.id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Recommendation {
    #[serde(rename_all = "camelCase")]
    TrackProgress {
        track_slug: String,
        next_bit_id: String,
    },
    #[serde(rename_all = "camelCase")]
    NextTrack { track_slug: String },
    #[serde(rename_all = "camelCase")]
    NextBit { next_bit_id: String },
    None,
}

/// What a learner should open next.
///
/// A track already under way comes first, then the first untouched track,
/// then any bit not yet learned.
pub fn recommend(tracks: &[Track], bits: &[Bit], progress: &Progress) -> Recommendation {
    let in_progress = tracks.iter().find_map(|track| {
        let status = track_progress(track, progress);
        if status.completed == 0 || status.completed >= status.total {
            return None;
        }
        track
            .bit_ids
            .iter()
            .find(|id| !progress.is_completed(id))
            .map(|id| (track, id))
    });
    if let Some((track, bit_id)) = in_progress {
        return Recommendation::TrackProgress {
            track_slug: track.slug.clone(),
            next_bit_id: bit_id.clone(),
        };
    }

    if let Some(track) = tracks
        .iter()
        .find(|t| track_progress(t, progress).completed == 0 && !t.bit_ids.is_empty())
    {
        return Recommendation::NextTrack {
            track_slug: track.slug.clone(),
        };
    }

    match next_bit_to_continue(bits, progress, None) {
        Some(bit) => Recommendation::NextBit {
            next_bit_id: bit.id.clone(),
        },
        None => Recommendation::None,
    }
}
