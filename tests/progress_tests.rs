//! Gamification rules and progress persistence

use pretty_assertions::assert_eq;
use serde_json::json;
use synapse::content::Catalog;
use synapse::progress::{
    MAX_READ_SECONDS, Progress, Recommendation, XP_QUIZ_WIN, level_for, next_bit_to_continue,
    recommend,
};
use synapse::saving::{Store, export_progress, import_progress};
use synapse::tracks::TRACKS;

/// 2026-01-01T00:00:00Z
const NEW_YEAR: i64 = 1_767_225_600_000;
const HOUR: i64 = 60 * 60 * 1000;
const DAY: i64 = 24 * HOUR;

#[test]
fn test_levels() {
    assert_eq!(level_for(0), 1);
    assert_eq!(level_for(99), 1);
    assert_eq!(level_for(100), 2);
    assert_eq!(level_for(450), 5);
}

#[test]
fn test_first_read_unlocks_novice() {
    let mut progress = Progress::new(NEW_YEAR);
    let award = progress.record_read("1", 120, NEW_YEAR);

    assert_eq!(award.xp_gained, 10);
    assert_eq!(award.xp, 10);
    assert_eq!(award.level, 1);
    assert!(!award.leveled_up);
    assert_eq!(award.new_badges, vec!["b_novice".to_string()]);
    assert_eq!(progress.bits_read, 1);

    let again = progress.record_read("2", 60, NEW_YEAR);
    assert!(again.new_badges.is_empty());
}

#[test]
fn test_ten_reads_make_a_scholar() {
    let mut progress = Progress::new(NEW_YEAR);
    for i in 0..9 {
        progress.record_read(&i.to_string(), 10, NEW_YEAR);
    }
    let award = progress.record_read("9", 10, NEW_YEAR);

    assert_eq!(award.new_badges, vec!["b_scholar".to_string()]);
    assert!(award.leveled_up);
    assert_eq!(progress.level(), 2);
}

#[test]
fn test_completion_pays_once() {
    let mut progress = Progress::new(NEW_YEAR);
    assert_eq!(progress.mark_completed("3").xp_gained, 10);

    let repeat = progress.mark_completed("3");
    assert_eq!(repeat.xp_gained, 0);
    assert_eq!(repeat.xp, 10);
    assert_eq!(progress.completed_bits, vec!["3".to_string()]);
    assert_eq!(progress.last_seen_bit_id.as_deref(), Some("3"));
}

#[test]
fn test_quiz_wins_and_level_badge() {
    let mut progress = Progress::new(NEW_YEAR);
    let first = progress.record_quiz_win();
    assert_eq!(first.xp_gained, XP_QUIZ_WIN);
    assert_eq!(first.new_badges, vec!["b_quiz_1".to_string()]);

    let mut last = first;
    for _ in 1..16 {
        last = progress.record_quiz_win();
    }
    assert_eq!(progress.xp, 400);
    assert!(last.leveled_up);
    assert_eq!(last.level, 5);
    assert_eq!(last.new_badges, vec!["b_level_5".to_string()]);
}

#[test]
fn test_read_time_is_capped() {
    let mut progress = Progress::new(NEW_YEAR);
    progress.record_read("1", u64::MAX, NEW_YEAR);
    progress.record_read("2", u64::MAX, NEW_YEAR);

    assert_eq!(progress.history[0].time_spent, MAX_READ_SECONDS);
    assert_eq!(
        progress.dashboard(NEW_YEAR).time_spent_week,
        2 * MAX_READ_SECONDS / 60
    );
}

#[test]
fn test_xp_saturates() {
    let mut progress: Progress = serde_json::from_value(json!({ "xp": u64::MAX })).unwrap();
    let award = progress.record_vote();
    assert_eq!(award.xp, u64::MAX);
    assert_eq!(progress.xp, u64::MAX);
}

#[test]
fn test_vote_xp() {
    let mut progress = Progress::new(NEW_YEAR);
    assert_eq!(progress.record_vote().xp, 2);
}

#[test]
fn test_streak_rules() {
    let mut progress = Progress::new(NEW_YEAR);
    assert_eq!(progress.streak, 1);

    assert!(progress.check_in(NEW_YEAR + DAY));
    assert_eq!(progress.streak, 2);

    assert!(!progress.check_in(NEW_YEAR + DAY + 3 * HOUR));
    assert_eq!(progress.streak, 2);

    assert!(progress.check_in(NEW_YEAR + 2 * DAY + 23 * HOUR));
    assert_eq!(progress.streak, 3);
    assert!(progress.badges.contains(&"b_streak_3".to_string()));

    assert!(progress.check_in(NEW_YEAR + 5 * DAY));
    assert_eq!(progress.streak, 1);
    assert!(progress.badges.contains(&"b_streak_3".to_string()));
}

#[test]
fn test_bookmarks_toggle() {
    let mut progress = Progress::default();
    assert!(progress.toggle_bookmark("7"));
    assert!(progress.is_bookmarked("7"));
    assert!(!progress.toggle_bookmark("7"));
    assert!(progress.bookmarked_bits.is_empty());
}

#[test]
fn test_dashboard_counts_the_last_week() {
    let mut progress = Progress::new(NEW_YEAR);
    progress.record_read("1", 600, NEW_YEAR);
    progress.record_read("2", 300, NEW_YEAR + 6 * DAY);
    progress.record_read("3", 180, NEW_YEAR + 8 * DAY);

    // The first read fell out of the seven day window.
    assert_eq!(progress.history.len(), 2);

    let dashboard = progress.dashboard(NEW_YEAR + 8 * DAY);
    assert_eq!(dashboard.bits_completed, 3);
    assert_eq!(dashboard.total_xp, 30);
    assert_eq!(dashboard.time_spent_week, 8);
    assert_eq!(dashboard.next_milestone.name, "Level 2");
    assert_eq!(dashboard.next_milestone.target, 100);
    assert_eq!(dashboard.next_milestone.current, 30);
}

#[test]
fn test_continue_within_topic() {
    let catalog = Catalog::seed().unwrap();
    let mut progress = Progress::default();
    progress.mark_completed("1");

    assert_eq!(next_bit_to_continue(&catalog.bits, &progress, None).unwrap().id, "2");
    assert_eq!(
        next_bit_to_continue(&catalog.bits, &progress, Some("networking"))
            .unwrap()
            .id,
        "15"
    );
}

#[test]
fn test_recommendation_order() {
    let catalog = Catalog::seed().unwrap();
    let mut progress = Progress::default();

    assert_eq!(
        recommend(&TRACKS, &catalog.bits, &progress),
        Recommendation::NextTrack {
            track_slug: "networking-basics".to_string()
        }
    );

    progress.mark_completed("1");
    let started = recommend(&TRACKS, &catalog.bits, &progress);
    assert_eq!(
        serde_json::to_value(&started).unwrap(),
        json!({ "reason": "track-progress", "trackSlug": "networking-basics", "nextBitId": "21" })
    );

    for id in ["21", "15"] {
        progress.mark_completed(id);
    }
    assert_eq!(
        recommend(&TRACKS, &catalog.bits, &progress),
        Recommendation::NextTrack {
            track_slug: "system-design-fundamentals".to_string()
        }
    );

    for id in ["3", "54", "56", "6", "2", "17"] {
        progress.mark_completed(id);
    }
    assert_eq!(
        recommend(&TRACKS, &catalog.bits, &progress),
        Recommendation::NextBit {
            next_bit_id: "4".to_string()
        }
    );
}

#[test]
fn test_old_documents_load_with_defaults() {
    let progress: Progress = serde_json::from_value(json!({ "xp": 120, "bitsRead": 4 })).unwrap();
    assert_eq!(progress.level(), 2);
    assert_eq!(progress.streak, 1);
    assert!(progress.history.is_empty());
}

#[test]
fn test_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let fresh = store.load_progress("ada", NEW_YEAR).unwrap();
    assert_eq!(fresh.last_login, NEW_YEAR);

    let mut progress = fresh;
    progress.record_quiz_win();
    store.save_progress("ada", &progress).unwrap();
    assert_eq!(store.load_progress("ada", 0).unwrap(), progress);
    assert!(store.load_users().unwrap().is_empty());
}

#[test]
fn test_export_import() {
    let mut progress = Progress::new(NEW_YEAR);
    progress.record_read("1", 90, NEW_YEAR);
    progress.toggle_bookmark("56");

    let bytes = export_progress(&progress).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    assert_eq!(import_progress(&bytes).unwrap(), progress);
    assert!(import_progress(b"not gzip").is_err());
}
