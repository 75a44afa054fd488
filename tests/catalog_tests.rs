//! Catalog, topic, track and feed queries over the seed content

use pretty_assertions::assert_eq;
use synapse::content::{Access, BitDraft, Catalog, Difficulty};
use synapse::feed::{self, FeedTab, ITEMS_PER_PAGE, TOP_CATEGORIES};
use synapse::progress::Progress;
use synapse::topics::{
    TopicFilter, capitalize_slug, derive_topics, filter_topic_bits, infer_topic_slug,
    topic_progress,
};
use synapse::tracks::{TRACKS, derive_tracks, find_track, resolve_bits, track_progress};

fn seed() -> Catalog {
    Catalog::seed().expect("seed catalog parses")
}

fn ids(bits: &[&synapse::Bit]) -> Vec<String> {
    bits.iter().map(|b| b.id.clone()).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_seed_sizes() {
    let catalog = seed();
    assert_eq!(catalog.bits.len(), 101);
    assert_eq!(catalog.tutorials.len(), 2);
    assert_eq!(catalog.projects.len(), 3);
    assert_eq!(catalog.facts.len(), 20);
}

#[test]
fn test_slugs_are_unique() {
    let catalog = seed();
    let mut slugs: Vec<String> = catalog.bits.iter().map(|b| b.slug()).collect();
    slugs.sort();
    slugs.dedup();
    assert_eq!(slugs.len(), catalog.bits.len());
}

#[test]
fn test_find_bit_by_slug_or_id() {
    let catalog = seed();
    assert_eq!(catalog.find_bit("understanding-cidr-notation").unwrap().id, "1");
    assert_eq!(
        catalog.find_bit("11").unwrap().slug(),
        "javascript-promises-vs-asyncawait"
    );
    assert!(catalog.find_bit("no-such-bit").is_none());
}

#[test]
fn test_pro_bits_lock_for_visitors_only() {
    let catalog = seed();
    let cap = catalog.bit_by_id("3").unwrap();
    assert_eq!(cap.access, Access::Pro);
    assert!(cap.is_locked(false));
    assert!(!cap.is_locked(true));
    assert!(!catalog.bit_by_id("1").unwrap().is_locked(false));
}

#[test]
fn test_premium_tutorial_preview() {
    let catalog = seed();
    let vps = catalog.find_tutorial("securing-your-vps").unwrap();
    assert!(vps.is_locked(false));
    assert_eq!(vps.preview().chars().count(), synapse::content::PREVIEW_CHARS);

    let shell = catalog.find_tutorial("shell-pipelines-101").unwrap();
    assert!(!shell.is_locked(false));
}

#[test]
fn test_add_bit_applies_defaults() {
    let mut catalog = seed();
    let draft = BitDraft {
        title: "  Rust Lifetimes ".to_string(),
        summary: "Borrows that outlive nothing.".to_string(),
        tags: vec![" rust ".to_string(), "".to_string()],
        ..BitDraft::default()
    };

    let bit = catalog.add_bit(draft, "ferris", 1_000).unwrap().clone();
    assert_eq!(bit.title, "Rust Lifetimes");
    assert_eq!(bit.tags, vec!["rust".to_string()]);
    assert_eq!(bit.language.as_deref(), Some("text"));
    assert_eq!(bit.difficulty, Difficulty::Beginner);
    assert_eq!(bit.votes, 0);
    assert_eq!(bit.id.len(), 9);
    assert_eq!(catalog.bits.len(), 102);
    assert_eq!(catalog.find_bit("rust-lifetimes").unwrap().author, "ferris");
}

#[test]
fn test_add_bit_requires_title_and_summary() {
    let mut catalog = seed();
    let err = catalog
        .add_bit(BitDraft::default(), "ferris", 0)
        .unwrap_err();
    assert_eq!(err.to_string(), "Title and Summary are required.");
}

#[test]
fn test_vote_counts_and_unknown_id() {
    let mut catalog = seed();
    assert_eq!(catalog.vote("1").unwrap(), 43);
    assert_eq!(catalog.vote("1").unwrap(), 44);
    assert_eq!(catalog.vote("nope").unwrap_err().status().as_u16(), 404);
}

#[test]
fn test_merge_saved_replaces_and_appends() {
    let mut catalog = seed();
    let mut voted = catalog.bit_by_id("1").unwrap().clone();
    voted.votes = 99;
    let mut fresh = voted.clone();
    fresh.id = "abc123xyz".to_string();
    fresh.title = "Fresh Bit".to_string();

    catalog.merge_saved(vec![voted, fresh]);
    assert_eq!(catalog.bits.len(), 102);
    assert_eq!(catalog.bit_by_id("1").unwrap().votes, 99);
    assert_eq!(catalog.bits.last().unwrap().id, "abc123xyz");
}

// ═══════════════════════════════════════════════════════════════════════
// Topics
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_derive_topics_counts() {
    let counts: Vec<(String, usize)> = derive_topics(&seed().bits)
        .into_iter()
        .map(|t| (t.slug, t.count))
        .collect();

    assert_eq!(
        counts,
        vec![
            ("programming".to_string(), 47),
            ("devops".to_string(), 17),
            ("database".to_string(), 15),
            ("networking".to_string(), 10),
            ("security".to_string(), 7),
            ("general".to_string(), 4),
            ("system-design".to_string(), 1),
        ]
    );
}

#[test]
fn test_infer_topic_rules() {
    let catalog = seed();
    let topic = |id: &str| infer_topic_slug(catalog.bit_by_id(id).unwrap());

    assert_eq!(topic("1"), "networking");
    assert_eq!(topic("2"), "programming");
    assert_eq!(topic("3"), "database");
    assert_eq!(topic("4"), "devops");
    assert_eq!(topic("9"), "general");
}

#[test]
fn test_explicit_topic_wins() {
    let mut bit = seed().bit_by_id("1").unwrap().clone();
    bit.topic_slug = Some("security".to_string());
    assert_eq!(infer_topic_slug(&bit), "security");
}

#[test]
fn test_capitalize_slug() {
    assert_eq!(capitalize_slug("system-design"), "System Design");
    assert_eq!(capitalize_slug("devops"), "DevOps");
    assert_eq!(capitalize_slug("load-balancing"), "Load Balancing");
    assert_eq!(capitalize_slug("typescript"), "TypeScript");
}

#[test]
fn test_topic_filters() {
    let catalog = seed();
    let mut progress = Progress::default();
    progress.mark_completed("22");

    let all = filter_topic_bits(&catalog.bits, "security", &progress, TopicFilter::All, false);
    assert_eq!(all.len(), 7);

    let locked = filter_topic_bits(&catalog.bits, "security", &progress, TopicFilter::Locked, false);
    assert_eq!(ids(&locked), vec!["13"]);

    let done = filter_topic_bits(&catalog.bits, "security", &progress, TopicFilter::Completed, true);
    assert_eq!(ids(&done), vec!["22"]);

    let unread = filter_topic_bits(&catalog.bits, "security", &progress, TopicFilter::Unread, true);
    assert_eq!(unread.len(), 6);

    let counted = topic_progress(&catalog.bits, &progress, "security");
    assert_eq!((counted.completed, counted.total), (1, 7));
}

// ═══════════════════════════════════════════════════════════════════════
// Tracks
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_curated_tracks() {
    let catalog = seed();
    assert_eq!(TRACKS.len(), 3);

    let basics = find_track("networking-basics").unwrap();
    assert_eq!(ids(&resolve_bits(basics, &catalog.bits)), vec!["1", "21", "15"]);
    assert!(!basics.is_locked(false));

    let design = find_track("system-design-fundamentals").unwrap();
    assert!(design.is_locked(false));
    assert_eq!(design.prerequisites, vec!["networking-basics".to_string()]);
}

#[test]
fn test_resolve_skips_missing_bits() {
    let mut catalog = seed();
    catalog.bits.retain(|b| b.id != "21");
    let basics = find_track("networking-basics").unwrap();
    assert_eq!(ids(&resolve_bits(basics, &catalog.bits)), vec!["1", "15"]);
}

#[test]
fn test_track_progress_percent() {
    let mut progress = Progress::default();
    progress.mark_completed("1");

    let status = track_progress(find_track("networking-basics").unwrap(), &progress);
    assert_eq!((status.completed, status.total, status.percent), (1, 3, 33));

    progress.mark_completed("21");
    let status = track_progress(find_track("networking-basics").unwrap(), &progress);
    assert_eq!(status.percent, 67);
}

#[test]
fn test_derived_tracks_largest_first() {
    let catalog = seed();
    let tracks = derive_tracks(&catalog.bits);
    assert_eq!(tracks.len(), 7);
    assert_eq!(tracks[0].slug, "programming");
    assert_eq!(tracks[0].title, "Programming");
    assert_eq!(tracks[0].bits.len(), 47);
    assert_eq!(tracks.last().unwrap().title, "System Design");
}

// ═══════════════════════════════════════════════════════════════════════
// Feed
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_search_title_and_tags() {
    let catalog = seed();
    let hits = feed::filter_bits(&catalog.bits, "DOCKER", &FeedTab::All, &[]);
    assert_eq!(ids(&hits), vec!["4", "29", "56", "76", "99"]);
}

#[test]
fn test_tabs() {
    let catalog = seed();
    let trending = feed::filter_bits(&catalog.bits, "", &"trending".parse().unwrap(), &[]);
    assert_eq!(trending.len(), 100);
    assert!(trending.iter().all(|b| b.id != "1"));

    let saved = vec!["56".to_string(), "3".to_string()];
    let hits = feed::filter_bits(&catalog.bits, "", &FeedTab::Saved, &saved);
    assert_eq!(ids(&hits), vec!["3", "56"]);

    assert!(feed::filter_bits(&catalog.bits, "", &FeedTab::Tutorials, &[]).is_empty());

    let react = feed::filter_bits(&catalog.bits, "", &FeedTab::Tag("react".into()), &[]);
    assert_eq!(react.len(), 8);
}

#[test]
fn test_paginate() {
    let catalog = seed();
    let react = feed::filter_bits(&catalog.bits, "", &FeedTab::Tag("react".into()), &[]);

    let first = feed::paginate(&react, 0, ITEMS_PER_PAGE);
    assert_eq!((first.page, first.total_pages, first.items.len()), (1, 2, 6));

    let second = feed::paginate(&react, 2, ITEMS_PER_PAGE);
    assert_eq!(second.items.len(), 2);

    let beyond = feed::paginate(&react, 9, ITEMS_PER_PAGE);
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 8);
}

#[test]
fn test_top_categories() {
    let top = feed::top_categories(&seed().bits, TOP_CATEGORIES);
    assert_eq!(top.len(), 10);
    assert_eq!(&top[..2], &["python".to_string(), "database".to_string()]);
}

#[test]
fn test_featured_and_surprise() {
    let catalog = seed();
    assert_eq!(feed::featured(&catalog.bits).unwrap().id, "1");
    for _ in 0..20 {
        assert_eq!(feed::surprise(&catalog.bits).unwrap().access, Access::Free);
    }
    assert!(feed::surprise(&[]).is_none());
}
