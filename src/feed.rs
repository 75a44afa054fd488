//! List-view queries over the bit catalog: search, tabs, paging and tag
//! categories.

use std::convert::Infallible;
use std::str::FromStr;

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::content::{Access, Bit};

pub const ITEMS_PER_PAGE: usize = 6;
pub const TOP_CATEGORIES: usize = 10;

/// Bits with more votes than this show up under the trending tab.
pub const TRENDING_VOTES: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedTab {
    #[default]
    All,
    Trending,
    Saved,
    Tutorials,
    /// Any other tab name filters by tag or language.
    Tag(String),
}

impl FromStr for FeedTab {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "all" => FeedTab::All,
            "trending" => FeedTab::Trending,
            "saved" => FeedTab::Saved,
            "tutorials" => FeedTab::Tutorials,
            other => FeedTab::Tag(other.to_string()),
        })
    }
}

impl FeedTab {
    fn admits(&self, bit: &Bit, bookmarks: &[String]) -> bool {
        match self {
            FeedTab::All => true,
            FeedTab::Trending => bit.votes > TRENDING_VOTES,
            FeedTab::Saved => bookmarks.iter().any(|id| id == &bit.id),
            // Tutorials are listed by their own endpoint.
            FeedTab::Tutorials => false,
            FeedTab::Tag(tag) => bit.has_tag(tag) || bit.is_language(tag),
        }
    }
}

fn matches_search(bit: &Bit, needle: &str) -> bool {
    needle.is_empty()
        || bit.title.to_lowercase().contains(needle)
        || bit.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Bits matching the search term (title or tag substring, any case) and tab.
pub fn filter_bits<'a>(
    bits: &'a [Bit],
    search: &str,
    tab: &FeedTab,
    bookmarks: &[String],
) -> Vec<&'a Bit> {
    let needle = search.trim().to_lowercase();

    bits.iter()
        .filter(|b| matches_search(b, &needle))
        .filter(|b| tab.admits(b, bookmarks))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

/// Slices one 1-based page out of `items`. Page 0 reads as page 1 and pages
/// past the end come back empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let start = (page - 1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());

    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages: items.len().div_ceil(per_page),
        total: items.len(),
    }
}

/// Most used tags, most frequent first.
pub fn top_categories(bits: &[Bit], limit: usize) -> Vec<String> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for tag in bits.iter().flat_map(|b| b.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(limit)
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// The daily hero card.
pub fn featured(bits: &[Bit]) -> Option<&Bit> {
    bits.first()
}

/// A random free bit for the "surprise me" button.
pub fn surprise(bits: &[Bit]) -> Option<&Bit> {
    let free: Vec<&Bit> = bits.iter().filter(|b| b.access == Access::Free).collect();
    free.choose(&mut rand::thread_rng()).copied()
}
