//! Blog entries and their published ordering.
//!
//! One [`Entry`] is recorded per content file during the walk, in walk order.
//! Afterwards [`order`] sorts them newest-first by creation time, and
//! [`latest`] takes the front window used for the index page and the feed.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::path::PathBuf;

/// A single blog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// Source file path.
    pub path: PathBuf,
    /// Text of the source's `<title>`, possibly empty.
    pub title: String,
    /// Site-absolute URL, e.g. `/posts/a`.
    pub url: String,
    pub created: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
    /// Rendered `<body>` fragment. Only filled for views that show bodies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Sort newest-first by creation time.
///
/// The sort is stable, so entries created at the same instant keep their walk
/// order.
pub fn order(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| b.created.cmp(&a.created));
    entries
}

/// The first `n` entries of an ordered list, or all of them if there are
/// fewer than `n`.
pub fn latest(entries: &[Entry], n: usize) -> &[Entry] {
    &entries[..n.min(entries.len())]
}

/// The site-wide "last updated" time exposed to templates.
///
/// This is the updated time of the most recently *created* entry, not the
/// maximum updated time over all entries: an edit to an older entry does not
/// move it.
pub fn site_updated(ordered: &[Entry]) -> Option<DateTime<FixedOffset>> {
    ordered.first().map(|entry| entry.updated)
}
