//! Feed adapter: RSS/Atom to `Candidate`. Parsing is pure and separately
//! testable; fetching wraps it with HTTP and source registration, and a
//! broken feed is skipped with a warning rather than failing the run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use tracing::{info, warn};
use uuid::Uuid;

use newswire_common::Candidate;
use newswire_store::ArticleStore;

/// Upper bound on stored excerpt length, in characters.
const EXCERPT_MAX_CHARS: usize = 300;

pub fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    feed_rs::parser::parse(bytes).context("unparseable feed document")
}

/// Outlet name shown in logs and stored on the source row. Falls back to
/// the feed URL when the document carries no title.
pub fn feed_source_name(feed: &Feed, feed_url: &str) -> String {
    feed.title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| feed_url.to_string())
}

/// Entries without a title or link carry nothing to resolve against and
/// are dropped here. Entries without a timestamp get `now` so ordering in
/// the batch stays defined.
pub fn candidates_from_feed(feed: &Feed, source_id: Uuid, now: DateTime<Utc>) -> Vec<Candidate> {
    feed.entries
        .iter()
        .filter_map(|entry| candidate_from_entry(entry, source_id, now))
        .collect()
}

fn candidate_from_entry(entry: &Entry, source_id: Uuid, now: DateTime<Utc>) -> Option<Candidate> {
    let title = entry.title.as_ref()?.content.trim().to_string();
    let url = entry.links.first()?.href.clone();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let excerpt = entry
        .summary
        .as_ref()
        .map(|s| truncate_chars(s.content.trim(), EXCERPT_MAX_CHARS))
        .unwrap_or_default();

    Some(Candidate {
        title,
        url,
        published_at: entry.published.or(entry.updated).unwrap_or(now),
        source_id,
        excerpt,
        image_url: entry_image(entry),
    })
}

fn entry_image(entry: &Entry) -> Option<String> {
    for media in &entry.media {
        if let Some(content) = media.content.iter().find_map(|c| c.url.as_ref()) {
            return Some(content.to_string());
        }
        if let Some(thumbnail) = media.thumbnails.first() {
            return Some(thumbnail.image.uri.clone());
        }
    }
    None
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

/// Pulls every configured feed and flattens the results into one batch.
/// Per-feed failures are logged and skipped.
pub async fn fetch_candidates(
    http: &reqwest::Client,
    store: &dyn ArticleStore,
    feed_urls: &[String],
) -> Result<Vec<Candidate>> {
    let now = Utc::now();
    let mut candidates = Vec::new();

    for feed_url in feed_urls {
        match fetch_one(http, store, feed_url, now).await {
            Ok(mut batch) => {
                info!(feed_url, entries = batch.len(), "fetched feed");
                candidates.append(&mut batch);
            }
            Err(e) => {
                warn!(feed_url, error = %e, "skipping feed");
            }
        }
    }

    Ok(candidates)
}

async fn fetch_one(
    http: &reqwest::Client,
    store: &dyn ArticleStore,
    feed_url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Candidate>> {
    let response = http.get(feed_url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    let feed = parse_feed(&bytes)?;
    let source = store
        .ensure_source(&feed_source_name(&feed, feed_url), feed_url)
        .await?;
    Ok(candidates_from_feed(&feed, source.id, now))
}
