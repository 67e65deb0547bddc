use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

/// Broad topic label attached to a story. Assigned once at story creation
/// (keyword rules first, remote classifier as fallback) and used by the
/// presentation layer to filter the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Domestic,
    World,
    Business,
    Sports,
    Culture,
    Tech,
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Domestic => write!(f, "domestic"),
            Category::World => write!(f, "world"),
            Category::Business => write!(f, "business"),
            Category::Sports => write!(f, "sports"),
            Category::Culture => write!(f, "culture"),
            Category::Tech => write!(f, "tech"),
            Category::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ();

    /// Lenient parse: unknown labels fold into `Other` so a classifier
    /// inventing a new label never breaks ingestion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "domestic" => Category::Domestic,
            "world" => Category::World,
            "business" => Category::Business,
            "sports" => Category::Sports,
            "culture" => Category::Culture,
            "tech" => Category::Tech,
            _ => Category::Other,
        })
    }
}

// --- Records ---

/// A not-yet-persisted observation pulled from a feed. Built once by the
/// feed adapter, consumed once by the pipeline, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_id: Uuid,
    pub excerpt: String,
    pub image_url: Option<String>,
}

/// Canonical comparison keys derived from a candidate: the URL identity key
/// (unique per stored article) and the title key used for the fast-path
/// exact-match short-circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedKey {
    pub url: String,
    pub title_key: String,
}

/// A persisted observation, one row per (source, normalized URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    /// Normalized URL, unique within the store.
    pub url: String,
    pub source_id: Uuid,
    pub title: String,
    pub title_key: String,
    pub excerpt: String,
    pub embedding: Option<Vec<f32>>,
    pub published_at: DateTime<Utc>,
    pub story_id: Option<Uuid>,
    pub image_url: Option<String>,
}

/// The cluster representing one real-world event, one-to-many with Article.
/// `article_count` is recomputed from the store after every mutation, never
/// incremented blindly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub category: Category,
    pub article_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// An upstream outlet, one row per feed URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub feed_url: String,
    pub created_at: DateTime<Utc>,
}

/// A similarity-search result with enough adjoining metadata for the
/// decision engine to avoid a second round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub article_id: Uuid,
    pub story_id: Option<Uuid>,
    pub source_id: Uuid,
    /// Normalized URL of the stored article, used to rule out self-matches.
    pub url: String,
    pub similarity: f64,
    pub title: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// A story with its attached articles, ordered for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryWithArticles {
    pub story: Story,
    pub articles: Vec<Article>,
}
