//! Category assignment for new stories: a cheap ordered keyword pass
//! first, the remote classifier only when no rule fires. Classification
//! failures degrade to `Other` rather than failing ingestion.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use intel_client::ClassifyApi;
use newswire_common::Category;

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleLabel {
    pub category: Category,
    /// Editorial weight in [0, 1]; keyword rules assign a flat 0.5.
    pub importance: f32,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn label(&self, title: &str, excerpt: &str) -> ArticleLabel;
}

struct CategoryRule {
    category: Category,
    keywords: &'static [&'static str],
}

/// Checked in order; first hit wins. Keywords are matched case-insensitively
/// against title and excerpt.
const RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::Sports,
        keywords: &[
            "fótbolti", "handbolti", "körfubolti", "landsliðið", "úrslit",
            "deildin", "mótið", "leikmaður", "football", "match",
        ],
    },
    CategoryRule {
        category: Category::Business,
        keywords: &[
            "hlutabréf", "kauphöll", "verðbólga", "vextir", "seðlabankinn",
            "hagnaður", "gjaldþrot", "stock", "inflation",
        ],
    },
    CategoryRule {
        category: Category::Tech,
        keywords: &[
            "gervigreind", "tölvuleikur", "netöryggi", "hugbúnaður",
            "software", "startup",
        ],
    },
    CategoryRule {
        category: Category::Culture,
        keywords: &[
            "tónleikar", "kvikmynd", "bókmenntir", "listasafn", "leikhús",
            "festival",
        ],
    },
];

fn keyword_category(title: &str, excerpt: &str) -> Option<Category> {
    let haystack = format!("{} {}", title, excerpt).to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw)))
        .map(|rule| rule.category)
}

/// Keyword rules backed by the remote classifier.
pub struct RuleChainClassifier {
    remote: Option<Arc<dyn ClassifyApi>>,
}

impl RuleChainClassifier {
    pub fn new(remote: Arc<dyn ClassifyApi>) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    /// Rules only; anything they miss becomes `Other`.
    pub fn rules_only() -> Self {
        Self { remote: None }
    }

    async fn remote_label(&self, title: &str, excerpt: &str) -> Result<ArticleLabel> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no remote classifier configured"))?;
        let classification = remote.classify(title, excerpt).await?;
        Ok(ArticleLabel {
            category: classification.category.parse().unwrap_or(Category::Other),
            importance: classification.importance.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl Classifier for RuleChainClassifier {
    async fn label(&self, title: &str, excerpt: &str) -> ArticleLabel {
        if let Some(category) = keyword_category(title, excerpt) {
            return ArticleLabel {
                category,
                importance: 0.5,
            };
        }
        if self.remote.is_some() {
            match self.remote_label(title, excerpt).await {
                Ok(label) => return label,
                Err(e) => {
                    warn!(title, error = %e, "classification failed, defaulting to other");
                }
            }
        }
        ArticleLabel {
            category: Category::Other,
            importance: 0.5,
        }
    }
}
