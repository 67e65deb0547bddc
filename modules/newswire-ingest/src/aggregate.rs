//! Story Aggregate Manager — turns a decision into store writes and keeps
//! the Story invariants intact: `article_count` is recomputed from the
//! store after every mutation, and an insert racing another writer on the
//! same URL re-resolves as an update instead of failing.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use newswire_common::{Article, Candidate, Neighbor, NormalizedKey, Story};
use newswire_store::{ArticleStore, ArticleUpdate, InsertOutcome};

use crate::classify::ArticleLabel;
use crate::decision::ClusterDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedKind {
    Updated,
    Attached,
    Paired,
    Standalone,
}

/// What a decision amounted to once written. `inserted` distinguishes a
/// fresh row from a fold into an existing one.
#[derive(Debug, Clone)]
pub struct Applied {
    pub article_id: Uuid,
    pub story_id: Option<Uuid>,
    pub kind: AppliedKind,
    pub inserted: bool,
}

pub struct StoryWriter {
    store: Arc<dyn ArticleStore>,
}

impl StoryWriter {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn apply(
        &self,
        candidate: &Candidate,
        key: &NormalizedKey,
        embedding: Option<Vec<f32>>,
        label: &ArticleLabel,
        decision: ClusterDecision,
    ) -> Result<Applied> {
        match decision {
            ClusterDecision::UpdateExisting { article_id } => {
                self.store
                    .update_article(article_id, &article_update(candidate, key, embedding))
                    .await?;
                debug!(url = %key.url, %article_id, "folded into existing article");
                Ok(Applied {
                    article_id,
                    story_id: None,
                    kind: AppliedKind::Updated,
                    inserted: false,
                })
            }

            ClusterDecision::CreateStandalone => {
                let article = new_article(candidate, key, embedding.clone(), None);
                match self.store.insert_article(&article).await? {
                    InsertOutcome::Inserted => {
                        let story_id = self.create_single_story(&article, label).await?;
                        debug!(url = %key.url, %story_id, "created standalone story");
                        Ok(Applied {
                            article_id: article.id,
                            story_id: Some(story_id),
                            kind: AppliedKind::Standalone,
                            inserted: true,
                        })
                    }
                    InsertOutcome::Conflict(existing) => {
                        self.reresolve_as_update(candidate, key, embedding, &existing)
                            .await
                    }
                }
            }

            ClusterDecision::AttachToStory { story_id } => {
                let article = new_article(candidate, key, embedding.clone(), Some(story_id));
                match self.store.insert_article(&article).await? {
                    InsertOutcome::Inserted => {
                        self.refresh_story(story_id).await?;
                        info!(url = %key.url, %story_id, "attached to tracked story");
                        Ok(Applied {
                            article_id: article.id,
                            story_id: Some(story_id),
                            kind: AppliedKind::Attached,
                            inserted: true,
                        })
                    }
                    InsertOutcome::Conflict(existing) => {
                        self.reresolve_as_update(candidate, key, embedding, &existing)
                            .await
                    }
                }
            }

            ClusterDecision::CreateStoryFromPair { neighbor } => {
                let article = new_article(candidate, key, embedding.clone(), None);
                match self.store.insert_article(&article).await? {
                    InsertOutcome::Inserted => {
                        let story_id = self.create_pair_story(&article, &neighbor, label).await?;
                        info!(
                            url = %key.url,
                            paired_with = %neighbor.url,
                            %story_id,
                            "created story from pair"
                        );
                        Ok(Applied {
                            article_id: article.id,
                            story_id: Some(story_id),
                            kind: AppliedKind::Paired,
                            inserted: true,
                        })
                    }
                    InsertOutcome::Conflict(existing) => {
                        self.reresolve_as_update(candidate, key, embedding, &existing)
                            .await
                    }
                }
            }
        }
    }

    /// A concurrent writer inserted this URL between our decision and our
    /// write. Treat the candidate as a republication of that row; its
    /// existing story membership is left alone.
    async fn reresolve_as_update(
        &self,
        candidate: &Candidate,
        key: &NormalizedKey,
        embedding: Option<Vec<f32>>,
        existing: &Article,
    ) -> Result<Applied> {
        info!(url = %key.url, "insert conflicted, re-resolving as update");
        self.store
            .update_article(existing.id, &article_update(candidate, key, embedding))
            .await?;
        Ok(Applied {
            article_id: existing.id,
            story_id: existing.story_id,
            kind: AppliedKind::Updated,
            inserted: false,
        })
    }

    /// Every committed article belongs to a story; an unmatched one gets
    /// its own, named and illustrated by itself. Later coverage attaches
    /// to this story through the story-bearing neighbor preference.
    async fn create_single_story(&self, article: &Article, label: &ArticleLabel) -> Result<Uuid> {
        let story = Story {
            id: Uuid::new_v4(),
            title: article.title.clone(),
            image_url: article.image_url.clone(),
            category: label.category,
            article_count: 0,
            updated_at: Utc::now(),
        };
        self.store.insert_story(&story).await?;
        self.store.set_story(article.id, story.id).await?;
        self.refresh_story(story.id).await?;
        Ok(story.id)
    }

    async fn create_pair_story(
        &self,
        article: &Article,
        neighbor: &Neighbor,
        label: &ArticleLabel,
    ) -> Result<Uuid> {
        // Representative title and image come from the earlier-published
        // member, with URL as the tie-break, so the pick is independent of
        // which member arrived first.
        let neighbor_leads = (neighbor.published_at, neighbor.url.as_str())
            < (article.published_at, article.url.as_str());
        let (title, image_url) = if neighbor_leads {
            (neighbor.title.clone(), neighbor.image_url.clone())
        } else {
            (article.title.clone(), article.image_url.clone())
        };

        let story = Story {
            id: Uuid::new_v4(),
            title,
            image_url,
            category: label.category,
            article_count: 0,
            updated_at: Utc::now(),
        };
        self.store.insert_story(&story).await?;
        self.store.set_story(article.id, story.id).await?;
        self.store.set_story(neighbor.article_id, story.id).await?;
        self.refresh_story(story.id).await?;
        Ok(story.id)
    }

    /// Recomputes `article_count` from the store instead of incrementing,
    /// so a retried or conflicting write cannot drift the count.
    async fn refresh_story(&self, story_id: Uuid) -> Result<()> {
        let count = self.store.count_story_articles(story_id).await?;
        self.store.update_story(story_id, count, Utc::now()).await
    }
}

fn new_article(
    candidate: &Candidate,
    key: &NormalizedKey,
    embedding: Option<Vec<f32>>,
    story_id: Option<Uuid>,
) -> Article {
    Article {
        id: Uuid::new_v4(),
        url: key.url.clone(),
        source_id: candidate.source_id,
        title: candidate.title.clone(),
        title_key: key.title_key.clone(),
        excerpt: candidate.excerpt.clone(),
        embedding,
        published_at: candidate.published_at,
        story_id,
        image_url: candidate.image_url.clone(),
    }
}

fn article_update(
    candidate: &Candidate,
    key: &NormalizedKey,
    embedding: Option<Vec<f32>>,
) -> ArticleUpdate {
    ArticleUpdate {
        title: candidate.title.clone(),
        title_key: key.title_key.clone(),
        excerpt: candidate.excerpt.clone(),
        image_url: candidate.image_url.clone(),
        published_at: candidate.published_at,
        embedding,
    }
}
