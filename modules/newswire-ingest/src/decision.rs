//! Decision Engine — the pure core of entity resolution. Given everything
//! the resolver could learn about a candidate, pick exactly one outcome.
//! No I/O happens here, which is what keeps the rule table testable.

use chrono::Duration;
use newswire_common::{Article, Candidate, ClusterConfig, Neighbor};
use uuid::Uuid;

/// One of the four mutually exclusive outcomes for a candidate, evaluated
/// in fixed priority order: identity, then same-source republication, then
/// cross-outlet coverage, then standalone.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterDecision {
    /// The candidate is a newer rendition of an article we already hold.
    UpdateExisting { article_id: Uuid },
    /// The candidate is fresh coverage of an already tracked story.
    AttachToStory { story_id: Uuid },
    /// The candidate and a storyless prior article cover the same event;
    /// found a new story around the pair.
    CreateStoryFromPair { neighbor: Neighbor },
    /// Nothing we hold resembles the candidate.
    CreateStandalone,
}

pub fn decide(
    candidate: &Candidate,
    exact_match: Option<&Article>,
    title_match: Option<&Article>,
    neighbors: &[Neighbor],
    config: &ClusterConfig,
) -> ClusterDecision {
    // Rule 1: identical normalized URL is the same article, full stop.
    if let Some(existing) = exact_match {
        return ClusterDecision::UpdateExisting {
            article_id: existing.id,
        };
    }

    // Rule 2: same outlet re-publishing the same piece. Two detectors, in
    // order: a near-identical embedding from the same source inside the
    // republication window, or (when embeddings are unavailable) an exact
    // title-key match the store already scoped to source and window.
    if let Some(dup) = same_source_duplicate(candidate, neighbors, config) {
        return ClusterDecision::UpdateExisting {
            article_id: dup.article_id,
        };
    }
    if let Some(existing) = title_match {
        return ClusterDecision::UpdateExisting {
            article_id: existing.id,
        };
    }

    // Rule 3: topically close coverage from anywhere.
    if let Some(neighbor) = pick_topical_neighbor(neighbors, config) {
        return match neighbor.story_id {
            Some(story_id) => ClusterDecision::AttachToStory { story_id },
            None => ClusterDecision::CreateStoryFromPair {
                neighbor: neighbor.clone(),
            },
        };
    }

    ClusterDecision::CreateStandalone
}

fn same_source_duplicate<'a>(
    candidate: &Candidate,
    neighbors: &'a [Neighbor],
    config: &ClusterConfig,
) -> Option<&'a Neighbor> {
    neighbors.iter().find(|n| {
        n.source_id == candidate.source_id
            && n.similarity > config.same_source_threshold
            && within_window(candidate, n, config.same_source_window)
    })
}

fn within_window(candidate: &Candidate, neighbor: &Neighbor, window: Duration) -> bool {
    (candidate.published_at - neighbor.published_at).abs() <= window
}

/// Among neighbors above the story threshold, prefer the most similar one
/// that already belongs to a story; only when none does, fall back to the
/// most similar storyless neighbor. Callers get the neighbor that anchors
/// either an attach or a pair.
pub fn pick_topical_neighbor<'a>(
    neighbors: &'a [Neighbor],
    config: &ClusterConfig,
) -> Option<&'a Neighbor> {
    let eligible = neighbors
        .iter()
        .filter(|n| n.similarity > config.same_story_threshold);

    let best_tracked = eligible
        .clone()
        .filter(|n| n.story_id.is_some())
        .max_by(|a, b| a.similarity.total_cmp(&b.similarity));

    best_tracked.or_else(|| eligible.max_by(|a, b| a.similarity.total_cmp(&b.similarity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candidate, neighbor, stored_article};
    use chrono::Duration;

    fn config() -> ClusterConfig {
        ClusterConfig::default()
    }

    #[test]
    fn exact_url_match_wins_over_everything() {
        let cand = candidate("Eldgos hafið", "https://a.example/eldgos");
        let existing = stored_article("Eldgos hafið", "https://a.example/eldgos");
        let tracked = neighbor(0.99, Some(Uuid::new_v4()), Uuid::new_v4());
        let verdict = decide(&cand, Some(&existing), None, &[tracked], &config());
        assert_eq!(
            verdict,
            ClusterDecision::UpdateExisting {
                article_id: existing.id
            }
        );
    }

    #[test]
    fn same_source_near_duplicate_is_an_update() {
        let cand = candidate("Eldgos hafið á ný", "https://a.example/eldgos-2");
        let dup = neighbor(0.97, None, cand.source_id);
        let verdict = decide(&cand, None, None, &[dup.clone()], &config());
        assert_eq!(
            verdict,
            ClusterDecision::UpdateExisting {
                article_id: dup.article_id
            }
        );
    }

    #[test]
    fn same_source_similarity_at_threshold_is_not_a_duplicate() {
        let cand = candidate("Eldgos", "https://a.example/1");
        let near = neighbor(config().same_source_threshold, None, cand.source_id);
        let verdict = decide(&cand, None, None, &[near.clone()], &config());
        assert_eq!(
            verdict,
            ClusterDecision::CreateStoryFromPair { neighbor: near }
        );
    }

    #[test]
    fn cross_source_near_duplicate_clusters_instead_of_updating() {
        let cand = candidate("Eldgos hafið", "https://a.example/1");
        let other_outlet = neighbor(0.97, None, Uuid::new_v4());
        let verdict = decide(&cand, None, None, &[other_outlet.clone()], &config());
        assert_eq!(
            verdict,
            ClusterDecision::CreateStoryFromPair {
                neighbor: other_outlet
            }
        );
    }

    #[test]
    fn same_source_duplicate_outside_window_falls_through() {
        let cand = candidate("Árleg skýrsla", "https://a.example/2026");
        let mut old = neighbor(0.97, None, cand.source_id);
        old.published_at = cand.published_at - Duration::hours(49);
        let verdict = decide(&cand, None, None, &[old.clone()], &config());
        assert_eq!(verdict, ClusterDecision::CreateStoryFromPair { neighbor: old });
    }

    #[test]
    fn title_match_updates_when_embeddings_are_missing() {
        let cand = candidate("Eldgos hafið | RÚV", "https://a.example/eldgos-b");
        let prior = stored_article("Eldgos hafið", "https://a.example/eldgos-a");
        let verdict = decide(&cand, None, Some(&prior), &[], &config());
        assert_eq!(
            verdict,
            ClusterDecision::UpdateExisting {
                article_id: prior.id
            }
        );
    }

    #[test]
    fn tracked_neighbor_attaches_to_its_story() {
        let cand = candidate("Gosið séð frá Grindavík", "https://b.example/1");
        let story_id = Uuid::new_v4();
        let tracked = neighbor(0.86, Some(story_id), Uuid::new_v4());
        let verdict = decide(&cand, None, None, &[tracked], &config());
        assert_eq!(verdict, ClusterDecision::AttachToStory { story_id });
    }

    #[test]
    fn tracked_neighbor_preferred_over_more_similar_storyless_one() {
        let cand = candidate("Gosið", "https://b.example/2");
        let story_id = Uuid::new_v4();
        let storyless = neighbor(0.92, None, Uuid::new_v4());
        let tracked = neighbor(0.85, Some(story_id), Uuid::new_v4());
        let verdict = decide(&cand, None, None, &[storyless, tracked], &config());
        assert_eq!(verdict, ClusterDecision::AttachToStory { story_id });
    }

    #[test]
    fn storyless_neighbor_seeds_a_new_story() {
        let cand = candidate("Gosið", "https://b.example/3");
        let storyless = neighbor(0.85, None, Uuid::new_v4());
        let verdict = decide(&cand, None, None, &[storyless.clone()], &config());
        assert_eq!(
            verdict,
            ClusterDecision::CreateStoryFromPair { neighbor: storyless }
        );
    }

    #[test]
    fn similarity_at_story_threshold_stays_standalone() {
        let cand = candidate("Gosið", "https://b.example/4");
        let near = neighbor(config().same_story_threshold, None, Uuid::new_v4());
        let verdict = decide(&cand, None, None, &[near], &config());
        assert_eq!(verdict, ClusterDecision::CreateStandalone);
    }

    #[test]
    fn no_neighbors_means_standalone() {
        let cand = candidate("Einstök frétt", "https://c.example/1");
        let verdict = decide(&cand, None, None, &[], &config());
        assert_eq!(verdict, ClusterDecision::CreateStandalone);
    }

    #[test]
    fn weak_neighbors_mean_standalone() {
        let cand = candidate("Einstök frétt", "https://c.example/2");
        let weak = neighbor(0.50, Some(Uuid::new_v4()), Uuid::new_v4());
        let verdict = decide(&cand, None, None, &[weak], &config());
        assert_eq!(verdict, ClusterDecision::CreateStandalone);
    }

    #[test]
    fn pick_topical_neighbor_ignores_sub_threshold_tracked_neighbors() {
        let tracked_weak = neighbor(0.70, Some(Uuid::new_v4()), Uuid::new_v4());
        let storyless_strong = neighbor(0.85, None, Uuid::new_v4());
        let neighbors = [tracked_weak, storyless_strong.clone()];
        let picked = pick_topical_neighbor(&neighbors, &config()).unwrap();
        assert_eq!(picked.article_id, storyless_strong.article_id);
    }

    #[test]
    fn window_comparison_is_symmetric_in_time() {
        // A backfilled candidate published before its duplicate still folds.
        let mut cand = candidate("Eldgos", "https://a.example/backfill");
        let dup = neighbor(0.97, None, cand.source_id);
        cand.published_at = dup.published_at - Duration::hours(2);
        let verdict = decide(&cand, None, None, &[dup.clone()], &config());
        assert_eq!(
            verdict,
            ClusterDecision::UpdateExisting {
                article_id: dup.article_id
            }
        );
    }
}
