//! End-to-end pipeline runs over the in-memory store with deterministic
//! embeddings. Vectors are unit-length so cosine similarities are exact:
//! (1, 0) vs (0.96, 0.28) is 0.96, vs (0.8, 0.6) is 0.8, and vs
//! (0.5, 0.8660254) is 0.5.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use uuid::Uuid;

use newswire_common::{Candidate, ClusterConfig};
use newswire_ingest::testing::{
    base_time, candidate_at, stored_article, stored_article_with_embedding, StubClassifier,
    StubEmbedder,
};
use newswire_ingest::IngestPipeline;
use newswire_store::{ArticleStore, MemoryStore};

fn pipeline(store: Arc<MemoryStore>, embedder: StubEmbedder) -> IngestPipeline {
    IngestPipeline::new(
        store,
        Arc::new(embedder),
        Arc::new(StubClassifier::other()),
        ClusterConfig::default(),
    )
}

fn from_source(mut candidate: Candidate, source_id: Uuid) -> Candidate {
    candidate.source_id = source_id;
    candidate
}

#[tokio::test]
async fn tracking_params_fold_republications_into_one_article() {
    let store = Arc::new(MemoryStore::new());
    let source = Uuid::new_v4();
    let p = pipeline(store.clone(), StubEmbedder::new());

    let first = from_source(
        candidate_at("Eldgos hafið", "https://a.example/gos?utm_source=rss", base_time()),
        source,
    );
    let stats = p.run(vec![first]).await.unwrap();
    assert_eq!(stats.standalone, 1);

    let second = from_source(
        candidate_at(
            "Eldgos hafið - uppfært",
            "https://a.example/gos?utm_source=frontpage",
            base_time() + ChronoDuration::hours(1),
        ),
        source,
    );
    let stats = p.run(vec![second]).await.unwrap();
    assert_eq!(stats.updated, 1);

    let articles = store.articles();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Eldgos hafið - uppfært");
}

#[tokio::test]
async fn rerunning_the_same_batch_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(
        store.clone(),
        StubEmbedder::new().with_vector("Eldgos", vec![1.0, 0.0]),
    );
    let batch = vec![candidate_at("Eldgos hafið", "https://a.example/gos", base_time())];

    let first = p.run(batch.clone()).await.unwrap();
    assert_eq!(first.standalone, 1);

    let second = p.run(batch).await.unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(second.applied(), 1);
    assert_eq!(store.articles().len(), 1);

    let stories = store.stories();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].article_count, 1);
}

#[tokio::test]
async fn same_source_rewrite_updates_instead_of_clustering() {
    let store = Arc::new(MemoryStore::new());
    let source = Uuid::new_v4();
    let embedder = StubEmbedder::new()
        .with_vector("Eldgos hafið", vec![1.0, 0.0])
        .with_vector("Gossprunga", vec![0.96, 0.28]);
    let p = pipeline(store.clone(), embedder);

    let original = from_source(
        candidate_at("Eldgos hafið", "https://a.example/1", base_time()),
        source,
    );
    p.run(vec![original]).await.unwrap();

    let rewrite = from_source(
        candidate_at(
            "Gossprunga opnast norðan Grindavíkur",
            "https://a.example/2",
            base_time() + ChronoDuration::hours(2),
        ),
        source,
    );
    let stats = p.run(vec![rewrite]).await.unwrap();

    assert_eq!(stats.updated, 1);
    assert_eq!(store.articles().len(), 1);
    // Still the original's own story; the rewrite spawned nothing new.
    let stories = store.stories();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].article_count, 1);
}

#[tokio::test]
async fn cross_outlet_coverage_joins_the_first_outlets_story() {
    let store = Arc::new(MemoryStore::new());
    let embedder = StubEmbedder::new()
        .with_vector("fyrsta umfjöllun", vec![1.0, 0.0])
        .with_vector("önnur umfjöllun", vec![0.96, 0.28])
        .with_vector("þriðja umfjöllun", vec![1.0, 0.0]);
    let p = pipeline(store.clone(), embedder);

    // Two outlets cover the same event in one batch; the second finds the
    // first's story through the batch-local cache and attaches.
    let stats = p
        .run(vec![
            candidate_at("fyrsta umfjöllun", "https://a.example/1", base_time()),
            candidate_at(
                "önnur umfjöllun",
                "https://b.example/1",
                base_time() + ChronoDuration::minutes(10),
            ),
        ])
        .await
        .unwrap();
    assert_eq!(stats.standalone, 1);
    assert_eq!(stats.attached, 1);

    let stories = store.stories();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].article_count, 2);
    assert_eq!(stories[0].title, "fyrsta umfjöllun");

    // A third outlet arrives later and attaches to the tracked story.
    let stats = p
        .run(vec![candidate_at(
            "þriðja umfjöllun",
            "https://c.example/1",
            base_time() + ChronoDuration::hours(1),
        )])
        .await
        .unwrap();
    assert_eq!(stats.attached, 1);

    let story = store.story(stories[0].id).unwrap();
    assert_eq!(story.article_count, 3);
    let member_count = store
        .articles()
        .iter()
        .filter(|a| a.story_id == Some(story.id))
        .count();
    assert_eq!(member_count as i64, story.article_count);
}

#[tokio::test]
async fn unrelated_article_stays_standalone() {
    let store = Arc::new(MemoryStore::new());
    let embedder = StubEmbedder::new()
        .with_vector("Eldgos", vec![1.0, 0.0])
        .with_vector("Handboltalandsliðið", vec![0.5, 0.866_025_4]);
    let p = pipeline(store.clone(), embedder);

    p.run(vec![candidate_at("Eldgos hafið", "https://a.example/1", base_time())])
        .await
        .unwrap();
    let stats = p
        .run(vec![candidate_at(
            "Handboltalandsliðið vann",
            "https://b.example/1",
            base_time() + ChronoDuration::hours(1),
        )])
        .await
        .unwrap();

    assert_eq!(stats.standalone, 1);
    assert_eq!(store.articles().len(), 2);
    // Two separate single-article stories, nothing merged.
    let stories = store.stories();
    assert_eq!(stories.len(), 2);
    assert!(stories.iter().all(|s| s.article_count == 1));
}

#[tokio::test]
async fn legacy_storyless_article_pairs_into_a_new_story() {
    let store = Arc::new(MemoryStore::new());
    // A row from before story tracking: committed, embedded, no story.
    let legacy =
        stored_article_with_embedding("Eldgos hafið", "https://a.example/1", vec![1.0, 0.0]);
    store.insert_article(&legacy).await.unwrap();

    let embedder = StubEmbedder::new().with_vector("önnur umfjöllun", vec![0.96, 0.28]);
    let p = pipeline(store.clone(), embedder);

    let stats = p
        .run(vec![candidate_at(
            "önnur umfjöllun af gosinu",
            "https://b.example/1",
            base_time() + ChronoDuration::minutes(10),
        )])
        .await
        .unwrap();
    assert_eq!(stats.paired, 1);

    let stories = store.stories();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].article_count, 2);
    // Named after the earlier-published member.
    assert_eq!(stories[0].title, "Eldgos hafið");
    assert_eq!(store.article(legacy.id).unwrap().story_id, Some(stories[0].id));
}

#[tokio::test]
async fn candidate_without_embedding_resolves_on_keys_alone() {
    let store = Arc::new(MemoryStore::new());
    let source = Uuid::new_v4();
    // The stub returns an empty vector for unregistered text.
    let p = pipeline(store.clone(), StubEmbedder::new());

    let first = from_source(
        candidate_at("Eldgos hafið | RÚV", "https://a.example/1", base_time()),
        source,
    );
    p.run(vec![first]).await.unwrap();

    // Same outlet, same title key, new URL: the title guard folds it.
    let second = from_source(
        candidate_at(
            "Eldgos hafið",
            "https://a.example/1-endurbirt",
            base_time() + ChronoDuration::hours(1),
        ),
        source,
    );
    let stats = p.run(vec![second]).await.unwrap();

    assert_eq!(stats.updated, 1);
    assert_eq!(store.articles().len(), 1);
}

#[tokio::test]
async fn story_representative_ignores_ingestion_order() {
    let early = candidate_at("Fyrri fréttin", "https://a.example/1", base_time());
    let late = candidate_at(
        "Seinni fréttin",
        "https://b.example/1",
        base_time() + ChronoDuration::hours(1),
    );

    for batch in [vec![early.clone(), late.clone()], vec![late.clone(), early.clone()]] {
        let store = Arc::new(MemoryStore::new());
        let embedder = StubEmbedder::new()
            .with_vector("Fyrri", vec![1.0, 0.0])
            .with_vector("Seinni", vec![0.96, 0.28]);
        let p = pipeline(store.clone(), embedder);

        p.run(batch).await.unwrap();

        let stories = store.stories();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Fyrri fréttin");
    }
}

#[tokio::test]
async fn duplicate_urls_within_a_batch_resolve_once() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone(), StubEmbedder::new());

    let stats = p
        .run(vec![
            candidate_at("Eldgos hafið", "https://a.example/gos?utm=1", base_time()),
            candidate_at(
                "Eldgos hafið",
                "https://a.example/gos?utm=2",
                base_time() + ChronoDuration::minutes(5),
            ),
        ])
        .await
        .unwrap();

    assert_eq!(stats.skipped_in_batch, 1);
    assert_eq!(stats.applied(), 1);
    assert_eq!(store.articles().len(), 1);
}

#[tokio::test]
async fn empty_url_is_rejected_up_front() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone(), StubEmbedder::new());

    let stats = p
        .run(vec![candidate_at("Frétt án hlekkjar", "   ", base_time())])
        .await
        .unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.applied(), 0);
    assert!(store.articles().is_empty());
}

#[tokio::test]
async fn embed_failure_degrades_instead_of_failing_the_run() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone(), StubEmbedder::new().failing_on("Eldgos"));

    let stats = p
        .run(vec![candidate_at("Eldgos hafið", "https://a.example/1", base_time())])
        .await
        .unwrap();

    assert_eq!(stats.degraded, 1);
    assert_eq!(stats.standalone, 1);
    assert_eq!(store.articles().len(), 1);
    assert!(store.articles()[0].embedding.is_none());
}

#[tokio::test]
async fn expired_deadline_defers_the_whole_batch() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone(), StubEmbedder::new()).with_deadline(Duration::ZERO);

    let stats = p
        .run(vec![
            candidate_at("Fyrsta", "https://a.example/1", base_time()),
            candidate_at("Önnur", "https://b.example/1", base_time()),
        ])
        .await
        .unwrap();

    assert_eq!(stats.deferred, 2);
    assert_eq!(stats.applied(), 0);
    assert!(store.articles().is_empty());
}

#[tokio::test]
async fn near_threshold_similarity_does_not_cluster() {
    let store = Arc::new(MemoryStore::new());
    // Exactly 0.8 against (1, 0): at the story threshold, not above it.
    let embedder = StubEmbedder::new()
        .with_vector("Eldgos", vec![1.0, 0.0])
        .with_vector("Jarðhræringar", vec![0.8, 0.6]);
    let p = pipeline(store.clone(), embedder);

    p.run(vec![candidate_at("Eldgos hafið", "https://a.example/1", base_time())])
        .await
        .unwrap();
    let stats = p
        .run(vec![candidate_at(
            "Jarðhræringar á skaganum",
            "https://b.example/1",
            base_time() + ChronoDuration::hours(1),
        )])
        .await
        .unwrap();

    assert_eq!(stats.standalone, 1);
    // Two single-article stories; no cluster formed at the boundary.
    assert_eq!(store.stories().len(), 2);
}

#[tokio::test]
async fn future_dated_same_title_does_not_fold() {
    let store = Arc::new(MemoryStore::new());
    // A scheduled piece dated far ahead, same outlet and headline.
    let mut scheduled = stored_article("Eldgos hafið", "https://a.example/scheduled");
    scheduled.published_at = base_time() + ChronoDuration::hours(100);
    store.insert_article(&scheduled).await.unwrap();

    let p = pipeline(store.clone(), StubEmbedder::new());
    let live = from_source(
        candidate_at("Eldgos hafið", "https://a.example/live", base_time()),
        scheduled.source_id,
    );
    let stats = p.run(vec![live]).await.unwrap();

    // 100 h exceeds the republication window in either direction.
    assert_eq!(stats.standalone, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(store.articles().len(), 2);
}
