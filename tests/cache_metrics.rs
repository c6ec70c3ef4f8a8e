mod support;

use std::collections::HashSet;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use yatube::cache::{
    CacheConfig, FragmentCache, FragmentKey, METRIC_FRAGMENT_EVICT, METRIC_FRAGMENT_HIT,
    METRIC_FRAGMENT_MISS,
};

use support::{body_text, post_cards, test_app};

#[tokio::test]
async fn fragment_cache_emits_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Hit and miss through the home page.
    let app = test_app();
    let author = app.author("leo").await;
    app.post(&author, "metrics test post", None).await;
    for _ in 0..2 {
        let html = body_text(app.get("/", None).await).await;
        assert_eq!(post_cards(&html), 1);
    }

    // Eviction needs a cache smaller than the working set.
    let small = FragmentCache::new(CacheConfig {
        max_entries: 1,
        ..Default::default()
    });
    small.put(FragmentKey::index_page(1), "one".to_string(), Duration::from_secs(20));
    small.put(FragmentKey::index_page(2), "two".to_string(), Duration::from_secs(20));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [METRIC_FRAGMENT_HIT, METRIC_FRAGMENT_MISS, METRIC_FRAGMENT_EVICT] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
