mod common;

use std::collections::HashMap;

use music_trends::model::{build_examples, ModelArtifact, MetricsRow};
use music_trends::network::Superspreader;
use music_trends::storage::{self, read_table};
use music_trends::types::{Comment, EngagementLabel, Post, PostSentiment, SentimentLabel};
use music_trends::Pipeline;

#[test]
fn three_post_scenario_labels() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path())).unwrap();
    let raw = vec![
        common::post("a", "Music", "u1", "\"Alpha\" by Someone", 500, 200),
        common::post("b", "Music", "u2", "\"Beta\" by Someone", 50, 10),
        common::post("c", "Music", "u3", "\"Gamma\" by Someone", 5, 1),
    ];

    let scored = pipeline.process_posts(raw).unwrap();
    // 0.7 * score + 0.3 * comments, no keywords
    let expected = [
        (410.0, EngagementLabel::Trending),
        (38.0, EngagementLabel::Stable),
        (3.8, EngagementLabel::Low),
    ];
    for (post, (score, label)) in scored.iter().zip(expected) {
        assert!((post.engagement_score.unwrap() - score).abs() < 1e-9);
        assert_eq!(post.engagement_label, Some(label));
    }

    let table: Vec<Post> = read_table(&pipeline.table(storage::TREND_DATASET)).unwrap();
    let labels: Vec<_> = table.iter().map(|p| p.engagement_label).collect();
    assert_eq!(
        labels,
        vec![
            Some(EngagementLabel::Trending),
            Some(EngagementLabel::Stable),
            Some(EngagementLabel::Low)
        ]
    );
    let cleaned: Vec<Post> = read_table(&pipeline.table(storage::CLEANED_POSTS)).unwrap();
    assert_eq!(cleaned[0].cleaned_text.as_deref(), Some("alpha by someone"));
}

#[test]
fn irrelevant_posts_leave_the_trend_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path())).unwrap();
    let raw = vec![
        common::post("a", "Music", "u1", "\"Alpha\" by Someone", 10, 1),
        common::post("b", "Music", "u2", "What are you listening to", 10, 1),
        common::post("c", "Music", "u3", "This leaked demo sounds unreal", 10, 1),
    ];
    let kept: Vec<String> = pipeline.process_posts(raw).unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(kept, vec!["a", "c"]);

    let cleaned: Vec<Post> = read_table(&pipeline.table(storage::CLEANED_POSTS)).unwrap();
    assert_eq!(cleaned.len(), 3);
}

#[test]
fn offline_run_writes_every_table_and_model() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path())).unwrap();
    let (raw, fetched) = common::corpus();

    let trend_posts = pipeline.process_posts(raw).unwrap();
    assert_eq!(trend_posts.len(), 30);
    let summary = pipeline.analyze(&trend_posts, fetched).unwrap();

    assert_eq!(summary.raw_posts, 0);
    assert_eq!(summary.trend_posts, 30);
    assert!(summary.model_trained);
    assert_eq!(summary.superspreaders, 5);
    assert!(summary.charts <= 9);

    let comments: Vec<Comment> = read_table(&pipeline.table(storage::COMMENTS_RAW)).unwrap();
    assert_eq!(comments.len(), summary.comments);
    for c in &comments {
        assert!((-1.0..=1.0).contains(&c.sentiment_compound));
    }

    let sentiment: Vec<PostSentiment> = read_table(&pipeline.table(storage::COMMENT_SENTIMENT)).unwrap();
    assert_eq!(sentiment.len(), 30);
    // every seventh post has no fetched comments
    let silent = sentiment.iter().find(|s| s.post_id == "p06").unwrap();
    assert_eq!(silent.comment_count, 0);
    assert_eq!(silent.sentiment_label, SentimentLabel::Neutral);
    assert_eq!(silent.avg_compound, 0.0);

    let spreaders: Vec<Superspreader> = read_table(&pipeline.table(storage::SUPERSPREADERS)).unwrap();
    assert_eq!(spreaders.len(), 5);
    assert!(spreaders.windows(2).all(|w| w[0].combined_score >= w[1].combined_score));
    assert_eq!(spreaders[0].rank, 1);

    let metrics: Vec<MetricsRow> = read_table(&pipeline.table(storage::MODEL_METRICS)).unwrap();
    let models: Vec<&str> = metrics.iter().map(|m| m.model.as_str()).collect();
    assert_eq!(models, vec!["random_forest", "logistic_regression"]);
    assert!(metrics.iter().all(|m| (0.0..=1.0).contains(&m.accuracy)));

    let artifact = ModelArtifact::load(&pipeline.table(storage::MODEL_ARTIFACT)).unwrap();
    let examples = build_examples(&trend_posts, &sentiment);
    assert_eq!(artifact.predict(&examples).unwrap().len(), examples.len());
}

#[test]
fn too_few_rows_skips_training_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path())).unwrap();
    let raw = vec![
        common::post("a", "Music", "u1", "\"Alpha\" by Someone", 500, 200),
        common::post("b", "Music", "u2", "\"Beta\" by Someone", 50, 10),
    ];
    let trend_posts = pipeline.process_posts(raw).unwrap();
    let fetched = HashMap::from([(
        "a".to_string(),
        vec![common::comment("u2", "love this"), common::comment("u3", "great")],
    )]);

    let summary = pipeline.analyze(&trend_posts, fetched).unwrap();
    assert!(!summary.model_trained);
    assert!(!pipeline.table(storage::MODEL_ARTIFACT).exists());
    assert_eq!(summary.comments, 2);
    assert_eq!(summary.users, 3);
}

#[test]
fn no_data_at_all_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(common::test_config(dir.path())).unwrap();
    let trend_posts = pipeline.process_posts(Vec::new()).unwrap();
    let summary = pipeline.analyze(&trend_posts, HashMap::new()).unwrap();
    assert_eq!(summary.users, 0);
    assert_eq!(summary.charts, 0);
    assert!(!summary.model_trained);
    let rows: Vec<Post> = read_table(&pipeline.table(storage::TREND_DATASET)).unwrap();
    assert!(rows.is_empty());
}
