mod common;

use music_trends::config::{GraphConfig, SentimentConfig};
use music_trends::network::InteractionNetwork;
use music_trends::sentiment::SentimentAnalyzer;
use music_trends::types::{Comment, Post};

fn scored_corpus() -> (Vec<Post>, Vec<Comment>) {
    let (posts, fetched) = common::corpus();
    let (comments, _) = SentimentAnalyzer::new(SentimentConfig::default()).score_posts(&posts, fetched);
    (posts, comments)
}

#[test]
fn repeated_builds_are_identical() {
    let (posts, comments) = scored_corpus();
    let config = GraphConfig::default();
    let first = InteractionNetwork::build(&posts, &comments);
    for _ in 0..3 {
        let again = InteractionNetwork::build(&posts, &comments);
        assert_eq!(again.edges(), first.edges());
        assert_eq!(again.superspreaders(&config), first.superspreaders(&config));
    }
}

#[test]
fn ranking_is_independent_of_row_order() {
    let (posts, comments) = scored_corpus();
    let config = GraphConfig::default();
    let reference = InteractionNetwork::build(&posts, &comments).superspreaders(&config);

    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..5 {
        let mut p = posts.clone();
        let mut c = comments.clone();
        rng.shuffle(&mut p);
        rng.shuffle(&mut c);
        assert_eq!(InteractionNetwork::build(&p, &c).superspreaders(&config), reference);
    }
}

#[test]
fn nodes_are_exactly_the_users_seen() {
    let (posts, comments) = scored_corpus();
    let network = InteractionNetwork::build(&posts, &comments);
    let mut users: Vec<String> = posts
        .iter()
        .map(|p| p.author.clone())
        .chain(comments.iter().map(|c| c.author.clone()))
        .collect();
    users.sort();
    users.dedup();
    assert_eq!(network.names(), users.as_slice());
}

#[test]
fn centralities_are_normalized() {
    let (posts, comments) = scored_corpus();
    let network = InteractionNetwork::build(&posts, &comments);
    let results = network.centralities(&GraphConfig::default());
    let total_rank: f64 = results.iter().map(|r| r.pagerank).sum();
    assert!((total_rank - 1.0).abs() < 1e-6);
    for r in &results {
        assert!((0.0..=1.0).contains(&r.degree));
        assert!((0.0..=1.0 + 1e-12).contains(&r.betweenness));
    }
}
