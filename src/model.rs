//! # Engagement Model
//!
//! Joins the trend dataset with per-post sentiment into training examples,
//! splits them with a fixed seed, trains a `smartcore` random forest
//! (primary) and logistic regression (baseline), and scores both on the
//! held-out rows. The logistic regression sees standardized features.
//!
//! ## Features
//!
//! Each example carries `score`, `num_comments`, `engagement_score`,
//! `keyword_count`, `comment_count`, the four averaged sentiment values and a
//! one-hot column per subreddit seen in training.
//!
//! ## Metrics
//!
//! Accuracy plus macro precision, recall and F1. Macro averages run over the
//! labels present in the test truth or the predictions; a label whose
//! precision or recall has an empty denominator counts as 0.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use log::{info, warn};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{RandomForestClassifier, RandomForestClassifierParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::storage;
use crate::types::{EngagementLabel, Post, PostSentiment};

pub const BASE_FEATURES: [&str; 9] = [
    "score",
    "num_comments",
    "engagement_score",
    "keyword_count",
    "comment_count",
    "avg_neg",
    "avg_neu",
    "avg_pos",
    "avg_compound",
];

const N_CLASSES: usize = EngagementLabel::ALL.len();

/// Random forest over dense `f64` features and class indices.
pub type Forest = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;
type Logistic = LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// One post with complete features and its engagement label.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub post_id: String,
    pub subreddit: String,
    pub features: [f64; 9],
    pub label: EngagementLabel,
}

/// Join posts with their sentiment rows.
///
/// Posts without a label, without a sentiment row or with a non-finite
/// feature are dropped.
pub fn build_examples(posts: &[Post], sentiment: &[PostSentiment]) -> Vec<TrainingExample> {
    let by_post: HashMap<&str, &PostSentiment> =
        sentiment.iter().map(|s| (s.post_id.as_str(), s)).collect();

    posts
        .iter()
        .filter_map(|post| {
            let s = by_post.get(post.id.as_str())?;
            let features = [
                post.score as f64,
                post.num_comments as f64,
                post.engagement_score?,
                post.keyword_count() as f64,
                s.comment_count as f64,
                s.avg_neg,
                s.avg_neu,
                s.avg_pos,
                s.avg_compound,
            ];
            if features.iter().any(|f| !f.is_finite()) {
                return None;
            }
            Some(TrainingExample {
                post_id: post.id.clone(),
                subreddit: post.subreddit.clone(),
                features,
                label: post.engagement_label?,
            })
        })
        .collect()
}

/// Column layout of the feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub feature_names: Vec<String>,
    pub subreddits: Vec<String>,
}

impl FeatureSchema {
    /// Base features followed by one column per subreddit, in name order.
    pub fn from_examples(examples: &[TrainingExample]) -> Self {
        let subreddits: Vec<String> = examples
            .iter()
            .map(|e| e.subreddit.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let feature_names = BASE_FEATURES
            .iter()
            .map(|f| f.to_string())
            .chain(subreddits.iter().map(|s| format!("subreddit_{s}")))
            .collect();
        Self { feature_names, subreddits }
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature row of one example; unknown subreddits get all zeros.
    pub fn encode(&self, example: &TrainingExample) -> Vec<f64> {
        let mut row = example.features.to_vec();
        row.extend(
            self.subreddits
                .iter()
                .map(|s| if *s == example.subreddit { 1.0 } else { 0.0 }),
        );
        row
    }

    pub fn matrix<'a, I>(&self, examples: I) -> Array2<f64>
    where
        I: IntoIterator<Item = &'a TrainingExample>,
    {
        let mut data = Vec::new();
        let mut rows = 0;
        for example in examples {
            data.extend(self.encode(example));
            rows += 1;
        }
        Array2::from_shape_vec((rows, self.width()), data).unwrap_or_else(|_| Array2::zeros((0, self.width())))
    }
}

fn dense(x: &Array2<f64>) -> DenseMatrix<f64> {
    let rows: Vec<Vec<f64>> = x.outer_iter().map(|row| row.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows)
}

fn model_error(model: &str, reason: impl ToString) -> PipelineError {
    PipelineError::Model {
        model: model.to_string(),
        reason: reason.to_string(),
    }
}

fn class_of(k: i32) -> usize {
    usize::try_from(k).unwrap_or(N_CLASSES)
}

/// Column means and standard deviations of the training rows. Constant
/// columns keep a scale of 1.
#[derive(Debug, Clone)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(x: &Array2<f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

/// Shuffle `0..n` with `seed` and cut off the test share.
///
/// Both sides are non-empty whenever `n >= 2`.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    fastrand::Rng::with_seed(seed).shuffle(&mut indices);
    if n < 2 {
        return (indices, Vec::new());
    }
    let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
    let test = indices.split_off(n - n_test);
    (indices, test)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: EngagementLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Scores of one classifier on the test rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    /// `confusion[truth][predicted]`
    pub confusion: [[usize; N_CLASSES]; N_CLASSES],
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Compare predicted class indices against the truth.
pub fn evaluate(truth: &[usize], predicted: &[usize]) -> Evaluation {
    let mut confusion = [[0usize; N_CLASSES]; N_CLASSES];
    for (&t, &p) in truth.iter().zip(predicted) {
        if t < N_CLASSES && p < N_CLASSES {
            confusion[t][p] += 1;
        }
    }
    let total = truth.len().min(predicted.len());
    let correct: usize = (0..N_CLASSES).map(|k| confusion[k][k]).sum();

    let mut per_class = Vec::new();
    for label in EngagementLabel::ALL {
        let k = label.index();
        let support: usize = confusion[k].iter().sum();
        let predicted_k: usize = (0..N_CLASSES).map(|t| confusion[t][k]).sum();
        if support == 0 && predicted_k == 0 {
            continue;
        }
        let tp = confusion[k][k] as f64;
        let precision = ratio(tp, predicted_k as f64);
        let recall = ratio(tp, support as f64);
        per_class.push(ClassMetrics {
            label,
            precision,
            recall,
            f1: ratio(2.0 * precision * recall, precision + recall),
            support,
        });
    }

    let n = per_class.len() as f64;
    let macro_of = |f: fn(&ClassMetrics) -> f64| ratio(per_class.iter().map(f).sum(), n);
    Evaluation {
        accuracy: ratio(correct as f64, total as f64),
        macro_precision: macro_of(|c| c.precision),
        macro_recall: macro_of(|c| c.recall),
        macro_f1: macro_of(|c| c.f1),
        per_class,
        confusion,
    }
}

impl Evaluation {
    /// Log the per-class report and the confusion matrix.
    pub fn log_report(&self, model: &str) {
        info!(
            "{}: accuracy {:.3}, macro precision {:.3}, recall {:.3}, F1 {:.3}",
            model, self.accuracy, self.macro_precision, self.macro_recall, self.macro_f1
        );
        for c in &self.per_class {
            info!(
                "  {:<9} precision {:.3} recall {:.3} f1 {:.3} support {}",
                c.label.as_str(), c.precision, c.recall, c.f1, c.support
            );
        }
        let header: Vec<String> = EngagementLabel::ALL.iter().map(|l| format!("{:>9}", l.as_str())).collect();
        info!("  confusion (rows = truth) {:>9}{}", "", header.join(""));
        for label in EngagementLabel::ALL {
            let cells: Vec<String> = self.confusion[label.index()].iter().map(|c| format!("{c:>9}")).collect();
            info!("  {:>33}{}", label.as_str(), cells.join(""));
        }
    }
}

/// One line of `model_metrics.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub model: String,
    pub accuracy: f64,
    pub precision_macro: f64,
    pub recall_macro: f64,
    pub f1_macro: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl MetricsRow {
    fn new(model: &str, eval: &Evaluation, train_rows: usize, test_rows: usize) -> Self {
        Self {
            model: model.to_string(),
            accuracy: eval.accuracy,
            precision_macro: eval.macro_precision,
            recall_macro: eval.macro_recall,
            f1_macro: eval.macro_f1,
            train_rows,
            test_rows,
        }
    }
}

/// The persisted primary model.
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema: FeatureSchema,
    pub labels: Vec<EngagementLabel>,
    pub forest: Forest,
    pub trained_at: String,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<()> {
        storage::write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: Self = storage::read_json(path)?;
        if artifact.labels.is_empty() || artifact.schema.width() == 0 {
            return Err(PipelineError::parse(
                path.display().to_string(),
                "model has no labels or no features",
            ));
        }
        Ok(artifact)
    }

    /// Predict the engagement label of each example.
    pub fn predict(&self, examples: &[TrainingExample]) -> Result<Vec<EngagementLabel>> {
        if examples.is_empty() {
            return Ok(Vec::new());
        }
        let x = dense(&self.schema.matrix(examples));
        let predicted = self.forest.predict(&x).map_err(|e| model_error("random forest", e))?;
        Ok(predicted
            .into_iter()
            .map(|k| self.labels.get(class_of(k)).copied().unwrap_or(EngagementLabel::Low))
            .collect())
    }
}

/// Everything produced by one training run.
pub struct TrainingReport {
    pub forest: Evaluation,
    pub logistic: Evaluation,
    pub metrics: Vec<MetricsRow>,
    pub artifact: ModelArtifact,
    pub train_rows: usize,
    pub test_rows: usize,
}

pub struct ModelTrainer<'a> {
    config: &'a ModelConfig,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// Train and evaluate both classifiers.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when fewer than `min_rows` complete examples remain,
    /// `Model` when a classifier cannot be fitted (e.g. a single label in the
    /// training rows).
    pub fn train(&self, posts: &[Post], sentiment: &[PostSentiment]) -> Result<TrainingReport> {
        let examples = build_examples(posts, sentiment);
        let dropped = posts.len() - examples.len().min(posts.len());
        if dropped > 0 {
            warn!("Dropped {} posts with incomplete features", dropped);
        }
        let required = self.config.min_rows.max(2);
        if examples.len() < required {
            return Err(PipelineError::InsufficientData {
                stage: "model training",
                found: examples.len(),
                required,
            });
        }

        let schema = FeatureSchema::from_examples(&examples);
        let (train_idx, test_idx) = train_test_split(examples.len(), self.config.test_fraction, self.config.seed);
        let x_train = schema.matrix(train_idx.iter().map(|&i| &examples[i]));
        let y_train: Vec<i32> = train_idx.iter().map(|&i| examples[i].label.index() as i32).collect();
        let x_test = schema.matrix(test_idx.iter().map(|&i| &examples[i]));
        let y_test: Vec<usize> = test_idx.iter().map(|&i| examples[i].label.index()).collect();
        info!(
            "Training on {} rows, testing on {} rows, {} features",
            train_idx.len(),
            test_idx.len(),
            schema.width()
        );

        let params = RandomForestClassifierParameters::default()
            .with_n_trees(self.config.n_trees)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_seed(self.config.seed);
        let forest: Forest = RandomForestClassifier::fit(&dense(&x_train), &y_train, params)
            .map_err(|e| model_error("random forest", e))?;
        let predicted = forest
            .predict(&dense(&x_test))
            .map_err(|e| model_error("random forest", e))?;
        let forest_eval = evaluate(&y_test, &predicted.into_iter().map(class_of).collect::<Vec<_>>());
        forest_eval.log_report("Random forest");

        let scaler = Standardizer::fit(&x_train);
        let lr_params = LogisticRegressionParameters::default().with_alpha(self.config.lr_alpha);
        let logistic: Logistic = LogisticRegression::fit(&dense(&scaler.transform(&x_train)), &y_train, lr_params)
            .map_err(|e| model_error("logistic regression", e))?;
        let predicted = logistic
            .predict(&dense(&scaler.transform(&x_test)))
            .map_err(|e| model_error("logistic regression", e))?;
        let logistic_eval = evaluate(&y_test, &predicted.into_iter().map(class_of).collect::<Vec<_>>());
        logistic_eval.log_report("Logistic regression");

        let metrics = vec![
            MetricsRow::new("random_forest", &forest_eval, train_idx.len(), test_idx.len()),
            MetricsRow::new("logistic_regression", &logistic_eval, train_idx.len(), test_idx.len()),
        ];
        let artifact = ModelArtifact {
            schema,
            labels: EngagementLabel::ALL.to_vec(),
            forest,
            trained_at: chrono::Utc::now().to_rfc3339(),
        };

        Ok(TrainingReport {
            forest: forest_eval,
            logistic: logistic_eval,
            metrics,
            artifact,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SentimentLabel;

    fn post(id: &str, subreddit: &str, score: i64, comments: u64, label: Option<EngagementLabel>) -> Post {
        Post {
            id: id.into(),
            subreddit: subreddit.into(),
            author: "someone".into(),
            title: "t".into(),
            raw_text: String::new(),
            cleaned_text: None,
            score,
            num_comments: comments,
            created_at: String::new(),
            url: String::new(),
            permalink: String::new(),
            detected_song: None,
            detected_artist: None,
            trend_keywords: Some("new".into()),
            engagement_score: Some(0.7 * score as f64 + 0.3 * comments as f64 + 10.0),
            engagement_label: label,
        }
    }

    fn sentiment(id: &str, compound: f64) -> PostSentiment {
        PostSentiment {
            post_id: id.into(),
            permalink: String::new(),
            title: String::new(),
            song: None,
            artist: None,
            comment_count: 3,
            avg_neg: 0.1,
            avg_neu: 0.7,
            avg_pos: 0.2,
            avg_compound: compound,
            sentiment_label: SentimentLabel::Positive,
        }
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let posts = vec![
            post("a", "Music", 10, 1, Some(EngagementLabel::Low)),
            post("b", "Music", 10, 1, None),
            post("c", "Music", 10, 1, Some(EngagementLabel::Low)),
        ];
        let sentiment = vec![sentiment("a", 0.3), sentiment("b", 0.1)];
        let examples = build_examples(&posts, &sentiment);
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].post_id, "a");
        assert_eq!(examples[0].features[3], 1.0);
    }

    #[test]
    fn schema_one_hot_encodes_subreddits() {
        let posts = vec![
            post("a", "PopHeads", 10, 1, Some(EngagementLabel::Low)),
            post("b", "Music", 10, 1, Some(EngagementLabel::Low)),
        ];
        let examples = build_examples(&posts, &[sentiment("a", 0.0), sentiment("b", 0.0)]);
        let schema = FeatureSchema::from_examples(&examples);
        assert_eq!(schema.subreddits, vec!["Music", "PopHeads"]);
        assert_eq!(schema.width(), BASE_FEATURES.len() + 2);
        let row = schema.encode(&examples[0]);
        assert_eq!(&row[BASE_FEATURES.len()..], &[0.0, 1.0]);
        assert_eq!(schema.matrix(&examples).dim(), (2, 11));
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let (train, test) = train_test_split(20, 0.25, 42);
        assert_eq!(train.len(), 15);
        assert_eq!(test.len(), 5);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
        assert_eq!(train_test_split(20, 0.25, 42), (train, test));

        let (train, test) = train_test_split(2, 0.01, 1);
        assert_eq!((train.len(), test.len()), (1, 1));
    }

    #[test]
    fn macro_metrics_cover_present_labels_only() {
        // truth: T, T, E, L ; predicted: T, E, E, L
        let truth = [0, 0, 1, 3];
        let predicted = [0, 1, 1, 3];
        let eval = evaluate(&truth, &predicted);
        assert!((eval.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(eval.per_class.len(), 3);
        // T: p 1, r .5 ; E: p .5, r 1 ; L: p 1, r 1
        assert!((eval.macro_precision - 2.5 / 3.0).abs() < 1e-12);
        assert!((eval.macro_recall - 2.5 / 3.0).abs() < 1e-12);
        let f1_t = 2.0 * 0.5 / 1.5;
        assert!((eval.macro_f1 - (f1_t * 2.0 + 1.0) / 3.0).abs() < 1e-12);
        assert_eq!(eval.confusion[0][1], 1);
    }

    #[test]
    fn predicted_only_label_scores_zero() {
        let eval = evaluate(&[2, 2], &[2, 1]);
        let emerging = eval.per_class.iter().find(|c| c.label == EngagementLabel::Emerging).unwrap();
        assert_eq!(emerging.precision, 0.0);
        assert_eq!(emerging.recall, 0.0);
        assert_eq!(emerging.f1, 0.0);
        assert_eq!(emerging.support, 0);
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        let posts = vec![post("a", "Music", 10, 1, Some(EngagementLabel::Low))];
        let config = ModelConfig::default();
        let result = ModelTrainer::new(&config).train(&posts, &[sentiment("a", 0.0)]);
        assert!(matches!(result, Err(PipelineError::InsufficientData { found: 1, required: 10, .. })));
    }

    #[test]
    fn trains_and_reloads_forest() {
        let mut posts = Vec::new();
        let mut sentiments = Vec::new();
        for i in 0..24 {
            let (score, label) = match i % 3 {
                0 => (900, EngagementLabel::Trending),
                1 => (200, EngagementLabel::Emerging),
                _ => (5, EngagementLabel::Low),
            };
            let id = format!("p{i}");
            posts.push(post(&id, "Music", score + i, 10, Some(label)));
            sentiments.push(sentiment(&id, 0.1));
        }
        let config = ModelConfig { n_trees: 10, ..ModelConfig::default() };
        let report = ModelTrainer::new(&config).train(&posts, &sentiments).unwrap();
        assert_eq!(report.train_rows + report.test_rows, 24);
        assert_eq!(report.metrics.len(), 2);
        assert!(report.forest.accuracy > 0.8);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        report.artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        let examples = build_examples(&posts[..3], &sentiments[..3]);
        assert_eq!(
            loaded.predict(&examples).unwrap(),
            vec![EngagementLabel::Trending, EngagementLabel::Emerging, EngagementLabel::Low]
        );
        assert!(loaded.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn standardizer_centers_and_scales_columns() {
        let x = ndarray::array![[1.0, 5.0], [3.0, 5.0]];
        let scaled = Standardizer::fit(&x).transform(&x);
        assert_eq!(scaled, ndarray::array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn logistic_baseline_separates_clusters() {
        let mut posts = Vec::new();
        let mut sentiments = Vec::new();
        for i in 0..30 {
            let (score, label) = if i % 2 == 0 {
                (1000, EngagementLabel::Trending)
            } else {
                (3, EngagementLabel::Low)
            };
            let id = format!("p{i}");
            posts.push(post(&id, "Music", score + i, 10, Some(label)));
            sentiments.push(sentiment(&id, 0.1));
        }
        let config = ModelConfig { n_trees: 10, ..ModelConfig::default() };
        let report = ModelTrainer::new(&config).train(&posts, &sentiments).unwrap();
        assert!(report.logistic.accuracy > 0.8);
        assert_eq!(report.metrics[1].model, "logistic_regression");
    }
}
