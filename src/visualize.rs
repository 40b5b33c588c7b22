//! Static PNG charts of the pipeline tables.
//!
//! Every chart is drawn on its own; a chart that fails or has no data is
//! logged and skipped and the others are still rendered.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use plotters::prelude::*;

use crate::error::{PipelineError, Result};
use crate::model::{build_examples, BASE_FEATURES};
use crate::network::{InteractionNetwork, Superspreader};
use crate::pattern::{Pattern, PatternStats};
use crate::types::{Comment, EngagementLabel, Post, PostSentiment};

type DrawResult = std::result::Result<(), Box<dyn Error>>;

const TOP_N: usize = 10;
const SIZE: (u32, u32) = (1200, 800);

/// The tables a chart run reads.
pub struct ChartData<'a> {
    pub posts: &'a [Post],
    pub comments: &'a [Comment],
    pub sentiment: &'a [PostSentiment],
    pub network: Option<&'a InteractionNetwork>,
    pub superspreaders: &'a [Superspreader],
}

fn short(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        let mut s: String = label.chars().take(max.saturating_sub(1)).collect();
        s.push('…');
        s
    }
}

fn label_color(label: EngagementLabel) -> RGBColor {
    match label {
        EngagementLabel::Trending => RGBColor(214, 39, 40),
        EngagementLabel::Emerging => RGBColor(255, 127, 14),
        EngagementLabel::Stable => RGBColor(31, 119, 180),
        EngagementLabel::Low => RGBColor(127, 127, 127),
    }
}

/// Blue for -1, white for 0, red for +1.
fn diverging(value: f64) -> RGBColor {
    let t = value.clamp(-1.0, 1.0);
    let fade = |x: f64| (255.0 * (1.0 - x.abs())).round() as u8;
    if t >= 0.0 {
        RGBColor(255, fade(t), fade(t))
    } else {
        RGBColor(fade(t), fade(t), 255)
    }
}

/// Vertical bar chart over named categories.
pub fn bar_chart(path: &Path, title: &str, y_desc: &str, bars: &[(String, f64)], color: RGBColor) -> DrawResult {
    if bars.is_empty() {
        return Err("no data".into());
    }
    let max = bars.iter().map(|b| b.1).fold(0.0f64, f64::max);
    let min = bars.iter().map(|b| b.1).fold(0.0f64, f64::min);
    let names: Vec<String> = bars.iter().map(|b| short(&b.0, 18)).collect();

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(90)
        .y_label_area_size(70)
        .build_cartesian_2d((0..bars.len() as i32).into_segmented(), min * 1.1..max * 1.1 + 1e-9)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_labels(bars.len())
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => names.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_label_style(("sans-serif", 13).into_font().transform(FontTransform::Rotate90))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(color.filled())
            .margin(8)
            .data(bars.iter().enumerate().map(|(i, b)| (i as i32, b.1))),
    )?;

    root.present()?;
    Ok(())
}

fn top_counts<'a, I>(values: I) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    Pattern::frequencies(values)
        .into_iter()
        .take(TOP_N)
        .map(|(name, count)| (name, count as f64))
        .collect()
}

/// Most mentioned detected songs.
pub fn top_songs(data: &ChartData, path: &Path) -> DrawResult {
    let bars = top_counts(data.posts.iter().filter_map(|p| p.detected_song.as_deref()));
    bar_chart(path, "Top Mentioned Songs", "Posts", &bars, RGBColor(31, 119, 180))
}

/// Most mentioned detected artists.
pub fn top_artists(data: &ChartData, path: &Path) -> DrawResult {
    let bars = top_counts(data.posts.iter().filter_map(|p| p.detected_artist.as_deref()));
    bar_chart(path, "Top Mentioned Artists", "Posts", &bars, RGBColor(44, 160, 44))
}

/// How often each trend keyword was matched.
pub fn keyword_frequency(data: &ChartData, path: &Path) -> DrawResult {
    let bars = top_counts(
        data.posts
            .iter()
            .filter_map(|p| p.trend_keywords.as_deref())
            .flat_map(|k| k.split(", "))
            .filter(|k| !k.is_empty()),
    );
    bar_chart(path, "Trend Keyword Frequency", "Posts", &bars, RGBColor(148, 103, 189))
}

/// Mean Reddit score per subreddit.
pub fn avg_score_by_subreddit(data: &ChartData, path: &Path) -> DrawResult {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for post in data.posts {
        groups.entry(post.subreddit.as_str()).or_default().push(post.score as f64);
    }
    let bars: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(name, scores)| (format!("r/{name}"), PatternStats::mean(&scores)))
        .collect();
    bar_chart(path, "Average Score by Subreddit", "Mean score", &bars, RGBColor(255, 127, 14))
}

/// Histogram of comment compound scores in bins of 0.1.
pub fn sentiment_distribution(data: &ChartData, path: &Path) -> DrawResult {
    const BINS: usize = 20;
    if data.comments.is_empty() {
        return Err("no comments".into());
    }
    let mut counts = vec![0u32; BINS];
    for c in data.comments {
        let bin = (((c.sentiment_compound + 1.0) / 2.0 * BINS as f64).floor() as usize).min(BINS - 1);
        counts[bin] += 1;
    }
    let max = counts.iter().copied().max().unwrap_or(0);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Comment Sentiment Distribution", ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(-1f64..1f64, 0u32..max + 1)?;

    chart
        .configure_mesh()
        .x_desc("Compound score")
        .y_desc("Comments")
        .draw()?;

    chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
        let x0 = -1.0 + i as f64 * 2.0 / BINS as f64;
        let x1 = x0 + 2.0 / BINS as f64;
        let color = diverging((x0 + x1) / 2.0 * 2.0);
        Rectangle::new([(x0, 0), (x1, count)], color.mix(0.9).filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Box plot of engagement score per label.
pub fn engagement_by_label(data: &ChartData, path: &Path) -> DrawResult {
    let mut groups: Vec<(usize, Vec<f64>)> = Vec::new();
    for label in EngagementLabel::ALL {
        let values: Vec<f64> = data
            .posts
            .iter()
            .filter(|p| p.engagement_label == Some(label))
            .filter_map(|p| p.engagement_score)
            .collect();
        if let Some(summary) = PatternStats::five_number_summary(&values) {
            info!("{} engagement: min {:.1} q1 {:.1} median {:.1} q3 {:.1} max {:.1}",
                label, summary[0], summary[1], summary[2], summary[3], summary[4]);
            groups.push((label.index(), values));
        }
    }
    if groups.is_empty() {
        return Err("no scored posts".into());
    }
    let all: Vec<f64> = groups.iter().flat_map(|g| g.1.iter().copied()).collect();
    let lo = all.iter().copied().fold(f64::INFINITY, f64::min) as f32;
    let hi = all.iter().copied().fold(f64::NEG_INFINITY, f64::max) as f32;
    let pad = ((hi - lo) * 0.05).max(1.0);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Engagement Score by Label", ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(
            (0..EngagementLabel::ALL.len() as i32).into_segmented(),
            (lo - pad)..(hi + pad),
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Engagement score")
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => EngagementLabel::from_index(*i as usize)
                .map(|l| l.as_str().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    for (index, values) in &groups {
        let color = EngagementLabel::from_index(*index).map(label_color).unwrap_or(BLACK);
        chart.draw_series(std::iter::once(
            Boxplot::new_vertical(SegmentValue::CenterOf(*index as i32), &Quartiles::new(values.as_slice()))
                .width(40)
                .style(color),
        ))?;
    }

    root.present()?;
    Ok(())
}

/// Score against comment count, one colour per label.
pub fn score_vs_comments(data: &ChartData, path: &Path) -> DrawResult {
    let points: Vec<(f64, f64, EngagementLabel)> = data
        .posts
        .iter()
        .filter_map(|p| Some((p.score as f64, p.num_comments as f64, p.engagement_label?)))
        .collect();
    if points.is_empty() {
        return Err("no labelled posts".into());
    }
    let max_x = points.iter().map(|p| p.0).fold(1.0f64, f64::max);
    let min_x = points.iter().map(|p| p.0).fold(0.0f64, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(1.0f64, f64::max);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Score vs Comments", ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(min_x..max_x * 1.05, 0f64..max_y * 1.05)?;

    chart
        .configure_mesh()
        .x_desc("Score")
        .y_desc("Comments")
        .draw()?;

    for label in EngagementLabel::ALL {
        let color = label_color(label);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.2 == label)
                    .map(|p| Circle::new((p.0, p.1), 4, color.mix(0.7).filled())),
            )?
            .label(label.as_str())
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Pairwise Pearson correlation of the base model features.
pub fn feature_correlation(data: &ChartData, path: &Path) -> DrawResult {
    let examples = build_examples(data.posts, data.sentiment);
    if examples.len() < 2 {
        return Err("fewer than two complete rows".into());
    }
    let d = BASE_FEATURES.len();
    let columns: Vec<Vec<f64>> = (0..d)
        .map(|j| examples.iter().map(|e| e.features[j]).collect())
        .collect();

    let root = BitMapBackend::new(path, (1000, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Correlation", ("sans-serif", 30))
        .margin(15)
        .x_label_area_size(120)
        .y_label_area_size(140)
        .build_cartesian_2d((0..d as i32).into_segmented(), (0..d as i32).into_segmented())?;

    let name = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => BASE_FEATURES.get(*i as usize).map(|s| s.to_string()).unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(d)
        .y_labels(d)
        .x_label_formatter(&name)
        .y_label_formatter(&name)
        .x_label_style(("sans-serif", 13).into_font().transform(FontTransform::Rotate90))
        .draw()?;

    for i in 0..d {
        for j in 0..d {
            let r = PatternStats::correlation(&columns[i], &columns[j]);
            let (x, y) = (i as i32, j as i32);
            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                diverging(r).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{r:.2}"),
                (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
                ("sans-serif", 12).into_font(),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Interaction subgraph of the top superspreaders.
pub fn superspreader_graph(data: &ChartData, path: &Path) -> DrawResult {
    let network = data.network.ok_or("no interaction network")?;
    if data.superspreaders.is_empty() {
        return Err("no superspreaders".into());
    }
    let users: Vec<String> = data.superspreaders.iter().map(|s| s.user.clone()).collect();
    let pagerank: HashMap<String, f64> = data
        .superspreaders
        .iter()
        .map(|s| (s.user.clone(), s.pagerank))
        .collect();
    let output = path.to_str().ok_or("chart path is not valid UTF-8")?;
    network
        .subgraph(&users)
        .static_plot(output, "Top Superspreaders", &pagerank)
}

/// Renders every chart into one directory.
pub struct Visualizer {
    chart_dir: PathBuf,
}

impl Visualizer {
    pub fn new(chart_dir: impl Into<PathBuf>) -> Self {
        Self { chart_dir: chart_dir.into() }
    }

    fn render<F>(&self, file: &str, draw: F) -> Option<PathBuf>
    where
        F: FnOnce(&Path) -> DrawResult,
    {
        let path = self.chart_dir.join(file);
        match draw(&path) {
            Ok(()) => {
                info!("Saved chart {}", path.display());
                Some(path)
            }
            Err(e) => {
                let err = PipelineError::Chart { name: file.to_string(), reason: e.to_string() };
                warn!("Skipping chart: {}", err);
                None
            }
        }
    }

    /// Draw all charts and return the paths that were written.
    pub fn render_all(&self, data: &ChartData) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.chart_dir)?;
        let charts: [(&str, fn(&ChartData, &Path) -> DrawResult); 9] = [
            ("top_songs.png", top_songs),
            ("top_artists.png", top_artists),
            ("avg_score_by_subreddit.png", avg_score_by_subreddit),
            ("sentiment_distribution.png", sentiment_distribution),
            ("engagement_by_label.png", engagement_by_label),
            ("keyword_frequency.png", keyword_frequency),
            ("feature_correlation.png", feature_correlation),
            ("score_vs_comments.png", score_vs_comments),
            ("superspreaders_graph.png", superspreader_graph),
        ];
        let written: Vec<PathBuf> = charts
            .iter()
            .filter_map(|(file, draw)| self.render(file, |path| draw(data, path)))
            .collect();
        info!("Rendered {} of {} charts", written.len(), charts.len());
        Ok(written)
    }
}
