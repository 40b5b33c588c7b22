//! # Pattern Module.
//!
//! Regex heuristics over post titles and simple statistics used by the
//! charts.
//!
//! ## Key Features
//!
//! - Song detection
//!
//! The first quoted span of a title (`"Song Name"` or `“Song Name”`) is taken
//! as the song. Music subreddits also use the `Artist - Song [genre]`
//! convention, which is recognised as a fallback.
//!
//! - Artist detection
//!
//! Text following `by` or `from` (case-insensitive) up to the next
//! punctuation, else the left side of an `Artist - Song` title.
//!
//! - Trend keywords
//!
//! Case-insensitive substring match of a keyword list against a text.
//!
//! ## Statistics
//!
//! - Mean (μ)
//!   * Formula: μ = (Σx) / n
//!
//! - Quartiles
//!   * Linear interpolation between closest ranks
//!
//! - Correlation (Pearson)
//!   * Formula: r = Σ((x - μₓ)(y - μᵧ)) / √(Σ(x - μₓ)² * Σ(y - μᵧ)²)

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn song_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("Failed to compile song regex")
    })
}

fn artist_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:by|from)\s+([A-Za-z0-9][A-Za-z0-9 .'&-]*)")
            .expect("Failed to compile artist regex")
    })
}

fn dash_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([^\[\]()\-–—]+?)\s+[-–—]{1,2}\s+([^\[\]()]+?)\s*(?:[\[(].*)?$")
            .expect("Failed to compile artist-title regex")
    })
}

/// Trim whitespace and trailing separators a greedy capture picks up.
fn tidy(capture: &str) -> Option<String> {
    let trimmed = capture
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == '-' || c == '\'' || c.is_whitespace())
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Heuristics for pulling song and artist names out of post titles.
pub struct Pattern {}
impl Pattern {

    /// Guess the song mentioned in a title.
    ///
    /// ## Arguments
    ///
    /// * `title` - The raw post title.
    ///
    /// ## Returns
    ///
    /// The quoted span if there is one, else the right side of an
    /// `Artist - Song` title, else `None`.
    pub fn extract_song(title: &str) -> Option<String> {
        if let Some(caps) = song_regex().captures(title) {
            let m = caps.get(1).or_else(|| caps.get(2))?;
            return tidy(m.as_str());
        }
        dash_title_regex()
            .captures(title)
            .and_then(|caps| caps.get(2))
            .and_then(|m| tidy(m.as_str()))
    }

    /// Guess the artist mentioned in a title.
    ///
    /// ## Arguments
    ///
    /// * `title` - The raw post title.
    ///
    /// ## Returns
    ///
    /// The text after `by`/`from`, else the left side of an `Artist - Song`
    /// title, else `None`.
    pub fn extract_artist(title: &str) -> Option<String> {
        if let Some(caps) = artist_regex().captures(title) {
            if let Some(found) = caps.get(1).and_then(|m| tidy(m.as_str())) {
                return Some(found);
            }
        }
        dash_title_regex()
            .captures(title)
            .and_then(|caps| caps.get(1))
            .and_then(|m| tidy(m.as_str()))
    }

    /// Find which keywords occur in a text.
    ///
    /// ## Arguments
    ///
    /// * `text` - The text to scan.
    /// * `keywords` - Keywords, matched as case-insensitive substrings.
    ///
    /// ## Returns
    ///
    /// The matched keywords in list order, without duplicates.
    pub fn detect_keywords(text: &str, keywords: &[String]) -> Vec<String> {
        let haystack = text.to_lowercase();
        let mut hits: Vec<String> = Vec::new();
        for keyword in keywords {
            let needle = keyword.to_lowercase();
            if !needle.is_empty() && haystack.contains(&needle) && !hits.contains(&needle) {
                hits.push(needle);
            }
        }
        hits
    }

    /// Count occurrences of each value, most frequent first, ties by value.
    pub fn frequencies<'a, I>(values: I) -> Vec<(String, usize)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for v in values {
            let v = v.trim();
            if !v.is_empty() {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        let mut out: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(k, c)| (k.to_string(), c))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

/// Descriptive statistics over `f64` samples.
pub struct PatternStats {}

impl PatternStats {

    /// Calculate the mean of a given data set. Empty input gives 0.
    pub fn mean(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        data.iter().sum::<f64>() / data.len() as f64
    }

    /// Quantile `q` in [0, 1] with linear interpolation between ranks.
    pub fn quantile(data: &[f64], q: f64) -> Option<f64> {
        if data.is_empty() {
            return None;
        }
        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let frac = pos - lo as f64;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }

    /// Minimum, lower quartile, median, upper quartile and maximum.
    pub fn five_number_summary(data: &[f64]) -> Option<[f64; 5]> {
        Some([
            Self::quantile(data, 0.0)?,
            Self::quantile(data, 0.25)?,
            Self::quantile(data, 0.5)?,
            Self::quantile(data, 0.75)?,
            Self::quantile(data, 1.0)?,
        ])
    }

    /// Calculate the Pearson correlation between two data sets.
    ///
    /// ## Returns
    ///
    /// The correlation in [-1, 1], or 0 when either side is constant or the
    /// lengths differ.
    pub fn correlation(data_x: &[f64], data_y: &[f64]) -> f64 {
        if data_x.len() != data_y.len() || data_x.len() < 2 {
            return 0.0;
        }
        let mean_x = Self::mean(data_x);
        let mean_y = Self::mean(data_y);
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (x, y) in data_x.iter().zip(data_y) {
            let dx = x - mean_x;
            let dy = y - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }
        let denom = (var_x * var_y).sqrt();
        if denom == 0.0 {
            0.0
        } else {
            (cov / denom).clamp(-1.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_from_quotes() {
        assert_eq!(
            Pattern::extract_song(r#"New single "Espresso" by Sabrina Carpenter"#),
            Some("Espresso".to_string())
        );
        assert_eq!(
            Pattern::extract_song("Listening to “Not Like Us” on repeat"),
            Some("Not Like Us".to_string())
        );
    }

    #[test]
    fn artist_after_by_or_from() {
        assert_eq!(
            Pattern::extract_artist(r#"New single "Espresso" by Sabrina Carpenter"#),
            Some("Sabrina Carpenter".to_string())
        );
        assert_eq!(
            Pattern::extract_artist("Leaked track from Kendrick Lamar!"),
            Some("Kendrick Lamar".to_string())
        );
    }

    #[test]
    fn dash_convention_fallback() {
        let title = "Radiohead - Creep [Alternative Rock] (1992)";
        assert_eq!(Pattern::extract_artist(title), Some("Radiohead".to_string()));
        assert_eq!(Pattern::extract_song(title), Some("Creep".to_string()));
    }

    #[test]
    fn nothing_detected_in_plain_titles() {
        assert_eq!(Pattern::extract_song("What are you listening to today?"), None);
        assert_eq!(Pattern::extract_artist("What are you listening to today?"), None);
    }

    #[test]
    fn keywords_are_case_insensitive_substrings() {
        let keywords: Vec<String> = ["viral", "out now", "hype"].iter().map(|s| s.to_string()).collect();
        let hits = Pattern::detect_keywords("This song is going VIRAL, Out Now everywhere", &keywords);
        assert_eq!(hits, vec!["viral".to_string(), "out now".to_string()]);
        assert!(Pattern::detect_keywords("", &keywords).is_empty());
    }

    #[test]
    fn frequencies_sorted_by_count_then_name() {
        let freq = Pattern::frequencies(["b", "a", "b", "c", "a", ""]);
        assert_eq!(
            freq,
            vec![("a".to_string(), 2), ("b".to_string(), 2), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn stats_quartiles_and_correlation() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(PatternStats::five_number_summary(&data), Some([1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(PatternStats::quantile(&[], 0.5), None);

        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((PatternStats::correlation(&data, &y) - 1.0).abs() < 1e-12);
        let flat = [3.0; 5];
        assert_eq!(PatternStats::correlation(&data, &flat), 0.0);
    }
}
