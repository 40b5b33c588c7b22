//! Text normalization for post titles and bodies.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::Post;

/// Tokens that are markup or Reddit artifacts rather than words.
const NOISE_TOKENS: &[&str] = &[
    "amp", "nbsp", "quot", "apos", "gt", "lt", "x200b", "deleted", "removed",
];

fn html_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("Failed to compile html regex"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:https?://|www\.)\S+").expect("Failed to compile url regex")
    })
}

fn punctuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("Failed to compile punctuation regex"))
}

/// A preprocessor for text
///
/// # Fields
/// * `noise`: Tokens dropped after punctuation is removed
pub struct Cleaner {
    noise: HashSet<String>,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner {
    pub fn new() -> Self {
        Self {
            noise: NOISE_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Add extra noise tokens, compared after lowercasing.
    pub fn with_noise_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.noise
            .extend(tokens.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    /// Normalize a text.
    ///
    /// Lowercases, removes HTML tags and URLs, replaces punctuation with
    /// spaces, drops noise tokens and collapses whitespace. Applying it to
    /// its own output returns the output unchanged.
    ///
    /// # Examples
    /// ```
    /// use music_trends::cleaner::Cleaner;
    /// let cleaner = Cleaner::new();
    /// assert_eq!(cleaner.clean("New <b>HIT</b>!! https://x.co/a &amp; more"), "new hit more");
    /// ```
    pub fn clean(&self, text: &str) -> String {
        let lowercased = text.to_lowercase();
        let no_html = html_regex().replace_all(&lowercased, " ");
        let no_urls = url_regex().replace_all(&no_html, " ");
        let no_punctuation = punctuation_regex().replace_all(&no_urls, " ");

        no_punctuation
            .split_whitespace()
            .filter(|token| !self.noise.contains(*token))
            .collect::<Vec<&str>>()
            .join(" ")
    }

    /// Fill `cleaned_text` from the title and body of each post.
    pub fn clean_posts(&self, posts: Vec<Post>) -> Vec<Post> {
        posts
            .into_iter()
            .map(|mut post| {
                let full_text = format!("{} {}", post.title, post.raw_text);
                post.cleaned_text = Some(self.clean(&full_text));
                post
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_urls_and_punctuation() {
        let cleaner = Cleaner::new();
        assert_eq!(
            cleaner.clean("Check THIS out: <a href=\"x\">link</a> www.example.com/path, it's FIRE!!!"),
            "check this out link it s fire"
        );
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let cleaner = Cleaner::new();
        assert_eq!(cleaner.clean(""), "");
        assert_eq!(cleaner.clean("   \n\t "), "");
        assert_eq!(cleaner.clean("&amp; [deleted]"), "");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let cleaner = Cleaner::new();
        let samples = [
            "Beyoncé's NEW album — \"Cowboy Carter\" is OUT NOW!!! https://open.spotify.com/x",
            "İstanbul  ΣΊΣΥΦΟΣ  straße",
            "<p>multi\nline\r\ntext</p> &nbsp; x200b",
            "already clean text",
            "emoji 🎵🔥 and numbers 2024",
        ];
        for sample in samples {
            let once = cleaner.clean(sample);
            assert_eq!(cleaner.clean(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn extra_noise_tokens() {
        let cleaner = Cleaner::new().with_noise_tokens(["Lol"]);
        assert_eq!(cleaner.clean("lol that drop"), "that drop");
    }
}
