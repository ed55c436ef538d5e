use crate::stopwords::StopwordSet;
use regex::Regex;

/// Result of cleaning one email body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    /// Lowercased text with URLs and punctuation removed and whitespace collapsed.
    pub clean: String,
    /// URLs in order of appearance.
    pub urls: Vec<String>,
}

impl NormalizedText {
    /// The comma-joined form used by the cleaned CSV artifact.
    pub fn joined_urls(&self) -> String {
        self.urls.join(", ")
    }
}

/// Text transform shared by corpus building, training and inference.
///
/// `normalize` is the cleaning step stored in the cleaned corpus.
/// `preprocess` additionally drops stopwords and is what the vectorizer sees,
/// both when fitting and when classifying a new email.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    url_regex: Regex,
    stopwords: StopwordSet,
}

impl TextNormalizer {
    pub fn new(stopwords: StopwordSet) -> Self {
        Self {
            url_regex: Regex::new(r"(?i)(?:https?|ftps?)://\S+").unwrap(),
            stopwords,
        }
    }

    pub fn stopwords(&self) -> &StopwordSet {
        &self.stopwords
    }

    /// Total over its input: a missing body yields an empty result.
    pub fn normalize(&self, raw: Option<&str>) -> NormalizedText {
        match raw {
            Some(text) => self.normalize_text(text),
            None => NormalizedText::default(),
        }
    }

    pub fn normalize_text(&self, raw: &str) -> NormalizedText {
        let urls: Vec<String> = self
            .url_regex
            .find_iter(raw)
            .map(|m| m.as_str().to_string())
            .collect();

        let without_urls = if urls.is_empty() {
            std::borrow::Cow::Borrowed(raw)
        } else {
            self.url_regex.replace_all(raw, "")
        };

        let stripped: String = without_urls
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect();

        NormalizedText {
            clean: collapse_whitespace(&stripped),
            urls,
        }
    }

    /// Drops stopwords from text already produced by `normalize`.
    pub fn remove_stopwords(&self, clean: &str) -> String {
        clean
            .split_whitespace()
            .filter(|token| !self.stopwords.contains(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full inference-time transform: clean, then drop stopwords.
    pub fn preprocess(&self, raw: &str) -> String {
        self.remove_stopwords(&self.normalize_text(raw).clean)
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(StopwordSet::english())
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
