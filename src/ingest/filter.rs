// src/ingest/filter.rs
//! Case-insensitive substring keyword match. No stemming or tokenization:
//! "govern" matches "government", and "ifs" matches "motifs".

/// The active keyword set: lowercased, trimmed, blanks dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    active: Vec<String>,
}

impl KeywordFilter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let active = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { active }
    }

    /// An empty filter never matches.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.active
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.active.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.active.iter().any(|k| text.contains(k.as_str()))
    }
}

/// One-shot form of [`KeywordFilter::matches`].
pub fn matches<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    KeywordFilter::new(keywords).matches(text)
}
