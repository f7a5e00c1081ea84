use regex::Regex;
use thiserror::Error;

pub const DEFAULT_PATTERNS: [&str; 4] = ["wow", "amaze", "excite", "doge"];

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern set must contain at least one word")]
    Empty,
    #[error("could not compile pattern `{word}`: {source}")]
    Compile { word: String, source: regex::Error },
}

/// Case-insensitive whole-word matchers, compiled once at startup.
#[derive(Clone, Debug)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    pub fn new<I, S>(words: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = words
            .into_iter()
            .map(|word| {
                let word = word.as_ref().trim();
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
                    .map_err(|source| PatternError::Compile { word: word.to_owned(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if patterns.is_empty() {
            return Err(PatternError::Empty);
        }

        Ok(Self { patterns })
    }

    /// Stops at the first pattern that matches.
    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .filter_map(|word| Regex::new(&format!(r"(?i)\b{word}\b")).ok())
            .collect();
        Self { patterns }
    }
}
