//! Text normalization applied before chunking.
//!
//! Steps, always in this order:
//!
//! 1. lowercase
//! 2. strip ASCII punctuation
//! 3. strip decimal digits (digit runs disappear entirely; superscripts,
//!    fractions and roman numerals stay)
//! 4. split on whitespace and drop stopwords of every configured language
//! 5. join the surviving tokens with single spaces
//!
//! Normalization fails closed: text carrying U+FFFD replacement characters
//! or NUL bytes comes from a broken decode and is rejected with
//! [`RagError::Processing`] instead of being indexed as garbage.

use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{RagError, Result};

/// Stopword languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    French,
    English,
}

impl Language {
    pub fn stopwords(&self) -> &'static [&'static str] {
        match self {
            Language::French => FRENCH_STOPWORDS,
            Language::English => ENGLISH_STOPWORDS,
        }
    }
}

impl FromStr for Language {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "french" | "fr" => Ok(Language::French),
            "english" | "en" => Ok(Language::English),
            other => Err(RagError::Processing(format!(
                "unsupported normalization language '{}'",
                other
            ))),
        }
    }
}

/// Stopword-aware normalizer for a fixed set of languages.
#[derive(Debug, Clone)]
pub struct Normalizer {
    languages: Vec<Language>,
    stopwords: HashSet<&'static str>,
}

impl Normalizer {
    /// Build a normalizer for `languages`, primary language first.
    pub fn new(languages: &[Language]) -> Result<Self> {
        if languages.is_empty() {
            return Err(RagError::Processing(
                "at least one normalization language is required".to_string(),
            ));
        }
        let stopwords = languages
            .iter()
            .flat_map(|l| l.stopwords().iter().copied())
            .collect();
        Ok(Self {
            languages: languages.to_vec(),
            stopwords,
        })
    }

    /// Build from configuration names such as `["french", "english"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let languages = names
            .iter()
            .map(|n| n.as_ref().parse::<Language>())
            .collect::<Result<Vec<_>>>()?;
        Self::new(&languages)
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn normalize(&self, text: &str) -> Result<String> {
        if let Some(pos) = text.find(['\u{FFFD}', '\0']) {
            return Err(RagError::Processing(format!(
                "text contains undecodable content at byte offset {}",
                pos
            )));
        }

        let cleaned: String = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_ascii_punctuation() && !c.is_ascii_digit())
            .collect();

        let tokens: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|t| !self.stopwords.contains(t))
            .collect();

        Ok(tokens.join(" "))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        let stopwords = FRENCH_STOPWORDS
            .iter()
            .chain(ENGLISH_STOPWORDS.iter())
            .copied()
            .collect();
        Self {
            languages: vec![Language::French, Language::English],
            stopwords,
        }
    }
}

// Entries containing apostrophes are omitted: punctuation is stripped
// before stopword removal, so they could never match.
const FRENCH_STOPWORDS: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux", "il",
    "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "même", "mes", "moi", "mon",
    "ne", "nos", "notre", "nous", "on", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa", "se",
    "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une", "vos", "votre",
    "vous", "c", "d", "j", "l", "à", "m", "n", "s", "t", "y", "été", "étée", "étées", "étés",
    "étant", "étante", "étants", "étantes", "suis", "es", "est", "sommes", "êtes", "sont", "serai",
    "seras", "sera", "serons", "serez", "seront", "serais", "serait", "serions", "seriez",
    "seraient", "étais", "était", "étions", "étiez", "étaient", "fus", "fut", "fûmes", "fûtes",
    "furent", "sois", "soit", "soyons", "soyez", "soient", "fusse", "fusses", "fût", "fussions",
    "fussiez", "fussent", "ayant", "ayante", "ayantes", "ayants", "eu", "eue", "eues", "eus", "ai",
    "as", "avons", "avez", "ont", "aurai", "auras", "aura", "aurons", "aurez", "auront", "aurais",
    "aurait", "aurions", "auriez", "auraient", "avais", "avait", "avions", "aviez", "avaient",
    "eut", "eûmes", "eûtes", "eurent", "aie", "aies", "ait", "ayons", "ayez", "aient", "eusse",
    "eusses", "eût", "eussions", "eussiez", "eussent",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself", "it",
    "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which", "who",
    "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and",
    "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for", "with", "about",
    "against", "between", "into", "through", "during", "before", "after", "above", "below", "to",
    "from", "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then",
    "once", "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few",
    "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so",
    "than", "too", "very", "s", "t", "can", "will", "just", "don", "should", "now", "d", "ll",
    "m", "o", "re", "ve", "y", "ain", "aren", "couldn", "didn", "doesn", "hadn", "hasn", "haven",
    "isn", "ma", "mightn", "mustn", "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
];
