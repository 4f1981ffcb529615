//! Parser and validator for model-generated quizzes.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or return a bare
//! list instead of the requested `{"questions": [...]}` object. The parser
//! tolerates exactly those deviations and nothing else:
//!
//! 1. Strip a leading ```` ```json ```` or ```` ``` ```` fence and a
//!    trailing ```` ``` ````.
//! 2. Unless the text is a bare list, keep the span from the first `{` to
//!    the last `}`.
//! 3. Parse. A top-level list becomes the question list, truncated to the
//!    requested count.
//! 4. Validate every question. Any violation rejects the whole quiz; a
//!    partial list is never returned.

use serde_json::Value;

use crate::error::QuizError;
use crate::models::{BloomLevel, QuizQuestion};

const REQUIRED_FIELDS: [&str; 4] = ["question", "options", "correct_answer", "bloom_level"];

/// Remove markdown fences and surrounding chatter from a model response.
pub fn clean_json_response(raw: &str) -> String {
    let mut cleaned = raw.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned = cleaned.trim();

    if !cleaned.starts_with('[') {
        if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
            if end > start {
                cleaned = &cleaned[start..=end];
            }
        }
    }

    cleaned.to_string()
}

/// Parse and validate a quiz response.
///
/// The caller compares the returned length with `num_questions`; a
/// mismatch is not an error here.
pub fn parse_quiz_response(raw: &str, num_questions: usize) -> Result<Vec<QuizQuestion>, QuizError> {
    let cleaned = clean_json_response(raw);
    let malformed = |reason: String| QuizError::MalformedOutput {
        reason,
        raw: raw.to_string(),
        cleaned: cleaned.clone(),
    };

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| malformed(e.to_string()))?;

    let items: Vec<Value> = match value {
        Value::Array(list) => list.into_iter().take(num_questions).collect(),
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(list)) => list,
            Some(_) => return Err(malformed("\"questions\" is not a list".to_string())),
            None => return Err(malformed("missing \"questions\" field".to_string())),
        },
        _ => return Err(malformed("expected a JSON object or list".to_string())),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_question(i + 1, item))
        .collect()
}

fn rule(question: usize, rule: impl Into<String>) -> QuizError {
    QuizError::Validation {
        question,
        rule: rule.into(),
    }
}

fn validate_question(n: usize, item: &Value) -> Result<QuizQuestion, QuizError> {
    let obj = item
        .as_object()
        .ok_or_else(|| rule(n, "question is not a JSON object"))?;

    for field in REQUIRED_FIELDS {
        if !obj.contains_key(field) {
            return Err(rule(n, format!("missing field '{}'", field)));
        }
    }

    let question = obj["question"]
        .as_str()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| rule(n, "'question' must be a non-empty string"))?;

    let options: Vec<String> = obj["options"]
        .as_array()
        .ok_or_else(|| rule(n, "'options' must be a list"))?
        .iter()
        .map(|o| o.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<_>>()
        .ok_or_else(|| rule(n, "every option must be a string"))?;
    let options: [String; 4] = options
        .try_into()
        .map_err(|v: Vec<String>| rule(n, format!("must have exactly 4 options, got {}", v.len())))?;

    if options
        .iter()
        .all(|o| o.chars().count() == 1 && o.chars().all(char::is_alphabetic))
    {
        return Err(rule(n, "options are single-letter placeholders"));
    }

    let correct_answer = obj["correct_answer"]
        .as_u64()
        .filter(|i| *i <= 3)
        .ok_or_else(|| rule(n, "correct_answer must be 0, 1, 2, or 3"))?;

    let bloom_level = obj["bloom_level"]
        .as_str()
        .ok_or_else(|| rule(n, "'bloom_level' must be a string"))?
        .parse::<BloomLevel>()
        .map_err(|_| {
            rule(
                n,
                "bloom_level must be knowledge, comprehension or application",
            )
        })?;

    Ok(QuizQuestion {
        question: question.to_string(),
        options,
        correct_answer: correct_answer as u8,
        bloom_level,
    })
}
