//! Core data models shared by the ingestion and retrieval pipeline.
//!
//! Everything that crosses the store traits lives here: the six-field
//! [`Scope`] partition key, stored [`ChunkRecord`]s, vector hits, chat
//! exchanges, and the quiz/summary request and response types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// The access/partition key attached to every document and chat exchange.
///
/// Retrieval always filters on all six fields with exact equality. There is
/// no hierarchical fallback (a module-level query does not see
/// department-level documents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub department_id: i64,
    pub program_id: i64,
    pub module_id: i64,
    pub activity_id: i64,
    pub profile_id: i64,
    pub user_id: i64,
}

impl Scope {
    pub fn new(
        department_id: i64,
        program_id: i64,
        module_id: i64,
        activity_id: i64,
        profile_id: i64,
        user_id: i64,
    ) -> Self {
        Self {
            department_id,
            program_id,
            module_id,
            activity_id,
            profile_id,
            user_id,
        }
    }

    /// The fields in canonical order.
    pub fn as_array(&self) -> [i64; 6] {
        [
            self.department_id,
            self.program_id,
            self.module_id,
            self.activity_id,
            self.profile_id,
            self.user_id,
        ]
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [d, p, m, a, pr, u] = self.as_array();
        write!(f, "{},{},{},{},{},{}", d, p, m, a, pr, u)
    }
}

/// Parses `department,program,module,activity,profile,user`.
impl FromStr for Scope {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i64> = s
            .split(',')
            .map(|p| p.trim().parse::<i64>())
            .collect::<Result<_, _>>()
            .map_err(|e| RagError::InvalidInput(format!("invalid scope '{}': {}", s, e)))?;
        match parts.as_slice() {
            [d, p, m, a, pr, u] => Ok(Scope::new(*d, *p, *m, *a, *pr, *u)),
            _ => Err(RagError::InvalidInput(format!(
                "scope must have exactly 6 comma-separated ids, got {}",
                parts.len()
            ))),
        }
    }
}

/// A stored chunk of a document, as persisted by both stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub content_hash: String,
    pub base_filename: String,
    pub chunk_index: i64,
    pub text: String,
    pub scope: Scope,
    pub ingested_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// Deterministic vector-store id: `"{content_hash}_{chunk_index}"`.
    pub fn id(&self) -> String {
        chunk_id(&self.content_hash, self.chunk_index)
    }
}

pub fn chunk_id(content_hash: &str, chunk_index: i64) -> String {
    format!("{}_{}", content_hash, chunk_index)
}

/// A chunk plus its unit-normalized embedding, ready for [`VectorStore::add`](crate::store::VectorStore::add).
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub chunk: ChunkRecord,
    pub vector: Vec<f32>,
}

/// One nearest-neighbour result. `distance` is cosine distance (`1 - cos`).
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

/// Debug view of a stored document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub content_hash: String,
    pub base_filename: String,
    pub chunk_count: usize,
    pub scope: Scope,
    pub ingested_at: DateTime<Utc>,
}

/// One row of the append-only chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExchange {
    pub question: String,
    pub answer: String,
    pub scope: Scope,
    pub timestamp: DateTime<Utc>,
}

/// Per-document listing row.
#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub content_hash: String,
    pub base_filename: String,
    pub scope: Scope,
    pub ingested_at: DateTime<Utc>,
    pub chunk_count: usize,
    /// Sum of stored chunk text lengths, in KiB, rounded to two decimals.
    pub estimated_size_kb: f64,
}

/// Distinct-document count for one id of one scope level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeCount {
    pub id: i64,
    pub documents: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionStats {
    pub total_documents: i64,
    pub by_department: Vec<ScopeCount>,
    pub by_program: Vec<ScopeCount>,
    pub by_module: Vec<ScopeCount>,
    pub by_activity: Vec<ScopeCount>,
}

/// Which slice of the chat log a caller may read.
///
/// Derived from the reader's profile: administrators see everything,
/// teachers their department and program, students their program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    All,
    DepartmentProgram { department_id: i64, program_id: i64 },
    Program { program_id: i64 },
    Nothing,
}

pub const PROFILE_ADMIN: i64 = 1;
pub const PROFILE_TEACHER: i64 = 2;
pub const PROFILE_STUDENT: i64 = 3;

impl HistoryFilter {
    pub fn for_profile(profile_id: i64, department_id: Option<i64>, program_id: Option<i64>) -> Self {
        match (profile_id, department_id, program_id) {
            (PROFILE_ADMIN, _, _) => HistoryFilter::All,
            (PROFILE_TEACHER, Some(department_id), Some(program_id)) => {
                HistoryFilter::DepartmentProgram {
                    department_id,
                    program_id,
                }
            }
            (PROFILE_STUDENT, _, Some(program_id)) => HistoryFilter::Program { program_id },
            _ => HistoryFilter::Nothing,
        }
    }
}

/// Summary verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    #[default]
    Simplified,
    Detailed,
}

impl FromStr for DetailLevel {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simplified" => Ok(DetailLevel::Simplified),
            "detailed" => Ok(DetailLevel::Detailed),
            other => Err(RagError::InvalidInput(format!(
                "unknown detail level '{}': expected simplified or detailed",
                other
            ))),
        }
    }
}

/// Bloom taxonomy levels accepted for generated questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Knowledge,
    Comprehension,
    Application,
}

impl BloomLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloomLevel::Knowledge => "knowledge",
            BloomLevel::Comprehension => "comprehension",
            BloomLevel::Application => "application",
        }
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the three canonical names plus `understanding`, which models
/// keep producing and which maps to comprehension.
impl FromStr for BloomLevel {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "knowledge" => Ok(BloomLevel::Knowledge),
            "comprehension" | "understanding" => Ok(BloomLevel::Comprehension),
            "application" => Ok(BloomLevel::Application),
            other => Err(RagError::InvalidInput(format!(
                "unknown bloom level '{}': expected knowledge, comprehension or application",
                other
            ))),
        }
    }
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: u8,
    pub bloom_level: BloomLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse_and_display() {
        let scope: Scope = "1, 2,3,4,5,6".parse().unwrap();
        assert_eq!(scope, Scope::new(1, 2, 3, 4, 5, 6));
        assert_eq!(scope.to_string(), "1,2,3,4,5,6");
    }

    #[test]
    fn test_scope_parse_wrong_arity() {
        assert!("1,2,3".parse::<Scope>().is_err());
        assert!("1,2,3,4,5,x".parse::<Scope>().is_err());
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("abc", 3), "abc_3");
    }

    #[test]
    fn test_bloom_understanding_alias() {
        assert_eq!(
            "Understanding".parse::<BloomLevel>().unwrap(),
            BloomLevel::Comprehension
        );
        assert!("synthesis".parse::<BloomLevel>().is_err());
    }

    #[test]
    fn test_history_filter_by_profile() {
        assert_eq!(HistoryFilter::for_profile(1, None, None), HistoryFilter::All);
        assert_eq!(
            HistoryFilter::for_profile(2, Some(4), Some(7)),
            HistoryFilter::DepartmentProgram {
                department_id: 4,
                program_id: 7
            }
        );
        assert_eq!(
            HistoryFilter::for_profile(3, None, Some(7)),
            HistoryFilter::Program { program_id: 7 }
        );
        assert_eq!(HistoryFilter::for_profile(9, Some(1), Some(1)), HistoryFilter::Nothing);
    }
}
