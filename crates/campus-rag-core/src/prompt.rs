//! Prompt templates for answers, summaries and quizzes.
//!
//! Templates exist in French (the institution's working language) and
//! English. Retrieved chunks and user questions are embedded verbatim.

use crate::models::{BloomLevel, DetailLevel};
use crate::normalize::Language;

/// Localized prompt builder and user-facing sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prompts {
    language: Language,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::new(Language::French)
    }
}

impl Prompts {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Placeholder used in place of context when retrieval found nothing.
    pub fn no_context(&self) -> &'static str {
        match self.language {
            Language::French => "Aucun contexte disponible.",
            Language::English => "No context available.",
        }
    }

    /// Returned by summary when none of the hashes resolves to a chunk.
    pub fn no_document(&self) -> &'static str {
        match self.language {
            Language::French => "Aucun document trouvé pour ce hash.",
            Language::English => "No document found for this hash.",
        }
    }

    pub fn summary_error(&self) -> &'static str {
        match self.language {
            Language::French => "Erreur lors de la génération du résumé.",
            Language::English => "Error while generating the summary.",
        }
    }

    /// Question-answering prompt. `context` empty means nothing was retrieved.
    pub fn answer(&self, context: &[String], question: &str) -> String {
        let context = if context.is_empty() {
            self.no_context().to_string()
        } else {
            context.join(" ")
        };
        match self.language {
            Language::French => format!(
                "Contexte : {context}\n\n\
                 Question : {question}\n\
                 Réponse uniquement basée sur le contexte fourni ci-dessus dans un cadre de formation académique. \
                 Répondre en français, de manière concise et précise, sans ajouter d'informations externes. \
                 Éliminer toujours la réponse qui débute par <think> et termine par </think>\n\
                 Réponse :"
            ),
            Language::English => format!(
                "Context: {context}\n\n\
                 Question: {question}\n\
                 Answer only from the context provided above, in an academic teaching setting. \
                 Answer in English, concisely and precisely, without adding outside information. \
                 Never include reasoning that starts with <think> and ends with </think>\n\
                 Answer:"
            ),
        }
    }

    pub fn summary(&self, full_text: &str, level: DetailLevel) -> String {
        match (self.language, level) {
            (Language::French, DetailLevel::Simplified) => format!(
                "Voici le contenu d'un document académique :\n\n{full_text}\n\n\
                 Génère un résumé simplifié de ce document. \
                 Concentre-toi sur les idées principales et utilise un langage clair et concis. \
                 Structure le résumé avec des points clés. \
                 Réponse en français :"
            ),
            (Language::French, DetailLevel::Detailed) => format!(
                "Voici le contenu d'un document académique :\n\n{full_text}\n\n\
                 Génère un résumé détaillé de ce document. \
                 Inclus tous les détails importants et structure les sous-sections pertinentes. \
                 Organise le résumé de manière hiérarchique avec des sections et sous-sections. \
                 Réponse en français :"
            ),
            (Language::English, DetailLevel::Simplified) => format!(
                "Here is the content of an academic document:\n\n{full_text}\n\n\
                 Write a simplified summary of this document. \
                 Focus on the main ideas and use clear, concise language. \
                 Structure the summary as key points. \
                 Answer in English:"
            ),
            (Language::English, DetailLevel::Detailed) => format!(
                "Here is the content of an academic document:\n\n{full_text}\n\n\
                 Write a detailed summary of this document. \
                 Include every important detail and structure the relevant subsections. \
                 Organize the summary hierarchically with sections and subsections. \
                 Answer in English:"
            ),
        }
    }

    fn bloom_instruction(&self, bloom: Option<BloomLevel>) -> String {
        match (self.language, bloom) {
            (Language::French, Some(level)) => format!(
                "Les questions doivent correspondre au niveau de la taxonomie de Bloom : {}. ",
                level
            ),
            (Language::French, None) => {
                "Inclure un mélange de questions de connaissance, compréhension et application. "
                    .to_string()
            }
            (Language::English, Some(level)) => {
                format!("Questions must match the Bloom taxonomy level: {}. ", level)
            }
            (Language::English, None) => {
                "Include a mix of knowledge, comprehension and application questions. ".to_string()
            }
        }
    }

    pub fn quiz(&self, full_text: &str, num_questions: usize, bloom: Option<BloomLevel>) -> String {
        let bloom_instruction = self.bloom_instruction(bloom);
        let example = r#"{"questions": [{"question": "Quelle est...", "options": ["Réponse 1", "Réponse 2", "Réponse 3", "Réponse 4"], "correct_answer": 0, "bloom_level": "knowledge"}]}"#;
        match self.language {
            Language::French => format!(
                "Voici le contenu d'un document :\n\n{full_text}\n\n\
                 Génère exactement {num_questions} questions QCM basées sur le contenu du document. \
                 Chaque question doit avoir exactement 4 options de réponse rédigées, avec une seule réponse correcte. \
                 {bloom_instruction}\
                 Le champ bloom_level vaut uniquement \"knowledge\", \"comprehension\" ou \"application\" ; \
                 n'utilise jamais \"understanding\". \
                 correct_answer est l'index (0 à 3) de la bonne option. \
                 IMPORTANT: Retourne UNIQUEMENT le JSON valide, sans formatage markdown, sans ```json ni ```. \
                 Format exact requis :\n{example}\n\
                 Réponse JSON :"
            ),
            Language::English => format!(
                "Here is the content of a document:\n\n{full_text}\n\n\
                 Generate exactly {num_questions} multiple-choice questions based on the document content. \
                 Each question must have exactly 4 written answer options, with a single correct answer. \
                 {bloom_instruction}\
                 The bloom_level field is only \"knowledge\", \"comprehension\" or \"application\"; \
                 never use \"understanding\". \
                 correct_answer is the index (0 to 3) of the right option. \
                 IMPORTANT: Return ONLY valid JSON, without markdown formatting, without ```json or ```. \
                 Exact format required:\n{example}\n\
                 JSON answer:"
            ),
        }
    }
}
