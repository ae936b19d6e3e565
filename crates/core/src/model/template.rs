use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, TemplateId};
use crate::model::question::{Question, QuestionDraft, QuestionError, ValidatedQuestion};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("template title cannot be empty")]
    EmptyTitle,

    #[error("template has no questions")]
    NoQuestions,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u8),

    #[error("expected {expected} question ids, got {actual}")]
    QuestionIdMismatch { expected: usize, actual: usize },

    #[error("question {index}: {source}")]
    Question {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

/// Passing score applied when a template does not specify one.
pub const DEFAULT_PASSING_SCORE: u8 = 70;

fn default_passing_score() -> u8 {
    DEFAULT_PASSING_SCORE
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Import shape of a mock exam / simulated test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub title: String,
    pub time_limit_secs: u32,
    #[serde(default = "default_passing_score")]
    pub passing_score: u8,
    #[serde(default)]
    pub shuffle_questions: bool,
    pub questions: Vec<QuestionDraft>,
}

impl TemplateDraft {
    /// Validate the template and each of its questions.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` for an empty title, empty question set, zero time
    /// limit, passing score above 100, or the first invalid question.
    pub fn validate(self) -> Result<ValidatedTemplate, TemplateError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(TemplateError::EmptyTitle);
        }
        if self.time_limit_secs == 0 {
            return Err(TemplateError::InvalidTimeLimit);
        }
        if self.passing_score > 100 {
            return Err(TemplateError::InvalidPassingScore(self.passing_score));
        }
        if self.questions.is_empty() {
            return Err(TemplateError::NoQuestions);
        }

        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                draft
                    .validate()
                    .map_err(|source| TemplateError::Question { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedTemplate {
            title,
            time_limit_secs: self.time_limit_secs,
            passing_score: self.passing_score,
            shuffle_questions: self.shuffle_questions,
            questions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTemplate {
    pub title: String,
    pub time_limit_secs: u32,
    pub passing_score: u8,
    pub shuffle_questions: bool,
    pub questions: Vec<ValidatedQuestion>,
}

impl ValidatedTemplate {
    /// Attach storage identifiers, one per question in order.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::QuestionIdMismatch` if the id count differs from
    /// the question count.
    pub fn assign_ids(
        self,
        id: TemplateId,
        question_ids: &[QuestionId],
    ) -> Result<ExamTemplate, TemplateError> {
        if question_ids.len() != self.questions.len() {
            return Err(TemplateError::QuestionIdMismatch {
                expected: self.questions.len(),
                actual: question_ids.len(),
            });
        }

        let questions: Vec<Question> = self
            .questions
            .into_iter()
            .zip(question_ids.iter().copied())
            .map(|(question, qid)| question.assign_id(qid))
            .collect();

        Ok(ExamTemplate {
            id,
            title: self.title,
            time_limit_secs: self.time_limit_secs,
            passing_score: self.passing_score,
            shuffle_questions: self.shuffle_questions,
            questions: questions.into(),
        })
    }
}

//
// ─── TEMPLATE ──────────────────────────────────────────────────────────────────
//

/// Reusable definition of a timed question set.
///
/// The question list is shared (`Arc`) so sessions reference it without
/// copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamTemplate {
    id: TemplateId,
    title: String,
    time_limit_secs: u32,
    passing_score: u8,
    shuffle_questions: bool,
    questions: Arc<[Question]>,
}

impl ExamTemplate {
    /// Rehydrate a template from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` if the stored data violates template invariants.
    pub fn from_persisted(
        id: TemplateId,
        title: String,
        time_limit_secs: u32,
        passing_score: u8,
        shuffle_questions: bool,
        questions: Vec<Question>,
    ) -> Result<Self, TemplateError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(TemplateError::EmptyTitle);
        }
        if time_limit_secs == 0 {
            return Err(TemplateError::InvalidTimeLimit);
        }
        if passing_score > 100 {
            return Err(TemplateError::InvalidPassingScore(passing_score));
        }
        if questions.is_empty() {
            return Err(TemplateError::NoQuestions);
        }

        Ok(Self {
            id,
            title,
            time_limit_secs,
            passing_score,
            shuffle_questions,
            questions: questions.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> TemplateId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    #[must_use]
    pub fn shuffle_questions(&self) -> bool {
        self.shuffle_questions
    }

    #[must_use]
    pub fn questions(&self) -> &Arc<[Question]> {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(subject: &str) -> QuestionDraft {
        QuestionDraft {
            subject: subject.into(),
            prompt: "Pick B".into(),
            options: vec!["A".into(), "B".into()],
            correct_option: 1,
            explanation: None,
        }
    }

    fn draft() -> TemplateDraft {
        TemplateDraft {
            title: "Mock exam 1".into(),
            time_limit_secs: 600,
            passing_score: 60,
            shuffle_questions: false,
            questions: vec![question("Math"), question("Physics")],
        }
    }

    #[test]
    fn template_validates_and_assigns_ids() {
        let template = draft()
            .validate()
            .unwrap()
            .assign_ids(
                TemplateId::new(3),
                &[QuestionId::new(10), QuestionId::new(11)],
            )
            .unwrap();

        assert_eq!(template.id(), TemplateId::new(3));
        assert_eq!(template.question_count(), 2);
        assert_eq!(template.questions()[1].id(), QuestionId::new(11));
        assert_eq!(template.questions()[1].subject(), "Physics");
    }

    #[test]
    fn empty_question_set_is_rejected() {
        let mut d = draft();
        d.questions.clear();
        assert_eq!(d.validate().unwrap_err(), TemplateError::NoQuestions);
    }

    #[test]
    fn zero_time_limit_is_rejected() {
        let mut d = draft();
        d.time_limit_secs = 0;
        assert_eq!(d.validate().unwrap_err(), TemplateError::InvalidTimeLimit);
    }

    #[test]
    fn invalid_question_reports_its_index() {
        let mut d = draft();
        d.questions[1].correct_option = 9;
        let err = d.validate().unwrap_err();
        assert!(matches!(err, TemplateError::Question { index: 1, .. }));
    }

    #[test]
    fn id_count_must_match_questions() {
        let err = draft()
            .validate()
            .unwrap()
            .assign_ids(TemplateId::new(1), &[QuestionId::new(1)])
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::QuestionIdMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn passing_score_defaults_when_missing() {
        let json = r#"{
            "title": "Quick quiz",
            "time_limit_secs": 60,
            "questions": [
                {"subject": "Math", "prompt": "1+1?", "options": ["1", "2"], "correct_option": 1}
            ]
        }"#;
        let d: TemplateDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.passing_score, DEFAULT_PASSING_SCORE);
        assert!(!d.shuffle_questions);
    }
}
