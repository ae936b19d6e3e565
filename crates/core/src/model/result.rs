use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grading::ScoreSheet;
use crate::model::ids::{SessionId, TemplateId};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("score {0} is outside [0, 100]")]
    ScoreOutOfRange(f64),

    #[error("total questions ({total}) does not match outcome counts ({sum})")]
    CountMismatch { total: u32, sum: u32 },

    #[error("subject breakdown does not add up to the result totals")]
    SubjectMismatch,

    #[error("unknown finish reason: {0}")]
    UnknownFinishReason(String),
}

/// How a session reached the completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Submitted,
    TimeExpired,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Submitted => "submitted",
            FinishReason::TimeExpired => "time_expired",
        }
    }

    /// Parse the storage form produced by `as_str`.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::UnknownFinishReason` for any other value.
    pub fn parse(value: &str) -> Result<Self, ResultError> {
        match value {
            "submitted" => Ok(Self::Submitted),
            "time_expired" => Ok(Self::TimeExpired),
            other => Err(ResultError::UnknownFinishReason(other.to_string())),
        }
    }
}

/// Correct/total tally for one subject tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectScore {
    pub subject: String,
    pub correct: u32,
    pub total: u32,
}

/// Read-only snapshot of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedResult {
    session_id: SessionId,
    template_id: TemplateId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    reason: FinishReason,
    total_questions: u32,
    correct: u32,
    incorrect: u32,
    unanswered: u32,
    score_percent: f64,
    passed: bool,
    time_spent_secs: u32,
    subjects: Vec<SubjectScore>,
}

impl CompletedResult {
    /// Snapshot a score sheet as the result of a session.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the sheet or timestamps are inconsistent.
    pub fn from_sheet(
        session_id: SessionId,
        template_id: TemplateId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reason: FinishReason,
        sheet: ScoreSheet,
    ) -> Result<Self, ResultError> {
        Self::from_persisted(
            session_id,
            template_id,
            started_at,
            completed_at,
            reason,
            sheet.total,
            sheet.correct,
            sheet.incorrect,
            sheet.unanswered,
            sheet.score_percent,
            sheet.passed,
            sheet.time_spent_secs,
            sheet.subjects,
        )
    }

    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if counts, score, breakdown, or time range do not align.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        session_id: SessionId,
        template_id: TemplateId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reason: FinishReason,
        total_questions: u32,
        correct: u32,
        incorrect: u32,
        unanswered: u32,
        score_percent: f64,
        passed: bool,
        time_spent_secs: u32,
        subjects: Vec<SubjectScore>,
    ) -> Result<Self, ResultError> {
        if completed_at < started_at {
            return Err(ResultError::InvalidTimeRange);
        }
        if !(0.0..=100.0).contains(&score_percent) {
            return Err(ResultError::ScoreOutOfRange(score_percent));
        }
        let sum = correct
            .saturating_add(incorrect)
            .saturating_add(unanswered);
        if sum != total_questions {
            return Err(ResultError::CountMismatch {
                total: total_questions,
                sum,
            });
        }
        let subject_total: u32 = subjects.iter().map(|s| s.total).sum();
        let subject_correct: u32 = subjects.iter().map(|s| s.correct).sum();
        if subject_total != total_questions || subject_correct != correct {
            return Err(ResultError::SubjectMismatch);
        }

        Ok(Self {
            session_id,
            template_id,
            started_at,
            completed_at,
            reason,
            total_questions,
            correct,
            incorrect,
            unanswered,
            score_percent,
            passed,
            time_spent_secs,
            subjects,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn reason(&self) -> FinishReason {
        self.reason
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    #[must_use]
    pub fn score_percent(&self) -> f64 {
        self.score_percent
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u32 {
        self.time_spent_secs
    }

    #[must_use]
    pub fn subjects(&self) -> &[SubjectScore] {
        &self.subjects
    }
}
