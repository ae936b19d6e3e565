use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use storage::repository::{
    AnswerRepository, AnswerSyncRecord, InMemoryRepository, ResultId, ResultRepository, ResultRow,
};
use studify_core::model::{CompletedResult, FinishReason, SessionId, SubjectScore, TemplateId};

use crate::error::SessionError;

/// Presentation-agnostic list item for a stored result.
///
/// Scores are carried unrounded; front ends round only when formatting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultListItem {
    pub id: ResultId,
    pub session_id: SessionId,
    pub template_id: TemplateId,
    pub completed_at: DateTime<Utc>,
    pub reason: FinishReason,

    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
    pub score_percent: f64,
    pub passed: bool,
    pub time_spent_secs: u32,
    pub subjects: Vec<SubjectScore>,
}

impl ResultListItem {
    #[must_use]
    pub fn from_result(id: ResultId, result: &CompletedResult) -> Self {
        Self {
            id,
            session_id: result.session_id(),
            template_id: result.template_id(),
            completed_at: result.completed_at(),
            reason: result.reason(),
            total: result.total_questions(),
            correct: result.correct(),
            incorrect: result.incorrect(),
            unanswered: result.unanswered(),
            score_percent: result.score_percent(),
            passed: result.passed(),
            time_spent_secs: result.time_spent_secs(),
            subjects: result.subjects().to_vec(),
        }
    }

    #[must_use]
    pub fn from_row(row: &ResultRow) -> Self {
        Self::from_result(row.id, &row.result)
    }
}

/// Read side for stored results and mirrored answers.
#[derive(Clone)]
pub struct ResultService {
    results: Arc<dyn ResultRepository>,
    answers: Arc<dyn AnswerRepository>,
}

impl ResultService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>, answers: Arc<dyn AnswerRepository>) -> Self {
        Self { results, answers }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        Self::new(repo.clone(), repo)
    }

    /// Load recent results for a template, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_recent(
        &self,
        template_id: TemplateId,
        limit: u32,
    ) -> Result<Vec<ResultListItem>, SessionError> {
        let rows = self.results.list_results(template_id, limit).await?;
        Ok(rows.iter().map(ResultListItem::from_row).collect())
    }

    /// Load one stored result.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if missing or on repository failures.
    pub async fn get(&self, id: ResultId) -> Result<CompletedResult, SessionError> {
        Ok(self.results.get_result(id).await?)
    }

    /// Mirrored answer records of a session, ordered by question index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn mirrored_answers(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnswerSyncRecord>, SessionError> {
        Ok(self.answers.answers_for_session(session_id).await?)
    }
}
