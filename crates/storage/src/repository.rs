use async_trait::async_trait;
use chrono::{DateTime, Utc};
use studify_core::model::{
    AnswerRecord, CompletedResult, ExamTemplate, QuestionId, SessionId, TemplateId,
    ValidatedTemplate,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted completed result.
///
/// NOTE: This is `i64` to match `SQLite` row IDs.
pub type ResultId = i64;

/// Persisted result together with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub id: ResultId,
    pub result: CompletedResult,
}

impl ResultRow {
    #[must_use]
    pub fn new(id: ResultId, result: CompletedResult) -> Self {
        Self { id, result }
    }
}

/// Mirrored copy of one answer record of an in-flight session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSyncRecord {
    pub session_id: SessionId,
    pub template_id: TemplateId,
    pub question_index: u32,
    pub question_id: QuestionId,
    pub record: AnswerRecord,
    pub synced_at: DateTime<Utc>,
}

/// Template summary row used for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateListItem {
    pub id: TemplateId,
    pub title: String,
    pub question_count: u32,
    pub time_limit_secs: u32,
}

impl TemplateListItem {
    #[must_use]
    pub fn from_template(template: &ExamTemplate) -> Self {
        Self {
            id: template.id(),
            title: template.title().to_string(),
            question_count: u32::try_from(template.question_count()).unwrap_or(u32::MAX),
            time_limit_secs: template.time_limit_secs(),
        }
    }
}

/// Repository contract for exam templates and their questions.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Persist a validated template, assigning template and question ids.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the template cannot be stored.
    async fn insert_template(&self, template: ValidatedTemplate)
    -> Result<ExamTemplate, StorageError>;

    /// Fetch a template with its questions in order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing template is `Ok(None)`.
    async fn get_template(&self, id: TemplateId) -> Result<Option<ExamTemplate>, StorageError>;

    /// List templates, lowest id first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_templates(&self, limit: u32) -> Result<Vec<TemplateListItem>, StorageError>;
}

/// Repository contract for mirroring in-flight answers.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Insert or replace the mirrored record for `(session_id, question_index)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_answer(&self, record: &AnswerSyncRecord) -> Result<(), StorageError>;

    /// Fetch all mirrored records of a session ordered by question index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn answers_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnswerSyncRecord>, StorageError>;
}

/// Repository contract for completed results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Append a completed result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a result for the same session exists,
    /// or other storage errors.
    async fn append_result(&self, result: &CompletedResult) -> Result<ResultId, StorageError>;

    /// Fetch a result by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: ResultId) -> Result<CompletedResult, StorageError>;

    /// List results of a template, newest completion first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_results(
        &self,
        template_id: TemplateId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError>;
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[derive(Default)]
struct TemplateState {
    next_template_id: u64,
    next_question_id: u64,
    templates: HashMap<TemplateId, ExamTemplate>,
}

#[derive(Default)]
struct ResultState {
    next_id: ResultId,
    rows: Vec<ResultRow>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    templates: Arc<Mutex<TemplateState>>,
    answers: Arc<Mutex<HashMap<(SessionId, u32), AnswerSyncRecord>>>,
    results: Arc<Mutex<ResultState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateRepository for InMemoryRepository {
    async fn insert_template(
        &self,
        template: ValidatedTemplate,
    ) -> Result<ExamTemplate, StorageError> {
        let mut guard = self.templates.lock().map_err(poisoned)?;
        guard.next_template_id += 1;
        let id = TemplateId::new(guard.next_template_id);

        let mut question_ids = Vec::with_capacity(template.questions.len());
        for _ in 0..template.questions.len() {
            guard.next_question_id += 1;
            question_ids.push(QuestionId::new(guard.next_question_id));
        }

        let template = template
            .assign_ids(id, &question_ids)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.templates.insert(id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<ExamTemplate>, StorageError> {
        let guard = self.templates.lock().map_err(poisoned)?;
        Ok(guard.templates.get(&id).cloned())
    }

    async fn list_templates(&self, limit: u32) -> Result<Vec<TemplateListItem>, StorageError> {
        let guard = self.templates.lock().map_err(poisoned)?;
        let mut items: Vec<_> = guard
            .templates
            .values()
            .map(TemplateListItem::from_template)
            .collect();
        items.sort_by_key(|item| item.id);
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(items)
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn upsert_answer(&self, record: &AnswerSyncRecord) -> Result<(), StorageError> {
        let mut guard = self.answers.lock().map_err(poisoned)?;
        guard.insert((record.session_id, record.question_index), record.clone());
        Ok(())
    }

    async fn answers_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnswerSyncRecord>, StorageError> {
        let guard = self.answers.lock().map_err(poisoned)?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.question_index);
        Ok(records)
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(&self, result: &CompletedResult) -> Result<ResultId, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        if guard
            .rows
            .iter()
            .any(|row| row.result.session_id() == result.session_id())
        {
            return Err(StorageError::Conflict);
        }
        guard.next_id += 1;
        let id = guard.next_id;
        guard.rows.push(ResultRow::new(id, result.clone()));
        Ok(id)
    }

    async fn get_result(&self, id: ResultId) -> Result<CompletedResult, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        guard
            .rows
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.result.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_results(
        &self,
        template_id: TemplateId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut rows: Vec<_> = guard
            .rows
            .iter()
            .filter(|row| row.result.template_id() == template_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .completed_at()
                .cmp(&a.result.completed_at())
                .then_with(|| b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub templates: Arc<dyn TemplateRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let templates: Arc<dyn TemplateRepository> = Arc::new(repo.clone());
        let answers: Arc<dyn AnswerRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self {
            templates,
            answers,
            results,
        }
    }
}
