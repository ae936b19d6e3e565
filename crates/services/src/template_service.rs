use std::sync::Arc;

use storage::repository::{InMemoryRepository, TemplateListItem, TemplateRepository};
use studify_core::model::{ExamTemplate, TemplateDraft, TemplateId};
use tracing::info;

use crate::error::TemplateServiceError;

/// Validates and stores exam templates.
///
/// Drafts are checked once here; everything downstream works with
/// validated `ExamTemplate`s only.
#[derive(Clone)]
pub struct TemplateService {
    templates: Arc<dyn TemplateRepository>,
}

impl TemplateService {
    #[must_use]
    pub fn new(templates: Arc<dyn TemplateRepository>) -> Self {
        Self { templates }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    /// Validate and store a template draft.
    ///
    /// # Errors
    ///
    /// Returns `TemplateServiceError::Template` for invalid drafts, or
    /// `TemplateServiceError::Storage` if persistence fails.
    pub async fn import(&self, draft: TemplateDraft) -> Result<ExamTemplate, TemplateServiceError> {
        let validated = draft.validate()?;
        let template = self.templates.insert_template(validated).await?;
        info!(
            template_id = %template.id(),
            questions = template.question_count(),
            "template imported"
        );
        Ok(template)
    }

    /// Parse a JSON template document and import it.
    ///
    /// # Errors
    ///
    /// Returns `TemplateServiceError::Json` if the document does not parse,
    /// plus everything `import` can return.
    pub async fn import_json(&self, json: &str) -> Result<ExamTemplate, TemplateServiceError> {
        let draft: TemplateDraft = serde_json::from_str(json)?;
        self.import(draft).await
    }

    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` on repository failures.
    pub async fn get(&self, id: TemplateId) -> Result<Option<ExamTemplate>, TemplateServiceError> {
        Ok(self.templates.get_template(id).await?)
    }

    /// # Errors
    ///
    /// Returns `TemplateServiceError::Storage` on repository failures.
    pub async fn list(&self, limit: u32) -> Result<Vec<TemplateListItem>, TemplateServiceError> {
        Ok(self.templates.list_templates(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studify_core::model::{DEFAULT_PASSING_SCORE, QuestionError, TemplateError};

    const DOCUMENT: &str = r#"{
        "title": "Anatomy drill",
        "time_limit_secs": 300,
        "questions": [
            {
                "subject": "Anatomy",
                "prompt": "Largest bone?",
                "options": ["Femur", "Tibia", "Humerus"],
                "correct_option": 0,
                "explanation": "The femur is the longest and heaviest."
            },
            {
                "subject": "Anatomy",
                "prompt": "Smallest bone?",
                "options": ["Stapes", "Incus"],
                "correct_option": 0
            }
        ]
    }"#;

    #[tokio::test]
    async fn import_json_applies_defaults() {
        let service = TemplateService::in_memory();
        let template = service.import_json(DOCUMENT).await.unwrap();

        assert_eq!(template.title(), "Anatomy drill");
        assert_eq!(template.question_count(), 2);
        assert_eq!(template.passing_score(), DEFAULT_PASSING_SCORE);
        assert!(!template.shuffle_questions());

        let listed = service.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, template.id());
        assert_eq!(service.get(template.id()).await.unwrap(), Some(template));
    }

    #[tokio::test]
    async fn invalid_correct_index_is_rejected_at_import() {
        let service = TemplateService::in_memory();
        let bad = DOCUMENT.replace("\"correct_option\": 0\n", "\"correct_option\": 5\n");

        let err = service.import_json(&bad).await.unwrap_err();
        assert!(matches!(
            err,
            TemplateServiceError::Template(TemplateError::Question {
                index: 1,
                source: QuestionError::CorrectOptionOutOfRange { index: 5, len: 2 },
            })
        ));
        assert!(service.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_document_is_a_json_error() {
        let service = TemplateService::in_memory();
        let err = service.import_json("{ \"title\": ").await.unwrap_err();
        assert!(matches!(err, TemplateServiceError::Json(_)));
    }
}
