use rand::rng;
use rand::seq::SliceRandom;
use std::sync::Arc;

use storage::repository::TemplateRepository;
use studify_core::model::{ExamTemplate, Question, TemplateId};

use crate::error::SessionError;

/// Storage-backed lookups used to open sessions.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// Load a template that can actually be taken.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unavailable` if the template is missing or has
    /// no questions, or `SessionError::Storage` on repository failures.
    pub(crate) async fn load_template(
        templates: &dyn TemplateRepository,
        template_id: TemplateId,
    ) -> Result<ExamTemplate, SessionError> {
        let template = templates
            .get_template(template_id)
            .await?
            .ok_or(SessionError::Unavailable)?;
        if template.question_count() == 0 {
            return Err(SessionError::Unavailable);
        }
        Ok(template)
    }

    /// Question order for a new attempt.
    ///
    /// Shares the template's list unless the template asks for shuffling.
    pub(crate) fn question_order(template: &ExamTemplate) -> Arc<[Question]> {
        if !template.shuffle_questions() {
            return Arc::clone(template.questions());
        }
        let mut questions = template.questions().to_vec();
        let mut rng = rng();
        questions.as_mut_slice().shuffle(&mut rng);
        Arc::from(questions)
    }
}
