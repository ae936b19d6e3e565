use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::sessions::{ExamLoopService, ResultService};
use crate::template_service::TemplateService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    templates: Arc<TemplateService>,
    exam_loop: Arc<ExamLoopService>,
    results: Arc<ResultService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over fresh in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let templates = Arc::new(TemplateService::new(Arc::clone(&storage.templates)));
        let exam_loop = Arc::new(ExamLoopService::new(
            clock,
            Arc::clone(&storage.templates),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.results),
        ));
        let results = Arc::new(ResultService::new(
            Arc::clone(&storage.results),
            Arc::clone(&storage.answers),
        ));
        Self {
            templates,
            exam_loop,
            results,
        }
    }

    #[must_use]
    pub fn templates(&self) -> Arc<TemplateService> {
        Arc::clone(&self.templates)
    }

    #[must_use]
    pub fn exam_loop(&self) -> Arc<ExamLoopService> {
        Arc::clone(&self.exam_loop)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultService> {
        Arc::clone(&self.results)
    }
}
