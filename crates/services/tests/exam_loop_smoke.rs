use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use services::sessions::{ExamTick, SessionNotice, SessionStatus};
use services::{AppServices, Clock, ExamLoopService, SessionError};
use storage::repository::{
    AnswerRepository, AnswerSyncRecord, InMemoryRepository, ResultId, ResultRepository, ResultRow,
    StorageError, TemplateRepository,
};
use studify_core::model::{
    CompletedResult, ExamTemplate, FinishReason, QuestionDraft, SessionId, TemplateDraft,
    TemplateId,
};
use studify_core::time::fixed_clock;

fn draft(time_limit_secs: u32, count: usize) -> TemplateDraft {
    TemplateDraft {
        title: "Pharmacology mock".into(),
        time_limit_secs,
        passing_score: 60,
        shuffle_questions: false,
        questions: (0..count)
            .map(|i| QuestionDraft {
                subject: if i % 2 == 0 { "Dosage" } else { "Interactions" }.into(),
                prompt: format!("Question {i}"),
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_option: 0,
                explanation: None,
            })
            .collect(),
    }
}

async fn seed(app: &AppServices, time_limit_secs: u32, count: usize) -> ExamTemplate {
    app.templates()
        .import(draft(time_limit_secs, count))
        .await
        .expect("import template")
}

#[tokio::test(start_paused = true)]
async fn timer_expiry_finishes_and_persists_once() {
    let app = AppServices::in_memory(Clock::default_clock());
    let template = seed(&app, 3, 2).await;

    let mut exam = app.exam_loop().open(template.id()).await.unwrap();
    exam.start().unwrap();
    exam.answer_current(0).unwrap();

    let mut running = Vec::new();
    let outcome = loop {
        let tick = exam.next_tick().await.expect("timer tick");
        match exam.on_tick(tick).await.unwrap() {
            ExamTick::Running { remaining_secs } => running.push(remaining_secs),
            ExamTick::Expired(outcome) => break outcome,
            ExamTick::Ignored => {}
        }
    };

    assert_eq!(running, vec![2, 1]);
    assert_eq!(outcome.result.reason(), FinishReason::TimeExpired);
    assert!(outcome.persist_error.is_none());
    assert!(outcome.is_persisted());
    assert_eq!(exam.session().status(), SessionStatus::Completed);
    assert_eq!(exam.session().remaining_secs(), 0);
    assert!(!exam.timer_running());

    let again = exam.finish(FinishReason::Submitted).await.unwrap();
    assert_eq!(again.result, outcome.result);
    assert_eq!(again.result_id, outcome.result_id);

    let listed = app.results().list_recent(template.id(), 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].correct, 1);
    assert_eq!(listed[0].unanswered, 1);
}

#[tokio::test]
async fn submit_mirrors_answers_and_stores_result() {
    let app = AppServices::in_memory(fixed_clock());
    let template = seed(&app, 600, 3).await;

    let mut exam = app.exam_loop().open(template.id()).await.unwrap();
    assert_eq!(exam.title(), "Pharmacology mock");
    exam.start().unwrap();
    exam.answer_current(0).unwrap();
    exam.next().unwrap();
    exam.answer_current(2).unwrap();
    exam.toggle_flag(1).unwrap();
    exam.go_to(99).unwrap();
    assert_eq!(exam.session().current_index(), 2);

    let outcome = exam.finish(FinishReason::Submitted).await.unwrap();
    exam.settle().await;
    assert_eq!(exam.pending_writes(), 0);

    let result = &outcome.result;
    assert_eq!(result.correct(), 1);
    assert_eq!(result.incorrect(), 1);
    assert_eq!(result.unanswered(), 1);
    assert!((result.score_percent() - 100.0 / 3.0).abs() < 1e-9);
    assert!(!result.passed());

    let mirrored = app
        .results()
        .mirrored_answers(exam.session().id())
        .await
        .unwrap();
    let selections: Vec<_> = mirrored
        .iter()
        .map(|r| (r.question_index, r.record.selected, r.record.flagged))
        .collect();
    assert_eq!(selections, vec![(0, Some(0), false), (1, Some(2), true)]);

    let stored = app
        .results()
        .get(outcome.result_id.expect("stored"))
        .await
        .unwrap();
    assert_eq!(&stored, result);
    assert!(exam.notices().is_empty());
}

#[tokio::test]
async fn missing_template_is_unavailable() {
    let app = AppServices::in_memory(fixed_clock());
    let err = app
        .exam_loop()
        .open(TemplateId::new(404))
        .await
        .err()
        .expect("open should fail");
    assert!(matches!(err, SessionError::Unavailable));
}

#[tokio::test(start_paused = true)]
async fn restart_runs_an_independent_attempt() {
    let app = AppServices::in_memory(Clock::default_clock());
    let template = seed(&app, 2, 2).await;

    let mut exam = app.exam_loop().open(template.id()).await.unwrap();
    exam.start().unwrap();
    let first = exam.finish(FinishReason::Submitted).await.unwrap();

    exam.restart().unwrap();
    assert_eq!(exam.session().status(), SessionStatus::NotStarted);
    assert_eq!(exam.result_id(), None);
    assert_ne!(exam.session().id(), first.result.session_id());

    exam.start().unwrap();
    assert_eq!(exam.session().remaining_secs(), 2);
    let second = loop {
        let tick = exam.next_tick().await.expect("timer tick");
        if let ExamTick::Expired(outcome) = exam.on_tick(tick).await.unwrap() {
            break outcome;
        }
    };
    assert_eq!(second.result.reason(), FinishReason::TimeExpired);

    let listed = app.results().list_recent(template.id(), 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_ne!(listed[0].session_id, listed[1].session_id);
}

#[tokio::test]
async fn sqlite_reload_matches_result_computed_at_finish() {
    let app = AppServices::new_sqlite(
        "sqlite:file:exam_loop_roundtrip?mode=memory&cache=shared",
        fixed_clock(),
    )
    .await
    .unwrap();
    let template = seed(&app, 900, 5).await;

    let mut exam = app.exam_loop().open(template.id()).await.unwrap();
    exam.start().unwrap();
    for index in 0..3 {
        exam.set_answer(index, 0).unwrap();
    }
    let outcome = exam.finish(FinishReason::Submitted).await.unwrap();
    exam.settle().await;

    let id = outcome.result_id.expect("stored");
    let reloaded = app.results().get(id).await.unwrap();
    assert_eq!(reloaded, outcome.result);
    assert!((reloaded.score_percent() - 60.0).abs() < f64::EPSILON);
    assert_eq!(reloaded.unanswered(), 2);
    assert_eq!(reloaded.incorrect(), 0);
    assert!(reloaded.passed());

    let mirrored = app
        .results()
        .mirrored_answers(exam.session().id())
        .await
        .unwrap();
    assert_eq!(mirrored.len(), 3);
}

//
// ─── FAILING STORAGE ───────────────────────────────────────────────────────────
//

#[derive(Default)]
struct FlakyResults {
    failed_once: AtomicBool,
    inner: InMemoryRepository,
}

#[async_trait::async_trait]
impl ResultRepository for FlakyResults {
    async fn append_result(&self, result: &CompletedResult) -> Result<ResultId, StorageError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Connection("database is locked".into()));
        }
        self.inner.append_result(result).await
    }

    async fn get_result(&self, id: ResultId) -> Result<CompletedResult, StorageError> {
        self.inner.get_result(id).await
    }

    async fn list_results(
        &self,
        template_id: TemplateId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        self.inner.list_results(template_id, limit).await
    }
}

struct OfflineAnswers;

#[async_trait::async_trait]
impl AnswerRepository for OfflineAnswers {
    async fn upsert_answer(&self, _record: &AnswerSyncRecord) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn answers_for_session(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<AnswerSyncRecord>, StorageError> {
        Ok(Vec::new())
    }
}

async fn seeded_templates() -> (Arc<InMemoryRepository>, TemplateId) {
    let templates = Arc::new(InMemoryRepository::new());
    let template = templates
        .insert_template(draft(600, 2).validate().unwrap())
        .await
        .unwrap();
    (templates, template.id())
}

#[tokio::test]
async fn result_storage_failure_is_reported_and_retryable() {
    let (templates, template_id) = seeded_templates().await;
    let results = Arc::new(FlakyResults::default());
    let service = ExamLoopService::new(
        fixed_clock(),
        templates.clone(),
        templates,
        results.clone(),
    );

    let mut exam = service.open(template_id).await.unwrap();
    assert!(matches!(
        exam.retry_persist().await.unwrap_err(),
        SessionError::NotCompleted
    ));
    exam.start().unwrap();
    exam.answer_current(0).unwrap();

    let outcome = exam.finish(FinishReason::Submitted).await.unwrap();
    assert!(matches!(
        outcome.persist_error,
        Some(StorageError::Connection(_))
    ));
    assert_eq!(outcome.result_id, None);
    assert_eq!(exam.session().status(), SessionStatus::Completed);

    let id = exam.retry_persist().await.unwrap();
    assert_eq!(exam.result_id(), Some(id));
    assert_eq!(exam.retry_persist().await.unwrap(), id);
    assert_eq!(results.get_result(id).await.unwrap(), outcome.result);
}

#[tokio::test]
async fn answer_mirroring_failure_becomes_a_notice() {
    let (templates, template_id) = seeded_templates().await;
    let service = ExamLoopService::new(
        fixed_clock(),
        templates.clone(),
        Arc::new(OfflineAnswers),
        templates,
    );

    let mut exam = service.open(template_id).await.unwrap();
    exam.start().unwrap();
    exam.set_answer(1, 2).unwrap();
    exam.settle().await;

    let notices = exam.notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        &notices[0],
        SessionNotice::SyncFailed { question_index: 1, .. }
    ));
    assert_eq!(exam.session().ledger().get(1).unwrap().selected, Some(2));
    assert!(exam.notices().is_empty());
}
