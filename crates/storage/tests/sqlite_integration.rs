use chrono::Duration;
use storage::repository::{
    AnswerRepository, AnswerSyncRecord, ResultRepository, StorageError, TemplateRepository,
};
use storage::sqlite::{SqliteConfig, SqliteRepository};
use studify_core::grading::score_session;
use studify_core::model::{
    AnswerRecord, CompletedResult, FinishReason, QuestionDraft, SessionId, TemplateDraft,
    TemplateId,
};
use studify_core::time::fixed_now;

fn question(subject: &str, correct: usize) -> QuestionDraft {
    QuestionDraft {
        subject: subject.into(),
        prompt: format!("{subject} question"),
        options: vec!["first".into(), "second".into(), "third".into()],
        correct_option: correct,
        explanation: Some("because".into()),
    }
}

fn template_draft() -> TemplateDraft {
    TemplateDraft {
        title: "Chemistry mock".into(),
        time_limit_secs: 900,
        passing_score: 60,
        shuffle_questions: true,
        questions: vec![
            question("Organic", 0),
            question("Inorganic", 2),
            question("Organic", 1),
        ],
    }
}

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url, SqliteConfig::default())
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_template_with_ordered_questions() {
    let repo = repo("memdb_templates").await;

    let inserted = repo
        .insert_template(template_draft().validate().unwrap())
        .await
        .unwrap();
    let fetched = repo
        .get_template(inserted.id())
        .await
        .unwrap()
        .expect("template exists");

    assert_eq!(fetched, inserted);
    assert_eq!(fetched.question_count(), 3);
    assert_eq!(fetched.questions()[1].correct_option(), 2);
    assert_eq!(fetched.questions()[0].explanation(), Some("because"));
    assert!(fetched.shuffle_questions());

    let listed = repo.list_templates(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].question_count, 3);

    assert!(repo.get_template(TemplateId::new(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_answer_mirror_is_last_write_wins() {
    let repo = repo("memdb_answers").await;
    let template = repo
        .insert_template(template_draft().validate().unwrap())
        .await
        .unwrap();
    let session_id = SessionId::generate();

    let mut record = AnswerSyncRecord {
        session_id,
        template_id: template.id(),
        question_index: 1,
        question_id: template.questions()[1].id(),
        record: AnswerRecord {
            selected: Some(0),
            time_spent_secs: 4,
            flagged: true,
        },
        synced_at: fixed_now(),
    };
    repo.upsert_answer(&record).await.unwrap();

    record.record.selected = None;
    record.record.time_spent_secs = 9;
    record.synced_at = fixed_now() + Duration::seconds(5);
    repo.upsert_answer(&record).await.unwrap();

    let stored = repo.answers_for_session(session_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], record);
}

#[tokio::test]
async fn sqlite_result_roundtrip_is_lossless() {
    let repo = repo("memdb_results").await;
    let template = repo
        .insert_template(template_draft().validate().unwrap())
        .await
        .unwrap();

    let records = vec![
        AnswerRecord {
            selected: Some(0),
            time_spent_secs: 11,
            flagged: false,
        },
        AnswerRecord {
            selected: Some(1),
            time_spent_secs: 7,
            flagged: true,
        },
        AnswerRecord::default(),
    ];
    let sheet = score_session(template.questions(), &records, template.passing_score());
    let started = fixed_now();
    let result = CompletedResult::from_sheet(
        SessionId::generate(),
        template.id(),
        started,
        started + Duration::minutes(3),
        FinishReason::TimeExpired,
        sheet,
    )
    .unwrap();

    let id = repo.append_result(&result).await.unwrap();
    let reloaded = repo.get_result(id).await.unwrap();

    assert_eq!(reloaded, result);
    assert_eq!(reloaded.correct(), 1);
    assert_eq!(reloaded.incorrect(), 1);
    assert_eq!(reloaded.unanswered(), 1);
    assert_eq!(reloaded.reason(), FinishReason::TimeExpired);

    let err = repo.append_result(&result).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let rows = repo.list_results(template.id(), 5).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);

    assert!(matches!(
        repo.get_result(id + 100).await.unwrap_err(),
        StorageError::NotFound
    ));
}
