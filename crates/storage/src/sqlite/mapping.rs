use sqlx::Row;
use studify_core::model::{
    CompletedResult, FinishReason, Question, QuestionId, SessionId, SubjectScore, TemplateId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn template_id_from_i64(v: i64) -> Result<TemplateId, StorageError> {
    Ok(TemplateId::new(i64_to_u64("template_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn session_id_from_str(v: &str) -> Result<SessionId, StorageError> {
    v.parse::<SessionId>().map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let correct_option = usize_from_i64(
        "correct_option",
        row.try_get::<i64, _>("correct_option").map_err(ser)?,
    )?;

    Question::from_persisted(
        id,
        row.try_get("subject").map_err(ser)?,
        row.try_get("prompt").map_err(ser)?,
        options,
        correct_option,
        row.try_get("explanation").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CompletedResult, StorageError> {
    let session_id = session_id_from_str(&row.try_get::<String, _>("session_id").map_err(ser)?)?;
    let template_id = template_id_from_i64(row.try_get::<i64, _>("template_id").map_err(ser)?)?;
    let reason =
        FinishReason::parse(&row.try_get::<String, _>("finish_reason").map_err(ser)?).map_err(ser)?;
    let subjects_json: String = row.try_get("subjects").map_err(ser)?;
    let subjects: Vec<SubjectScore> = serde_json::from_str(&subjects_json).map_err(ser)?;

    let count = |field: &'static str| -> Result<u32, StorageError> {
        u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
    };

    CompletedResult::from_persisted(
        session_id,
        template_id,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        reason,
        count("total_questions")?,
        count("correct")?,
        count("incorrect")?,
        count("unanswered")?,
        row.try_get::<f64, _>("score_percent").map_err(ser)?,
        row.try_get::<bool, _>("passed").map_err(ser)?,
        count("time_spent_secs")?,
        subjects,
    )
    .map_err(ser)
}
