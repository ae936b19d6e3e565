use sqlx::Row;
use studify_core::model::{CompletedResult, TemplateId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_result_row, ser};
use crate::repository::{ResultId, ResultRepository, ResultRow, StorageError};

fn map_result_row_with_id(row: &sqlx::sqlite::SqliteRow) -> Result<ResultRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let result = map_result_row(row)?;
    Ok(ResultRow::new(id, result))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(&self, result: &CompletedResult) -> Result<ResultId, StorageError> {
        let subjects = serde_json::to_string(result.subjects()).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO results (
                    session_id, template_id, started_at, completed_at, finish_reason,
                    total_questions, correct, incorrect, unanswered,
                    score_percent, passed, time_spent_secs, subjects
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(result.session_id().to_string())
        .bind(id_i64("template_id", result.template_id().value())?)
        .bind(result.started_at())
        .bind(result.completed_at())
        .bind(result.reason().as_str())
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct()))
        .bind(i64::from(result.incorrect()))
        .bind(i64::from(result.unanswered()))
        .bind(result.score_percent())
        .bind(result.passed())
        .bind(i64::from(result.time_spent_secs()))
        .bind(subjects)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::Conflict
            } else {
                conn(e)
            }
        })?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: ResultId) -> Result<CompletedResult, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    session_id, template_id, started_at, completed_at, finish_reason,
                    total_questions, correct, incorrect, unanswered,
                    score_percent, passed, time_spent_secs, subjects
                FROM results
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn list_results(
        &self,
        template_id: TemplateId,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, template_id, started_at, completed_at, finish_reason,
                    total_questions, correct, incorrect, unanswered,
                    score_percent, passed, time_spent_secs, subjects
                FROM results
                WHERE template_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("template_id", template_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row_with_id(&row)?);
        }
        Ok(out)
    }
}
