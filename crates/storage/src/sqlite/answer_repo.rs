use sqlx::Row;
use studify_core::model::{AnswerRecord, SessionId};

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, question_id_from_i64, ser, session_id_from_str, template_id_from_i64,
    u32_from_i64, usize_from_i64, usize_to_i64,
};
use crate::repository::{AnswerRepository, AnswerSyncRecord, StorageError};

fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerSyncRecord, StorageError> {
    let selected = row
        .try_get::<Option<i64>, _>("selected_option")
        .map_err(ser)?
        .map(|v| usize_from_i64("selected_option", v))
        .transpose()?;

    Ok(AnswerSyncRecord {
        session_id: session_id_from_str(&row.try_get::<String, _>("session_id").map_err(ser)?)?,
        template_id: template_id_from_i64(row.try_get::<i64, _>("template_id").map_err(ser)?)?,
        question_index: u32_from_i64(
            "question_index",
            row.try_get::<i64, _>("question_index").map_err(ser)?,
        )?,
        question_id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        record: AnswerRecord {
            selected,
            time_spent_secs: u32_from_i64(
                "time_spent_secs",
                row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
            )?,
            flagged: row.try_get::<bool, _>("flagged").map_err(ser)?,
        },
        synced_at: row.try_get("synced_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn upsert_answer(&self, record: &AnswerSyncRecord) -> Result<(), StorageError> {
        let selected = record
            .record
            .selected
            .map(|v| usize_to_i64("selected_option", v))
            .transpose()?;

        sqlx::query(
            r"
                INSERT INTO answer_records (
                    session_id, question_index, template_id, question_id,
                    selected_option, time_spent_secs, flagged, synced_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(session_id, question_index) DO UPDATE SET
                    selected_option = excluded.selected_option,
                    time_spent_secs = excluded.time_spent_secs,
                    flagged = excluded.flagged,
                    synced_at = excluded.synced_at
            ",
        )
        .bind(record.session_id.to_string())
        .bind(i64::from(record.question_index))
        .bind(id_i64("template_id", record.template_id.value())?)
        .bind(id_i64("question_id", record.question_id.value())?)
        .bind(selected)
        .bind(i64::from(record.record.time_spent_secs))
        .bind(record.record.flagged)
        .bind(record.synced_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn answers_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AnswerSyncRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    session_id, question_index, template_id, question_id,
                    selected_option, time_spent_secs, flagged, synced_at
                FROM answer_records
                WHERE session_id = ?1
                ORDER BY question_index ASC
            ",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }
}
