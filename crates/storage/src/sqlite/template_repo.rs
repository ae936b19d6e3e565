use chrono::Utc;
use sqlx::Row;
use studify_core::model::{ExamTemplate, QuestionId, TemplateId, ValidatedTemplate};

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, map_question_row, question_id_from_i64, ser, template_id_from_i64,
    u32_from_i64, usize_to_i64,
};
use crate::repository::{StorageError, TemplateListItem, TemplateRepository};

#[async_trait::async_trait]
impl TemplateRepository for SqliteRepository {
    async fn insert_template(
        &self,
        template: ValidatedTemplate,
    ) -> Result<ExamTemplate, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO templates (
                    title, time_limit_secs, passing_score, shuffle_questions, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&template.title)
        .bind(i64::from(template.time_limit_secs))
        .bind(i64::from(template.passing_score))
        .bind(template.shuffle_questions)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        let template_row_id = res.last_insert_rowid();

        let mut question_ids: Vec<QuestionId> = Vec::with_capacity(template.questions.len());
        for (position, question) in template.questions.iter().enumerate() {
            let options = serde_json::to_string(&question.options).map_err(ser)?;
            let res = sqlx::query(
                r"
                    INSERT INTO questions (
                        template_id, position, subject, prompt, options,
                        correct_option, explanation
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(template_row_id)
            .bind(usize_to_i64("position", position)?)
            .bind(&question.subject)
            .bind(&question.prompt)
            .bind(options)
            .bind(usize_to_i64("correct_option", question.correct_option)?)
            .bind(question.explanation.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            question_ids.push(question_id_from_i64(res.last_insert_rowid())?);
        }

        tx.commit().await.map_err(conn)?;

        template
            .assign_ids(template_id_from_i64(template_row_id)?, &question_ids)
            .map_err(ser)
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<ExamTemplate>, StorageError> {
        let template_id = id_i64("template_id", id.value())?;

        let Some(row) = sqlx::query(
            r"
                SELECT id, title, time_limit_secs, passing_score, shuffle_questions
                FROM templates
                WHERE id = ?1
            ",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let question_rows = sqlx::query(
            r"
                SELECT id, subject, prompt, options, correct_option, explanation
                FROM questions
                WHERE template_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for row in &question_rows {
            questions.push(map_question_row(row)?);
        }

        let passing_score = u8::try_from(row.try_get::<i64, _>("passing_score").map_err(ser)?)
            .map_err(ser)?;

        ExamTemplate::from_persisted(
            id,
            row.try_get("title").map_err(ser)?,
            u32_from_i64(
                "time_limit_secs",
                row.try_get::<i64, _>("time_limit_secs").map_err(ser)?,
            )?,
            passing_score,
            row.try_get::<bool, _>("shuffle_questions").map_err(ser)?,
            questions,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn list_templates(&self, limit: u32) -> Result<Vec<TemplateListItem>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT t.id, t.title, t.time_limit_secs, COUNT(q.id) AS question_count
                FROM templates t
                LEFT JOIN questions q ON q.template_id = t.id
                GROUP BY t.id
                ORDER BY t.id ASC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(TemplateListItem {
                id: template_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
                title: row.try_get("title").map_err(ser)?,
                question_count: u32_from_i64(
                    "question_count",
                    row.try_get::<i64, _>("question_count").map_err(ser)?,
                )?,
                time_limit_secs: u32_from_i64(
                    "time_limit_secs",
                    row.try_get::<i64, _>("time_limit_secs").map_err(ser)?,
                )?,
            });
        }
        Ok(out)
    }
}
