use std::collections::HashMap;

use exam_core::model::{AnswerOption, CertificationId, DomainTag, Question, QuestionId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::SqliteRepository;
use super::mapping::{
    id_i64, parse_difficulty, parse_domain_tag, parse_option_key, question_id_from_i64, ser,
};
use crate::repository::{QuestionRepository, StorageError};

fn question_from_row(row: &SqliteRow, options: Vec<AnswerOption>) -> Result<Question, StorageError> {
    Question::new(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        options,
        parse_domain_tag(row.try_get::<String, _>("domain").map_err(ser)?.as_str())?,
        parse_difficulty(row.try_get::<String, _>("difficulty").map_err(ser)?.as_str())?,
    )
    .map_err(ser)
}

fn collect_options(rows: Vec<SqliteRow>) -> Result<HashMap<i64, Vec<AnswerOption>>, StorageError> {
    let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
    for row in rows {
        let question_id: i64 = row.try_get("question_id").map_err(ser)?;
        let option = AnswerOption::new(
            parse_option_key(row.try_get::<String, _>("key").map_err(ser)?.as_str())?,
            row.try_get::<String, _>("text").map_err(ser)?,
            row.try_get::<i64, _>("correct").map_err(ser)? != 0,
        )
        .map_err(ser)?;
        by_question.entry(question_id).or_default().push(option);
    }
    Ok(by_question)
}

async fn load_all_options(
    pool: &SqlitePool,
    certification_id: i64,
) -> Result<HashMap<i64, Vec<AnswerOption>>, StorageError> {
    let rows = sqlx::query(
        r"
        SELECT question_id, key, text, correct
        FROM question_options
        WHERE certification_id = ?1
        ORDER BY question_id ASC, position ASC
        ",
    )
    .bind(certification_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    collect_options(rows)
}

async fn load_options_for(
    pool: &SqlitePool,
    certification_id: i64,
    question_ids: &[i64],
) -> Result<HashMap<i64, Vec<AnswerOption>>, StorageError> {
    let mut sql = String::from(
        r"
        SELECT question_id, key, text, correct
        FROM question_options
        WHERE certification_id = ?1 AND question_id IN (
        ",
    );
    for i in 0..question_ids.len() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        sql.push_str(&(i + 2).to_string());
    }
    sql.push_str(")\n ORDER BY question_id ASC, position ASC");

    let mut query = sqlx::query(&sql).bind(certification_id);
    for id in question_ids {
        query = query.bind(id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    collect_options(rows)
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(
        &self,
        certification_id: CertificationId,
        question: &Question,
    ) -> Result<(), StorageError> {
        let cert = id_i64("certification_id", certification_id.value())?;
        let id = id_i64("question_id", question.id().value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO questions (id, certification_id, text, domain, difficulty)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, certification_id) DO UPDATE SET
                text = excluded.text,
                domain = excluded.domain,
                difficulty = excluded.difficulty
            ",
        )
        .bind(id)
        .bind(cert)
        .bind(question.text().to_owned())
        .bind(question.domain().as_str().to_owned())
        .bind(question.difficulty().as_str().to_owned())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            "DELETE FROM question_options WHERE question_id = ?1 AND certification_id = ?2",
        )
        .bind(id)
        .bind(cert)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (position, option) in question.options().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO question_options (
                    question_id, certification_id, key, text, correct, position
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(id)
            .bind(cert)
            .bind(option.key().to_string())
            .bind(option.text().to_owned())
            .bind(i64::from(option.is_correct()))
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_questions(
        &self,
        certification_id: CertificationId,
        ids: &[QuestionId],
    ) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cert = id_i64("certification_id", certification_id.value())?;
        let mut id_params = Vec::with_capacity(ids.len());
        for id in ids {
            id_params.push(id_i64("question_id", id.value())?);
        }

        let mut sql = String::from(
            r"
            SELECT id, certification_id, text, domain, difficulty
            FROM questions
            WHERE certification_id = ?1 AND id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push_str(")\n");

        let mut query = sqlx::query(&sql).bind(cert);
        for id in &id_params {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut options = load_options_for(&self.pool, cert, &id_params).await?;

        let mut by_id: HashMap<u64, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let row_id: i64 = row.try_get("id").map_err(ser)?;
            let question = question_from_row(&row, options.remove(&row_id).unwrap_or_default())?;
            by_id.insert(question.id().value(), question);
        }

        // Results come back in the caller's id order, so a shuffled draw
        // stays shuffled.
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(&id.value()) {
                Some(question) => out.push(question),
                None => return Err(StorageError::NotFound),
            }
        }

        Ok(out)
    }

    async fn list_questions(
        &self,
        certification_id: CertificationId,
    ) -> Result<Vec<Question>, StorageError> {
        let cert = id_i64("certification_id", certification_id.value())?;

        let rows = sqlx::query(
            r"
            SELECT id, certification_id, text, domain, difficulty
            FROM questions
            WHERE certification_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(cert)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut options = load_all_options(&self.pool, cert).await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let row_id: i64 = row.try_get("id").map_err(ser)?;
            questions.push(question_from_row(
                &row,
                options.remove(&row_id).unwrap_or_default(),
            )?);
        }
        Ok(questions)
    }

    async fn list_questions_by_domains(
        &self,
        certification_id: CertificationId,
        domains: &[DomainTag],
    ) -> Result<Vec<Question>, StorageError> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }

        let cert = id_i64("certification_id", certification_id.value())?;

        let mut sql = String::from(
            r"
            SELECT id, certification_id, text, domain, difficulty
            FROM questions
            WHERE certification_id = ?1 AND domain IN (
            ",
        );
        for i in 0..domains.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push_str(")\n ORDER BY id ASC");

        let mut query = sqlx::query(&sql).bind(cert);
        for domain in domains {
            query = query.bind(domain.as_str().to_owned());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut options = load_all_options(&self.pool, cert).await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let row_id: i64 = row.try_get("id").map_err(ser)?;
            questions.push(question_from_row(
                &row,
                options.remove(&row_id).unwrap_or_default(),
            )?);
        }
        Ok(questions)
    }
}
