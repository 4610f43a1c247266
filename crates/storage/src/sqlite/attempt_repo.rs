use std::collections::{HashMap, HashSet};

use exam_core::model::CertificationId;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::SqliteRepository;
use super::mapping::{
    certification_id_from_i64, id_i64, parse_domain_tag, parse_option_key, parse_test_kind,
    question_id_from_i64, ser, u8_from_i64, u32_from_i64,
};
use crate::repository::{
    AnswerRecord, AttemptRecord, AttemptRepository, AttemptRow, DomainScoreRecord, StorageError,
};

fn attempt_row(
    row: &SqliteRow,
    domain_scores: Vec<DomainScoreRecord>,
    answers: Vec<AnswerRecord>,
) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let record = AttemptRecord {
        certification_id: certification_id_from_i64(
            row.try_get::<i64, _>("certification_id").map_err(ser)?,
        )?,
        kind: parse_test_kind(row.try_get::<String, _>("kind").map_err(ser)?.as_str())?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        correct_count: u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        passing_grade: u8_from_i64(
            "passing_grade",
            row.try_get::<i64, _>("passing_grade").map_err(ser)?,
        )?,
        domain_scores,
        answers,
    };
    Ok(AttemptRow::new(id, record))
}

fn in_list(prefix: &str, count: usize, suffix: &str) -> String {
    let mut sql = String::from(prefix);
    for i in 0..count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        sql.push_str(&(i + 1).to_string());
    }
    sql.push_str(")\n");
    sql.push_str(suffix);
    sql
}

async fn load_domain_scores(
    pool: &SqlitePool,
    attempt_ids: &[i64],
) -> Result<HashMap<i64, Vec<DomainScoreRecord>>, StorageError> {
    if attempt_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = in_list(
        r"
        SELECT attempt_id, domain, correct, total
        FROM attempt_domain_scores
        WHERE attempt_id IN (
        ",
        attempt_ids.len(),
        " ORDER BY attempt_id ASC, domain ASC",
    );

    let mut query = sqlx::query(&sql);
    for id in attempt_ids {
        query = query.bind(id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    let mut by_attempt: HashMap<i64, Vec<DomainScoreRecord>> = HashMap::new();
    for row in rows {
        let attempt_id: i64 = row.try_get("attempt_id").map_err(ser)?;
        by_attempt.entry(attempt_id).or_default().push(DomainScoreRecord {
            domain: parse_domain_tag(row.try_get::<String, _>("domain").map_err(ser)?.as_str())?,
            correct: u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
            total: u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
        });
    }
    Ok(by_attempt)
}

async fn load_answers(
    pool: &SqlitePool,
    attempt_ids: &[i64],
) -> Result<HashMap<i64, Vec<AnswerRecord>>, StorageError> {
    if attempt_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = in_list(
        r"
        SELECT attempt_id, question_id, selected
        FROM attempt_answers
        WHERE attempt_id IN (
        ",
        attempt_ids.len(),
        " ORDER BY attempt_id ASC, question_id ASC",
    );

    let mut query = sqlx::query(&sql);
    for id in attempt_ids {
        query = query.bind(id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    let mut by_attempt: HashMap<i64, Vec<AnswerRecord>> = HashMap::new();
    for row in rows {
        let attempt_id: i64 = row.try_get("attempt_id").map_err(ser)?;
        by_attempt.entry(attempt_id).or_default().push(AnswerRecord {
            question_id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
            selected: parse_option_key(
                row.try_get::<String, _>("selected").map_err(ser)?.as_str(),
            )?,
        });
    }
    Ok(by_attempt)
}

async fn assemble(pool: &SqlitePool, rows: Vec<SqliteRow>) -> Result<Vec<AttemptRow>, StorageError> {
    let mut ids = Vec::with_capacity(rows.len());
    for row in &rows {
        ids.push(row.try_get::<i64, _>("id").map_err(ser)?);
    }
    let mut scores = load_domain_scores(pool, &ids).await?;
    let mut answers = load_answers(pool, &ids).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.try_get("id").map_err(ser)?;
        out.push(attempt_row(
            &row,
            scores.remove(&id).unwrap_or_default(),
            answers.remove(&id).unwrap_or_default(),
        )?);
    }
    Ok(out)
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<i64, StorageError> {
        let cert = id_i64("certification_id", record.certification_id.value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    certification_id, kind, started_at, completed_at,
                    total_questions, correct_count, passing_grade
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(cert)
        .bind(record.kind.as_str())
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(i64::from(record.total_questions))
        .bind(i64::from(record.correct_count))
        .bind(i64::from(record.passing_grade))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let attempt_id = res.last_insert_rowid();

        for score in &record.domain_scores {
            sqlx::query(
                r"
                    INSERT INTO attempt_domain_scores (attempt_id, domain, correct, total)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(attempt_id)
            .bind(score.domain.as_str().to_owned())
            .bind(i64::from(score.correct))
            .bind(i64::from(score.total))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        for answer in &record.answers {
            sqlx::query(
                r"
                    INSERT INTO attempt_answers (attempt_id, question_id, selected)
                    VALUES (?1, ?2, ?3)
                ",
            )
            .bind(attempt_id)
            .bind(id_i64("question_id", answer.question_id.value())?)
            .bind(answer.selected.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(attempt_id)
    }

    async fn get_attempt(&self, id: i64) -> Result<AttemptRow, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, certification_id, kind, started_at, completed_at,
                    total_questions, correct_count, passing_grade
                FROM attempts
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let mut scores = load_domain_scores(&self.pool, &[id]).await?;
        let mut answers = load_answers(&self.pool, &[id]).await?;
        attempt_row(
            &row,
            scores.remove(&id).unwrap_or_default(),
            answers.remove(&id).unwrap_or_default(),
        )
    }

    async fn list_attempt_rows(
        &self,
        certification_id: CertificationId,
        completed_from: Option<chrono::DateTime<chrono::Utc>>,
        completed_until: Option<chrono::DateTime<chrono::Utc>>,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let mut sql = String::from(
            r"
                SELECT
                    id, certification_id, kind, started_at, completed_at,
                    total_questions, correct_count, passing_grade
                FROM attempts
                WHERE certification_id = ?1
            ",
        );

        let mut bind_index = 2;
        if completed_from.is_some() {
            sql.push_str(" AND completed_at >= ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        if completed_until.is_some() {
            sql.push_str(" AND completed_at <= ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        sql.push_str(" ORDER BY completed_at DESC, id DESC");
        sql.push_str(" LIMIT ?");
        sql.push_str(&bind_index.to_string());

        let mut query =
            sqlx::query(&sql).bind(id_i64("certification_id", certification_id.value())?);
        if let Some(from) = completed_from {
            query = query.bind(from);
        }
        if let Some(until) = completed_until {
            query = query.bind(until);
        }
        query = query.bind(i64::from(limit));

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        assemble(&self.pool, rows).await
    }

    async fn list_latest_attempt_rows(
        &self,
        certification_ids: &[CertificationId],
    ) -> Result<Vec<AttemptRow>, StorageError> {
        if certification_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = in_list(
            r"
                SELECT
                    id, certification_id, kind, started_at, completed_at,
                    total_questions, correct_count, passing_grade
                FROM attempts
                WHERE certification_id IN (
            ",
            certification_ids.len(),
            " ORDER BY certification_id ASC, completed_at DESC, id DESC",
        );

        let mut query = sqlx::query(&sql);
        for certification_id in certification_ids {
            query = query.bind(id_i64("certification_id", certification_id.value())?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut latest = Vec::new();
        for row in rows {
            let certification_id = certification_id_from_i64(
                row.try_get::<i64, _>("certification_id").map_err(ser)?,
            )?;
            if !seen.insert(certification_id) {
                continue;
            }
            latest.push(row);
        }

        assemble(&self.pool, latest).await
    }
}
