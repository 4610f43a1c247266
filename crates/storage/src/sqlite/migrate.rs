use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Ordered schema scripts; each runs once inside a transaction and is
/// recorded in `schema_migrations`.
const MIGRATIONS: &[(i64, &str)] = &[(1, SCHEMA_V1)];

/// Full relational schema: certifications with their domain lists, questions
/// with their options, attempts with per-domain scores and raw answers.
///
/// Child rows follow their parent via `ON DELETE CASCADE`; `position` columns
/// preserve authoring order.
const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS certifications (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    passing_grade INTEGER NOT NULL CHECK (passing_grade BETWEEN 1 AND 100),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS certification_domains (
    certification_id INTEGER NOT NULL,
    domain TEXT NOT NULL,
    position INTEGER NOT NULL CHECK (position >= 0),
    PRIMARY KEY (certification_id, domain),
    FOREIGN KEY (certification_id) REFERENCES certifications(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER NOT NULL,
    certification_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    domain TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    PRIMARY KEY (id, certification_id),
    FOREIGN KEY (certification_id) REFERENCES certifications(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS question_options (
    question_id INTEGER NOT NULL,
    certification_id INTEGER NOT NULL,
    key TEXT NOT NULL,
    text TEXT NOT NULL,
    correct INTEGER NOT NULL CHECK (correct IN (0, 1)),
    position INTEGER NOT NULL CHECK (position >= 0),
    PRIMARY KEY (question_id, certification_id, key),
    FOREIGN KEY (question_id, certification_id)
        REFERENCES questions(id, certification_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS attempts (
    id INTEGER PRIMARY KEY,
    certification_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
    correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
    passing_grade INTEGER NOT NULL CHECK (passing_grade BETWEEN 1 AND 100),
    FOREIGN KEY (certification_id) REFERENCES certifications(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS attempt_domain_scores (
    attempt_id INTEGER NOT NULL,
    domain TEXT NOT NULL,
    correct INTEGER NOT NULL CHECK (correct >= 0),
    total INTEGER NOT NULL CHECK (total >= 0),
    PRIMARY KEY (attempt_id, domain),
    FOREIGN KEY (attempt_id) REFERENCES attempts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS attempt_answers (
    attempt_id INTEGER NOT NULL,
    question_id INTEGER NOT NULL,
    selected TEXT NOT NULL,
    PRIMARY KEY (attempt_id, question_id),
    FOREIGN KEY (attempt_id) REFERENCES attempts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_questions_cert_domain
    ON questions (certification_id, domain, id);

CREATE INDEX IF NOT EXISTS idx_attempts_cert_completed
    ON attempts (certification_id, completed_at);
";

/// Bring the schema up to the latest version, applying only what is missing.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        ",
    )
    .execute(pool)
    .await?;

    for &(version, script) in MIGRATIONS {
        let applied = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?
            .is_some();
        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(script).execute(&mut *tx).await?;
        sqlx::query(
            r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    Ok(())
}
