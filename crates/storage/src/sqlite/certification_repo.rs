use std::collections::HashMap;

use exam_core::model::{Certification, CertificationId, DomainTag};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{certification_id_from_i64, id_i64, parse_domain_tag, ser, u8_from_i64};
use crate::repository::{CertificationRepository, StorageError};

fn certification_from_row(
    row: &SqliteRow,
    domains: Vec<DomainTag>,
) -> Result<Certification, StorageError> {
    Certification::new(
        certification_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("description")
            .map_err(ser)?
            .unwrap_or_default(),
        u8_from_i64(
            "passing_grade",
            row.try_get::<i64, _>("passing_grade").map_err(ser)?,
        )?,
        domains,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl CertificationRepository for SqliteRepository {
    async fn upsert_certification(
        &self,
        certification: &Certification,
    ) -> Result<(), StorageError> {
        let id = id_i64("certification_id", certification.id().value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO certifications (id, name, description, passing_grade, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                passing_grade = excluded.passing_grade
            ",
        )
        .bind(id)
        .bind(certification.name().to_owned())
        .bind(certification.description().map(ToOwned::to_owned))
        .bind(i64::from(certification.passing_grade()))
        .bind(certification.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query("DELETE FROM certification_domains WHERE certification_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (position, domain) in certification.domains().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO certification_domains (certification_id, domain, position)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(id)
            .bind(domain.as_str().to_owned())
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

    async fn get_certification(
        &self,
        id: CertificationId,
    ) -> Result<Option<Certification>, StorageError> {
        let cert_id = id_i64("certification_id", id.value())?;

        let row = sqlx::query(
            r"
            SELECT id, name, description, passing_grade, created_at
            FROM certifications WHERE id = ?1
            ",
        )
        .bind(cert_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let domain_rows = sqlx::query(
            r"
            SELECT domain FROM certification_domains
            WHERE certification_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(cert_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut domains = Vec::with_capacity(domain_rows.len());
        for domain_row in domain_rows {
            domains.push(parse_domain_tag(
                domain_row.try_get::<String, _>("domain").map_err(ser)?.as_str(),
            )?);
        }

        certification_from_row(&row, domains).map(Some)
    }

    async fn list_certifications(&self) -> Result<Vec<Certification>, StorageError> {
        let domain_rows = sqlx::query(
            r"
            SELECT certification_id, domain FROM certification_domains
            ORDER BY certification_id ASC, position ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut domains_by_cert: HashMap<i64, Vec<DomainTag>> = HashMap::new();
        for domain_row in domain_rows {
            let cert_id: i64 = domain_row.try_get("certification_id").map_err(ser)?;
            let domain = parse_domain_tag(
                domain_row.try_get::<String, _>("domain").map_err(ser)?.as_str(),
            )?;
            domains_by_cert.entry(cert_id).or_default().push(domain);
        }

        let rows = sqlx::query(
            r"
            SELECT id, name, description, passing_grade, created_at
            FROM certifications
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut certifications = Vec::with_capacity(rows.len());
        for row in rows {
            let cert_id: i64 = row.try_get("id").map_err(ser)?;
            let domains = domains_by_cert.remove(&cert_id).unwrap_or_default();
            certifications.push(certification_from_row(&row, domains)?);
        }
        Ok(certifications)
    }
}
