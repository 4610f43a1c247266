use exam_core::model::{CertificationId, Difficulty, DomainTag, OptionKey, QuestionId, TestKind};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn certification_id_from_i64(v: i64) -> Result<CertificationId, StorageError> {
    Ok(CertificationId::new(i64_to_u64("certification_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn parse_test_kind(s: &str) -> Result<TestKind, StorageError> {
    match s {
        "short" => Ok(TestKind::Short),
        "medium" => Ok(TestKind::Medium),
        "full" => Ok(TestKind::Full),
        _ => Err(StorageError::Serialization(format!("invalid test kind: {s}"))),
    }
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    match s {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        _ => Err(StorageError::Serialization(format!(
            "invalid difficulty: {s}"
        ))),
    }
}

pub(crate) fn parse_domain_tag(s: &str) -> Result<DomainTag, StorageError> {
    DomainTag::new(s).map_err(ser)
}

/// Option keys are stored as single-letter strings.
pub(crate) fn parse_option_key(s: &str) -> Result<OptionKey, StorageError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(raw), None) => OptionKey::new(raw).map_err(ser),
        _ => Err(StorageError::Serialization(format!(
            "invalid option key: {s}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_and_difficulty() {
        assert_eq!(parse_test_kind("short").unwrap(), TestKind::Short);
        assert!(parse_test_kind("marathon").is_err());
        assert_eq!(parse_difficulty("hard").unwrap(), Difficulty::Hard);
        assert!(parse_difficulty("brutal").is_err());
    }

    #[test]
    fn parses_option_keys_strictly() {
        assert_eq!(parse_option_key("b").unwrap(), OptionKey::new('B').unwrap());
        assert!(parse_option_key("").is_err());
        assert!(parse_option_key("AB").is_err());
        assert!(parse_option_key("7").is_err());
    }

    #[test]
    fn rejects_negative_ids() {
        assert!(question_id_from_i64(-1).is_err());
        assert!(certification_id_from_i64(7).is_ok());
    }
}
