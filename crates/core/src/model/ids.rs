use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raised when a string does not hold a decimal id of the expected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

fn parse_u64(s: &str, kind: &'static str) -> Result<u64, ParseIdError> {
    s.parse::<u64>().map_err(|_| ParseIdError { kind })
}

// ─── QuestionId ────────────────────────────────────────────────────────────────

/// Identifier of a question, unique within its certification's bank.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(u64);

impl QuestionId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuestionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u64(s, "QuestionId").map(Self)
    }
}

// ─── CertificationId ───────────────────────────────────────────────────────────

/// Identifier of a certification in the catalog.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertificationId(u64);

impl CertificationId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CertificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificationId({})", self.0)
    }
}

impl fmt::Display for CertificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CertificationId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u64(s, "CertificationId").map(Self)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_id_display() {
        let id = QuestionId::new(17);
        assert_eq!(id.to_string(), "17");
    }

    #[test]
    fn question_id_from_str() {
        let id: QuestionId = "311".parse().unwrap();
        assert_eq!(id, QuestionId::new(311));
    }

    #[test]
    fn question_id_from_str_invalid() {
        let result = "not-a-number".parse::<QuestionId>();
        assert!(result.is_err());
    }

    #[test]
    fn question_id_debug_includes_type() {
        let id = QuestionId::new(7);
        assert_eq!(format!("{id:?}"), "QuestionId(7)");
    }

    #[test]
    fn certification_id_display() {
        let id = CertificationId::new(58);
        assert_eq!(id.to_string(), "58");
    }

    #[test]
    fn certification_id_from_str() {
        let id: CertificationId = "204".parse().unwrap();
        assert_eq!(id, CertificationId::new(204));
    }

    #[test]
    fn id_roundtrip() {
        let original = QuestionId::new(8086);
        let serialized = original.to_string();
        let deserialized: QuestionId = serialized.parse().unwrap();
        assert_eq!(original, deserialized);
    }
}
