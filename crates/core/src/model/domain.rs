use thiserror::Error;

/// Validated knowledge-area tag on a question (trimmed, non-empty).
///
/// Domains group questions in the post-test score breakdown and drive the
/// domain filter when a test is assembled. They carry no other semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainTag(String);

impl DomainTag {
    /// Create a validated domain tag.
    ///
    /// # Errors
    ///
    /// Returns `DomainTagError::Empty` if the tag is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainTagError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainTagError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DomainTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomainTagError {
    #[error("domain tag cannot be empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        let tag = DomainTag::new("  role  ").unwrap();
        assert_eq!(tag.as_str(), "role");
    }

    #[test]
    fn rejects_empty_tag() {
        let err = DomainTag::new("   ").unwrap_err();
        assert_eq!(err, DomainTagError::Empty);
    }

    #[test]
    fn orders_lexicographically() {
        let event = DomainTag::new("event").unwrap();
        let role = DomainTag::new("role").unwrap();
        assert!(event < role);
    }
}
