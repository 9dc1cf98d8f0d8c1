//! subdomain label validation.
//!
//! meshdir labels are stricter than general dns labels: only lowercase
//! ascii letters and digits, 1 to 63 characters, no hyphens. callers
//! lowercase at the boundary before parsing.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// labels that can never be allocated to a user.
pub const RESERVED_LABELS: [&str; 3] = ["root", "app", "www"];

/// errors from label validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// the label is empty.
    #[error("label is empty")]
    Empty,

    /// the label exceeds 63 characters.
    #[error("label is too long ({0} characters, maximum 63)")]
    TooLong(usize),

    /// the label contains something other than lowercase letters and digits.
    #[error("label may only contain lowercase letters and digits")]
    InvalidCharacters,
}

/// a validated subdomain label.
///
/// construction goes through [`Label::parse`], so a `Label` value always
/// satisfies the syntax rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    /// validate and wrap a label.
    pub fn parse(s: &str) -> Result<Self, LabelError> {
        if s.is_empty() {
            return Err(LabelError::Empty);
        }
        if s.len() > 63 {
            return Err(LabelError::TooLong(s.len()));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(LabelError::InvalidCharacters);
        }
        Ok(Self(s.to_string()))
    }

    /// whether this label is in the reserved set.
    pub fn is_reserved(&self) -> bool {
        RESERVED_LABELS.contains(&self.0.as_str())
    }

    /// get the raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Label {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Label::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Label::parse("alice").is_ok());
        assert!(Label::parse("a").is_ok());
        assert!(Label::parse("abc123").is_ok());
        assert!(Label::parse("007").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Label::parse(""), Err(LabelError::Empty));
    }

    #[test]
    fn test_parse_length_boundary() {
        assert!(Label::parse(&"a".repeat(63)).is_ok());
        assert_eq!(
            Label::parse(&"a".repeat(64)),
            Err(LabelError::TooLong(64))
        );
    }

    #[test]
    fn test_parse_rejects_hyphen() {
        assert_eq!(
            Label::parse("a-b"),
            Err(LabelError::InvalidCharacters)
        );
    }

    #[test]
    fn test_parse_rejects_uppercase_and_symbols() {
        assert_eq!(Label::parse("Alice"), Err(LabelError::InvalidCharacters));
        assert_eq!(Label::parse("a.b"), Err(LabelError::InvalidCharacters));
        assert_eq!(Label::parse("a_b"), Err(LabelError::InvalidCharacters));
    }

    #[test]
    fn test_reserved() {
        for name in RESERVED_LABELS {
            assert!(Label::parse(name).unwrap().is_reserved());
        }
        assert!(!Label::parse("alice").unwrap().is_reserved());
    }

    #[test]
    fn test_serde_roundtrip() {
        let label = Label::parse("alice").unwrap();
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(back, label);
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let result: Result<Label, _> = serde_json::from_str("\"Not-Valid\"");
        assert!(result.is_err());
    }
}
