//! Source-prefixed content identifiers (spec §3 "GUID").

use std::fmt;

use crate::error::{ModelError, Result};

/// A normalized `source:value` identifier, e.g. `tmdb:12345`, `imdb:tt0000001`.
///
/// Matching between content items is set-intersection on `Guid` equality, so
/// the inner string is always lowercased at construction time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Guid(String);

impl Guid {
    /// Parses and normalizes a `source:value` string, lowercasing it.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let Some((source, value)) = trimmed.split_once(':') else {
            return Err(ModelError::MalformedGuid(raw.to_string()));
        };
        if source.is_empty() || value.is_empty() {
            return Err(ModelError::MalformedGuid(raw.to_string()));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn source(&self) -> &str {
        self.0.split_once(':').map(|(s, _)| s).unwrap_or(&self.0)
    }

    pub fn value(&self) -> &str {
        self.0.split_once(':').map(|(_, v)| v).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Guid {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Guid> for String {
    fn from(value: Guid) -> Self {
        value.0
    }
}

/// Returns true if the two GUID sets intersect (spec §3 "Matching").
pub fn guid_sets_intersect(a: &[Guid], b: &[Guid]) -> bool {
    a.iter().any(|g| b.contains(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case() {
        let g = Guid::parse("TMDB:12345").unwrap();
        assert_eq!(g.as_str(), "tmdb:12345");
        assert_eq!(g.source(), "tmdb");
        assert_eq!(g.value(), "12345");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(Guid::parse("tmdb12345").is_err());
    }

    #[test]
    fn intersection_matches_on_equality() {
        let a = vec![Guid::parse("tmdb:1").unwrap(), Guid::parse("imdb:tt1").unwrap()];
        let b = vec![Guid::parse("IMDB:TT1").unwrap()];
        assert!(guid_sets_intersect(&a, &b));
    }
}
