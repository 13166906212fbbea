//! Repository identifiers in `owner/name` form.
//!
//! Identifiers come from configuration and are validated once, at construction
//! time. Anything that is not exactly one non-empty owner and one non-empty name
//! separated by a single `/` is rejected.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing configured repository identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The entry is not of the form `owner/name`.
    #[error("invalid repository format: {value:?}, expected 'owner/name'")]
    InvalidFormat { value: String },

    /// No repositories were configured at all.
    #[error("at least one repository must be configured")]
    Empty,
}

/// A validated `owner/name` pair identifying one upstream repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryIdentifier {
    owner: String,
    name: String,
}

impl RepositoryIdentifier {
    /// Build an identifier from its parts, applying the same validation as parsing.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, IdentifierError> {
        let owner = owner.into();
        let name = name.into();
        if !is_valid_segment(&owner) || !is_valid_segment(&name) {
            return Err(IdentifierError::InvalidFormat {
                value: format!("{owner}/{name}"),
            });
        }
        Ok(Self { owner, name })
    }

    #[inline]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the full name (owner/name).
    #[inline]
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/')
}

impl FromStr for RepositoryIdentifier {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || IdentifierError::InvalidFormat {
            value: value.to_string(),
        };

        let (owner, name) = value.split_once('/').ok_or_else(invalid)?;
        Self::new(owner, name).map_err(|_| invalid())
    }
}

impl fmt::Display for RepositoryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse every configured entry, failing on the first malformed one.
///
/// Duplicate entries are collapsed so each repository is synced once per cycle.
pub fn parse_identifiers<I, S>(entries: I) -> Result<Vec<RepositoryIdentifier>, IdentifierError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut identifiers: Vec<RepositoryIdentifier> = Vec::new();
    for entry in entries {
        let id: RepositoryIdentifier = entry.as_ref().parse()?;
        if !identifiers.contains(&id) {
            identifiers.push(id);
        }
    }

    if identifiers.is_empty() {
        return Err(IdentifierError::Empty);
    }
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_name() {
        let id: RepositoryIdentifier = "acme/widgets".parse().unwrap();
        assert_eq!(id.owner(), "acme");
        assert_eq!(id.name(), "widgets");
        assert_eq!(id.to_string(), "acme/widgets");
        assert_eq!(id.full_name(), "acme/widgets");
    }

    #[test]
    fn accepts_any_non_empty_segments() {
        let id: RepositoryIdentifier = "rust-lang/rust.vim".parse().unwrap();
        assert_eq!(id.owner(), "rust-lang");
        assert_eq!(id.name(), "rust.vim");
    }

    #[test]
    fn rejects_malformed_entries() {
        for bad in [
            "",
            "/",
            "acme",
            "acme/",
            "/widgets",
            "acme/widgets/extra",
            "acme//widgets",
        ] {
            let err = bad.parse::<RepositoryIdentifier>().unwrap_err();
            assert_eq!(
                err,
                IdentifierError::InvalidFormat {
                    value: bad.to_string()
                },
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn new_applies_the_same_rules() {
        assert!(RepositoryIdentifier::new("acme", "widgets").is_ok());
        assert!(RepositoryIdentifier::new("", "widgets").is_err());
        assert!(RepositoryIdentifier::new("acme", "a/b").is_err());
    }

    #[test]
    fn parse_identifiers_fails_on_first_bad_entry() {
        let err = parse_identifiers(["acme/widgets", "broken", "acme/gadgets"]).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn parse_identifiers_collapses_duplicates() {
        let ids = parse_identifiers(["acme/widgets", "acme/gadgets", "acme/widgets"]).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].full_name(), "acme/widgets");
        assert_eq!(ids[1].full_name(), "acme/gadgets");
    }

    #[test]
    fn parse_identifiers_requires_at_least_one() {
        let entries: Vec<String> = Vec::new();
        assert_eq!(parse_identifiers(entries), Err(IdentifierError::Empty));
    }
}
