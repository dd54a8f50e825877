//! Package identifier parsing
//!
//! A package reference is `[@scope/]name[@tag]`, e.g. `@acme/tool@1.2.3`
//! or plain `tool`. The tag defaults to `latest` when omitted. At most
//! three `@`-delimited segments are meaningful; anything beyond the tag
//! is ignored.

use std::fmt;

use crate::errors::{Result, TrustError};

/// Default dist-tag when the reference carries none
pub const DEFAULT_TAG: &str = "latest";

/// Parsed package reference
///
/// Immutable once parsed. A present scope means the reference was
/// explicitly written `@scope/name`; a scope is never inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentifier {
    /// Scope without the leading `@`, if the reference was scoped
    pub scope: Option<String>,
    /// Package name, always non-empty
    pub name: String,
    /// Dist-tag or literal version, defaults to `latest`
    pub tag: String,
}

impl PackageIdentifier {
    /// Parse a user-supplied package reference string
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TrustError::InvalidIdentifier(
                "empty package reference".to_string(),
            ));
        }

        // A leading `@` yields an empty first split segment, so the
        // scope/name body is always the element after it.
        let segments: Vec<&str> = trimmed.split('@').collect();
        let (body, tag) = if trimmed.starts_with('@') {
            (segments.get(1).copied().unwrap_or(""), segments.get(2).copied())
        } else {
            (segments[0], segments.get(1).copied())
        };

        let (scope, name) = if trimmed.starts_with('@') {
            let Some((scope, name)) = body.split_once('/') else {
                return Err(TrustError::InvalidIdentifier(format!(
                    "scope delimiter without a package name: {trimmed}"
                )));
            };
            let scope = scope.trim();
            if scope.is_empty() {
                return Err(TrustError::InvalidIdentifier(format!(
                    "empty scope: {trimmed}"
                )));
            }
            (Some(scope.to_string()), name.trim())
        } else {
            (None, body.trim())
        };

        if name.is_empty() {
            return Err(TrustError::InvalidIdentifier(format!(
                "missing package name: {trimmed}"
            )));
        }

        let tag = tag
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TAG);

        Ok(Self {
            scope,
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Full package name as it appears in the registry (`@scope/name` or `name`)
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}/{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    /// Registry URL path segment for this package
    ///
    /// Scoped names keep the leading `@` but percent-encode the slash,
    /// per registry convention.
    pub fn registry_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}%2F{}", scope, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.full_name(), self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let id = PackageIdentifier::parse("tool").unwrap();
        assert_eq!(id.scope, None);
        assert_eq!(id.name, "tool");
        assert_eq!(id.tag, "latest");
    }

    #[test]
    fn test_parse_name_with_tag() {
        let id = PackageIdentifier::parse("tool@1.2.3").unwrap();
        assert_eq!(id.scope, None);
        assert_eq!(id.name, "tool");
        assert_eq!(id.tag, "1.2.3");
    }

    #[test]
    fn test_parse_scoped_with_tag() {
        let id = PackageIdentifier::parse("@acme/tool@1.2.3").unwrap();
        assert_eq!(id.scope.as_deref(), Some("acme"));
        assert_eq!(id.name, "tool");
        assert_eq!(id.tag, "1.2.3");
    }

    #[test]
    fn test_parse_scoped_without_tag() {
        let id = PackageIdentifier::parse("@acme/tool").unwrap();
        assert_eq!(id.scope.as_deref(), Some("acme"));
        assert_eq!(id.name, "tool");
        assert_eq!(id.tag, "latest");
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(matches!(
            PackageIdentifier::parse(""),
            Err(TrustError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            PackageIdentifier::parse("   "),
            Err(TrustError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_parse_scope_without_name_fails() {
        assert!(matches!(
            PackageIdentifier::parse("@acme"),
            Err(TrustError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            PackageIdentifier::parse("@acme/"),
            Err(TrustError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_parse_empty_scope_fails() {
        assert!(matches!(
            PackageIdentifier::parse("@/tool"),
            Err(TrustError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            PackageIdentifier::parse("@  /tool"),
            Err(TrustError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_parse_trailing_at_defaults_to_latest() {
        let id = PackageIdentifier::parse("tool@").unwrap();
        assert_eq!(id.tag, "latest");
    }

    #[test]
    fn test_segments_beyond_tag_are_ignored() {
        let id = PackageIdentifier::parse("@acme/tool@1.2.3@extra").unwrap();
        assert_eq!(id.scope.as_deref(), Some("acme"));
        assert_eq!(id.name, "tool");
        assert_eq!(id.tag, "1.2.3");
    }

    #[test]
    fn test_full_name_and_registry_path() {
        let scoped = PackageIdentifier::parse("@acme/tool").unwrap();
        assert_eq!(scoped.full_name(), "@acme/tool");
        assert_eq!(scoped.registry_path(), "@acme%2Ftool");

        let bare = PackageIdentifier::parse("tool").unwrap();
        assert_eq!(bare.full_name(), "tool");
        assert_eq!(bare.registry_path(), "tool");
    }
}
