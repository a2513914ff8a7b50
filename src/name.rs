//! Hierarchical names for named-data requests and responses.
//!
//! A name is an ordered list of opaque byte components. The textual form is a
//! URI such as `ccnx:/example/ping/42`; bytes outside the unreserved set are
//! written as `%XX` escapes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// URI scheme accepted (and printed) in front of the path.
pub const URI_SCHEME: &str = "ccnx:";

/// Errors that can occur while parsing a name URI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The path part does not start with `/`.
    #[error("name URI must start with '/' (optionally preceded by ccnx:): {0}")]
    MissingLeadingSlash(String),

    /// A `%` escape is truncated or not followed by two hex digits.
    #[error("invalid percent escape in name URI: {0}")]
    InvalidEscape(String),
}

/// A single name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Component(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the component as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Component(s.as_bytes().to_vec())
    }
}

impl From<String> for Component {
    fn from(s: String) -> Self {
        Component(s.into_bytes())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &b in &self.0 {
            if is_unreserved(b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// A hierarchical name made of zero or more components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// Creates the empty (root) name `ccnx:/`.
    pub fn new() -> Self {
        Name::default()
    }

    /// Parses a name from its URI form.
    ///
    /// The `ccnx:` scheme is optional, the path must begin with `/`, and empty
    /// segments (`//`) are skipped.
    ///
    /// ```
    /// use ccnping::name::Name;
    /// let name = Name::from_uri("ccnx:/example/ping").unwrap();
    /// assert_eq!(name.len(), 2);
    /// assert_eq!(name.to_string(), "ccnx:/example/ping");
    /// ```
    pub fn from_uri(uri: &str) -> Result<Self, NameError> {
        let path = uri.strip_prefix(URI_SCHEME).unwrap_or(uri);
        if !path.starts_with('/') {
            return Err(NameError::MissingLeadingSlash(uri.to_string()));
        }

        let mut name = Name::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            name.push(Component(percent_decode(segment)?));
        }
        Ok(name)
    }

    pub fn push(&mut self, component: impl Into<Component>) {
        self.components.push(component.into());
    }

    /// Returns a copy of this name with `component` appended.
    #[must_use]
    pub fn append(&self, component: impl Into<Component>) -> Name {
        let mut name = self.clone();
        name.push(component);
        name
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// Returns true if every component of `self` matches the leading
    /// components of `other`. A name is a prefix of itself.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.len() <= other.len() && other.components[..self.len()] == self.components[..]
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", URI_SCHEME)?;
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::from_uri(s)
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'+' | b'=')
}

fn percent_decode(segment: &str) -> Result<Vec<u8>, NameError> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| NameError::InvalidEscape(segment.to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_scheme() {
        let a = Name::from_uri("ccnx:/example/data").unwrap();
        let b = Name::from_uri("/example/data").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get(0).unwrap().as_str(), Some("example"));
    }

    #[test]
    fn test_parse_root() {
        let root = Name::from_uri("ccnx:/").unwrap();
        assert!(root.is_empty());
        assert_eq!(root.to_string(), "ccnx:/");
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        let name = Name::from_uri("/a//b/").unwrap();
        assert_eq!(name.len(), 2);
    }

    #[test]
    fn test_parse_requires_leading_slash() {
        assert!(matches!(
            Name::from_uri("example/data"),
            Err(NameError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            Name::from_uri("ccnx:example"),
            Err(NameError::MissingLeadingSlash(_))
        ));
    }

    #[test]
    fn test_percent_escapes() {
        let name = Name::from_uri("/hello%20world/%2F").unwrap();
        assert_eq!(name.get(0).unwrap().as_bytes(), b"hello world");
        assert_eq!(name.get(1).unwrap().as_bytes(), b"/");
        assert_eq!(name.to_string(), "ccnx:/hello%20world/%2F");
    }

    #[test]
    fn test_invalid_percent_escape() {
        assert!(matches!(
            Name::from_uri("/bad%2"),
            Err(NameError::InvalidEscape(_))
        ));
        assert!(matches!(
            Name::from_uri("/bad%zz"),
            Err(NameError::InvalidEscape(_))
        ));
    }

    #[test]
    fn test_append_and_prefix() {
        let prefix = Name::from_uri("/example").unwrap().append("ping");
        let probe = prefix.append("42");

        assert_eq!(probe.to_string(), "ccnx:/example/ping/42");
        assert!(prefix.is_prefix_of(&probe));
        assert!(prefix.is_prefix_of(&prefix));
        assert!(!probe.is_prefix_of(&prefix));
        assert!(!Name::from_uri("/other").unwrap().is_prefix_of(&probe));
        assert_eq!(probe.last().unwrap().as_str(), Some("42"));
    }
}
