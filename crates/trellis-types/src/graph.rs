use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a graph identifier.
const MAX_GRAPH_ID_LEN: usize = 128;

/// The logical graph (project / stream) a node or closure edge belongs to.
///
/// Every persisted row is keyed by `(GraphId, ..)`; the same node content
/// written into two graphs is stored twice. Graph ids are opaque strings
/// chosen by the caller, restricted to URL-safe characters so they can be
/// used directly as a path segment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GraphId(String);

impl GraphId {
    /// Create a graph id, validating its characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_GRAPH_ID_LEN {
            return Err(TypeError::InvalidGraphId(id));
        }
        let valid = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !valid {
            return Err(TypeError::InvalidGraphId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphId({})", self.0)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GraphId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GraphId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GraphId> for String {
    fn from(id: GraphId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_url_safe_ids() {
        let id = GraphId::new("project-42_main.v2").unwrap();
        assert_eq!(id.as_str(), "project-42_main.v2");
        assert_eq!(id.to_string(), "project-42_main.v2");
    }

    #[test]
    fn rejects_empty() {
        assert!(GraphId::new("").is_err());
    }

    #[test]
    fn rejects_path_separators() {
        assert!(GraphId::new("a/b").is_err());
        assert!(GraphId::new("a b").is_err());
    }

    #[test]
    fn rejects_overlong() {
        assert!(GraphId::new("x".repeat(MAX_GRAPH_ID_LEN + 1)).is_err());
    }

    #[test]
    fn serde_validates() {
        let ok: GraphId = serde_json::from_str("\"stream1\"").unwrap();
        assert_eq!(ok.as_str(), "stream1");
        assert!(serde_json::from_str::<GraphId>("\"bad/id\"").is_err());
    }
}
