//! Plan document artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synthesized requirements document owned by a project.
///
/// Immutable once created; replaced only by re-planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    /// Document title
    pub title: String,

    /// Requirements text (markdown)
    pub content: String,

    /// When the document was synthesized
    pub created_at: DateTime<Utc>,
}

impl PlanDocument {
    /// Create a document from synthesized content.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: title.into(), content: content.into(), created_at: Utc::now() }
    }

    /// A short excerpt of the content for prompt context.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.content[..idx],
            None => &self.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_shorter_than_limit() {
        let doc = PlanDocument::new("PRD", "short");
        assert_eq!(doc.excerpt(100), "short");
    }

    #[test]
    fn test_excerpt_truncates() {
        let doc = PlanDocument::new("PRD", "abcdef");
        assert_eq!(doc.excerpt(3), "abc");
    }
}
