//! Tag search predicates.

use crate::records::TagMap;

/// Filter applied to a single tag key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagFilter {
    /// Tag value equals the given string exactly.
    Eq(String),
    /// Tag value falls lexicographically within [low, high], inclusive.
    Between(String, String),
}

impl TagFilter {
    fn matches(&self, value: &str) -> bool {
        match self {
            TagFilter::Eq(expected) => value == expected,
            TagFilter::Between(low, high) => value >= low.as_str() && value <= high.as_str(),
        }
    }
}

/// Conjunction of tag filters; a record matches when every clause holds.
#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    clauses: Vec<(String, TagFilter)>,
}

impl SearchQuery {
    /// Create an empty query, matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an exact tag value.
    pub fn eq(mut self, key: &str, value: &str) -> Self {
        self.clauses
            .push((key.to_string(), TagFilter::Eq(value.to_string())));
        self
    }

    /// Require a tag value within an inclusive lexicographic range.
    pub fn between(mut self, key: &str, low: &str, high: &str) -> Self {
        self.clauses.push((
            key.to_string(),
            TagFilter::Between(low.to_string(), high.to_string()),
        ));
        self
    }

    /// Whether a tag set satisfies every clause. A missing key never
    /// matches.
    pub fn matches(&self, tags: &TagMap) -> bool {
        self.clauses.iter().all(|(key, filter)| {
            tags.get(key).map(|value| filter.matches(value)).unwrap_or(false)
        })
    }
}
