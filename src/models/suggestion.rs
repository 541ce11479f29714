use serde::{Deserialize, Serialize};

use super::geo::{Coordinate, ServiceArea};
use crate::errors::EngineError;

/// One autocomplete candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub display_text: String,
    pub short_label: String,
    pub coordinate: Coordinate,
}

/// A validated forward search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    query: String,
    pub area: Option<ServiceArea>,
    pub limit: usize,
}

impl SearchRequest {
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn new(query: &str) -> Result<Self, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery);
        }
        Ok(Self {
            query: query.to_string(),
            area: None,
            limit: Self::DEFAULT_LIMIT,
        })
    }

    pub fn within(mut self, area: ServiceArea) -> Self {
        self.area = Some(area);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn query_is_trimmed() {
        let req = SearchRequest::new("  Stortorget ").unwrap();
        assert_eq!(req.query(), "Stortorget");
        assert_eq!(req.limit, SearchRequest::DEFAULT_LIMIT);
    }

    #[test]
    fn blank_query_is_rejected() {
        assert_matches!(SearchRequest::new("   "), Err(EngineError::EmptyQuery));
    }

    #[test]
    fn limit_never_zero() {
        let req = SearchRequest::new("Mal").unwrap().limit(0);
        assert_eq!(req.limit, 1);
    }
}
