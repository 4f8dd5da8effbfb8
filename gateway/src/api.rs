use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sizak_core::conversation::Turn;
use sizak_core::store::{Industry, Job, Posting, Track, DEFAULT_PLAIN_SEARCH_LIMIT};

pub const SEARCH_QUERY_MAX_CHARS: usize = 120;
pub const SEARCH_LIMIT_MAX: u32 = 30;

// Input: a chat transcript, oldest turn first
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Turn>,
    /// Page the user is looking at (plain chat only).
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    /// Kept as a float so `12.0` is accepted and `1.5` is rejected by us,
    /// not by serde.
    #[serde(default)]
    pub limit: Option<f64>,
}

impl SearchRequest {
    /// Returns the query and effective limit, or a client-facing reason.
    pub fn validate(&self) -> Result<(&str, u32), String> {
        let chars = self.q.chars().count();
        if chars == 0 || chars > SEARCH_QUERY_MAX_CHARS {
            return Err(format!("q must be 1..={} chars, got {}", SEARCH_QUERY_MAX_CHARS, chars));
        }

        let limit = match self.limit {
            None => DEFAULT_PLAIN_SEARCH_LIMIT,
            Some(n) if n.fract() == 0.0 && (1.0..=SEARCH_LIMIT_MAX as f64).contains(&n) => n as u32,
            Some(n) => return Err(format!("limit must be an integer in 1..={}, got {}", SEARCH_LIMIT_MAX, n)),
        };

        Ok((&self.q, limit))
    }
}

// Output shapes
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

/// A plain search hit. Omits the posting's track link.
#[derive(Debug, Serialize)]
pub struct SearchItem {
    pub id: Uuid,
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Posting> for SearchItem {
    fn from(posting: Posting) -> Self {
        Self {
            id: posting.id,
            company: posting.company,
            title: posting.title,
            location: posting.location,
            experience: posting.experience,
            url: posting.url,
            created_at: posting.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndustryDetail {
    pub industry: Industry,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub job: Job,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
pub struct TrackDetail {
    pub track: Track,
    pub postings: Vec<Posting>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(q: &str, limit: Option<f64>) -> SearchRequest {
        SearchRequest { q: q.to_string(), limit }
    }

    #[test]
    fn test_search_defaults_and_bounds() {
        assert_eq!(search("백엔드", None).validate(), Ok(("백엔드", 12)));
        assert_eq!(search("a", Some(30.0)).validate(), Ok(("a", 30)));
        assert!(search("", None).validate().is_err());
        assert!(search("a", Some(0.0)).validate().is_err());
        assert!(search("a", Some(31.0)).validate().is_err());
        assert!(search("a", Some(2.5)).validate().is_err());
    }

    #[test]
    fn test_query_length_counts_chars() {
        assert!(search(&"가".repeat(120), None).validate().is_ok());
        assert!(search(&"가".repeat(121), None).validate().is_err());
    }
}
