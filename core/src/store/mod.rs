//! Read-only access to the job hierarchy: industries → jobs → tracks → postings.
//!
//! `JobStore` is the seam between the tool runtime / browse endpoints and the
//! relational backend. `PgStore` talks to Postgres; `MemoryStore` serves the
//! same queries from memory for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

mod memory;
mod postgres;

pub use memory::{MemoryStore, StoreData};
pub use postgres::PgStore;

/// Posting search default when the caller gives no limit.
pub const DEFAULT_SEARCH_LIMIT: u32 = 8;

/// Plain (non-agentic) search default.
pub const DEFAULT_PLAIN_SEARCH_LIMIT: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Industry {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub industry_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub job_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Posting {
    pub id: Uuid,
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub track_id: Option<Uuid>,
}

/// Conjunctive posting filters. Text filters are case-insensitive substring
/// matches built as `%value%`; `%` and `_` inside the value keep their
/// wildcard meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingSearch {
    pub track_id: Option<Uuid>,
    /// Matches title OR company.
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub experience: Option<String>,
    pub limit: Option<u32>,
}

impl PostingSearch {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }
}

pub(crate) fn contains_pattern(value: &str) -> String {
    format!("%{value}%")
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// All industries, by name.
    async fn list_industries(&self) -> StoreResult<Vec<Industry>>;

    /// Jobs of one industry, by name.
    async fn list_jobs(&self, industry_id: Uuid) -> StoreResult<Vec<Job>>;

    /// Tracks of one job, by name.
    async fn list_tracks(&self, job_id: Uuid) -> StoreResult<Vec<Track>>;

    /// Filtered postings, newest first, capped at `search.effective_limit()`.
    async fn search_postings(&self, search: &PostingSearch) -> StoreResult<Vec<Posting>>;

    /// Free-text search over title, company, location and experience, newest first.
    async fn search_text(&self, query: &str, limit: u32) -> StoreResult<Vec<Posting>>;

    async fn industry(&self, id: Uuid) -> StoreResult<Option<Industry>>;

    async fn job(&self, id: Uuid) -> StoreResult<Option<Job>>;

    async fn track(&self, id: Uuid) -> StoreResult<Option<Track>>;

    /// Every posting of one track, newest first.
    async fn track_postings(&self, track_id: Uuid) -> StoreResult<Vec<Posting>>;
}
