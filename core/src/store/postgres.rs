use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{contains_pattern, Industry, Job, JobStore, Posting, PostingSearch, Track};
use crate::config::Credentials;
use crate::error::StoreResult;

const POSTING_COLUMNS: &str =
    "id, company, title, location, experience, url, created_at, track_id";

/// Postgres-backed store. One instance per credential tier.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to `endpoint` (a `postgres://host:port/db` URL without
    /// credentials) as the given role.
    pub async fn connect(endpoint: &str, credentials: &Credentials) -> Result<Self> {
        let options = PgConnectOptions::from_str(endpoint)
            .with_context(|| format!("Invalid database endpoint '{}'", endpoint))?
            .username(&credentials.user)
            .password(&credentials.key);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database as '{}'", credentials.user))?;

        info!("Database pool ready for role '{}'", credentials.user);
        Ok(Self { pool })
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn list_industries(&self) -> StoreResult<Vec<Industry>> {
        let rows = sqlx::query_as::<_, Industry>("SELECT id, name FROM industries ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_jobs(&self, industry_id: Uuid) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            "SELECT id, name, industry_id FROM jobs WHERE industry_id = $1 ORDER BY name ASC",
        )
        .bind(industry_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_tracks(&self, job_id: Uuid) -> StoreResult<Vec<Track>> {
        let rows = sqlx::query_as::<_, Track>(
            "SELECT id, name, job_id FROM job_tracks WHERE job_id = $1 ORDER BY name ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn search_postings(&self, search: &PostingSearch) -> StoreResult<Vec<Posting>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {POSTING_COLUMNS} FROM postings WHERE TRUE"));

        if let Some(track_id) = search.track_id {
            qb.push(" AND track_id = ").push_bind(track_id);
        }
        if let Some(keyword) = search.keyword.as_deref().filter(|k| !k.is_empty()) {
            let pattern = contains_pattern(keyword);
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR company ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(location) = search.location.as_deref().filter(|l| !l.is_empty()) {
            qb.push(" AND location ILIKE ").push_bind(contains_pattern(location));
        }
        if let Some(experience) = search.experience.as_deref().filter(|e| !e.is_empty()) {
            qb.push(" AND experience ILIKE ").push_bind(contains_pattern(experience));
        }

        // id breaks created_at ties so repeated searches return the same order
        qb.push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(search.effective_limit()));

        let rows = qb.build_query_as::<Posting>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn search_text(&self, query: &str, limit: u32) -> StoreResult<Vec<Posting>> {
        let pattern = contains_pattern(query);
        let rows = sqlx::query_as::<_, Posting>(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings \
             WHERE title ILIKE $1 OR company ILIKE $1 OR location ILIKE $1 OR experience ILIKE $1 \
             ORDER BY created_at DESC, id ASC LIMIT $2"
        ))
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn industry(&self, id: Uuid) -> StoreResult<Option<Industry>> {
        let row = sqlx::query_as::<_, Industry>("SELECT id, name FROM industries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, Job>("SELECT id, name, industry_id FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn track(&self, id: Uuid) -> StoreResult<Option<Track>> {
        let row = sqlx::query_as::<_, Track>("SELECT id, name, job_id FROM job_tracks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn track_postings(&self, track_id: Uuid) -> StoreResult<Vec<Posting>> {
        let rows = sqlx::query_as::<_, Posting>(&format!(
            "SELECT {POSTING_COLUMNS} FROM postings WHERE track_id = $1 ORDER BY created_at DESC, id ASC"
        ))
        .bind(track_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
