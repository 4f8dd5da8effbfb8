use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use super::{contains_pattern, Industry, Job, JobStore, Posting, PostingSearch, Track};
use crate::error::{StoreError, StoreResult};

/// Rows served by a [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreData {
    pub industries: Vec<Industry>,
    pub jobs: Vec<Job>,
    pub tracks: Vec<Track>,
    pub postings: Vec<Posting>,
}

/// In-memory `JobStore` with the same filtering and ordering rules as the
/// Postgres queries. Counts every query it answers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: StoreData,
    failure: Option<String>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        Self {
            data,
            failure: None,
            queries: AtomicUsize::new(0),
        }
    }

    /// A store whose every query fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            data: StoreData::default(),
            failure: Some(message.into()),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn begin(&self) -> StoreResult<&StoreData> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(StoreError::new(message.clone())),
            None => Ok(&self.data),
        }
    }
}

fn by_name<T>(mut rows: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    rows.sort_by(|a, b| name(a).cmp(name(b)));
    rows
}

fn newest_first(mut rows: Vec<Posting>) -> Vec<Posting> {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    rows
}

fn matches_opt(value: Option<&str>, pattern: &str) -> bool {
    value.is_some_and(|v| ilike(v, pattern))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

/// Splits a LIKE pattern with Postgres' default escape character `\`.
fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            // a trailing lone escape stays literal
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            other => LikeToken::Literal(other),
        });
    }
    tokens
}

/// Case-insensitive SQL `LIKE`: `%` matches any run, `_` matches one char,
/// `\` makes the next char literal.
pub(crate) fn ilike(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.to_lowercase().chars().collect();
    let p = like_tokens(&pattern.to_lowercase());

    let (mut vi, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while vi < v.len() {
        let advance = match p.get(pi) {
            Some(LikeToken::AnyRun) => {
                backtrack = Some((pi, vi));
                pi += 1;
                continue;
            }
            Some(LikeToken::AnyOne) => true,
            Some(LikeToken::Literal(c)) => *c == v[vi],
            None => false,
        };

        if advance {
            vi += 1;
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            vi = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|t| *t == LikeToken::AnyRun)
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn list_industries(&self) -> StoreResult<Vec<Industry>> {
        let data = self.begin()?;
        Ok(by_name(data.industries.clone(), |i| i.name.as_str()))
    }

    async fn list_jobs(&self, industry_id: Uuid) -> StoreResult<Vec<Job>> {
        let data = self.begin()?;
        let rows: Vec<Job> = data.jobs.iter().filter(|j| j.industry_id == industry_id).cloned().collect();
        Ok(by_name(rows, |j| j.name.as_str()))
    }

    async fn list_tracks(&self, job_id: Uuid) -> StoreResult<Vec<Track>> {
        let data = self.begin()?;
        let rows: Vec<Track> = data.tracks.iter().filter(|t| t.job_id == job_id).cloned().collect();
        Ok(by_name(rows, |t| t.name.as_str()))
    }

    async fn search_postings(&self, search: &PostingSearch) -> StoreResult<Vec<Posting>> {
        let data = self.begin()?;

        let keyword = search.keyword.as_deref().filter(|k| !k.is_empty()).map(contains_pattern);
        let location = search.location.as_deref().filter(|l| !l.is_empty()).map(contains_pattern);
        let experience = search.experience.as_deref().filter(|e| !e.is_empty()).map(contains_pattern);

        let rows = data
            .postings
            .iter()
            .filter(|p| search.track_id.map_or(true, |t| p.track_id == Some(t)))
            .filter(|p| {
                keyword
                    .as_deref()
                    .map_or(true, |k| ilike(&p.title, k) || ilike(&p.company, k))
            })
            .filter(|p| location.as_deref().map_or(true, |l| matches_opt(p.location.as_deref(), l)))
            .filter(|p| {
                experience
                    .as_deref()
                    .map_or(true, |e| matches_opt(p.experience.as_deref(), e))
            })
            .cloned()
            .collect();

        let mut rows = newest_first(rows);
        rows.truncate(search.effective_limit() as usize);
        Ok(rows)
    }

    async fn search_text(&self, query: &str, limit: u32) -> StoreResult<Vec<Posting>> {
        let data = self.begin()?;
        let pattern = contains_pattern(query);

        let rows = data
            .postings
            .iter()
            .filter(|p| {
                ilike(&p.title, &pattern)
                    || ilike(&p.company, &pattern)
                    || matches_opt(p.location.as_deref(), &pattern)
                    || matches_opt(p.experience.as_deref(), &pattern)
            })
            .cloned()
            .collect();

        let mut rows = newest_first(rows);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn industry(&self, id: Uuid) -> StoreResult<Option<Industry>> {
        let data = self.begin()?;
        Ok(data.industries.iter().find(|i| i.id == id).cloned())
    }

    async fn job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let data = self.begin()?;
        Ok(data.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn track(&self, id: Uuid) -> StoreResult<Option<Track>> {
        let data = self.begin()?;
        Ok(data.tracks.iter().find(|t| t.id == id).cloned())
    }

    async fn track_postings(&self, track_id: Uuid) -> StoreResult<Vec<Posting>> {
        let data = self.begin()?;
        let rows = data
            .postings
            .iter()
            .filter(|p| p.track_id == Some(track_id))
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn posting(title: &str, company: &str, location: Option<&str>, day: u32) -> Posting {
        Posting {
            id: Uuid::new_v4(),
            company: company.into(),
            title: title.into(),
            location: location.map(Into::into),
            experience: Some("신입".into()),
            url: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
            track_id: None,
        }
    }

    #[test]
    fn test_ilike_wildcards() {
        assert!(ilike("Backend Engineer", "%backend%"));
        assert!(ilike("서울 강남구", "%서울%"));
        assert!(ilike("abc", "a_c"));
        assert!(!ilike("abc", "a_d"));
        assert!(ilike("anything", "%"));
        assert!(ilike("", "%%"));
        assert!(!ilike("ab", "%abc%"));
        assert!(ilike("aXbXc", "%b%c"));
    }

    #[test]
    fn test_user_wildcards_are_not_escaped() {
        // "50%" is embedded verbatim, so its % still matches any run.
        assert!(ilike("50 people", &contains_pattern("50%")));
        assert!(ilike("Data_Eng", &contains_pattern("data_eng")));
        assert!(ilike("DataXEng", &contains_pattern("data_eng")));
    }

    #[test]
    fn test_backslash_escapes_like_postgres() {
        // keyword `C\` becomes `%C\%`: the final % is literal
        let pattern = contains_pattern("C\\");
        assert!(ilike("Objective-C%", &pattern));
        assert!(!ilike("C\\ programmer", &pattern));
        assert!(!ilike("C# developer", &pattern));

        assert!(ilike("100% remote", &contains_pattern("0\\%")));
        assert!(!ilike("100 remote", &contains_pattern("0\\%")));
        assert!(ilike("a\\b", "a\\\\b"));
    }

    #[tokio::test]
    async fn test_search_is_conjunctive_and_newest_first() {
        let store = MemoryStore::new(StoreData {
            postings: vec![
                posting("Backend Engineer", "Acme", Some("서울"), 1),
                posting("Frontend Engineer", "Backend Labs", Some("서울"), 3),
                posting("Backend Engineer", "Zeta", Some("부산"), 2),
            ],
            ..Default::default()
        });

        let rows = store
            .search_postings(&PostingSearch {
                keyword: Some("backend".into()),
                location: Some("서울".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let companies: Vec<_> = rows.iter().map(|p| p.company.as_str()).collect();
        assert_eq!(companies, vec!["Backend Labs", "Acme"]);
    }

    #[tokio::test]
    async fn test_search_applies_default_limit() {
        let postings = (1..=12).map(|d| posting("Engineer", "Acme", None, d)).collect();
        let store = MemoryStore::new(StoreData {
            postings,
            ..Default::default()
        });

        let rows = store.search_postings(&PostingSearch::default()).await.unwrap();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0].created_at.format("%d").to_string(), "12");
    }

    #[tokio::test]
    async fn test_missing_location_never_matches_location_filter() {
        let store = MemoryStore::new(StoreData {
            postings: vec![posting("Engineer", "Acme", None, 1)],
            ..Default::default()
        });
        let rows = store
            .search_postings(&PostingSearch {
                location: Some("서울".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_failing_store_counts_queries() {
        let store = MemoryStore::failing("relation \"industries\" does not exist");
        let err = store.list_industries().await.unwrap_err();
        assert_eq!(err.message, "relation \"industries\" does not exist");
        assert_eq!(store.query_count(), 1);
    }
}
