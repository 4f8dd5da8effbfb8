use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{SchemaViolation, StoreResult};
use crate::registry::{Registry, ToolArgs};
use crate::store::JobStore;

/// A tool call as the model emitted it. Untrusted until validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub name: String,
    /// Raw JSON text, exactly as the model produced it.
    pub arguments: String,
}

/// Outcome of one executed tool call: rows, or `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub name: String,
    pub result: Value,
}

/// Executes validated tool calls against the store (service credential tier).
#[derive(Clone)]
pub struct Runtime {
    store: Arc<dyn JobStore>,
}

impl Runtime {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Runs one tool call.
    ///
    /// * malformed argument JSON is treated as `{}`;
    /// * an unregistered tool yields `Ok(None)`, nothing is reported;
    /// * schema-invalid arguments yield `Err(SchemaViolation)`;
    /// * a store failure becomes `{"error": message}` in the result.
    pub async fn run_tool(&self, call: &ToolCallRequest) -> Result<Option<ToolResult>, SchemaViolation> {
        let raw = parse_arguments(call);

        let Some(tool) = Registry::lookup(&call.name) else {
            warn!("Model requested unregistered tool '{}', skipping", call.name);
            return Ok(None);
        };

        let args = tool.validate(&raw)?;
        info!("Executing tool '{}'", tool.as_str());

        let result = match args {
            ToolArgs::ListIndustries => normalize(self.store.list_industries().await),
            ToolArgs::ListJobs { industry_id } => normalize(self.store.list_jobs(industry_id).await),
            ToolArgs::ListTracks { job_id } => normalize(self.store.list_tracks(job_id).await),
            ToolArgs::SearchPostings(search) => normalize(self.store.search_postings(&search).await),
        };

        Ok(Some(ToolResult {
            name: tool.as_str().to_string(),
            result,
        }))
    }
}

fn parse_arguments(call: &ToolCallRequest) -> Value {
    if call.arguments.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
        debug!("Malformed arguments for '{}' ({}), treating as empty", call.name, e);
        Value::Object(Map::new())
    })
}

fn normalize<T: Serialize>(outcome: StoreResult<Vec<T>>) -> Value {
    match outcome {
        Ok(rows) => serde_json::to_value(rows).unwrap_or_else(|e| json!({ "error": e.to_string() })),
        Err(e) => {
            warn!("Tool query failed: {}", e);
            json!({ "error": e.message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Industry, Job, MemoryStore, StoreData};
    use uuid::Uuid;

    fn call(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn seeded() -> (Arc<MemoryStore>, Uuid) {
        let it = Uuid::new_v4();
        let store = MemoryStore::new(StoreData {
            industries: vec![
                Industry { id: it, name: "IT".into() },
                Industry { id: Uuid::new_v4(), name: "Finance".into() },
            ],
            jobs: vec![
                Job { id: Uuid::new_v4(), name: "Frontend".into(), industry_id: it },
                Job { id: Uuid::new_v4(), name: "Backend".into(), industry_id: it },
            ],
            ..Default::default()
        });
        (Arc::new(store), it)
    }

    #[tokio::test]
    async fn test_list_industries_sorted_by_name() {
        let (store, _) = seeded();
        let runtime = Runtime::new(store);

        let result = runtime.run_tool(&call("list_industries", "{}")).await.unwrap().unwrap();
        assert_eq!(result.name, "list_industries");
        assert_eq!(result.result[0]["name"], "Finance");
        assert_eq!(result.result[1]["name"], "IT");
    }

    #[tokio::test]
    async fn test_list_jobs_projection() {
        let (store, it) = seeded();
        let runtime = Runtime::new(store);

        let args = json!({ "industryId": it.to_string() }).to_string();
        let result = runtime.run_tool(&call("list_jobs", &args)).await.unwrap().unwrap();
        let first = result.result[0].as_object().unwrap();
        assert_eq!(first["name"], "Backend");
        assert_eq!(first["industry_id"], it.to_string());
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_silently_dropped() {
        let (store, _) = seeded();
        let runtime = Runtime::new(store.clone());

        let outcome = runtime.run_tool(&call("delete_everything", "{}")).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_degrades_to_no_arguments() {
        let (store, _) = seeded();
        let runtime = Runtime::new(store);

        // list_industries takes no arguments, so "{}" is enough to succeed
        let result = runtime.run_tool(&call("list_industries", "{not json")).await.unwrap();
        assert!(result.is_some());

        // list_jobs needs industryId, so the empty fallback then fails the schema
        let err = runtime.run_tool(&call("list_jobs", "{\"industryId\":")).await.unwrap_err();
        assert_eq!(err.field, "industryId");
    }

    #[tokio::test]
    async fn test_schema_violation_runs_no_query() {
        let (store, _) = seeded();
        let runtime = Runtime::new(store.clone());

        let err = runtime
            .run_tool(&call("list_jobs", r#"{"industryId":"not-a-uuid"}"#))
            .await
            .unwrap_err();
        assert_eq!(err.tool, "list_jobs");
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_store_error_becomes_result_value() {
        let store = Arc::new(MemoryStore::failing("permission denied for table postings"));
        let runtime = Runtime::new(store);

        let result = runtime
            .run_tool(&call("search_postings", r#"{"keyword":"백엔드"}"#))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.result, json!({ "error": "permission denied for table postings" }));
    }

    #[tokio::test]
    async fn test_empty_argument_text_is_empty_object() {
        let (store, _) = seeded();
        let runtime = Runtime::new(store);
        let result = runtime.run_tool(&call("search_postings", "")).await.unwrap();
        assert_eq!(result.unwrap().result, json!([]));
    }
}
