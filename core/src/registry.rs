use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::SchemaViolation;
use crate::store::PostingSearch;

pub const TEXT_FILTER_MAX_CHARS: usize = 60;
pub const SEARCH_LIMIT_MAX: u32 = 20;

/// The shape we hand to the model provider for one tool. The rendered
/// `parameters` object is a fixed provider contract: `type`, `properties`,
/// `required`, nothing else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolDeclaration {
    /// The full `{"type": "function", "function": {...}}` wire form.
    pub fn to_function_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListIndustries,
    ListJobs,
    ListTracks,
    SearchPostings,
}

/// Arguments after schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolArgs {
    ListIndustries,
    ListJobs { industry_id: Uuid },
    ListTracks { job_id: Uuid },
    SearchPostings(PostingSearch),
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::ListIndustries,
        ToolName::ListJobs,
        ToolName::ListTracks,
        ToolName::SearchPostings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListIndustries => "list_industries",
            Self::ListJobs => "list_jobs",
            Self::ListTracks => "list_tracks",
            Self::SearchPostings => "search_postings",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Self::ListIndustries => "산업 목록 조회",
            Self::ListJobs => "산업에 속한 직무 목록 조회",
            Self::ListTracks => "직무에 속한 직무 상세(트랙) 목록 조회",
            Self::SearchPostings => "공고 검색 (trackId/키워드/지역/경력으로 필터). limit 최대 20",
        }
    }

    fn parameters(self) -> Value {
        match self {
            Self::ListIndustries => json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
            Self::ListJobs => json!({
                "type": "object",
                "properties": { "industryId": { "type": "string" } },
                "required": ["industryId"],
            }),
            Self::ListTracks => json!({
                "type": "object",
                "properties": { "jobId": { "type": "string" } },
                "required": ["jobId"],
            }),
            Self::SearchPostings => json!({
                "type": "object",
                "properties": {
                    "trackId": { "type": "string" },
                    "keyword": { "type": "string" },
                    "location": { "type": "string" },
                    "experience": { "type": "string" },
                    "limit": { "type": "number" },
                },
                "required": [],
            }),
        }
    }

    pub fn declaration(self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.as_str(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Validates raw (already JSON-parsed) arguments. Unknown keys are
    /// ignored; `null` is never accepted in place of an optional value.
    pub fn validate(self, raw: &Value) -> Result<ToolArgs, SchemaViolation> {
        let tool = self.as_str();
        let obj = raw
            .as_object()
            .ok_or_else(|| SchemaViolation::new(tool, "(root)", "expected an object"))?;

        match self {
            Self::ListIndustries => Ok(ToolArgs::ListIndustries),
            Self::ListJobs => Ok(ToolArgs::ListJobs {
                industry_id: required_uuid(tool, obj, "industryId")?,
            }),
            Self::ListTracks => Ok(ToolArgs::ListTracks {
                job_id: required_uuid(tool, obj, "jobId")?,
            }),
            Self::SearchPostings => Ok(ToolArgs::SearchPostings(PostingSearch {
                track_id: optional_uuid(tool, obj, "trackId")?,
                keyword: optional_text(tool, obj, "keyword")?,
                location: optional_text(tool, obj, "location")?,
                experience: optional_text(tool, obj, "experience")?,
                limit: optional_limit(tool, obj, "limit")?,
            })),
        }
    }
}

/// The fixed catalog of callable tools.
pub struct Registry;

impl Registry {
    pub fn declarations() -> Vec<ToolDeclaration> {
        ToolName::ALL.into_iter().map(ToolName::declaration).collect()
    }

    pub fn lookup(name: &str) -> Option<ToolName> {
        ToolName::from_name(name)
    }
}

fn present<'a>(
    tool: &'static str,
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a Value>, SchemaViolation> {
    match obj.get(field) {
        None => Ok(None),
        Some(Value::Null) => Err(SchemaViolation::new(tool, field, "must not be null")),
        Some(value) => Ok(Some(value)),
    }
}

/// Canonical hyphenated form only (36 chars), as a UUID-shaped string.
fn parse_uuid(tool: &'static str, field: &str, value: &Value) -> Result<Uuid, SchemaViolation> {
    let text = value
        .as_str()
        .ok_or_else(|| SchemaViolation::new(tool, field, "expected a string"))?;
    if text.len() != 36 {
        return Err(SchemaViolation::new(tool, field, "expected a UUID"));
    }
    Uuid::try_parse(text).map_err(|_| SchemaViolation::new(tool, field, "expected a UUID"))
}

fn required_uuid(
    tool: &'static str,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Uuid, SchemaViolation> {
    let value = present(tool, obj, field)?
        .ok_or_else(|| SchemaViolation::new(tool, field, "is required"))?;
    parse_uuid(tool, field, value)
}

fn optional_uuid(
    tool: &'static str,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<Uuid>, SchemaViolation> {
    present(tool, obj, field)?
        .map(|value| parse_uuid(tool, field, value))
        .transpose()
}

/// An empty string passes validation but applies no filter.
fn optional_text(
    tool: &'static str,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, SchemaViolation> {
    let Some(value) = present(tool, obj, field)? else {
        return Ok(None);
    };
    let text = value
        .as_str()
        .ok_or_else(|| SchemaViolation::new(tool, field, "expected a string"))?;
    let chars = text.chars().count();
    if chars > TEXT_FILTER_MAX_CHARS {
        return Err(SchemaViolation::new(
            tool,
            field,
            format!("must be at most {TEXT_FILTER_MAX_CHARS} chars, got {chars}"),
        ));
    }
    Ok(Some(text.to_string()).filter(|t| !t.is_empty()))
}

fn optional_limit(
    tool: &'static str,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<u32>, SchemaViolation> {
    let Some(value) = present(tool, obj, field)? else {
        return Ok(None);
    };
    let number = value
        .as_f64()
        .ok_or_else(|| SchemaViolation::new(tool, field, "expected a number"))?;
    if number.fract() != 0.0 {
        return Err(SchemaViolation::new(tool, field, "expected an integer"));
    }
    if !(1.0..=f64::from(SEARCH_LIMIT_MAX)).contains(&number) {
        return Err(SchemaViolation::new(
            tool,
            field,
            format!("must be between 1 and {SEARCH_LIMIT_MAX}"),
        ));
    }
    Ok(Some(number as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDUSTRY: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

    #[test]
    fn test_exactly_four_declarations_in_order() {
        let names: Vec<_> = Registry::declarations().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["list_industries", "list_jobs", "list_tracks", "search_postings"]);
    }

    #[test]
    fn test_declaration_wire_shape() {
        let decl = ToolName::ListJobs.declaration().to_function_json();
        assert_eq!(
            decl,
            json!({
                "type": "function",
                "function": {
                    "name": "list_jobs",
                    "description": "산업에 속한 직무 목록 조회",
                    "parameters": {
                        "type": "object",
                        "properties": { "industryId": { "type": "string" } },
                        "required": ["industryId"],
                    }
                }
            })
        );

        let search = ToolName::SearchPostings.declaration();
        assert_eq!(search.parameters["properties"]["limit"], json!({ "type": "number" }));
        assert_eq!(search.parameters["required"], json!([]));
    }

    #[test]
    fn test_list_jobs_requires_uuid() {
        let err = ToolName::ListJobs
            .validate(&json!({ "industryId": "software" }))
            .unwrap_err();
        assert_eq!(err.field, "industryId");
        assert_eq!(err.tool, "list_jobs");

        let missing = ToolName::ListJobs.validate(&json!({})).unwrap_err();
        assert_eq!(missing.reason, "is required");

        let ok = ToolName::ListJobs.validate(&json!({ "industryId": INDUSTRY })).unwrap();
        assert_eq!(
            ok,
            ToolArgs::ListJobs {
                industry_id: Uuid::parse_str(INDUSTRY).unwrap()
            }
        );
    }

    #[test]
    fn test_uuid_must_be_hyphenated() {
        let simple = INDUSTRY.replace('-', "");
        assert!(ToolName::ListTracks.validate(&json!({ "jobId": simple })).is_err());
    }

    #[test]
    fn test_search_limits() {
        let tool = ToolName::SearchPostings;
        assert!(tool.validate(&json!({ "limit": 0 })).is_err());
        assert!(tool.validate(&json!({ "limit": 21 })).is_err());
        assert!(tool.validate(&json!({ "limit": 2.5 })).is_err());
        assert!(tool.validate(&json!({ "limit": "8" })).is_err());

        let ToolArgs::SearchPostings(search) = tool.validate(&json!({ "limit": 20.0 })).unwrap() else {
            panic!("expected search args");
        };
        assert_eq!(search.limit, Some(20));
    }

    #[test]
    fn test_search_text_bounds() {
        let tool = ToolName::SearchPostings;
        let long = "가".repeat(61);
        let err = tool.validate(&json!({ "keyword": long })).unwrap_err();
        assert_eq!(err.field, "keyword");
        assert!(tool.validate(&json!({ "location": "가".repeat(60) })).is_ok());
        assert!(tool.validate(&json!({ "experience": null })).is_err());
    }

    #[test]
    fn test_empty_text_means_no_filter() {
        let args = ToolName::SearchPostings
            .validate(&json!({ "keyword": "", "location": "서울", "extra": true }))
            .unwrap();
        assert_eq!(
            args,
            ToolArgs::SearchPostings(PostingSearch {
                location: Some("서울".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_non_object_rejected() {
        let err = ToolName::ListIndustries.validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.field, "(root)");
        assert!(ToolName::ListIndustries.validate(&Value::Null).is_err());
    }

    #[test]
    fn test_lookup_unknown() {
        assert_eq!(Registry::lookup("search_postings"), Some(ToolName::SearchPostings));
        assert_eq!(Registry::lookup("drop_tables"), None);
    }
}
