use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use tracing::info;
use uuid::Uuid;

use sizak_core::conversation::Conversation;
use sizak_core::error::{ChatError, Locale};
use sizak_core::guard::{check_origin, client_key};
use sizak_core::llm::FragmentStream;
use sizak_core::relay::spawn_relay;
use sizak_core::store::Industry;

use crate::api::{ChatRequest, IndustryDetail, ItemsResponse, JobDetail, SearchItem, SearchRequest, TrackDetail};
use crate::error::ApiError;
use crate::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn locale_of(headers: &HeaderMap) -> Locale {
    Locale::from_accept_language(header_str(headers, "accept-language"))
}

/// Guard, then parse. The body is read raw so a malformed payload gets the
/// same generic failure as every other chat error.
fn admit(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<ChatRequest, ChatError> {
    // 1. Same-origin only
    check_origin(header_str(headers, "origin"), header_str(headers, "host"))?;

    // 2. Per-client budget
    let key = client_key(header_str(headers, "x-forwarded-for"));
    state.limiter.check(&key)?;

    // 3. Body shape
    serde_json::from_slice(body).map_err(|e| ChatError::InvalidConversation(e.to_string()))
}

fn stream_response(fragments: FragmentStream, locale: Locale) -> Response {
    let rx = spawn_relay(fragments, locale.stream_error_marker());

    // Dropping the body (client gone) drops `rx`, which stops the relay.
    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
        ],
        Body::from_stream(chunks),
    )
        .into_response()
}

pub async fn health_check() -> &'static str {
    "si-zak gateway: operational"
}

pub async fn agent_chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    let locale = locale_of(&headers);
    let fail = |e: ChatError| ApiError::chat(e, locale);

    let request = admit(&state, &headers, &body).map_err(fail)?;
    let conversation = Conversation::new(request.messages).map_err(fail)?;
    info!("Agent chat with {} turn(s)", conversation.turns().len());

    let fragments = state.orchestrator.run(conversation).await.map_err(fail)?;
    Ok(stream_response(fragments, locale))
}

pub async fn plain_chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    let locale = locale_of(&headers);
    let fail = |e: ChatError| ApiError::chat(e, locale);

    let request = admit(&state, &headers, &body).map_err(fail)?;
    let conversation = Conversation::new(request.messages).map_err(fail)?;

    let fragments = state
        .orchestrator
        .chat(conversation, request.context.as_deref())
        .await
        .map_err(fail)?;
    Ok(stream_response(fragments, locale))
}

pub async fn search(State(state): State<AppState>, body: Bytes) -> Result<Json<ItemsResponse<SearchItem>>, ApiError> {
    let request: SearchRequest = serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let (q, limit) = request.validate().map_err(ApiError::BadRequest)?;

    let rows = state.anon.search_text(q, limit).await?;
    info!("Search '{}' matched {} posting(s)", q, rows.len());
    let items = rows.into_iter().map(SearchItem::from).collect();
    Ok(Json(ItemsResponse { items }))
}

pub async fn list_industries(State(state): State<AppState>) -> Result<Json<ItemsResponse<Industry>>, ApiError> {
    let items = state.anon.list_industries().await?;
    Ok(Json(ItemsResponse { items }))
}

pub async fn industry_detail(
    State(state): State<AppState>,
    Path(industry_id): Path<Uuid>,
) -> Result<Json<IndustryDetail>, ApiError> {
    let industry = state.anon.industry(industry_id).await?.ok_or(ApiError::NotFound("industry"))?;
    let jobs = state.anon.list_jobs(industry_id).await?;
    Ok(Json(IndustryDetail { industry, jobs }))
}

pub async fn job_detail(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<Json<JobDetail>, ApiError> {
    let job = state.anon.job(job_id).await?.ok_or(ApiError::NotFound("job"))?;
    let tracks = state.anon.list_tracks(job_id).await?;
    Ok(Json(JobDetail { job, tracks }))
}

pub async fn track_detail(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> Result<Json<TrackDetail>, ApiError> {
    let track = state.anon.track(track_id).await?.ok_or(ApiError::NotFound("track"))?;
    let postings = state.anon.track_postings(track_id).await?;
    Ok(Json(TrackDetail { track, postings }))
}
