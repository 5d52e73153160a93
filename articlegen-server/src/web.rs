//! HTTP surface: the form page and a JSON API over the same session.
//!
//! Both surfaces find the caller's session through the `articlegen_session`
//! cookie and create one when it is missing or unknown. A generate request
//! holds the connection open until the pipeline finishes.

use std::sync::Arc;

use articlegen_core::{
    InvokeError, PromptForm, PromptSet, Temperature, TemperatureError, Transcript,
};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::page::{self, Notice};
use crate::server::{Session, SharedState, SESSION_COOKIE};

/// Build the axum router with the form page and REST endpoints.
pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/api/v1/health", get(api_health))
        .route("/api/v1/session", get(api_session))
        .route("/api/v1/prompts", get(api_get_prompts).put(api_put_prompts))
        .route("/api/v1/prompts/save", post(api_save_prompts))
        .route("/api/v1/generate", post(api_generate))
        .layer(DefaultBodyLimit::max(12 * 1024 * 1024)) // 12MB
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Sessions ───────────────────────────────────────────────────────────

fn cookie_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_string())
        })
}

/// The caller's session, plus a fresh id when one had to be created.
fn resolve_session(state: &SharedState, headers: &HeaderMap) -> (Arc<Session>, Option<String>) {
    if let Some(id) = cookie_session_id(headers)
        && let Some(session) = state.session(&id)
    {
        return (session, None);
    }
    let (id, session) = state.create_session();
    (session, Some(id))
}

fn with_session_cookie(mut resp: Response, new_id: Option<String>) -> Response {
    if let Some(id) = new_id {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            resp.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    resp
}

// ── Form submission ────────────────────────────────────────────────────

/// Everything a multipart submission may carry.
#[derive(Debug, Default)]
struct Submission {
    action: Option<String>,
    prompts: PromptForm,
    api_key: Option<String>,
    temperature: Option<String>,
    transcript: Option<Vec<u8>>,
}

impl Submission {
    async fn read(mut multipart: Multipart) -> Result<Self, (StatusCode, String)> {
        let mut form = Submission::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    let has_name = field.file_name().is_some_and(|n| !n.is_empty());
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, format!("File read error: {e}")))?;
                    // Browsers send an empty, unnamed part when no file was chosen.
                    if has_name || !bytes.is_empty() {
                        form.transcript = Some(bytes.to_vec());
                    }
                }
                _ => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{name} read error: {e}")))?;
                    match name.as_str() {
                        "action" => form.action = Some(value),
                        "api_key" => form.api_key = Some(value),
                        "temperature" => form.temperature = Some(value),
                        n if PromptForm::is_prompt_field(n) => form.prompts.insert(n, value),
                        _ => {}
                    }
                }
            }
        }
        Ok(form)
    }

    /// Missing means the default; anything unparsable or out of range is rejected.
    fn temperature(&self) -> Result<Temperature, String> {
        let Some(raw) = self.temperature.as_deref().map(str::trim).filter(|s| !s.is_empty())
        else {
            return Ok(Temperature::default());
        };
        let value: f32 = raw
            .parse()
            .map_err(|_| format!("Temperature must be a number, got {raw:?}"))?;
        Temperature::new(value).map_err(|TemperatureError(v)| {
            format!("Temperature must be between 0.0 and 1.0, got {v}")
        })
    }

    fn transcript(&self) -> Result<Option<Transcript>, String> {
        self.transcript
            .as_deref()
            .map(Transcript::from_bytes)
            .transpose()
            .map_err(|e| format!("Could not read transcript: {e}"))
    }
}

enum Generated {
    Article(String),
    Rejected(String),
    Failed(InvokeError),
}

/// Validate inputs, then run the session's invoker.
async fn generate(state: &SharedState, session: &Session, form: &Submission) -> Generated {
    let temperature = match form.temperature() {
        Ok(t) => t,
        Err(msg) => return Generated::Rejected(msg),
    };
    let transcript = match form.transcript() {
        Ok(t) => t,
        Err(msg) => return Generated::Rejected(msg),
    };

    let prompts = session.prompts.lock().prompts().clone();
    let api_key = state.config.resolve_api_key(form.api_key.as_deref());
    let llm = state.provider.connect(&api_key, &state.config.azure());

    match session
        .invoker
        .invoke(&prompts, transcript.as_ref(), temperature, llm)
        .await
    {
        Ok(article) => Generated::Article(article),
        Err(e) => Generated::Failed(e),
    }
}

fn failure_status(err: &InvokeError) -> StatusCode {
    match err {
        InvokeError::MissingInput => StatusCode::BAD_REQUEST,
        InvokeError::ApiConnectivity { .. } => StatusCode::BAD_GATEWAY,
        InvokeError::Pipeline { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        InvokeError::Busy => StatusCode::CONFLICT,
    }
}

fn save_session(state: &SharedState, session: &Session) -> Result<(), String> {
    session.prompts.lock().save(&state.store).map_err(|e| {
        tracing::error!(error = %e, "Failed to save configuration");
        e.to_string()
    })
}

// ── Page handlers ──────────────────────────────────────────────────────

/// GET /
async fn index(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    let (session, new_id) = resolve_session(&state, &headers);
    let prompts = session.prompts.lock().prompts().clone();
    let html = page::render(&prompts, Temperature::default(), None);
    with_session_cookie(Html(html).into_response(), new_id)
}

/// The two buttons on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Save,
    Generate,
}

impl Action {
    fn parse(raw: Option<&str>) -> Result<Self, (StatusCode, String)> {
        match raw {
            Some("save") => Ok(Action::Save),
            Some("generate") => Ok(Action::Generate),
            other => Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown action: {}", other.unwrap_or("(none)")),
            )),
        }
    }
}

/// POST /
/// Multipart form from the page. A valid `action` is required; prompt edits
/// then apply to the session before the save or generate runs.
async fn submit(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    let (session, new_id) = resolve_session(&state, &headers);
    let form = Submission::read(multipart).await?;
    let action = Action::parse(form.action.as_deref())?;
    session.prompts.lock().apply_form(&form.prompts);

    let shown_temperature = form.temperature().unwrap_or_default();
    let (status, notice) = match action {
        Action::Save => match save_session(&state, &session) {
            Ok(()) => (StatusCode::OK, Notice::Saved),
            Err(msg) => (StatusCode::INTERNAL_SERVER_ERROR, Notice::SaveFailed(msg)),
        },
        Action::Generate => match generate(&state, &session, &form).await {
            Generated::Article(article) => (StatusCode::OK, Notice::Article(article)),
            Generated::Rejected(msg) => (StatusCode::BAD_REQUEST, Notice::InvalidInput(msg)),
            Generated::Failed(err) => (failure_status(&err), Notice::Failed(err)),
        },
    };

    let prompts = session.prompts.lock().prompts().clone();
    let html = page::render(&prompts, shown_temperature, Some(&notice));
    Ok(with_session_cookie((status, Html(html)).into_response(), new_id))
}

// ── REST API (v1) ──────────────────────────────────────────────────────

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1/session
async fn api_session(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    let (session, new_id) = resolve_session(&state, &headers);
    let body = Json(serde_json::json!({ "phase": session.invoker.phase().to_string() }));
    with_session_cookie(body.into_response(), new_id)
}

/// GET /api/v1/prompts
async fn api_get_prompts(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    let (session, new_id) = resolve_session(&state, &headers);
    let prompts = session.prompts.lock().prompts().clone();
    with_session_cookie(Json(prompts).into_response(), new_id)
}

/// PUT /api/v1/prompts
/// Replaces the session's prompts. Not persisted until `/api/v1/prompts/save`.
async fn api_put_prompts(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let (session, new_id) = resolve_session(&state, &headers);
    let resp = match PromptSet::from_document(body) {
        Ok(prompts) => {
            session.prompts.lock().replace(prompts.clone());
            Json(prompts).into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    };
    with_session_cookie(resp, new_id)
}

/// POST /api/v1/prompts/save
async fn api_save_prompts(State(state): State<Arc<SharedState>>, headers: HeaderMap) -> Response {
    let (session, new_id) = resolve_session(&state, &headers);
    let resp = match save_session(&state, &session) {
        Ok(()) => Json(serde_json::json!({
            "saved": true,
            "path": state.store.path().display().to_string(),
        }))
        .into_response(),
        Err(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": msg })),
        )
            .into_response(),
    };
    with_session_cookie(resp, new_id)
}

#[derive(Serialize)]
struct ApiError {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
}

impl From<&InvokeError> for ApiError {
    fn from(err: &InvokeError) -> Self {
        let mut out = ApiError {
            kind: err.kind(),
            message: err.to_string(),
            status: None,
            body: None,
            trace: None,
        };
        match err {
            InvokeError::MissingInput | InvokeError::Busy => {}
            InvokeError::ApiConnectivity { status, body } => {
                out.status = *status;
                out.body = Some(body.clone());
            }
            InvokeError::Pipeline { trace, .. } => out.trace = Some(trace.clone()),
        }
        out
    }
}

/// POST /api/v1/generate
/// Multipart form: `file` (transcript), `api_key`, `temperature`.
/// Returns JSON: `{ "article": "...", "finished_at": "..." }`.
async fn api_generate(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, (StatusCode, String)> {
    let (session, new_id) = resolve_session(&state, &headers);
    let form = Submission::read(multipart).await?;

    let resp = match generate(&state, &session, &form).await {
        Generated::Article(article) => Json(serde_json::json!({
            "article": article,
            "finished_at": chrono::Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Generated::Rejected(message) => {
            let error = ApiError {
                kind: "invalid_input",
                message,
                status: None,
                body: None,
                trace: None,
            };
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": error })),
            )
                .into_response()
        }
        Generated::Failed(err) => {
            let error = ApiError::from(&err);
            (failure_status(&err), Json(serde_json::json!({ "error": error }))).into_response()
        }
    };
    Ok(with_session_cookie(resp, new_id))
}
