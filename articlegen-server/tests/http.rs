//! HTTP acceptance tests.
//!
//! Starts the server on an ephemeral port with a stub model provider and a
//! stub engine, then drives the form and the JSON API with reqwest.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use articlegen_core::llm::{ChatRequest, LlmError};
use articlegen_core::{
    AzureSettings, ChatModel, ConfigStore, Crew, Engine, ModelProvider, PromptSet, Step,
};
use articlegen_server::config::ServerConfig;
use articlegen_server::server::Server;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};

const BAD_KEY: &str = "bad-key";

/// Counts every call that would have gone to Azure.
struct StubModel {
    api_key: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatModel for StubModel {
    async fn chat(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.api_key == BAD_KEY {
            return Err(LlmError::Status {
                status: 401,
                body: r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#
                    .to_string(),
            });
        }
        Ok("ok".to_string())
    }
}

struct StubProvider {
    calls: Arc<AtomicUsize>,
}

impl ModelProvider for StubProvider {
    fn connect(&self, api_key: &str, _settings: &AzureSettings) -> Arc<dyn ChatModel> {
        Arc::new(StubModel {
            api_key: api_key.to_string(),
            calls: self.calls.clone(),
        })
    }
}

/// Returns "ARTICLE" unless the transcript asks it to fail.
#[derive(Default)]
struct StubEngine {
    plan_descriptions: Mutex<Vec<String>>,
}

#[async_trait]
impl Engine for StubEngine {
    async fn kickoff(&self, crew: Crew) -> anyhow::Result<String> {
        let plan = crew
            .task(Step::Plan)
            .map(|t| t.description.clone())
            .unwrap_or_default();
        self.plan_descriptions.lock().push(plan.clone());
        if plan.contains("FAIL") {
            return Err(anyhow::anyhow!("editor agent crashed").context("crew kickoff failed"));
        }
        Ok("ARTICLE".to_string())
    }
}

struct TestServer {
    base: String,
    config_path: PathBuf,
    model_calls: Arc<AtomicUsize>,
    engine: Arc<StubEngine>,
    _dir: tempfile::TempDir,
}

async fn start_server() -> TestServer {
    start_server_with(|_| {}).await
}

async fn start_server_with(configure: impl FnOnce(&mut ServerConfig)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("agent_task_config.json");
    let mut config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        config_path: config_path.clone(),
        ..Default::default()
    };
    configure(&mut config);
    let model_calls = Arc::new(AtomicUsize::new(0));
    let engine = Arc::new(StubEngine::default());
    let provider = Arc::new(StubProvider {
        calls: model_calls.clone(),
    });

    let (addr, _handle) = Server::with_backends(config, provider, engine.clone())
        .start()
        .await
        .unwrap();

    TestServer {
        base: format!("http://{addr}"),
        config_path,
        model_calls,
        engine,
        _dir: dir,
    }
}

/// Open a session and return its cookie header value.
async fn new_session(client: &reqwest::Client, base: &str) -> String {
    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let set_cookie = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}

fn transcript(text: &str) -> Part {
    Part::bytes(text.as_bytes().to_vec())
        .file_name("transcript.txt")
        .mime_str("text/plain")
        .unwrap()
}

fn load_saved(path: &Path) -> PromptSet {
    let doc = ConfigStore::new(path).load().unwrap();
    PromptSet::from_document(serde_json::Value::Object(doc)).unwrap()
}

// ── Form page ──────────────────────────────────────────────────────────

#[tokio::test]
async fn index_renders_defaults_and_sets_cookie() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let cookie = new_session(&client, &srv.base).await;
    assert!(cookie.starts_with("articlegen_session="));

    let html = client
        .get(format!("{}/", srv.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Research Article Generator"));
    assert!(html.contains("Content Planner"));
    assert!(html.contains("Plan content for the topic"));
}

#[tokio::test]
async fn generate_without_transcript_makes_no_calls() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .text("action", "generate")
        .text("api_key", "key")
        .text("temperature", "0.7");
    let resp = client
        .post(format!("{}/", srv.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Please upload a transcript file."));
    assert_eq!(srv.model_calls.load(Ordering::SeqCst), 0);
    assert!(srv.engine.plan_descriptions.lock().is_empty());
}

#[tokio::test]
async fn generate_shows_article() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .text("action", "generate")
        .text("api_key", "key")
        .text("temperature", "0.5")
        .part("file", transcript("T"));
    let resp = client
        .post(format!("{}/", srv.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Research article generated successfully!"));
    assert!(html.contains("ARTICLE"));

    let plans = srv.engine.plan_descriptions.lock();
    assert_eq!(plans.len(), 1);
    assert!(plans[0].contains('T'));
    assert_eq!(plans[0], "Plan content for the topic: T");
    // Just the probe.
    assert_eq!(srv.model_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn form_edits_reach_the_pipeline() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .text("action", "generate")
        .text("plan_description", "Summarize the interview")
        .text("api_key", "key")
        .part("file", transcript("Q: why? A: because."));
    let resp = client
        .post(format!("{}/", srv.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let plans = srv.engine.plan_descriptions.lock();
    assert_eq!(plans[0], "Summarize the interview: Q: why? A: because.");
}

#[tokio::test]
async fn out_of_range_temperature_rejected_before_invocation() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    for bad in ["1.5", "-0.1"] {
        let form = Form::new()
            .text("action", "generate")
            .text("api_key", "key")
            .text("temperature", bad)
            .part("file", transcript("T"));
        let resp = client
            .post(format!("{}/", srv.base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "temperature {bad}");
        assert!(resp.text().await.unwrap().contains("between 0.0 and 1.0"));
    }

    assert_eq!(srv.model_calls.load(Ordering::SeqCst), 0);
    assert!(srv.engine.plan_descriptions.lock().is_empty());
}

#[tokio::test]
async fn temperature_bounds_are_accepted() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    for ok in ["0.0", "1.0"] {
        let form = Form::new()
            .text("api_key", "key")
            .text("temperature", ok)
            .part("file", transcript("T"));
        let resp = client
            .post(format!("{}/api/v1/generate", srv.base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "temperature {ok}");
    }
}

#[tokio::test]
async fn save_configuration_persists_form_edits() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .text("action", "save")
        .text("writer_role", "Science Journalist")
        .text("edit_description", "Fact-check and finalize");
    let resp = client
        .post(format!("{}/", srv.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Configuration saved successfully!"));
    assert!(html.contains("Science Journalist"));

    let saved = load_saved(&srv.config_path);
    assert_eq!(saved.writer.role, "Science Journalist");
    assert_eq!(saved.tasks.edit, "Fact-check and finalize");
    assert_eq!(saved.planner, PromptSet::default().planner);
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let cookie = new_session(&client, &srv.base).await;

    let form = Form::new()
        .text("action", "publish")
        .text("writer_role", "Ghostwriter");
    let resp = client
        .post(format!("{}/", srv.base))
        .header("cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // The edit carried by the rejected request is not applied.
    let prompts: PromptSet = client
        .get(format!("{}/api/v1/prompts", srv.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prompts, PromptSet::default());
}

#[tokio::test]
async fn non_utf8_transcript_rejected_before_invocation() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let file = Part::bytes(vec![0xff, 0xfe])
        .file_name("transcript.txt")
        .mime_str("text/plain")
        .unwrap();
    let form = Form::new()
        .text("action", "generate")
        .text("api_key", "key")
        .part("file", file);
    let resp = client
        .post(format!("{}/", srv.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert!(resp.text().await.unwrap().contains("Could not read transcript"));
    assert_eq!(srv.model_calls.load(Ordering::SeqCst), 0);
    assert!(srv.engine.plan_descriptions.lock().is_empty());
}

// ── JSON API ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health() {
    let srv = start_server().await;
    let body: serde_json::Value = reqwest::get(format!("{}/api/v1/health", srv.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn bad_key_reports_status_and_body() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let cookie = new_session(&client, &srv.base).await;

    let form = Form::new()
        .text("api_key", BAD_KEY)
        .part("file", transcript("T"));
    let resp = client
        .post(format!("{}/api/v1/generate", srv.base))
        .header("cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "api_connectivity");
    assert_eq!(body["error"]["status"], 401);
    assert!(body["error"]["body"].as_str().unwrap().contains("Access denied"));
    assert!(srv.engine.plan_descriptions.lock().is_empty());

    let session: serde_json::Value = client
        .get(format!("{}/api/v1/session", srv.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["phase"], "idle");
}

#[tokio::test]
async fn engine_failure_reports_trace() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let form = Form::new()
        .text("api_key", "key")
        .part("file", transcript("please FAIL"));
    let resp = client
        .post(format!("{}/api/v1/generate", srv.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "pipeline");
    assert!(body["error"]["message"].as_str().unwrap().contains("editor agent crashed"));
    assert!(body["error"]["trace"].as_str().unwrap().contains("Caused by"));
    // A failed run never touches the config file.
    assert!(!srv.config_path.exists());
}

#[tokio::test]
async fn api_generate_returns_article_and_phase_done() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let cookie = new_session(&client, &srv.base).await;

    let form = Form::new()
        .text("api_key", "key")
        .part("file", transcript("T"));
    let body: serde_json::Value = client
        .post(format!("{}/api/v1/generate", srv.base))
        .header("cookie", &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["article"], "ARTICLE");
    assert!(body["finished_at"].is_string());

    let session: serde_json::Value = client
        .get(format!("{}/api/v1/session", srv.base))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["phase"], "done");
}

#[tokio::test]
async fn oldest_session_is_dropped_at_the_limit() {
    let srv = start_server_with(|config| config.max_sessions = 2).await;
    let client = reqwest::Client::new();

    let first = new_session(&client, &srv.base).await;
    let _second = new_session(&client, &srv.base).await;
    let _third = new_session(&client, &srv.base).await;

    // `first` was evicted, so the server issues a replacement cookie.
    let resp = client
        .get(format!("{}/api/v1/session", srv.base))
        .header("cookie", &first)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let reissued = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("replacement cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(!reissued.starts_with(&first));
}

#[tokio::test]
async fn unsaved_edits_stay_in_their_session() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let alice = new_session(&client, &srv.base).await;
    let bob = new_session(&client, &srv.base).await;
    assert_ne!(alice, bob);

    let mut edited = PromptSet::default();
    edited.editor.goal = "Make it shorter".into();
    let resp = client
        .put(format!("{}/api/v1/prompts", srv.base))
        .header("cookie", &alice)
        .json(&edited)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let get = |cookie: String| {
        let client = client.clone();
        let url = format!("{}/api/v1/prompts", srv.base);
        async move {
            client
                .get(url)
                .header("cookie", cookie)
                .send()
                .await
                .unwrap()
                .json::<PromptSet>()
                .await
                .unwrap()
        }
    };
    assert_eq!(get(alice.clone()).await, edited);
    assert_eq!(get(bob.clone()).await, PromptSet::default());
    assert!(!srv.config_path.exists());
}

#[tokio::test]
async fn invalid_prompt_document_is_rejected() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{}/api/v1/prompts", srv.base))
        .json(&serde_json::json!({ "planner": { "role": "only this" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn later_save_wins_across_sessions() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let first = new_session(&client, &srv.base).await;
    let second = new_session(&client, &srv.base).await;

    let mut a = PromptSet::default();
    a.planner.role = "Planner from first".into();
    let mut b = PromptSet::default();
    b.tasks.write = "Write from second".into();

    for (cookie, prompts) in [(&first, &a), (&second, &b)] {
        let resp = client
            .put(format!("{}/api/v1/prompts", srv.base))
            .header("cookie", cookie)
            .json(prompts)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    for cookie in [&first, &second] {
        let resp = client
            .post(format!("{}/api/v1/prompts/save", srv.base))
            .header("cookie", cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let saved = load_saved(&srv.config_path);
    assert_eq!(saved, b);
    assert_eq!(saved.planner.role, "Content Planner");
}

#[tokio::test]
async fn new_sessions_start_from_saved_config() {
    let srv = start_server().await;
    let mut saved = PromptSet::default();
    saved.writer.backstory = "Ten years at a science desk".into();
    ConfigStore::new(&srv.config_path).save(&saved).unwrap();

    let client = reqwest::Client::new();
    let prompts: PromptSet = client
        .get(format!("{}/api/v1/prompts", srv.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prompts, saved);
}
