//! Server state and HTTP listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use articlegen_core::{
    AzureProvider, ConfigStore, Engine, Invoker, ModelProvider, PromptSession, SequentialEngine,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "articlegen_session";

/// One browser session: its own prompt copy and its own invocation state.
pub struct Session {
    pub prompts: Mutex<PromptSession>,
    pub invoker: Invoker,
    last_seen: Mutex<Instant>,
}

impl Session {
    fn touch(&self, now: Instant) {
        *self.last_seen.lock() = now;
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.lock())
    }
}

/// Shared state accessible by all request handlers.
pub struct SharedState {
    pub config: ServerConfig,
    pub store: ConfigStore,
    pub provider: Arc<dyn ModelProvider>,
    pub engine: Arc<dyn Engine>,
    /// session id -> session. Idle sessions expire after
    /// `config.session_ttl()`; at most `config.max_sessions` are kept.
    pub sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SharedState {
    /// Look up a live session by id and mark it as used.
    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let session = sessions.get(id)?.clone();
        if session.idle_for(now) > self.config.session_ttl() {
            sessions.remove(id);
            tracing::debug!("Session expired");
            return None;
        }
        session.touch(now);
        Some(session)
    }

    /// Create a session seeded from the config file.
    ///
    /// Expired sessions are pruned first. If the map is still full, the
    /// least recently used sessions are dropped to make room.
    pub fn create_session(&self) -> (String, Arc<Session>) {
        let id = generate_session_id();
        let now = Instant::now();
        let session = Arc::new(Session {
            prompts: Mutex::new(PromptSession::open(&self.store)),
            invoker: Invoker::new(self.engine.clone()).with_probe(!self.config.skip_probe),
            last_seen: Mutex::new(now),
        });

        let ttl = self.config.session_ttl();
        let cap = self.config.max_sessions.max(1);
        let (count, expired, evicted) = {
            let mut sessions = self.sessions.lock();
            let before = sessions.len();
            sessions.retain(|_, s| s.idle_for(now) <= ttl);
            let expired = before - sessions.len();

            let mut evicted = 0;
            while sessions.len() >= cap {
                let Some(oldest) = sessions
                    .iter()
                    .max_by_key(|(_, s)| s.idle_for(now))
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                sessions.remove(&oldest);
                evicted += 1;
            }

            sessions.insert(id.clone(), session.clone());
            (sessions.len(), expired, evicted)
        };
        if evicted > 0 {
            tracing::warn!(evicted, max_sessions = cap, "Session limit reached");
        }
        tracing::info!(session_count = count, expired, "New session");
        (id, session)
    }
}

fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

pub struct Server {
    config: ServerConfig,
    provider: Arc<dyn ModelProvider>,
    engine: Arc<dyn Engine>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            provider: Arc::new(AzureProvider::default()),
            engine: Arc::new(SequentialEngine),
        }
    }

    /// Create a server with a custom model provider and engine (for testing).
    pub fn with_backends(
        config: ServerConfig,
        provider: Arc<dyn ModelProvider>,
        engine: Arc<dyn Engine>,
    ) -> Self {
        Self {
            config,
            provider,
            engine,
        }
    }

    fn build_state(&self) -> Arc<SharedState> {
        Arc::new(SharedState {
            store: ConfigStore::new(&self.config.config_path),
            config: self.config.clone(),
            provider: self.provider.clone(),
            engine: self.engine.clone(),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Bind, then serve in a background task. Returns the bound address.
    pub async fn start(self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let state = self.build_state();
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        let addr = listener.local_addr()?;
        tracing::info!(
            %addr,
            config = %self.config.config_path.display(),
            deployment = %self.config.azure_deployment,
            "HTTP listener ready"
        );

        let app = crate::web::router(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.context("HTTP server failed")
        });
        Ok((addr, handle))
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        let (_addr, handle) = self.start().await?;
        handle.await.context("HTTP server task panicked")?
    }
}
