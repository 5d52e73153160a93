//! Pipeline invocation: validate, probe, run.
//!
//! One [`Invoker`] per session. Each call walks
//! `Idle → ValidatingInput → ConnectingApi → RunningPipeline → Done`;
//! any failure drops straight back to `Idle`. Nothing is retried and
//! nothing is persisted. A second call while one is in flight is refused
//! with [`InvokeError::Busy`] and leaves the running call's phase alone.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::crew::{Crew, Engine};
use crate::input::{Temperature, Transcript};
use crate::llm::{ChatModel, LlmError};
use crate::prompts::PromptSet;

/// Invocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ValidatingInput,
    ConnectingApi,
    RunningPipeline,
    Done,
}

impl Phase {
    /// Between `Idle`/`Done` and the end of a run.
    pub fn in_flight(self) -> bool {
        matches!(
            self,
            Phase::ValidatingInput | Phase::ConnectingApi | Phase::RunningPipeline
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::ValidatingInput => write!(f, "validating_input"),
            Phase::ConnectingApi => write!(f, "connecting_api"),
            Phase::RunningPipeline => write!(f, "running_pipeline"),
            Phase::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Please upload a transcript file.")]
    MissingInput,
    #[error("API Error: {body}")]
    ApiConnectivity { status: Option<u16>, body: String },
    #[error("An error occurred: {message}")]
    Pipeline { message: String, trace: String },
    #[error("A research article is already being generated for this session.")]
    Busy,
}

impl InvokeError {
    pub fn kind(&self) -> &'static str {
        match self {
            InvokeError::MissingInput => "missing_input",
            InvokeError::ApiConnectivity { .. } => "api_connectivity",
            InvokeError::Pipeline { .. } => "pipeline",
            InvokeError::Busy => "busy",
        }
    }

    fn from_probe(err: LlmError) -> Self {
        match err {
            LlmError::Status { status, body } => InvokeError::ApiConnectivity {
                status: Some(status),
                body,
            },
            LlmError::Transport(e) => InvokeError::ApiConnectivity {
                status: e.status().map(|s| s.as_u16()),
                body: e.to_string(),
            },
            LlmError::Malformed(msg) => InvokeError::ApiConnectivity { status: None, body: msg },
        }
    }

    fn from_pipeline(err: anyhow::Error) -> Self {
        InvokeError::Pipeline {
            message: format!("{err:#}"),
            trace: format!("{err:?}"),
        }
    }
}

/// Session-scoped pipeline runner.
pub struct Invoker {
    engine: Arc<dyn Engine>,
    probe: bool,
    phase: Mutex<Phase>,
}

impl Invoker {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            probe: true,
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Enable or disable the connectivity probe before the real run.
    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe = probe;
        self
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!(%phase, "Invocation phase");
        *self.phase.lock() = phase;
    }

    /// Claim the invoker for one run, or `None` if a run is in flight.
    fn begin(&self) -> Option<Running<'_>> {
        let mut phase = self.phase.lock();
        if phase.in_flight() {
            return None;
        }
        *phase = Phase::ValidatingInput;
        tracing::debug!(phase = %Phase::ValidatingInput, "Invocation phase");
        Some(Running { invoker: self })
    }

    /// Run plan → write → edit and return the edited article.
    ///
    /// Blocks until the engine finishes. Without a transcript, fails before
    /// any call to `llm`. Fails with [`InvokeError::Busy`] while another
    /// call on this invoker is still running.
    pub async fn invoke(
        &self,
        prompts: &PromptSet,
        transcript: Option<&Transcript>,
        temperature: Temperature,
        llm: Arc<dyn ChatModel>,
    ) -> Result<String, InvokeError> {
        let Some(_running) = self.begin() else {
            tracing::warn!(phase = %self.phase(), "Invocation already in flight");
            return Err(InvokeError::Busy);
        };
        let result = self.run(prompts, transcript, temperature, llm).await;
        match &result {
            Ok(article) => {
                self.enter(Phase::Done);
                tracing::info!(chars = article.len(), "Research article generated");
            }
            Err(e) => {
                self.enter(Phase::Idle);
                tracing::warn!(kind = e.kind(), error = %e, "Invocation failed");
            }
        }
        result
    }

    async fn run(
        &self,
        prompts: &PromptSet,
        transcript: Option<&Transcript>,
        temperature: Temperature,
        llm: Arc<dyn ChatModel>,
    ) -> Result<String, InvokeError> {
        let transcript = transcript.ok_or(InvokeError::MissingInput)?;

        if self.probe {
            self.enter(Phase::ConnectingApi);
            llm.probe().await.map_err(InvokeError::from_probe)?;
            tracing::info!("API connection successful");
        }

        self.enter(Phase::RunningPipeline);
        let crew = Crew::assemble(prompts, transcript, temperature, llm);
        tracing::info!(
            transcript_bytes = transcript.len(),
            temperature = temperature.value(),
            "Generating research article"
        );
        self.engine
            .kickoff(crew)
            .await
            .map_err(InvokeError::from_pipeline)
    }
}

/// Held for the length of one run. Dropping it mid-run (the caller went
/// away) puts the invoker back to `Idle`.
struct Running<'a> {
    invoker: &'a Invoker,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let mut phase = self.invoker.phase.lock();
        if phase.in_flight() {
            tracing::debug!(was = %*phase, "Invocation abandoned");
            *phase = Phase::Idle;
        }
    }
}
