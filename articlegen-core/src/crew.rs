//! Agents, tasks and the engine that runs them.
//!
//! A [`Crew`] is three agents and three tasks. The [`SequentialEngine`]
//! runs the tasks in order and hands each task's output to the next one
//! through its `context` slot.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::input::{Temperature, Transcript};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::prompts::{PromptSet, Role, Step};

/// One role-playing agent.
#[derive(Clone)]
pub struct AgentDescriptor {
    pub role: Role,
    /// Role text shown to the model, e.g. "Content Planner".
    pub name: String,
    pub goal: String,
    pub backstory: String,
    pub temperature: Temperature,
    pub allow_delegation: bool,
    pub llm: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for AgentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDescriptor")
            .field("role", &self.role)
            .field("name", &self.name)
            .field("goal", &self.goal)
            .field("backstory", &self.backstory)
            .field("temperature", &self.temperature)
            .field("allow_delegation", &self.allow_delegation)
            .finish_non_exhaustive()
    }
}

impl AgentDescriptor {
    fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.name, self.backstory, self.goal
        )
    }
}

/// One unit of work bound to an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub step: Step,
    pub description: String,
    pub agent: Role,
    /// Output of the previous task, filled in by the engine.
    pub context: Option<String>,
}

impl TaskDescriptor {
    fn user_prompt(&self) -> String {
        let mut prompt = format!("Current Task: {}", self.description);
        if let Some(ref context) = self.context {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(context);
        }
        prompt.push_str("\n\nBegin! Give your complete final answer, not a summary of it.");
        prompt
    }
}

#[derive(Debug, Clone)]
pub struct Crew {
    pub agents: Vec<AgentDescriptor>,
    pub tasks: Vec<TaskDescriptor>,
}

impl Crew {
    /// Build the plan/write/edit crew from the current prompts.
    ///
    /// Only the plan task sees the transcript; the others get their input
    /// from the engine's handoff.
    pub fn assemble(
        prompts: &PromptSet,
        transcript: &Transcript,
        temperature: Temperature,
        llm: Arc<dyn ChatModel>,
    ) -> Self {
        let agents = Role::ALL
            .iter()
            .map(|&role| {
                let p = prompts.agent(role);
                AgentDescriptor {
                    role,
                    name: p.role.clone(),
                    goal: p.goal.clone(),
                    backstory: p.backstory.clone(),
                    temperature,
                    allow_delegation: false,
                    llm: llm.clone(),
                }
            })
            .collect();

        let tasks = Step::ALL
            .iter()
            .map(|&step| {
                let description = match step {
                    Step::Plan => format!("{}: {}", prompts.task(step), transcript.as_str()),
                    _ => prompts.task(step).to_string(),
                };
                TaskDescriptor {
                    step,
                    description,
                    agent: step.role(),
                    context: None,
                }
            })
            .collect();

        Self { agents, tasks }
    }

    pub fn agent(&self, role: Role) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.role == role)
    }

    pub fn task(&self, step: Step) -> Option<&TaskDescriptor> {
        self.tasks.iter().find(|t| t.step == step)
    }
}

/// Runs a crew to completion and returns the final artifact.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn kickoff(&self, crew: Crew) -> Result<String>;
}

/// Runs tasks one after another, each feeding the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialEngine;

#[async_trait]
impl Engine for SequentialEngine {
    async fn kickoff(&self, crew: Crew) -> Result<String> {
        let Crew { agents, mut tasks } = crew;
        if tasks.is_empty() {
            anyhow::bail!("crew has no tasks");
        }

        let mut output = String::new();
        for i in 0..tasks.len() {
            let task = &tasks[i];
            let agent = agents
                .iter()
                .find(|a| a.role == task.agent)
                .with_context(|| format!("no agent for role {} (task {})", task.agent, task.step))?;

            tracing::info!(
                step = %task.step,
                agent = %agent.name,
                has_context = task.context.is_some(),
                "Running task"
            );

            let request = ChatRequest {
                messages: vec![
                    ChatMessage::system(agent.system_prompt()),
                    ChatMessage::user(task.user_prompt()),
                ],
                temperature: Some(agent.temperature.value()),
                max_tokens: None,
            };
            output = agent
                .llm
                .chat(&request)
                .await
                .with_context(|| format!("{} task failed", task.step))?;

            if output.trim().is_empty() {
                anyhow::bail!("{} task returned an empty answer", task.step);
            }
            tracing::info!(step = %task.step, chars = output.len(), "Task complete");

            if let Some(next) = tasks.get_mut(i + 1) {
                next.context = Some(output.clone());
            }
        }
        Ok(output)
    }
}
