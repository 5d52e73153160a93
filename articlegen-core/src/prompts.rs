//! Prompt configuration for the three pipeline agents.
//!
//! A [`PromptSet`] holds one [`AgentPrompt`] per [`Role`] and one task
//! description per [`Step`]. On disk it is a single JSON object with the
//! keys `planner`, `writer`, `editor` and `tasks`.

use serde::{Deserialize, Serialize};

/// Agent roles, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Planner,
    Writer,
    Editor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Planner, Role::Writer, Role::Editor];

    /// Key used in the persisted document and in form field names.
    pub fn key(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Writer => "writer",
            Role::Editor => "editor",
        }
    }

    /// Heading shown in the form, e.g. "Planner".
    pub fn label(self) -> &'static str {
        match self {
            Role::Planner => "Planner",
            Role::Writer => "Writer",
            Role::Editor => "Editor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Plan,
    Write,
    Edit,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Plan, Step::Write, Step::Edit];

    pub fn key(self) -> &'static str {
        match self {
            Step::Plan => "plan",
            Step::Write => "write",
            Step::Edit => "edit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Plan => "Plan",
            Step::Write => "Write",
            Step::Edit => "Edit",
        }
    }

    /// The agent that performs this step.
    pub fn role(self) -> Role {
        match self {
            Step::Plan => Role::Planner,
            Step::Write => Role::Writer,
            Step::Edit => Role::Editor,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Role, goal and backstory that condition one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPrompt {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl AgentPrompt {
    fn new(role: &str, goal: &str, backstory: &str) -> Self {
        Self {
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
        }
    }
}

/// Instruction text for each pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPrompts {
    pub plan: String,
    pub write: String,
    pub edit: String,
}

/// The full user-editable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub planner: AgentPrompt,
    pub writer: AgentPrompt,
    pub editor: AgentPrompt,
    pub tasks: TaskPrompts,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            planner: AgentPrompt::new(
                "Content Planner",
                "Plan engaging and factually accurate content on the given topic",
                "You're working on planning a research report about a given topic.",
            ),
            writer: AgentPrompt::new(
                "Content Writer",
                "Write insightful and factually accurate research report",
                "You're working on writing a new opinion piece about a given topic.",
            ),
            editor: AgentPrompt::new(
                "Editor",
                "Edit a given blog post",
                "You are an editor who receives a research article from the Content Writer.",
            ),
            tasks: TaskPrompts {
                plan: "Plan content for the topic".to_string(),
                write: "Write a research article based on the content plan".to_string(),
                edit: "Edit and finalize the research article".to_string(),
            },
        }
    }
}

/// Why a stored document could not be used as a [`PromptSet`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("missing key `{0}`")]
    MissingKey(&'static str),
    #[error("invalid `{key}`: {source}")]
    Invalid {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl PromptSet {
    pub fn agent(&self, role: Role) -> &AgentPrompt {
        match role {
            Role::Planner => &self.planner,
            Role::Writer => &self.writer,
            Role::Editor => &self.editor,
        }
    }

    pub fn agent_mut(&mut self, role: Role) -> &mut AgentPrompt {
        match role {
            Role::Planner => &mut self.planner,
            Role::Writer => &mut self.writer,
            Role::Editor => &mut self.editor,
        }
    }

    pub fn task(&self, step: Step) -> &str {
        match step {
            Step::Plan => &self.tasks.plan,
            Step::Write => &self.tasks.write,
            Step::Edit => &self.tasks.edit,
        }
    }

    pub fn task_mut(&mut self, step: Step) -> &mut String {
        match step {
            Step::Plan => &mut self.tasks.plan,
            Step::Write => &mut self.tasks.write,
            Step::Edit => &mut self.tasks.edit,
        }
    }

    /// Validate a loaded document against the four-key schema.
    ///
    /// All four keys must be present and well-formed; there is no partial
    /// fill from defaults. Unknown extra keys are ignored.
    pub fn from_document(doc: serde_json::Value) -> Result<Self, SchemaError> {
        let serde_json::Value::Object(mut map) = doc else {
            return Err(SchemaError::NotAnObject);
        };

        let mut agent = |key: &'static str| -> Result<AgentPrompt, SchemaError> {
            let value = map.remove(key).ok_or(SchemaError::MissingKey(key))?;
            serde_json::from_value(value).map_err(|source| SchemaError::Invalid { key, source })
        };
        let planner = agent("planner")?;
        let writer = agent("writer")?;
        let editor = agent("editor")?;

        let tasks = map.remove("tasks").ok_or(SchemaError::MissingKey("tasks"))?;
        let tasks = serde_json::from_value(tasks)
            .map_err(|source| SchemaError::Invalid { key: "tasks", source })?;

        Ok(Self {
            planner,
            writer,
            editor,
            tasks,
        })
    }

    pub fn to_document(&self) -> serde_json::Value {
        // Plain strings only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
