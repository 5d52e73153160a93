//! Per-session, in-memory copy of the prompt configuration.

use std::collections::HashMap;

use crate::prompts::{PromptSet, Role, Step};
use crate::store::{ConfigStore, StoreError};

/// Editable prompt state owned by one user session.
#[derive(Debug, Clone)]
pub struct PromptSession {
    prompts: PromptSet,
}

impl PromptSession {
    /// Seed a session from the store.
    ///
    /// A missing file gives the defaults. An unreadable or malformed file
    /// is logged and also gives the defaults; it is never partially used.
    pub fn open(store: &ConfigStore) -> Self {
        let path = store.path().display();
        let prompts = match store.load() {
            Ok(doc) if doc.is_empty() => PromptSet::default(),
            Ok(doc) => match PromptSet::from_document(serde_json::Value::Object(doc)) {
                Ok(prompts) => prompts,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Config file failed validation, using defaults");
                    PromptSet::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Config file unusable, using defaults");
                PromptSet::default()
            }
        };
        Self { prompts }
    }

    pub fn with_prompts(prompts: PromptSet) -> Self {
        Self { prompts }
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    pub fn prompts_mut(&mut self) -> &mut PromptSet {
        &mut self.prompts
    }

    pub fn replace(&mut self, prompts: PromptSet) {
        self.prompts = prompts;
    }

    /// Apply submitted form values. Fields absent from the form keep their
    /// current value.
    pub fn apply_form(&mut self, form: &PromptForm) {
        for role in Role::ALL {
            let agent = self.prompts.agent_mut(role);
            if let Some(v) = form.get(&PromptForm::agent_field(role, "role")) {
                agent.role = v.to_string();
            }
            if let Some(v) = form.get(&PromptForm::agent_field(role, "goal")) {
                agent.goal = v.to_string();
            }
            if let Some(v) = form.get(&PromptForm::agent_field(role, "backstory")) {
                agent.backstory = v.to_string();
            }
        }
        for step in Step::ALL {
            if let Some(v) = form.get(&PromptForm::task_field(step)) {
                *self.prompts.task_mut(step) = v.to_string();
            }
        }
    }

    /// Persist the whole in-memory set.
    pub fn save(&self, store: &ConfigStore) -> Result<(), StoreError> {
        store.save(&self.prompts)
    }
}

/// Flat field-name → value map as submitted by the prompt form.
#[derive(Debug, Clone, Default)]
pub struct PromptForm {
    fields: HashMap<String, String>,
}

impl PromptForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// `planner_role`, `writer_goal`, `editor_backstory`, ...
    pub fn agent_field(role: Role, field: &str) -> String {
        format!("{}_{field}", role.key())
    }

    /// `plan_description`, `write_description`, `edit_description`.
    pub fn task_field(step: Step) -> String {
        format!("{}_description", step.key())
    }

    /// True if `name` is one of the prompt fields this form understands.
    pub fn is_prompt_field(name: &str) -> bool {
        Role::ALL.iter().any(|&role| {
            ["role", "goal", "backstory"]
                .iter()
                .any(|f| Self::agent_field(role, f) == name)
        }) || Step::ALL.iter().any(|&step| Self::task_field(step) == name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
