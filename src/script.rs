//! Scripted form sessions for the command line driver

use anyhow::{Context, Result};
use form_engine::{
    EngineConfig, Field, FieldDef, FormSnapshot, FormStore, Validation, ValueMap,
};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A form declaration plus the events to replay against it
#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub value: Option<ValueMap>,
    /// Ids of fields that must be filled in
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

/// One stimulus applied to the form
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    Change { id: String, value: Value },
    Focus { id: String },
    Register { field: FieldDef },
    Value { value: ValueMap },
    Disabled { disabled: bool },
    Declarations { fields: Vec<FieldDef> },
}

fn required(field: &Field, _: &[Field], _: Option<&FormSnapshot>) -> Validation {
    if field.has_value() {
        Validation::ok()
    } else {
        Validation::invalid("required")
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid script")
    }

    /// Attach the required validator to declarations listed in `required`
    pub fn prepare(&self, def: FieldDef) -> FieldDef {
        if self.required.contains(&def.id) {
            def.with_validator(required)
        } else {
            def
        }
    }

    pub fn build_store(&self, config: &EngineConfig) -> FormStore {
        let defs = self.fields.iter().cloned().map(|d| self.prepare(d)).collect();
        let mut builder = FormStore::builder()
            .config(config)
            .declarations(defs)
            .on_change(|value, is_valid| {
                tracing::info!(fields = value.len(), is_valid, "form changed");
            });
        if let Some(value) = &self.value {
            builder = builder.value(value.clone());
        }
        builder.build()
    }

    /// Apply `event` to `store`
    pub fn apply(&self, event: &ScriptEvent, store: &mut FormStore) -> Result<()> {
        match event {
            ScriptEvent::Change { id, value } => store.try_field_change(id, value.clone())?,
            ScriptEvent::Focus { id } => store.on_field_focus(id),
            ScriptEvent::Register { field } => {
                if !store.register_field(self.prepare(field.clone())) {
                    tracing::warn!("field {} already registered", field.id);
                }
            }
            ScriptEvent::Value { value } => {
                store.set_value(value.clone());
            }
            ScriptEvent::Disabled { disabled } => {
                store.set_disabled(*disabled);
            }
            ScriptEvent::Declarations { fields } => {
                let defs = fields.iter().cloned().map(|d| self.prepare(d)).collect();
                store.set_declarations(defs);
            }
        }
        Ok(())
    }
}

impl ScriptEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Change { .. } => "change",
            Self::Focus { .. } => "focus",
            Self::Register { .. } => "register",
            Self::Value { .. } => "value",
            Self::Disabled { .. } => "disabled",
            Self::Declarations { .. } => "declarations",
        }
    }
}
