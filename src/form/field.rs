//! Field declarations and the derived per-field records

use super::handlers::{OptionsHandler, ValidationHandler};
use super::store::FormSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Field id -> current value
pub type ValueMap = HashMap<String, Value>;

/// One selectable entry of a field's option list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: Value,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

impl From<&str> for FieldOption {
    fn from(s: &str) -> Self {
        Self::new(s, s)
    }
}

/// Resolution state of a field's option list
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", content = "options", rename_all = "snake_case")]
pub enum OptionsState {
    /// The field has no options
    #[default]
    None,
    /// Options are known
    Ready(Vec<FieldOption>),
    /// Registered but no request issued yet
    Unresolved,
    /// A request is in flight; only a completion carrying this generation is accepted
    Pending { generation: u64 },
}

impl OptionsState {
    pub fn is_pending(&self) -> bool {
        matches!(self, OptionsState::Pending { .. })
    }

    /// Resolved options, empty while unresolved or pending
    pub fn as_slice(&self) -> &[FieldOption] {
        match self {
            OptionsState::Ready(options) => options,
            _ => &[],
        }
    }
}

/// Result of validating one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }

    /// Lenient conversion for handlers that produce loosely-typed output.
    ///
    /// Anything other than an object with a boolean `valid` is invalid.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::invalid("malformed validation result");
        };
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        match obj.get("valid").and_then(Value::as_bool) {
            Some(valid) => Self { valid, message },
            None => Self {
                valid: false,
                message: message.or_else(|| Some("malformed validation result".to_string())),
            },
        }
    }
}

/// Declarative description of one field
///
/// The data part deserializes from JSON; handlers are attached with the
/// builder methods and are never serialized.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip)]
    pub validator: Option<Arc<dyn ValidationHandler>>,
    #[serde(skip)]
    pub options_handler: Option<Arc<dyn OptionsHandler>>,
}

impl FieldDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Attach a per-field validator closure
    pub fn with_validator<F>(self, f: F) -> Self
    where
        F: Fn(&Field, &[Field], Option<&FormSnapshot>) -> Validation + Send + Sync + 'static,
    {
        self.with_validation_handler(Arc::new(f))
    }

    pub fn with_validation_handler(mut self, handler: Arc<dyn ValidationHandler>) -> Self {
        self.validator = Some(handler);
        self
    }

    pub fn with_options_handler(mut self, handler: Arc<dyn OptionsHandler>) -> Self {
        self.options_handler = Some(handler);
        self
    }
}

fn same_handler<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        _ => false,
    }
}

impl PartialEq for FieldDef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.default == other.default
            && self.options == other.options
            && self.disabled == other.disabled
            && same_handler(&self.validator, &other.validator)
            && same_handler(&self.options_handler, &other.options_handler)
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("id", &self.id)
            .field("default", &self.default)
            .field("options", &self.options)
            .field("disabled", &self.disabled)
            .field("has_validator", &self.validator.is_some())
            .field("has_options_handler", &self.options_handler.is_some())
            .finish()
    }
}

/// Runtime record of one field, owned by exactly one store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub id: String,
    pub value: Value,
    pub touched: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub options: OptionsState,
    pub disabled: bool,
    #[serde(skip)]
    pub def: Arc<FieldDef>,
}

impl Field {
    /// Build a fresh record, seeding the value from `values` or the declared default
    pub fn from_def(def: &FieldDef, values: &ValueMap) -> Self {
        let value = values
            .get(&def.id)
            .cloned()
            .unwrap_or_else(|| def.default.clone());
        let options = match (&def.options_handler, &def.options) {
            (None, Some(options)) => OptionsState::Ready(options.clone()),
            _ => OptionsState::Unresolved,
        };
        Self {
            id: def.id.clone(),
            value,
            touched: false,
            valid: true,
            error: None,
            options,
            disabled: def.disabled.unwrap_or(false),
            def: Arc::new(def.clone()),
        }
    }

    /// Text value, empty for non-string values
    pub fn as_text(&self) -> &str {
        self.value.as_str().unwrap_or("")
    }

    /// Whether the value counts as filled in (not null, not an empty string or list)
    pub fn has_value(&self) -> bool {
        match &self.value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod field_def {
        use super::*;

        #[test]
        fn test_deserialize_minimal() {
            let def: FieldDef = serde_json::from_str(r#"{"id": "name"}"#).unwrap();
            assert_eq!(def.id, "name");
            assert_eq!(def.default, Value::Null);
            assert!(def.options.is_none());
            assert!(def.validator.is_none());
        }

        #[test]
        fn test_deserialize_with_options() {
            let json = r#"{"id": "color", "default": "red", "options": [{"label": "Red", "value": "red"}], "disabled": true}"#;
            let def: FieldDef = serde_json::from_str(json).unwrap();
            assert_eq!(def.default, json!("red"));
            assert_eq!(def.options.unwrap()[0].label, "Red");
            assert_eq!(def.disabled, Some(true));
        }

        #[test]
        fn test_equality_compares_handler_identity() {
            let a = FieldDef::new("a").with_validator(|_, _, _| Validation::ok());
            let b = a.clone();
            assert_eq!(a, b);

            let c = FieldDef::new("a").with_validator(|_, _, _| Validation::ok());
            assert_ne!(a, c);
        }

        #[test]
        fn test_debug_hides_handlers() {
            let def = FieldDef::new("a").with_validator(|_, _, _| Validation::ok());
            let debug_str = format!("{:?}", def);
            assert!(debug_str.contains("has_validator: true"));
        }
    }

    mod field {
        use super::*;

        #[test]
        fn test_from_def_prefers_value_map() {
            let def = FieldDef::new("a").with_default("fallback");
            let mut values = ValueMap::new();
            values.insert("a".into(), json!("given"));
            assert_eq!(Field::from_def(&def, &values).value, json!("given"));
            assert_eq!(
                Field::from_def(&def, &ValueMap::new()).value,
                json!("fallback")
            );
        }

        #[test]
        fn test_from_def_static_options_are_ready() {
            let def = FieldDef::new("a").with_options(vec!["x".into(), "y".into()]);
            let field = Field::from_def(&def, &ValueMap::new());
            assert_eq!(field.options.as_slice().len(), 2);
        }

        #[test]
        fn test_from_def_without_options_is_unresolved() {
            let field = Field::from_def(&FieldDef::new("a"), &ValueMap::new());
            assert_eq!(field.options, OptionsState::Unresolved);
            assert!(!field.touched);
            assert!(field.valid);
        }

        #[test]
        fn test_has_value() {
            let mut field = Field::from_def(&FieldDef::new("a"), &ValueMap::new());
            assert!(!field.has_value());
            field.value = json!("");
            assert!(!field.has_value());
            field.value = json!("x");
            assert!(field.has_value());
            field.value = json!(0);
            assert!(field.has_value());
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn test_from_json_well_formed() {
            let v = Validation::from_json(&json!({"valid": false, "message": "required"}));
            assert_eq!(v, Validation::invalid("required"));
            assert!(Validation::from_json(&json!({"valid": true})).valid);
        }

        #[test]
        fn test_from_json_malformed_is_invalid() {
            assert!(!Validation::from_json(&json!("yes")).valid);
            assert!(!Validation::from_json(&json!({"valid": "true"})).valid);
            assert!(!Validation::from_json(&Value::Null).valid);
        }
    }
}
