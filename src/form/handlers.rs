//! Pluggable validation and options handlers

use super::field::{Field, FieldOption, Validation};
use super::store::FormSnapshot;
use async_trait::async_trait;
use serde_json::Value;

/// Computes the validity of one field.
///
/// `fields` is the full list being derived and `parent` the enclosing form's
/// latest snapshot when the store is nested.
pub trait ValidationHandler: Send + Sync {
    fn validate(&self, field: &Field, fields: &[Field], parent: Option<&FormSnapshot>)
        -> Validation;
}

impl<F> ValidationHandler for F
where
    F: Fn(&Field, &[Field], Option<&FormSnapshot>) -> Validation + Send + Sync,
{
    fn validate(
        &self,
        field: &Field,
        fields: &[Field],
        parent: Option<&FormSnapshot>,
    ) -> Validation {
        self(field, fields, parent)
    }
}

/// Adapts a validator that produces loosely-typed JSON such as
/// `{"valid": false, "message": "..."}`.
///
/// Output without a boolean `valid` marks the field invalid.
pub struct JsonValidator<F>(pub F);

impl<F> ValidationHandler for JsonValidator<F>
where
    F: Fn(&Field, &[Field], Option<&FormSnapshot>) -> Value + Send + Sync,
{
    fn validate(
        &self,
        field: &Field,
        fields: &[Field],
        parent: Option<&FormSnapshot>,
    ) -> Validation {
        Validation::from_json(&(self.0)(field, fields, parent))
    }
}

/// Produces the option list for a field, possibly asynchronously
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OptionsHandler: Send + Sync {
    /// Whether this handler supplies options for `field`.
    ///
    /// Only consulted for form-level handlers; a per-field handler always applies.
    fn handles(&self, _field: &Field) -> bool {
        true
    }

    /// Resolve the options for `field`
    async fn resolve(&self, field: Field, parent: Option<FormSnapshot>) -> Vec<FieldOption>;
}

/// Adapts a synchronous closure into an [`OptionsHandler`]
pub struct OptionsFn<F>(pub F);

#[async_trait]
impl<F> OptionsHandler for OptionsFn<F>
where
    F: Fn(&Field) -> Vec<FieldOption> + Send + Sync,
{
    async fn resolve(&self, field: Field, _parent: Option<FormSnapshot>) -> Vec<FieldOption> {
        (self.0)(&field)
    }
}
