//! Derivation of per-field validity and the aggregate form state
//!
//! [`derive_state`] is the single source of truth for the aggregate: the store
//! runs it after every transform and never patches a previous result.

use super::field::{Field, OptionsState, Validation, ValueMap};
use super::handlers::{OptionsHandler, ValidationHandler};
use super::store::FormSnapshot;

/// Form-level inputs to a derivation
#[derive(Clone, Copy, Default)]
pub struct DeriveContext<'a> {
    pub show_validation_before_touched: bool,
    pub disabled: bool,
    pub options_handler: Option<&'a dyn OptionsHandler>,
    pub validation_handler: Option<&'a dyn ValidationHandler>,
    pub parent: Option<&'a FormSnapshot>,
}

/// Output of [`derive_state`]
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedState {
    pub fields: Vec<Field>,
    pub value: ValueMap,
    pub is_valid: bool,
    /// Ids of fields whose options still have to be requested
    pub option_requests: Vec<String>,
}

/// Whether `field` blocks the aggregate validity
fn counts_against(field: &Field, show_validation_before_touched: bool) -> bool {
    (field.touched || show_validation_before_touched) && !field.valid
}

fn has_options_source(field: &Field, form_handler: Option<&dyn OptionsHandler>) -> bool {
    field.def.options_handler.is_some() || form_handler.is_some_and(|h| h.handles(field))
}

/// Revalidate every field and rebuild the aggregate value map and validity
pub fn derive_state(fields: &[Field], ctx: &DeriveContext<'_>) -> DerivedState {
    let mut option_requests = Vec::new();
    let derived: Vec<Field> = fields
        .iter()
        .map(|field| {
            let handler: Option<&dyn ValidationHandler> = match &field.def.validator {
                Some(validator) => Some(validator.as_ref()),
                None => ctx.validation_handler,
            };
            let validation = match handler {
                Some(handler) => handler.validate(field, fields, ctx.parent),
                None => Validation::ok(),
            };

            let mut next = field.clone();
            next.valid = validation.valid;
            next.error = validation.message;
            next.disabled = ctx.disabled || field.def.disabled.unwrap_or(false);

            if next.options == OptionsState::Unresolved {
                if has_options_source(field, ctx.options_handler) {
                    option_requests.push(field.id.clone());
                } else {
                    next.options = OptionsState::None;
                }
            }
            next
        })
        .collect();

    let value = derived
        .iter()
        .map(|f| (f.id.clone(), f.value.clone()))
        .collect();
    let is_valid = !derived
        .iter()
        .any(|f| counts_against(f, ctx.show_validation_before_touched));

    DerivedState {
        fields: derived,
        value,
        is_valid,
        option_requests,
    }
}
