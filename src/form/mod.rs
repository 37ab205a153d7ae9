//! Form domain layer
//!
//! Pure transforms over field lists plus the store that owns one form
//! instance and re-derives its aggregate state after every change.

mod derive;
mod field;
mod fragment;
mod handlers;
mod options;
mod registry;
mod store;
mod updates;

pub use derive::{derive_state, DeriveContext, DerivedState};
pub use field::{Field, FieldDef, FieldOption, OptionsState, Validation, ValueMap};
pub use fragment::FormFragment;
pub use handlers::{JsonValidator, OptionsFn, OptionsHandler, ValidationHandler};
pub use options::{set_options_in_field, OptionsCompletion, OptionsResolver};
pub use registry::{register_field, register_fields};
pub use store::{
    FieldRegistrar, FormInputs, FormSnapshot, FormStore, FormStoreBuilder, OnChange,
    ParentContext,
};
pub use updates::{update_field_touched_state, update_field_value};
