//! Copy-on-write updates of a single field's value or touched flag

use super::field::Field;
use serde_json::Value;
use tracing::debug;

fn update_field(id: &str, fields: &[Field], apply: impl FnOnce(&mut Field)) -> Vec<Field> {
    let mut next = fields.to_vec();
    match next.iter_mut().find(|f| f.id == id) {
        Some(field) => apply(field),
        None => debug!(id, "update for unknown field ignored"),
    }
    next
}

/// Replace the value of the field matching `id`; unknown ids leave the list unchanged
pub fn update_field_value(id: &str, value: Value, fields: &[Field]) -> Vec<Field> {
    update_field(id, fields, |field| field.value = value)
}

/// Set the touched flag of the field matching `id`; unknown ids leave the list unchanged
pub fn update_field_touched_state(id: &str, touched: bool, fields: &[Field]) -> Vec<Field> {
    update_field(id, fields, |field| field.touched = touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::field::{FieldDef, ValueMap};
    use crate::form::registry::register_fields;
    use serde_json::json;

    fn fields() -> Vec<Field> {
        register_fields(
            &[FieldDef::new("a"), FieldDef::new("b"), FieldDef::new("c")],
            &ValueMap::new(),
        )
    }

    fn ids(fields: &[Field]) -> Vec<&str> {
        fields.iter().map(|f| f.id.as_str()).collect()
    }

    mod value {
        use super::*;

        #[test]
        fn test_replaces_only_matching_field() {
            let before = fields();
            let after = update_field_value("b", json!("hello"), &before);
            assert_eq!(after[1].value, json!("hello"));
            assert_eq!(after[0], before[0]);
            assert_eq!(after[2], before[2]);
            // the input list is left untouched
            assert_eq!(before[1].value, serde_json::Value::Null);
        }

        #[test]
        fn test_unknown_id_is_noop() {
            let before = fields();
            assert_eq!(update_field_value("zzz", json!(1), &before), before);
        }

        #[test]
        fn test_preserves_count_and_order() {
            let before = fields();
            let after = update_field_value("c", json!([1, 2]), &before);
            assert_eq!(ids(&after), ids(&before));
        }

        #[test]
        fn test_does_not_touch_field() {
            let after = update_field_value("a", json!("x"), &fields());
            assert!(!after[0].touched);
        }
    }

    mod touched {
        use super::*;

        #[test]
        fn test_marks_field_touched() {
            let after = update_field_touched_state("a", true, &fields());
            assert!(after[0].touched);
            assert!(!after[1].touched);
        }

        #[test]
        fn test_keeps_value_and_options() {
            let before = update_field_value("a", json!("v"), &fields());
            let after = update_field_touched_state("a", true, &before);
            assert_eq!(after[0].value, before[0].value);
            assert_eq!(after[0].options, before[0].options);
        }

        #[test]
        fn test_unknown_id_is_noop() {
            let before = fields();
            assert_eq!(update_field_touched_state("nope", true, &before), before);
        }

        #[test]
        fn test_preserves_count_and_order() {
            let before = fields();
            let after = update_field_touched_state("b", true, &before);
            assert_eq!(ids(&after), ids(&before));
        }
    }
}
