//! Field registration: merging declarations with a value map

use super::field::{Field, FieldDef, ValueMap};
use std::collections::HashSet;
use tracing::debug;

/// Build the full field list for `defs`, replacing whatever was registered before.
///
/// Values come from `values` when present, otherwise from each declaration's
/// default. A declaration repeating an earlier id is skipped.
pub fn register_fields(defs: &[FieldDef], values: &ValueMap) -> Vec<Field> {
    let mut seen = HashSet::with_capacity(defs.len());
    defs.iter()
        .filter(|def| {
            let first = seen.insert(def.id.as_str());
            if !first {
                debug!(id = %def.id, "duplicate declaration ignored");
            }
            first
        })
        .map(|def| Field::from_def(def, values))
        .collect()
}

/// Append one field built from `def`, unless a field with that id already exists
pub fn register_field(def: &FieldDef, fields: &[Field], values: &ValueMap) -> Vec<Field> {
    if fields.iter().any(|f| f.id == def.id) {
        debug!(id = %def.id, "field already registered");
        return fields.to_vec();
    }
    let mut next = Vec::with_capacity(fields.len() + 1);
    next.extend_from_slice(fields);
    next.push(Field::from_def(def, values));
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn ids(fields: &[Field]) -> Vec<&str> {
        fields.iter().map(|f| f.id.as_str()).collect()
    }

    mod bulk {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_single_undefined_default() {
            let fields = register_fields(&[FieldDef::new("a")], &ValueMap::new());
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].id, "a");
            assert_eq!(fields[0].value, Value::Null);
            assert!(!fields[0].touched);
            assert!(fields[0].valid);
        }

        #[test]
        fn test_keeps_declared_order() {
            let defs = vec![FieldDef::new("c"), FieldDef::new("a"), FieldDef::new("b")];
            let fields = register_fields(&defs, &ValueMap::new());
            assert_eq!(ids(&fields), vec!["c", "a", "b"]);
        }

        #[test]
        fn test_seeds_from_value_map() {
            let defs = vec![
                FieldDef::new("a").with_default("x"),
                FieldDef::new("b").with_default("y"),
            ];
            let values = ValueMap::from([("b".to_string(), json!("given"))]);
            let fields = register_fields(&defs, &values);
            assert_eq!(fields[0].value, json!("x"));
            assert_eq!(fields[1].value, json!("given"));
        }

        #[test]
        fn test_is_idempotent() {
            let defs = vec![FieldDef::new("a").with_default(1), FieldDef::new("b")];
            let values = ValueMap::from([("b".to_string(), json!(true))]);
            assert_eq!(register_fields(&defs, &values), register_fields(&defs, &values));
        }

        #[test]
        fn test_duplicate_declaration_first_wins() {
            let defs = vec![
                FieldDef::new("a").with_default("first"),
                FieldDef::new("b"),
                FieldDef::new("a").with_default("second"),
            ];
            let fields = register_fields(&defs, &ValueMap::new());
            assert_eq!(ids(&fields), vec!["a", "b"]);
            assert_eq!(fields[0].value, json!("first"));
        }

        #[test]
        fn test_replacement_drops_omitted_fields() {
            let first = register_fields(
                &[FieldDef::new("a"), FieldDef::new("b")],
                &ValueMap::new(),
            );
            assert_eq!(first.len(), 2);
            let second = register_fields(&[FieldDef::new("b")], &ValueMap::new());
            assert_eq!(ids(&second), vec!["b"]);
        }
    }

    mod single {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_appends_after_existing() {
            let fields = register_fields(&[FieldDef::new("a")], &ValueMap::new());
            let fields = register_field(&FieldDef::new("b"), &fields, &ValueMap::new());
            assert_eq!(ids(&fields), vec!["a", "b"]);
        }

        #[test]
        fn test_existing_id_is_noop() {
            let fields = register_fields(&[FieldDef::new("a").with_default("x")], &ValueMap::new());
            let next = register_field(
                &FieldDef::new("a").with_default("other"),
                &fields,
                &ValueMap::new(),
            );
            assert_eq!(next, fields);
        }

        #[test]
        fn test_repeated_registration_keeps_ids_unique() {
            let mut fields = Vec::new();
            for id in ["b", "a", "b", "c", "a", "a", "c"] {
                fields = register_field(&FieldDef::new(id), &fields, &ValueMap::new());
            }
            assert_eq!(ids(&fields), vec!["b", "a", "c"]);
        }

        #[test]
        fn test_seeds_from_value_map() {
            let values = ValueMap::from([("b".to_string(), json!("seeded"))]);
            let fields = register_field(&FieldDef::new("b"), &[], &values);
            assert_eq!(fields[0].value, json!("seeded"));
        }
    }
}
