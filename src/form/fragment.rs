//! Nested composition units that attach their fields at mount time

use super::field::FieldDef;
use super::store::FieldRegistrar;
use tracing::warn;

/// A group of declarations owned by a sub-form.
///
/// The enclosing store does not know these fields upfront; they are attached
/// through its [`FieldRegistrar`] when the fragment mounts.
#[derive(Debug, Clone, Default)]
pub struct FormFragment {
    defs: Vec<FieldDef>,
}

impl FormFragment {
    pub fn new(defs: Vec<FieldDef>) -> Self {
        Self { defs }
    }

    pub fn defs(&self) -> &[FieldDef] {
        &self.defs
    }

    /// Nest another fragment; its fields follow this fragment's own
    pub fn with_child(mut self, child: FormFragment) -> Self {
        self.defs.extend(child.defs);
        self
    }

    /// Queue every declaration with the enclosing store.
    ///
    /// Returns how many were queued; ids already present are dropped by the store.
    pub fn mount(&self, registrar: &FieldRegistrar) -> usize {
        let mut queued = 0;
        for def in &self.defs {
            if !registrar.register(def.clone()) {
                warn!(id = %def.id, "form store dropped before fragment mounted");
                break;
            }
            queued += 1;
        }
        queued
    }
}
