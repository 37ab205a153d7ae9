//! Reconciliation store: the single owner of one form instance's fields
//!
//! Every stimulus (owner reconfiguration, user edit or focus, dynamic
//! registration, option completion) produces a candidate field list through
//! one of the pure transforms, which is then pushed through
//! [`derive_state`] before it is committed.

use super::derive::{derive_state, DeriveContext, DerivedState};
use super::field::{Field, FieldDef, Validation, ValueMap};
use super::handlers::{OptionsHandler, ValidationHandler};
use super::options::{set_options_in_field, OptionsCompletion, OptionsResolver};
use super::registry::{register_field, register_fields};
use super::updates::{update_field_touched_state, update_field_value};
use crate::config::EngineConfig;
use crate::error::{FormError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

/// Owner callback invoked with `(value, is_valid)` after user-driven transitions
pub type OnChange = Box<dyn FnMut(&ValueMap, bool) + Send>;

/// Owner-facing view of a form
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FormSnapshot {
    pub fields: Vec<Field>,
    pub value: ValueMap,
    pub is_valid: bool,
    pub disabled: bool,
}

impl FormSnapshot {
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// Reconfiguration pushed by the owning context; `None` means "unchanged"
#[derive(Debug, Clone, Default)]
pub struct FormInputs {
    pub declarations: Option<Vec<FieldDef>>,
    pub value: Option<ValueMap>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Default)]
struct FormState {
    snapshot: FormSnapshot,
    /// Last declaration set applied by the owner
    declarations: Option<Vec<FieldDef>>,
    /// Last value object injected by the owner
    injected: ValueMap,
}

/// Read-only view of an enclosing form, handed to nested stores
#[derive(Debug, Clone)]
pub struct ParentContext {
    rx: watch::Receiver<FormSnapshot>,
}

impl ParentContext {
    /// The parent's latest committed snapshot
    pub fn snapshot(&self) -> FormSnapshot {
        self.rx.borrow().clone()
    }

    pub fn value(&self, id: &str) -> Option<Value> {
        self.rx.borrow().value.get(id).cloned()
    }

    /// Wait until the parent commits a new snapshot.
    ///
    /// Returns `false` once the parent store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Write channel through which nested units attach fields to a store
#[derive(Debug, Clone)]
pub struct FieldRegistrar {
    tx: mpsc::UnboundedSender<FieldDef>,
}

impl FieldRegistrar {
    /// Queue `def` for registration; `false` if the store no longer exists
    pub fn register(&self, def: FieldDef) -> bool {
        self.tx.send(def).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notify {
    Never,
    Always,
    IfChanged,
}

/// Builder for [`FormStore`]
#[derive(Default)]
pub struct FormStoreBuilder {
    inputs: FormInputs,
    show_validation_before_touched: bool,
    conditional_update: bool,
    validation_handler: Option<Arc<dyn ValidationHandler>>,
    options_handler: Option<Arc<dyn OptionsHandler>>,
    parent: Option<ParentContext>,
    on_change: Option<OnChange>,
}

impl FormStoreBuilder {
    pub fn declarations(mut self, defs: Vec<FieldDef>) -> Self {
        self.inputs.declarations = Some(defs);
        self
    }

    pub fn value(mut self, value: ValueMap) -> Self {
        self.inputs.value = Some(value);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.inputs.disabled = Some(disabled);
        self
    }

    pub fn show_validation_before_touched(mut self, show: bool) -> Self {
        self.show_validation_before_touched = show;
        self
    }

    /// Skip republishing snapshots equal to the previous one
    pub fn conditional_update(mut self, enabled: bool) -> Self {
        self.conditional_update = enabled;
        self
    }

    /// Apply the settings present in `config`
    pub fn config(mut self, config: &EngineConfig) -> Self {
        if let Some(show) = config.show_validation_before_touched {
            self.show_validation_before_touched = show;
        }
        if let Some(enabled) = config.conditional_update {
            self.conditional_update = enabled;
        }
        if let Some(disabled) = config.disabled {
            self.inputs.disabled = Some(disabled);
        }
        self
    }

    /// Form-level validator for fields without their own
    pub fn validator<F>(self, f: F) -> Self
    where
        F: Fn(&Field, &[Field], Option<&FormSnapshot>) -> Validation + Send + Sync + 'static,
    {
        self.validation_handler(Arc::new(f))
    }

    pub fn validation_handler(mut self, handler: Arc<dyn ValidationHandler>) -> Self {
        self.validation_handler = Some(handler);
        self
    }

    pub fn options_handler(mut self, handler: Arc<dyn OptionsHandler>) -> Self {
        self.options_handler = Some(handler);
        self
    }

    pub fn parent(mut self, parent: ParentContext) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn on_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ValueMap, bool) + Send + 'static,
    {
        self.on_change = Some(Box::new(f));
        self
    }

    pub fn build(self) -> FormStore {
        let (published, _) = watch::channel(FormSnapshot::default());
        let (registrations_tx, registrations) = mpsc::unbounded_channel();
        let FormInputs {
            declarations,
            value,
            disabled,
        } = self.inputs;

        let mut store = FormStore {
            id: Uuid::new_v4(),
            show_validation_before_touched: self.show_validation_before_touched,
            conditional_update: self.conditional_update,
            validation_handler: self.validation_handler,
            options_handler: self.options_handler,
            parent: self.parent,
            on_change: self.on_change,
            state: FormState {
                injected: value.unwrap_or_default(),
                ..Default::default()
            },
            resolver: OptionsResolver::new(),
            published,
            registrations_tx,
            registrations,
        };

        let fields = match &declarations {
            Some(defs) => register_fields(defs, &store.state.injected),
            None => Vec::new(),
        };
        store.state.declarations = declarations;
        store.commit(fields, disabled.unwrap_or(false), Notify::Never);
        debug!(form = %store.id, fields = store.fields().len(), "form store created");
        store
    }
}

/// Owner of one form instance's authoritative field list and snapshot
pub struct FormStore {
    id: Uuid,
    show_validation_before_touched: bool,
    conditional_update: bool,
    validation_handler: Option<Arc<dyn ValidationHandler>>,
    options_handler: Option<Arc<dyn OptionsHandler>>,
    parent: Option<ParentContext>,
    on_change: Option<OnChange>,
    state: FormState,
    resolver: OptionsResolver,
    published: watch::Sender<FormSnapshot>,
    registrations_tx: mpsc::UnboundedSender<FieldDef>,
    registrations: mpsc::UnboundedReceiver<FieldDef>,
}

impl FormStore {
    pub fn builder() -> FormStoreBuilder {
        FormStoreBuilder::default()
    }

    /// Builder for a store nested under this one
    pub fn nested(&self) -> FormStoreBuilder {
        FormStore::builder().parent(self.context())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> &FormSnapshot {
        &self.state.snapshot
    }

    pub fn fields(&self) -> &[Field] {
        &self.state.snapshot.fields
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.state.snapshot.field(id)
    }

    pub fn value(&self) -> &ValueMap {
        &self.state.snapshot.value
    }

    pub fn is_valid(&self) -> bool {
        self.state.snapshot.is_valid
    }

    pub fn disabled(&self) -> bool {
        self.state.snapshot.disabled
    }

    /// Declaration set last applied by the owner
    pub fn declarations(&self) -> Option<&[FieldDef]> {
        self.state.declarations.as_deref()
    }

    /// Option requests issued but not yet merged or discarded
    pub fn pending_options(&self) -> usize {
        self.resolver.in_flight()
    }

    /// Receive every committed snapshot
    pub fn subscribe(&self) -> watch::Receiver<FormSnapshot> {
        self.published.subscribe()
    }

    /// Read-only back-reference for nested stores
    pub fn context(&self) -> ParentContext {
        ParentContext {
            rx: self.published.subscribe(),
        }
    }

    /// Registration channel for nested composition units
    pub fn registrar(&self) -> FieldRegistrar {
        FieldRegistrar {
            tx: self.registrations_tx.clone(),
        }
    }

    /// Apply a reconfiguration from the owner.
    ///
    /// A changed declaration set replaces the field list. A changed value or
    /// disabled flag re-registers the current declarations so dynamically
    /// registered fields survive. Returns `false` when nothing changed.
    pub fn apply_inputs(&mut self, inputs: FormInputs) -> bool {
        self.drain_registrations();

        let FormInputs {
            declarations,
            value,
            disabled,
        } = inputs;
        let declarations_changed = declarations
            .as_ref()
            .is_some_and(|defs| self.state.declarations.as_ref() != Some(defs));
        let value_changed = value
            .as_ref()
            .is_some_and(|v| *v != self.state.snapshot.value);
        let disabled_changed = disabled.is_some_and(|d| d != self.state.snapshot.disabled);

        if !(declarations_changed || value_changed || disabled_changed) {
            return false;
        }

        let seed = match value {
            Some(value) => {
                self.state.injected = value.clone();
                value
            }
            None => self.state.snapshot.value.clone(),
        };

        let fields = match declarations.filter(|_| declarations_changed) {
            Some(defs) => {
                let fields = register_fields(&defs, &seed);
                self.state.declarations = Some(defs);
                fields
            }
            None => {
                let current: Vec<FieldDef> = self
                    .fields()
                    .iter()
                    .map(|f| f.def.as_ref().clone())
                    .collect();
                register_fields(&current, &seed)
            }
        };

        debug!(
            form = %self.id,
            declarations_changed,
            value_changed,
            disabled_changed,
            "form reconfigured"
        );
        let disabled = disabled.unwrap_or(self.state.snapshot.disabled);
        self.commit(fields, disabled, Notify::Never);
        true
    }

    pub fn set_declarations(&mut self, defs: Vec<FieldDef>) -> bool {
        self.apply_inputs(FormInputs {
            declarations: Some(defs),
            ..Default::default()
        })
    }

    pub fn set_value(&mut self, value: ValueMap) -> bool {
        self.apply_inputs(FormInputs {
            value: Some(value),
            ..Default::default()
        })
    }

    pub fn set_disabled(&mut self, disabled: bool) -> bool {
        self.apply_inputs(FormInputs {
            disabled: Some(disabled),
            ..Default::default()
        })
    }

    /// User edited a field. Unknown ids leave the state as it was and do not
    /// notify the owner.
    pub fn on_field_change(&mut self, id: &str, value: Value) {
        self.drain_registrations();
        let notify = if self.field(id).is_some() {
            Notify::Always
        } else {
            Notify::Never
        };
        let fields = update_field_value(id, value, self.fields());
        self.commit(fields, self.disabled(), notify);
    }

    /// Like [`on_field_change`](Self::on_field_change) but reports unknown ids
    pub fn try_field_change(&mut self, id: &str, value: Value) -> Result<()> {
        self.drain_registrations();
        if self.field(id).is_none() {
            return Err(FormError::UnknownField { id: id.to_string() });
        }
        self.on_field_change(id, value);
        Ok(())
    }

    /// User focused a field, marking it touched
    pub fn on_field_focus(&mut self, id: &str) {
        self.drain_registrations();
        let fields = update_field_touched_state(id, true, self.fields());
        self.commit(fields, self.disabled(), Notify::IfChanged);
    }

    /// Attach one field at runtime. First registration of an id wins.
    ///
    /// Returns `false` if the id was already registered.
    pub fn register_field(&mut self, def: FieldDef) -> bool {
        let mut seed = self.state.injected.clone();
        seed.extend(
            self.value()
                .iter()
                .map(|(id, value)| (id.clone(), value.clone())),
        );
        let fields = register_field(&def, self.fields(), &seed);
        if fields.len() == self.fields().len() {
            return false;
        }
        debug!(form = %self.id, id = %def.id, "field registered");
        self.commit(fields, self.disabled(), Notify::Never);
        true
    }

    /// Re-derive against the latest parent snapshot
    pub fn revalidate(&mut self) {
        let fields = self.fields().to_vec();
        self.commit(fields, self.disabled(), Notify::Never);
    }

    /// Apply queued registrations and already-finished option requests.
    ///
    /// Returns how many of them changed the form.
    pub fn poll(&mut self) -> usize {
        let mut applied = self.drain_registrations();
        while let Some(completion) = self.resolver.try_next_completion() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait until no registrations are queued and no option requests are in flight
    pub async fn settle(&mut self) {
        loop {
            self.drain_registrations();
            if self.resolver.in_flight() == 0 {
                break;
            }
            if let Some(completion) = self.resolver.next_completion().await {
                self.apply_completion(completion);
            }
        }
    }

    fn drain_registrations(&mut self) -> usize {
        let mut registered = 0;
        while let Ok(def) = self.registrations.try_recv() {
            if self.register_field(def) {
                registered += 1;
            }
        }
        registered
    }

    fn apply_completion(&mut self, completion: OptionsCompletion) -> bool {
        match set_options_in_field(self.fields(), &completion) {
            Some(fields) => {
                self.commit(fields, self.disabled(), Notify::Never);
                true
            }
            None => {
                debug!(
                    form = %self.id,
                    id = %completion.field_id,
                    generation = completion.generation,
                    "stale options completion discarded"
                );
                false
            }
        }
    }

    fn commit(&mut self, fields: Vec<Field>, disabled: bool, notify: Notify) {
        let parent = self.parent.as_ref().map(ParentContext::snapshot);
        let ctx = DeriveContext {
            show_validation_before_touched: self.show_validation_before_touched,
            disabled,
            options_handler: self.options_handler.as_deref(),
            validation_handler: self.validation_handler.as_deref(),
            parent: parent.as_ref(),
        };
        let DerivedState {
            fields,
            value,
            is_valid,
            option_requests,
        } = derive_state(&fields, &ctx);

        let fields = if option_requests.is_empty() {
            fields
        } else {
            self.resolver.issue(
                fields,
                &option_requests,
                self.options_handler.as_ref(),
                parent.as_ref(),
            )
        };

        let previous = &self.state.snapshot;
        let aggregate_changed = previous.value != value || previous.is_valid != is_valid;
        self.state.snapshot = FormSnapshot {
            fields,
            value,
            is_valid,
            disabled,
        };
        self.publish();

        let should_notify = match notify {
            Notify::Never => false,
            Notify::Always => true,
            Notify::IfChanged => aggregate_changed,
        };
        if should_notify {
            if let Some(on_change) = self.on_change.as_mut() {
                on_change(&self.state.snapshot.value, self.state.snapshot.is_valid);
            }
        }

        while let Some(completion) = self.resolver.take_ready() {
            self.apply_completion(completion);
        }
    }

    fn publish(&self) {
        let snapshot = &self.state.snapshot;
        if self.conditional_update {
            self.published.send_if_modified(|current| {
                if current == snapshot {
                    false
                } else {
                    *current = snapshot.clone();
                    true
                }
            });
        } else {
            self.published.send_replace(snapshot.clone());
        }
    }
}

impl std::fmt::Debug for FormStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormStore")
            .field("id", &self.id)
            .field("snapshot", &self.state.snapshot)
            .field("pending_options", &self.resolver.in_flight())
            .finish()
    }
}
