//! Asynchronous option resolution
//!
//! Every request carries a per-field generation. A completion is merged only
//! when its field still exists in the current list and is still waiting on
//! that exact generation; anything else is dropped.
//!
//! Inside a tokio runtime requests run as tasks. Without one they are driven
//! to completion on a short-lived current-thread runtime and queued as ready.

use super::field::{Field, FieldOption, OptionsState};
use super::handlers::OptionsHandler;
use super::store::FormSnapshot;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Options delivered for one request
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsCompletion {
    pub field_id: String,
    pub generation: u64,
    pub options: Vec<FieldOption>,
}

/// Issues option requests and collects their completions
#[derive(Debug)]
pub struct OptionsResolver {
    generations: HashMap<String, u64>,
    in_flight: JoinSet<OptionsCompletion>,
    /// Completions resolved without a runtime, not yet collected
    ready: VecDeque<OptionsCompletion>,
}

impl OptionsResolver {
    pub fn new() -> Self {
        Self {
            generations: HashMap::new(),
            in_flight: JoinSet::new(),
            ready: VecDeque::new(),
        }
    }

    /// Number of requests that have not been collected yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.len() + self.ready.len()
    }

    /// Latest generation issued for `id`
    pub fn generation(&self, id: &str) -> u64 {
        self.generations.get(id).copied().unwrap_or(0)
    }

    fn next_generation(&mut self, id: &str) -> u64 {
        let generation = self.generations.entry(id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Spawn a request for every field listed in `requests` and mark it pending.
    ///
    /// A field's own handler wins over `form_handler`. Outside a tokio runtime
    /// the handler is resolved before this returns, so it must not wait on
    /// anything the caller has yet to do.
    pub fn issue(
        &mut self,
        fields: Vec<Field>,
        requests: &[String],
        form_handler: Option<&Arc<dyn OptionsHandler>>,
        parent: Option<&FormSnapshot>,
    ) -> Vec<Field> {
        fields
            .into_iter()
            .map(|mut field| {
                if !requests.contains(&field.id) {
                    return field;
                }
                let Some(handler) = field
                    .def
                    .options_handler
                    .clone()
                    .or_else(|| form_handler.cloned())
                else {
                    return field;
                };

                let generation = self.next_generation(&field.id);
                let field_id = field.id.clone();
                let request = field.clone();
                let parent = parent.cloned();
                let task = async move {
                    let options = handler.resolve(request, parent).await;
                    OptionsCompletion {
                        field_id,
                        generation,
                        options,
                    }
                };
                if Handle::try_current().is_ok() {
                    self.in_flight.spawn(task);
                } else {
                    self.resolve_blocking(task);
                }
                debug!(id = %field.id, generation, "options requested");

                field.options = OptionsState::Pending { generation };
                field
            })
            .collect()
    }

    fn resolve_blocking<F>(&mut self, task: F)
    where
        F: Future<Output = OptionsCompletion> + Send + 'static,
    {
        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(error = %err, "failed to start runtime for options request");
                return;
            }
        };
        match runtime.block_on(runtime.spawn(task)) {
            Ok(completion) => self.ready.push_back(completion),
            Err(err) => warn!(error = %err, "options request failed"),
        }
    }

    /// Take a completion that was resolved without a runtime
    pub fn take_ready(&mut self) -> Option<OptionsCompletion> {
        self.ready.pop_front()
    }

    /// Wait for the next finished request; `None` once nothing is in flight
    pub async fn next_completion(&mut self) -> Option<OptionsCompletion> {
        if let Some(completion) = self.ready.pop_front() {
            return Some(completion);
        }
        while let Some(result) = self.in_flight.join_next().await {
            match result {
                Ok(completion) => return Some(completion),
                Err(err) => warn!(error = %err, "options request failed"),
            }
        }
        None
    }

    /// Collect a request that has already finished, without waiting
    pub fn try_next_completion(&mut self) -> Option<OptionsCompletion> {
        if let Some(completion) = self.ready.pop_front() {
            return Some(completion);
        }
        while let Some(result) = self.in_flight.try_join_next() {
            match result {
                Ok(completion) => return Some(completion),
                Err(err) => warn!(error = %err, "options request failed"),
            }
        }
        None
    }
}

impl Default for OptionsResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge `completion` into the current field list.
///
/// Returns `None` when the completion is stale: its field was removed or a
/// newer request has been issued since.
pub fn set_options_in_field(fields: &[Field], completion: &OptionsCompletion) -> Option<Vec<Field>> {
    let index = fields.iter().position(|f| f.id == completion.field_id)?;
    match fields[index].options {
        OptionsState::Pending { generation } if generation == completion.generation => {}
        _ => return None,
    }
    let mut next = fields.to_vec();
    next[index].options = OptionsState::Ready(completion.options.clone());
    Some(next)
}
