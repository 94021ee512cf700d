//! Shared demo store.
//!
//! A single state container for the walkthrough: demo-mode flag, the step
//! sequence, the step cursor and the demo data collections. It is handed by
//! clone to the executor, the injector and the UI; every committed mutation
//! notifies subscribers through a `watch` channel, no-op mutations do not.

use crate::model::DemoStep;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoState {
    pub is_demo_mode: bool,
    pub steps: Vec<DemoStep>,
    pub current_step_index: usize,
    pub domain_collections: BTreeMap<String, Vec<Value>>,
    /// Bumped whenever a run starts or stops or the catalog is swapped.
    /// Deferred work scheduled under an older epoch is stale.
    #[serde(skip)]
    pub epoch: u64,
}

impl DemoState {
    pub fn current_step(&self) -> Option<&DemoStep> {
        self.steps.get(self.current_step_index)
    }

    /// True when the cursor sits on the last step (or there are no steps).
    pub fn is_terminal(&self) -> bool {
        self.current_step_index + 1 >= self.steps.len()
    }

    pub fn collection(&self, name: &str) -> &[Value] {
        self.domain_collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }
}

/// Cheap-to-clone handle on the shared demo state.
#[derive(Clone)]
pub struct DemoStore {
    tx: Arc<watch::Sender<DemoState>>,
}

impl DemoStore {
    /// Create the store with its step catalog. Demo mode starts off.
    pub fn new(steps: Vec<DemoStep>) -> Self {
        let (tx, _) = watch::channel(DemoState {
            steps,
            ..Default::default()
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<DemoState> {
        self.tx.subscribe()
    }

    /// Run `f` against the latest committed state.
    pub fn read<R>(&self, f: impl FnOnce(&DemoState) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn snapshot(&self) -> DemoState {
        self.tx.borrow().clone()
    }

    pub fn is_demo_mode(&self) -> bool {
        self.read(|s| s.is_demo_mode)
    }

    #[cfg(test)]
    pub fn current_step_index(&self) -> usize {
        self.read(|s| s.current_step_index)
    }

    pub fn steps(&self) -> Vec<DemoStep> {
        self.read(|s| s.steps.clone())
    }

    pub fn collection(&self, name: &str) -> Vec<Value> {
        self.read(|s| s.collection(name).to_vec())
    }

    pub fn epoch(&self) -> u64 {
        self.read(|s| s.epoch)
    }

    /// Start a run from the first step. No-op if a run is already active.
    pub fn enter_demo_mode(&self) -> bool {
        let entered = self.tx.send_if_modified(|s| {
            if s.is_demo_mode {
                return false;
            }
            s.is_demo_mode = true;
            s.current_step_index = 0;
            for step in &mut s.steps {
                step.completed = false;
            }
            s.epoch += 1;
            true
        });
        if entered {
            tracing::info!(epoch = self.epoch(), "entered demo mode");
        }
        entered
    }

    /// Stop the run. Pending continuations see the new epoch and drop out.
    pub fn exit_demo_mode(&self) -> bool {
        let exited = self.tx.send_if_modified(|s| {
            if !s.is_demo_mode {
                return false;
            }
            s.is_demo_mode = false;
            s.epoch += 1;
            true
        });
        if exited {
            tracing::info!("exited demo mode");
        }
        exited
    }

    /// Swap the step catalog. Resets the cursor and invalidates pending work.
    pub fn replace_steps(&self, steps: Vec<DemoStep>) {
        self.tx.send_modify(|s| {
            s.steps = steps;
            for step in &mut s.steps {
                step.completed = false;
            }
            s.current_step_index = 0;
            s.epoch += 1;
        });
    }

    /// Append `record` to `collection`, creating the collection if needed.
    /// Returns the new collection length.
    pub fn add_domain_record(&self, collection: &str, record: Value) -> usize {
        let mut total = 0;
        self.tx.send_modify(|s| {
            let records = s.domain_collections.entry(collection.to_string()).or_default();
            records.push(record);
            total = records.len();
        });
        tracing::debug!(collection, total, "record added");
        total
    }

    /// Apply `f` to the object record whose `id` field equals `id`.
    /// Returns false (and notifies nobody) when there is no such record.
    pub fn update_record(
        &self,
        collection: &str,
        id: &str,
        f: impl FnOnce(&mut serde_json::Map<String, Value>),
    ) -> bool {
        self.tx.send_if_modified(|s| {
            let record = s
                .domain_collections
                .get_mut(collection)
                .and_then(|records| {
                    records
                        .iter_mut()
                        .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
                })
                .and_then(Value::as_object_mut);
            match record {
                Some(obj) => {
                    f(obj);
                    true
                }
                None => false,
            }
        })
    }

    /// Drop all demo data. Used to reset the preview mid-run.
    pub fn reset_collections(&self) {
        self.tx.send_if_modified(|s| {
            if s.domain_collections.is_empty() {
                return false;
            }
            s.domain_collections.clear();
            true
        });
    }

    /// Mark a step done. Unknown ids are ignored.
    pub fn complete_step(&self, step_id: &str) -> bool {
        let done = self.tx.send_if_modified(|s| {
            match s.steps.iter_mut().find(|step| step.id == step_id) {
                Some(step) if !step.completed => {
                    step.completed = true;
                    true
                }
                _ => false,
            }
        });
        if !done {
            tracing::debug!(step = step_id, "complete_step: nothing to do");
        }
        done
    }

    /// Move the cursor forward unless it is already on the last step.
    pub fn advance_step(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if s.current_step_index + 1 < s.steps.len() {
                s.current_step_index += 1;
                true
            } else {
                false
            }
        })
    }
}
