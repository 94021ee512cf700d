//! Content and module injection.
//!
//! Watches the store for completed `populate_content` and `add_modules`
//! steps and hands their payloads to the host's callbacks after a short
//! delay. Holds no content itself; it only remembers which completions it
//! has already delivered so each is delivered once.

use crate::host::HostBindings;
use crate::model::{ContentPayload, DemoStep, Module, StepAction, TourConfig, TourEvent};
use crate::store::{DemoState, DemoStore};
use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Content(String),
    Modules(Vec<Module>),
}

#[derive(Debug, Clone, PartialEq)]
struct Delivery {
    epoch: u64,
    step_id: String,
    payload: Payload,
}

/// Step ids already handed to the host during the current run.
///
/// Keys from earlier epochs can never match again, so they are dropped as
/// soon as a delivery from a newer epoch shows up.
#[derive(Debug, Default)]
struct Ledger {
    epoch: u64,
    delivered: HashSet<String>,
}

impl Ledger {
    /// True the first time a delivery is seen for its epoch and step.
    fn admit(&mut self, delivery: &Delivery) -> bool {
        if delivery.epoch != self.epoch {
            self.epoch = delivery.epoch;
            self.delivered.clear();
        }
        self.delivered.insert(delivery.step_id.clone())
    }
}

/// Completed steps up to the cursor that carry something to inject.
///
/// Looking back from the cursor (rather than at the cursor only) keeps
/// delivery exact when several store updates coalesce into one notification.
fn due_deliveries(state: &DemoState) -> Vec<Delivery> {
    if !state.is_demo_mode {
        return Vec::new();
    }
    state
        .steps
        .iter()
        .take(state.current_step_index + 1)
        .filter(|s| s.completed)
        .filter_map(payload_of)
        .map(|(step_id, payload)| Delivery {
            epoch: state.epoch,
            step_id,
            payload,
        })
        .collect()
}

fn payload_of(step: &DemoStep) -> Option<(String, Payload)> {
    let data = step.data.clone()?;
    let payload = match step.action {
        StepAction::PopulateContent => {
            let Some(content) = ContentPayload::content_of(&data) else {
                tracing::warn!(step = %step.id, "content payload not injectable");
                return None;
            };
            Payload::Content(content.to_string())
        }
        StepAction::AddModules => {
            let modules = match data {
                serde_json::Value::Array(_) => serde_json::from_value::<Vec<Module>>(data),
                other => serde_json::from_value::<Module>(other).map(|m| vec![m]),
            };
            match modules {
                Ok(m) => Payload::Modules(m),
                Err(e) => {
                    tracing::warn!(step = %step.id, error = %e, "module payload not injectable");
                    return None;
                }
            }
        }
        _ => return None,
    };
    Some((step.id.clone(), payload))
}

pub struct ContentInjector {
    cfg: TourConfig,
    store: DemoStore,
    host: HostBindings,
}

impl ContentInjector {
    pub fn new(cfg: TourConfig, store: DemoStore, host: HostBindings) -> Self {
        Self { cfg, store, host }
    }

    pub async fn run(self, event_tx: UnboundedSender<TourEvent>) -> Result<()> {
        let mut rx = self.store.subscribe();
        let mut ledger = Ledger::default();
        // Dropping the set aborts deliveries still waiting on their delay.
        let mut pending: JoinSet<()> = JoinSet::new();

        loop {
            let due = due_deliveries(&rx.borrow_and_update());
            for delivery in due {
                if ledger.admit(&delivery) {
                    self.schedule(&mut pending, delivery, &event_tx);
                }
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(res) = pending.join_next() => {
                    if let Err(e) = res {
                        tracing::warn!(error = %e, "injection task failed");
                    }
                }
            }
        }
        Ok(())
    }

    fn schedule(
        &self,
        pending: &mut JoinSet<()>,
        delivery: Delivery,
        event_tx: &UnboundedSender<TourEvent>,
    ) {
        let delay: Duration = match delivery.payload {
            Payload::Content(_) if self.host.on_content_update.is_some() => {
                self.cfg.content_inject_delay
            }
            Payload::Modules(_) if self.host.on_module_update.is_some() => {
                self.cfg.module_inject_delay
            }
            _ => {
                tracing::debug!(step = %delivery.step_id, "no host callback for payload");
                return;
            }
        };

        let store = self.store.clone();
        let host = self.host.clone();
        let event_tx = event_tx.clone();
        pending.spawn(async move {
            tokio::time::sleep(delay).await;
            let live = store.read(|s| s.is_demo_mode && s.epoch == delivery.epoch);
            if !live {
                tracing::debug!(step = %delivery.step_id, "injection dropped: run ended");
                return;
            }
            match delivery.payload {
                Payload::Content(content) => {
                    if let Some(cb) = host.on_content_update.as_ref() {
                        cb(&content);
                        let _ = event_tx.send(TourEvent::ContentInjected {
                            step_id: delivery.step_id,
                        });
                    }
                }
                Payload::Modules(modules) => {
                    if let Some(cb) = host.on_module_update.as_ref() {
                        cb(&modules);
                        let _ = event_tx.send(TourEvent::ModulesInjected {
                            step_id: delivery.step_id,
                            count: modules.len(),
                        });
                    }
                }
            }
        });
    }
}
