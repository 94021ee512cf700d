//! Step executor.
//!
//! Drives the tour one step at a time: wait for the viewer, run the step's
//! effect, mark it complete, wait again, advance. The control flow is an
//! explicit state machine; every deferred continuation carries a
//! [`StepTicket`] that is re-checked against the store before each
//! transition, so leaving demo mode (or restarting) turns pending work into
//! a no-op without cancelling timers.

mod actions;
mod ticket;

pub use actions::Outcome;
pub use ticket::StepTicket;

use crate::host::HostBindings;
use crate::model::{TourConfig, TourEvent};
use crate::store::{DemoState, DemoStore};
use actions::ActionContext;
use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    AwaitingPresentationDelay { ticket: StepTicket, until: Instant },
    Executing { ticket: StepTicket },
    AwaitingAdvanceDelay { ticket: StepTicket, until: Instant },
    Done,
}

/// What the store says should happen next, read while idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Demo mode is off or there is no step under the cursor.
    Wait,
    Execute(StepTicket),
    /// The step under the cursor is already complete but not the last one.
    Advance(StepTicket),
    Finished,
}

impl Plan {
    pub fn from_state(state: &DemoState) -> Plan {
        let Some(ticket) = StepTicket::capture(state) else {
            return Plan::Wait;
        };
        if !state.steps[ticket.index].completed {
            Plan::Execute(ticket)
        } else if state.is_terminal() {
            Plan::Finished
        } else {
            Plan::Advance(ticket)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Planned(Plan),
    /// The state's deadline passed. `live` is the guard re-read at that moment.
    DelayElapsed { live: bool },
    /// The store changed before the deadline. `live` is the guard re-read.
    StoreChanged { live: bool },
    Executed(Outcome),
}

impl ExecutorState {
    /// The transition table. Pure: effects are performed by the run loop.
    pub fn next(self, input: Input, cfg: &TourConfig, now: Instant) -> ExecutorState {
        use ExecutorState::*;
        match (self, input) {
            (Idle | Done, Input::Planned(Plan::Execute(ticket))) => AwaitingPresentationDelay {
                ticket,
                until: now + cfg.presentation_delay,
            },
            (Idle | Done, Input::Planned(Plan::Advance(ticket))) => AwaitingAdvanceDelay {
                ticket,
                until: now + cfg.advance_delay,
            },
            (Idle | Done, Input::Planned(Plan::Finished)) => Done,
            (Idle | Done, Input::Planned(Plan::Wait)) => Idle,

            (AwaitingPresentationDelay { ticket, .. }, Input::DelayElapsed { live: true }) => {
                Executing { ticket }
            }
            (Executing { ticket }, Input::Executed(Outcome::Completed)) => AwaitingAdvanceDelay {
                ticket,
                until: now + cfg.advance_delay,
            },
            (AwaitingAdvanceDelay { .. }, Input::DelayElapsed { .. }) => Idle,

            (
                s @ (AwaitingPresentationDelay { .. } | AwaitingAdvanceDelay { .. }),
                Input::StoreChanged { live: true },
            ) => s,
            (
                AwaitingPresentationDelay { .. } | AwaitingAdvanceDelay { .. },
                Input::DelayElapsed { live: false } | Input::StoreChanged { live: false },
            ) => Idle,
            (Executing { .. }, Input::Executed(Outcome::Cancelled)) => Idle,

            (s, input) => {
                tracing::warn!(state = ?s, ?input, "executor ignored input");
                s
            }
        }
    }

    pub fn ticket(&self) -> Option<&StepTicket> {
        match self {
            ExecutorState::AwaitingPresentationDelay { ticket, .. }
            | ExecutorState::Executing { ticket }
            | ExecutorState::AwaitingAdvanceDelay { ticket, .. } => Some(ticket),
            ExecutorState::Idle | ExecutorState::Done => None,
        }
    }
}

pub struct StepExecutor {
    cfg: TourConfig,
    store: DemoStore,
    host: HostBindings,
}

impl StepExecutor {
    pub fn new(cfg: TourConfig, store: DemoStore, host: HostBindings) -> Self {
        Self { cfg, store, host }
    }

    pub async fn run(self, event_tx: UnboundedSender<TourEvent>) -> Result<()> {
        let mut rx = self.store.subscribe();
        let ctx = ActionContext {
            cfg: &self.cfg,
            store: &self.store,
            host: &self.host,
            event_tx: &event_tx,
        };
        let mut state = ExecutorState::Idle;

        loop {
            let input = match &state {
                ExecutorState::Idle | ExecutorState::Done => {
                    let plan = Plan::from_state(&rx.borrow_and_update());
                    if matches!(plan, Plan::Wait | Plan::Finished) {
                        let next = state.clone().next(Input::Planned(plan), &self.cfg, Instant::now());
                        if next == ExecutorState::Done && state != ExecutorState::Done {
                            let steps = self.store.read(|s| s.steps.len());
                            tracing::info!(steps, "tour finished");
                            let _ = event_tx.send(TourEvent::TourFinished { steps });
                        }
                        state = next;
                        if rx.changed().await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Input::Planned(plan)
                }
                ExecutorState::AwaitingPresentationDelay { ticket, until }
                | ExecutorState::AwaitingAdvanceDelay { ticket, until } => {
                    // Before the effect the step must still be pending; afterwards
                    // it only has to still be under the cursor.
                    let before_effect =
                        matches!(state, ExecutorState::AwaitingPresentationDelay { .. });
                    let live = |s: &DemoState| {
                        if before_effect {
                            ticket.is_pending(s)
                        } else {
                            ticket.is_current(s)
                        }
                    };
                    tokio::select! {
                        _ = tokio::time::sleep_until(*until) => {
                            Input::DelayElapsed { live: self.store.read(&live) }
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            Input::StoreChanged { live: self.store.read(&live) }
                        }
                    }
                }
                ExecutorState::Executing { ticket } => {
                    let step = self.store.read(|s| s.steps.get(ticket.index).cloned());
                    let outcome = match step {
                        Some(step) => actions::execute(&ctx, ticket, &step).await,
                        None => Outcome::Cancelled,
                    };
                    Input::Executed(outcome)
                }
            };

            self.apply_effects(&state, &input, &event_tx);

            let was_waiting = matches!(state, ExecutorState::AwaitingPresentationDelay { .. });
            state = state.next(input, &self.cfg, Instant::now());

            if let ExecutorState::AwaitingPresentationDelay { ticket, .. } = &state {
                if !was_waiting {
                    self.announce(ticket, &event_tx);
                }
            }
        }
        Ok(())
    }

    /// Effects that belong to a transition and must land in the store before it.
    fn apply_effects(
        &self,
        state: &ExecutorState,
        input: &Input,
        event_tx: &UnboundedSender<TourEvent>,
    ) {
        match (state, input) {
            (ExecutorState::Executing { ticket }, Input::Executed(Outcome::Completed)) => {
                self.store.complete_step(&ticket.step_id);
                tracing::debug!(step = %ticket.step_id, index = ticket.index, "step completed");
                let _ = event_tx.send(TourEvent::StepCompleted {
                    index: ticket.index,
                    step_id: ticket.step_id.clone(),
                });
            }
            (
                ExecutorState::AwaitingAdvanceDelay { ticket, .. },
                Input::DelayElapsed { live: true },
            ) => {
                if self.store.advance_step() {
                    let _ = event_tx.send(TourEvent::StepAdvanced {
                        index: ticket.index + 1,
                    });
                }
            }
            (
                _,
                Input::DelayElapsed { live: false }
                | Input::StoreChanged { live: false }
                | Input::Executed(Outcome::Cancelled),
            ) => {
                if let Some(ticket) = state.ticket() {
                    tracing::debug!(step = %ticket.step_id, "continuation went stale");
                    let _ = event_tx.send(TourEvent::StepSkipped {
                        index: ticket.index,
                        step_id: ticket.step_id.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    fn announce(&self, ticket: &StepTicket, event_tx: &UnboundedSender<TourEvent>) {
        let action = self
            .store
            .read(|s| s.steps.get(ticket.index).map(|st| st.action.clone()));
        if let Some(action) = action {
            tracing::info!(index = ticket.index, step = %ticket.step_id, %action, "step scheduled");
            let _ = event_tx.send(TourEvent::StepStarted {
                index: ticket.index,
                step_id: ticket.step_id.clone(),
                action,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LoggingHost;
    use crate::model::{DemoStep, REQUESTS};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn spawn_executor(
        store: &DemoStore,
        host: &std::sync::Arc<LoggingHost>,
    ) -> (
        mpsc::UnboundedReceiver<TourEvent>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let exec = StepExecutor::new(TourConfig::default(), store.clone(), host.bindings());
        (rx, tokio::spawn(exec.run(tx)))
    }

    async fn until_finished(rx: &mut mpsc::UnboundedReceiver<TourEvent>) -> Vec<TourEvent> {
        let mut seen = Vec::new();
        tokio::time::timeout(Duration::from_secs(120), async {
            while let Some(ev) = rx.recv().await {
                let done = matches!(ev, TourEvent::TourFinished { .. });
                seen.push(ev);
                if done {
                    break;
                }
            }
        })
        .await
        .expect("tour did not finish");
        seen
    }

    fn ticket(index: usize) -> StepTicket {
        StepTicket {
            epoch: 1,
            index,
            step_id: format!("s{index}"),
        }
    }

    #[test]
    fn transition_table_follows_the_happy_path() {
        let cfg = TourConfig::default();
        let now = Instant::now();

        let s = ExecutorState::Idle.next(Input::Planned(Plan::Execute(ticket(0))), &cfg, now);
        assert_eq!(
            s,
            ExecutorState::AwaitingPresentationDelay {
                ticket: ticket(0),
                until: now + cfg.presentation_delay
            }
        );
        let s = s.next(Input::DelayElapsed { live: true }, &cfg, now);
        assert_eq!(s, ExecutorState::Executing { ticket: ticket(0) });
        let s = s.next(Input::Executed(Outcome::Completed), &cfg, now);
        assert!(matches!(s, ExecutorState::AwaitingAdvanceDelay { .. }));
        let s = s.next(Input::DelayElapsed { live: true }, &cfg, now);
        assert_eq!(s, ExecutorState::Idle);
        let s = s.next(Input::Planned(Plan::Finished), &cfg, now);
        assert_eq!(s, ExecutorState::Done);
    }

    #[test]
    fn stale_inputs_fall_back_to_idle() {
        let cfg = TourConfig::default();
        let now = Instant::now();
        let waiting = ExecutorState::AwaitingPresentationDelay {
            ticket: ticket(1),
            until: now,
        };

        assert_eq!(
            waiting
                .clone()
                .next(Input::StoreChanged { live: true }, &cfg, now),
            waiting
        );
        assert_eq!(
            waiting
                .clone()
                .next(Input::StoreChanged { live: false }, &cfg, now),
            ExecutorState::Idle
        );
        assert_eq!(
            waiting.next(Input::DelayElapsed { live: false }, &cfg, now),
            ExecutorState::Idle
        );
        assert_eq!(
            ExecutorState::Executing { ticket: ticket(1) }.next(
                Input::Executed(Outcome::Cancelled),
                &cfg,
                now
            ),
            ExecutorState::Idle
        );
        // Inputs that make no sense for a state leave it alone.
        assert_eq!(
            ExecutorState::Done.next(Input::DelayElapsed { live: true }, &cfg, now),
            ExecutorState::Done
        );
    }

    #[test]
    fn plan_reads_cursor_and_completion() {
        let store = DemoStore::new(vec![
            DemoStep::new("a", "export_document"),
            DemoStep::new("b", "export_document"),
        ]);
        assert_eq!(store.read(Plan::from_state), Plan::Wait);
        store.enter_demo_mode();
        assert!(matches!(store.read(Plan::from_state), Plan::Execute(t) if t.step_id == "a"));
        store.complete_step("a");
        assert!(matches!(store.read(Plan::from_state), Plan::Advance(_)));
        store.advance_step();
        store.complete_step("b");
        assert_eq!(store.read(Plan::from_state), Plan::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn create_navigate_update_scenario() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "create_request").with_data(json!({"id": "r1", "guest": "Ada"})),
            DemoStep::new("s2", "navigate_to_requests"),
            DemoStep::new("s3", "update_request_status")
                .with_data(json!({"id": "r1", "status": "in_progress"})),
        ]);
        let host = LoggingHost::new();
        let (mut rx, _handle) = spawn_executor(&store, &host);

        store.enter_demo_mode();
        let events = until_finished(&mut rx).await;

        let requests = store.collection(REQUESTS);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["id"], "r1");
        assert_eq!(requests[0]["guest"], "Ada");
        assert_eq!(requests[0]["status"], "in_progress");
        assert!(requests[0]["updatedAt"].is_string());
        assert!(store.steps().iter().all(|s| s.completed));
        assert_eq!(store.current_step_index(), 2);
        assert_eq!(host.navigations(), vec!["/requests".to_string()]);

        let completed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TourEvent::StepCompleted { step_id, .. } => Some(step_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(completed, ["s1", "s2", "s3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_status_target_still_advances() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "update_request_status")
                .with_data(json!({"id": "ghost", "status": "done"})),
            DemoStep::new("s2", "export_document"),
        ]);
        let host = LoggingHost::new();
        let (mut rx, _handle) = spawn_executor(&store, &host);

        store.enter_demo_mode();
        let events = until_finished(&mut rx).await;

        assert!(store.steps().iter().all(|s| s.completed));
        assert_eq!(store.current_step_index(), 1);
        assert!(events.iter().any(|e| matches!(
            e,
            TourEvent::RecordUpdated { found: false, record_id, .. } if record_id == "ghost"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn exit_during_presentation_delay_drops_the_step() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "create_request").with_data(json!({"id": "r1"})),
            DemoStep::new("s2", "export_document"),
        ]);
        let host = LoggingHost::new();
        let (mut rx, _handle) = spawn_executor(&store, &host);

        store.enter_demo_mode();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        store.exit_demo_mode();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(store.collection(REQUESTS).is_empty());
        assert!(store.steps().iter().all(|s| !s.completed));
        assert_eq!(store.current_step_index(), 0);

        let mut skipped = false;
        while let Ok(ev) = rx.try_recv() {
            skipped |= matches!(ev, TourEvent::StepSkipped { .. });
            assert!(!matches!(ev, TourEvent::StepCompleted { .. }));
        }
        assert!(skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn exit_during_status_delay_leaves_record_untouched() {
        let store = DemoStore::new(vec![DemoStep::new("s1", "update_request_status")
            .with_data(json!({"id": "r1", "status": "in_progress"}))]);
        store.add_domain_record(REQUESTS, json!({"id": "r1", "status": "new"}));
        let host = LoggingHost::new();
        let (_rx, _handle) = spawn_executor(&store, &host);

        store.enter_demo_mode();
        // Past the presentation delay, inside the status update delay.
        tokio::time::sleep(Duration::from_millis(2200)).await;
        store.exit_demo_mode();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(store.collection(REQUESTS)[0]["status"], "new");
        assert!(!store.steps()[0].completed);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_store_changes_do_not_duplicate_effects() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "navigate_to_requests"),
            DemoStep::new("s2", "export_document"),
        ]);
        let host = LoggingHost::new();
        let (mut rx, _handle) = spawn_executor(&store, &host);

        store.enter_demo_mode();
        tokio::time::sleep(Duration::from_millis(500)).await;
        store.add_domain_record("noise", json!({"id": "x"}));
        tokio::time::sleep(Duration::from_millis(500)).await;
        store.reset_collections();
        until_finished(&mut rx).await;

        assert_eq!(host.navigations().len(), 1);
        assert!(store.steps().iter().all(|s| s.completed));
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_is_monotonic_and_bounded() {
        let steps: Vec<_> = (0..4)
            .map(|i| DemoStep::new(format!("s{i}"), "run_quality_check"))
            .collect();
        let len = steps.len();
        let store = DemoStore::new(steps);
        let host = LoggingHost::new();
        let (mut rx, _handle) = spawn_executor(&store, &host);

        let mut watch = store.subscribe();
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while watch.changed().await.is_ok() {
                let s = watch.borrow_and_update();
                if s.is_demo_mode {
                    seen.push(s.current_step_index);
                }
                if s.completed_count() == s.steps.len() {
                    break;
                }
            }
            seen
        });

        store.enter_demo_mode();
        until_finished(&mut rx).await;
        let seen = observer.await.unwrap();

        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|&i| i < len));
    }

    #[tokio::test(start_paused = true)]
    async fn reentering_runs_the_tour_again() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "add_sources").with_data(json!([{"id": "a"}, {"id": "b"}])),
            DemoStep::new("s2", "do_something_new"),
        ]);
        let host = LoggingHost::new();
        let (mut rx, _handle) = spawn_executor(&store, &host);

        store.enter_demo_mode();
        let first = until_finished(&mut rx).await;
        assert!(first.iter().any(|e| matches!(e, TourEvent::Info(_))));

        store.exit_demo_mode();
        store.enter_demo_mode();
        assert_eq!(store.current_step_index(), 0);
        assert!(store.steps().iter().all(|s| !s.completed));

        until_finished(&mut rx).await;
        assert_eq!(store.collection("sources").len(), 4);
        assert!(store.steps().iter().all(|s| s.completed));
    }
}
