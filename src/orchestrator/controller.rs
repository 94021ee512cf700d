//! Tour lifecycle controller.
//!
//! Owns the executor and injector tasks, turns UI commands into store
//! transitions, and emits events for presentation layers.

use crate::engine::StepExecutor;
use crate::host::HostBindings;
use crate::injector::ContentInjector;
use crate::model::{DemoStep, InfoEvent, TourConfig, TourEvent};
use crate::store::DemoStore;
use anyhow::Result;
use futures::future::{self, Either};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control the tour.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UiCommand {
    EnterDemo,
    ExitDemo,
    /// Exit, drop the preview data, enter again.
    Restart,
    /// Drop the preview data without touching the step cursor.
    ResetPreview,
    /// Swap in a freshly loaded catalog; a running tour starts over on it.
    LoadCatalog(Vec<DemoStep>),
    Quit,
}

/// Handles for the two long-lived tour tasks.
struct TourTasks {
    executor: tokio::task::JoinHandle<Result<()>>,
    injector: tokio::task::JoinHandle<Result<()>>,
}

impl TourTasks {
    fn abort(&self) {
        // Dropping a JoinHandle does not cancel the task; abort explicitly.
        self.executor.abort();
        self.injector.abort();
    }
}

fn start_tasks(
    cfg: &TourConfig,
    store: &DemoStore,
    host: &HostBindings,
    event_tx: &UnboundedSender<TourEvent>,
) -> TourTasks {
    let executor = StepExecutor::new(cfg.clone(), store.clone(), host.clone());
    let injector = ContentInjector::new(cfg.clone(), store.clone(), host.clone());
    let exec_tx = event_tx.clone();
    let inj_tx = event_tx.clone();
    TourTasks {
        executor: tokio::spawn(async move { executor.run(exec_tx).await }),
        injector: tokio::spawn(async move { injector.run(inj_tx).await }),
    }
}

fn set_demo_mode(store: &DemoStore, on: bool, event_tx: &UnboundedSender<TourEvent>) {
    let changed = if on {
        store.enter_demo_mode()
    } else {
        store.exit_demo_mode()
    };
    if changed {
        let _ = event_tx.send(TourEvent::DemoModeChanged { active: on });
    }
}

/// Run the tour based on UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    cfg: &TourConfig,
    start_on_launch: bool,
    store: DemoStore,
    host: HostBindings,
    event_tx: UnboundedSender<TourEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut tasks = start_tasks(cfg, &store, &host, &event_tx);
    if start_on_launch {
        set_demo_mode(&store, true, &event_tx);
    }

    let res = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                tracing::debug!(?cmd, "controller command");
                match cmd {
                    Some(UiCommand::EnterDemo) => set_demo_mode(&store, true, &event_tx),
                    Some(UiCommand::ExitDemo) => set_demo_mode(&store, false, &event_tx),
                    Some(UiCommand::Restart) => {
                        // Serialized: leaving demo mode first stales every pending
                        // continuation before the new run begins.
                        set_demo_mode(&store, false, &event_tx);
                        store.reset_collections();
                        set_demo_mode(&store, true, &event_tx);
                        let _ = event_tx.send(TourEvent::Info(InfoEvent::Message(
                            "Restarting tour…".into(),
                        )));
                    }
                    Some(UiCommand::ResetPreview) => {
                        store.reset_collections();
                        let _ = event_tx.send(TourEvent::Info(InfoEvent::Message(
                            "Preview data cleared".into(),
                        )));
                    }
                    Some(UiCommand::LoadCatalog(steps)) => {
                        let count = steps.len();
                        store.replace_steps(steps);
                        let _ = event_tx.send(TourEvent::Info(InfoEvent::Message(format!(
                            "Catalog loaded ({count} steps)"
                        ))));
                    }
                    Some(UiCommand::Quit) | None => break Ok(()),
                }
            }
            // A tour task should only end when aborted; surface anything else and restart it.
            joined = future::select(&mut tasks.executor, &mut tasks.injector) => {
                let (name, res) = match joined {
                    Either::Left((r, _)) => ("executor", r),
                    Either::Right((r, _)) => ("injector", r),
                };
                let msg = match res {
                    Ok(Ok(())) => format!("Tour {name} stopped"),
                    Ok(Err(e)) => format!("Tour {name} failed: {e:#}"),
                    Err(e) => format!("Tour {name} join failed: {e}"),
                };
                tracing::warn!("{msg}");
                let _ = event_tx.send(TourEvent::Info(InfoEvent::Message(msg)));
                tasks.abort();
                tasks = start_tasks(cfg, &store, &host, &event_tx);
            }
        }
    };

    tasks.abort();
    set_demo_mode(&store, false, &event_tx);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LoggingHost;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn restart_clears_preview_and_replays() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "create_request").with_data(json!({"id": "r1"})),
            DemoStep::new("s2", "export_document"),
        ]);
        let host = LoggingHost::new();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl_store = store.clone();
        let ctl = tokio::spawn(async move {
            run_controller(
                &TourConfig::default(),
                true,
                ctl_store,
                host.bindings(),
                event_tx,
                cmd_rx,
            )
            .await
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.collection("requests").len(), 1);

        cmd_tx.send(UiCommand::Restart).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.collection("requests").is_empty());
        assert_eq!(store.current_step_index(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.collection("requests").len(), 1);

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
        assert!(!store.is_demo_mode());

        let mut finished = 0;
        while let Ok(ev) = event_rx.try_recv() {
            if matches!(ev, TourEvent::TourFinished { .. }) {
                finished += 1;
            }
        }
        assert_eq!(finished, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_start_until_asked() {
        let store = DemoStore::new(vec![DemoStep::new("s1", "navigate_to_requests")]);
        let host = LoggingHost::new();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl_store = store.clone();
        let bindings = host.bindings();
        let ctl = tokio::spawn(async move {
            run_controller(
                &TourConfig::default(),
                false,
                ctl_store,
                bindings,
                event_tx,
                cmd_rx,
            )
            .await
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(host.navigations().is_empty());

        cmd_tx.send(UiCommand::EnterDemo).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(host.navigations(), vec!["/requests".to_string()]);

        drop(cmd_tx);
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loading_a_catalog_restarts_on_the_new_steps() {
        let store = DemoStore::new(vec![
            DemoStep::new("s1", "navigate_to_requests"),
            DemoStep::new("s2", "export_document"),
        ]);
        let host = LoggingHost::new();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl_store = store.clone();
        let bindings = host.bindings();
        let ctl = tokio::spawn(async move {
            run_controller(
                &TourConfig::default(),
                true,
                ctl_store,
                bindings,
                event_tx,
                cmd_rx,
            )
            .await
        });

        // Swap while the first step is still on screen.
        tokio::time::sleep(Duration::from_millis(500)).await;
        cmd_tx
            .send(UiCommand::LoadCatalog(vec![
                DemoStep::new("n1", "navigate_to_sources"),
                DemoStep::new("n2", "add_sources").with_data(json!([{"id": "a"}])),
            ]))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(host.navigations(), vec!["/sources".to_string()]);
        assert_eq!(store.collection("sources").len(), 1);
        let ids: Vec<_> = store.steps().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["n1", "n2"]);
        assert!(store.steps().iter().all(|s| s.completed));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }
}
