//! Per-action step effects.
//!
//! Every `StepAction` variant has exactly one handler. Handlers never fail:
//! bad payloads and missing records are reported as events and the step
//! still completes.

use super::ticket::StepTicket;
use crate::host::HostBindings;
use crate::model::{
    ContentPayload, DemoStep, InfoEvent, Route, StepAction, TourConfig, TourEvent, REQUESTS,
};
use crate::store::DemoStore;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The effect ran (or had nothing to do); the step may be marked complete.
    Completed,
    /// The store moved on during an inner delay; the step is abandoned.
    Cancelled,
}

pub(crate) struct ActionContext<'a> {
    pub cfg: &'a TourConfig,
    pub store: &'a DemoStore,
    pub host: &'a HostBindings,
    pub event_tx: &'a UnboundedSender<TourEvent>,
}

impl ActionContext<'_> {
    fn emit(&self, ev: TourEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn invalid(&self, step: &DemoStep, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(step = %step.id, action = %step.action, %reason, "invalid step payload");
        self.emit(TourEvent::Info(InfoEvent::InvalidPayload {
            step_id: step.id.clone(),
            reason,
        }));
    }

    /// Sleep, then report whether the ticket's step is still pending.
    async fn guarded_delay(&self, ticket: &StepTicket, delay: Duration) -> bool {
        tokio::time::sleep(delay).await;
        self.store.read(|s| ticket.is_pending(s))
    }
}

pub(crate) async fn execute(ctx: &ActionContext<'_>, ticket: &StepTicket, step: &DemoStep) -> Outcome {
    match &step.action {
        StepAction::Navigate(route) => navigate(ctx, *route),
        StepAction::CreateRequest
        | StepAction::CreateWorkingDoc
        | StepAction::AddModules
        | StepAction::AddSources => add_records(ctx, step),
        StepAction::UpdateRequestStatus => return update_request_status(ctx, ticket, step).await,
        StepAction::PopulateContent => return populate_content(ctx, ticket, step).await,
        StepAction::Highlight(_)
        | StepAction::DemoAiAssist
        | StepAction::RunQualityCheck
        | StepAction::ExportDocument => {
            tracing::debug!(step = %step.id, action = %step.action, "presentation-only step");
        }
        StepAction::Unrecognized(tag) => {
            tracing::warn!(step = %step.id, action = %tag, "unrecognized action, skipping");
            ctx.emit(TourEvent::Info(InfoEvent::UnrecognizedAction {
                step_id: step.id.clone(),
                action: tag.clone(),
            }));
        }
    }
    Outcome::Completed
}

fn navigate(ctx: &ActionContext<'_>, route: Route) {
    let path = route.path();
    ctx.host.navigator.navigate(path);
    ctx.emit(TourEvent::Navigated {
        path: path.to_string(),
    });
}

fn add_records(ctx: &ActionContext<'_>, step: &DemoStep) {
    let Some(collection) = step.action.collection() else {
        return;
    };
    let list_ok = matches!(step.action, StepAction::AddModules | StepAction::AddSources);

    let records = match step.data.clone() {
        Some(Value::Array(items)) if list_ok => items,
        Some(v @ Value::Object(_)) => vec![v],
        Some(other) => {
            ctx.invalid(step, format!("expected a record, got {}", json_kind(&other)));
            return;
        }
        None => {
            ctx.invalid(step, "missing data");
            return;
        }
    };

    let mut total = ctx.store.collection(collection).len();
    for record in records {
        total = ctx.store.add_domain_record(collection, record);
    }
    ctx.emit(TourEvent::RecordAdded {
        collection: collection.to_string(),
        total,
    });
}

async fn update_request_status(
    ctx: &ActionContext<'_>,
    ticket: &StepTicket,
    step: &DemoStep,
) -> Outcome {
    let data = step.data.as_ref();
    let Some(status) = data.and_then(|d| d.get("status")).and_then(Value::as_str) else {
        ctx.invalid(step, "missing status");
        return Outcome::Completed;
    };
    let record_id = data
        .and_then(|d| d.get("id"))
        .and_then(Value::as_str)
        .unwrap_or(ctx.cfg.demo_record_id.as_str())
        .to_string();

    if !ctx.guarded_delay(ticket, ctx.cfg.status_update_delay).await {
        return Outcome::Cancelled;
    }

    let updated_at = now_rfc3339();
    let found = ctx.store.update_record(REQUESTS, &record_id, |obj| {
        obj.insert("status".into(), Value::String(status.to_string()));
        obj.insert("updatedAt".into(), Value::String(updated_at));
    });
    if !found {
        tracing::info!(record = %record_id, "status update target absent, continuing");
    }
    ctx.emit(TourEvent::RecordUpdated {
        collection: REQUESTS.to_string(),
        record_id,
        found,
    });
    Outcome::Completed
}

/// Content lives in the host's editor, so this only waits for the viewer and
/// stages the payload; the injector hands it over once the step completes.
async fn populate_content(ctx: &ActionContext<'_>, ticket: &StepTicket, step: &DemoStep) -> Outcome {
    let payload = match step.data.as_ref().map(ContentPayload::from_data) {
        Some(Ok(p)) => p,
        Some(Err(reason)) => {
            ctx.invalid(step, reason);
            return Outcome::Completed;
        }
        None => {
            ctx.invalid(step, "missing content");
            return Outcome::Completed;
        }
    };

    if !ctx
        .guarded_delay(ticket, payload.kind.delay(&ctx.cfg.content_delays))
        .await
    {
        return Outcome::Cancelled;
    }
    ctx.emit(TourEvent::ContentStaged {
        step_id: step.id.clone(),
        chars: payload.content.chars().count(),
    });
    Outcome::Completed
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LoggingHost;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    struct Fixture {
        cfg: TourConfig,
        store: DemoStore,
        host: HostBindings,
        tx: UnboundedSender<TourEvent>,
        rx: mpsc::UnboundedReceiver<TourEvent>,
        step: DemoStep,
    }

    impl Fixture {
        fn new(step: DemoStep) -> Self {
            let store = DemoStore::new(vec![step.clone()]);
            store.enter_demo_mode();
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                cfg: TourConfig::default(),
                store,
                host: LoggingHost::new().bindings(),
                tx,
                rx,
                step,
            }
        }

        async fn run(&self) -> Outcome {
            let ctx = ActionContext {
                cfg: &self.cfg,
                store: &self.store,
                host: &self.host,
                event_tx: &self.tx,
            };
            let ticket = self.store.read(StepTicket::capture).unwrap();
            execute(&ctx, &ticket, &self.step).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_request_rejects_arrays() {
        let mut fx = Fixture::new(
            DemoStep::new("s1", "create_request").with_data(json!([{"id": "a"}])),
        );
        assert_eq!(fx.run().await, Outcome::Completed);
        assert!(fx.store.collection(REQUESTS).is_empty());
        assert!(matches!(
            fx.rx.try_recv(),
            Ok(TourEvent::Info(InfoEvent::InvalidPayload { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn add_modules_accepts_a_single_object() {
        let fx = Fixture::new(
            DemoStep::new("s1", "add_modules").with_data(json!({"id": "m1", "name": "Summary"})),
        );
        assert_eq!(fx.run().await, Outcome::Completed);
        assert_eq!(fx.store.collection("modules").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn status_update_falls_back_to_demo_record() {
        let fx = Fixture::new(
            DemoStep::new("s1", "update_request_status").with_data(json!({"status": "done"})),
        );
        fx.store
            .add_domain_record(REQUESTS, json!({"id": "demo-request-1", "status": "new"}));

        let started = Instant::now();
        assert_eq!(fx.run().await, Outcome::Completed);
        assert!(started.elapsed() >= fx.cfg.status_update_delay);

        let record = &fx.store.collection(REQUESTS)[0];
        assert_eq!(record["status"], "done");
        assert!(record["updatedAt"].as_str().is_some_and(|t| t.contains('T')));
    }

    #[tokio::test(start_paused = true)]
    async fn content_waits_for_its_kind_then_stages() {
        let mut fx = Fixture::new(
            DemoStep::new("s1", "populate_content")
                .with_data(json!({"content": "Hello", "kind": "section"})),
        );
        let started = Instant::now();
        assert_eq!(fx.run().await, Outcome::Completed);
        assert!(started.elapsed() >= fx.cfg.content_delays.section);
        assert!(matches!(
            fx.rx.try_recv(),
            Ok(TourEvent::ContentStaged { chars: 5, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_content_kind_still_stages() {
        let mut fx = Fixture::new(
            DemoStep::new("s1", "populate_content")
                .with_data(json!({"content": "Hello", "kind": "paragraph"})),
        );
        let started = Instant::now();
        assert_eq!(fx.run().await, Outcome::Completed);
        assert!(started.elapsed() >= fx.cfg.content_delays.document);
        assert!(matches!(
            fx.rx.try_recv(),
            Ok(TourEvent::ContentStaged { chars: 5, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn content_is_abandoned_when_demo_mode_exits() {
        let mut fx = Fixture::new(
            DemoStep::new("s1", "populate_content")
                .with_data(json!({"content": "Hello", "kind": "snippet"})),
        );
        let exit = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            fx.store.exit_demo_mode();
        };
        let (outcome, ()) = tokio::join!(fx.run(), exit);
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_actions_complete_with_a_notice() {
        let mut fx = Fixture::new(DemoStep::new("s1", "teleport"));
        assert_eq!(fx.run().await, Outcome::Completed);
        match fx.rx.try_recv() {
            Ok(TourEvent::Info(InfoEvent::UnrecognizedAction { action, .. })) => {
                assert_eq!(action, "teleport")
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
