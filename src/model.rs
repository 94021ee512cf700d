use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Collection names used by the mutation actions.
pub const REQUESTS: &str = "requests";
pub const WORKING_DOCS: &str = "workingDocs";
pub const MODULES: &str = "modules";
pub const SOURCES: &str = "sources";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourConfig {
    #[serde(with = "humantime_serde")]
    pub presentation_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub advance_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub status_update_delay: Duration,
    pub content_delays: ContentDelays,
    #[serde(with = "humantime_serde")]
    pub content_inject_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub module_inject_delay: Duration,
    pub highlight_margin: i32,
    pub pointer_offset: i32,
    pub demo_record_id: String,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            presentation_delay: Duration::from_millis(2000),
            advance_delay: Duration::from_millis(1500),
            status_update_delay: Duration::from_millis(500),
            content_delays: ContentDelays::default(),
            content_inject_delay: Duration::from_millis(1500),
            module_inject_delay: Duration::from_millis(1000),
            highlight_margin: 8,
            pointer_offset: 16,
            demo_record_id: "demo-request-1".into(),
        }
    }
}

/// Per-kind wait before a `populate_content` step is staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDelays {
    #[serde(with = "humantime_serde")]
    pub snippet: Duration,
    #[serde(with = "humantime_serde")]
    pub section: Duration,
    #[serde(with = "humantime_serde")]
    pub document: Duration,
}

impl Default for ContentDelays {
    fn default() -> Self {
        Self {
            snippet: Duration::from_millis(500),
            section: Duration::from_millis(1000),
            document: Duration::from_millis(1500),
        }
    }
}

/// Screens the dashboard can be asked to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Dashboard,
    Requests,
    WorkingStudio,
    Documents,
    Sources,
    Modules,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Dashboard => "/",
            Route::Requests => "/requests",
            Route::WorkingStudio => "/studio",
            Route::Documents => "/documents",
            Route::Sources => "/sources",
            Route::Modules => "/modules",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        [
            Route::Dashboard,
            Route::Requests,
            Route::WorkingStudio,
            Route::Documents,
            Route::Sources,
            Route::Modules,
        ]
        .into_iter()
        .find(|r| r.path() == path)
    }

    fn from_suffix(suffix: &str) -> Option<Route> {
        match suffix {
            "dashboard" | "hub" => Some(Route::Dashboard),
            "requests" => Some(Route::Requests),
            // The "back" variant is the same screen; catalogs use it after a detour.
            "working_studio" | "back_to_studio" | "studio" => Some(Route::WorkingStudio),
            "documents" => Some(Route::Documents),
            "sources" => Some(Route::Sources),
            "modules" => Some(Route::Modules),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Route::Dashboard => "dashboard",
            Route::Requests => "requests",
            Route::WorkingStudio => "working_studio",
            Route::Documents => "documents",
            Route::Sources => "sources",
            Route::Modules => "modules",
        }
    }
}

/// The closed set of operations a step can declare.
///
/// Catalogs name actions with snake_case string tags. Tags outside the set
/// parse to `Unrecognized` so a typo in a catalog degrades to a no-op step
/// instead of aborting the tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepAction {
    Navigate(Route),
    CreateRequest,
    CreateWorkingDoc,
    AddModules,
    AddSources,
    UpdateRequestStatus,
    PopulateContent,
    Highlight(String),
    DemoAiAssist,
    RunQualityCheck,
    ExportDocument,
    Unrecognized(String),
}

impl StepAction {
    /// Collection appended to by this action, if it is a create/add action.
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            StepAction::CreateRequest => Some(REQUESTS),
            StepAction::CreateWorkingDoc => Some(WORKING_DOCS),
            StepAction::AddModules => Some(MODULES),
            StepAction::AddSources => Some(SOURCES),
            _ => None,
        }
    }

    pub fn is_presentation_only(&self) -> bool {
        matches!(
            self,
            StepAction::Highlight(_)
                | StepAction::DemoAiAssist
                | StepAction::RunQualityCheck
                | StepAction::ExportDocument
        )
    }

    pub fn tag(&self) -> String {
        match self {
            StepAction::Navigate(route) => format!("navigate_to_{}", route.suffix()),
            StepAction::CreateRequest => "create_request".into(),
            StepAction::CreateWorkingDoc => "create_working_doc".into(),
            StepAction::AddModules => "add_modules".into(),
            StepAction::AddSources => "add_sources".into(),
            StepAction::UpdateRequestStatus => "update_request_status".into(),
            StepAction::PopulateContent => "populate_content".into(),
            StepAction::Highlight(what) => format!("highlight_{what}"),
            StepAction::DemoAiAssist => "demo_ai_assist".into(),
            StepAction::RunQualityCheck => "run_quality_check".into(),
            StepAction::ExportDocument => "export_document".into(),
            StepAction::Unrecognized(raw) => raw.clone(),
        }
    }
}

impl From<&str> for StepAction {
    fn from(raw: &str) -> Self {
        match raw {
            "create_request" => return StepAction::CreateRequest,
            "create_working_doc" => return StepAction::CreateWorkingDoc,
            "add_modules" => return StepAction::AddModules,
            "add_sources" => return StepAction::AddSources,
            "update_request_status" => return StepAction::UpdateRequestStatus,
            "populate_content" => return StepAction::PopulateContent,
            "demo_ai_assist" => return StepAction::DemoAiAssist,
            "run_quality_check" => return StepAction::RunQualityCheck,
            "export_document" => return StepAction::ExportDocument,
            _ => {}
        }
        if raw == "navigate_back_to_studio" {
            return StepAction::Navigate(Route::WorkingStudio);
        }
        if let Some(route) = raw
            .strip_prefix("navigate_to_")
            .and_then(Route::from_suffix)
        {
            return StepAction::Navigate(route);
        }
        if let Some(what) = raw.strip_prefix("highlight_") {
            if !what.is_empty() {
                return StepAction::Highlight(what.to_string());
            }
        }
        StepAction::Unrecognized(raw.to_string())
    }
}

impl From<String> for StepAction {
    fn from(raw: String) -> Self {
        StepAction::from(raw.as_str())
    }
}

impl From<StepAction> for String {
    fn from(action: StepAction) -> Self {
        action.tag()
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoStep {
    pub id: String,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
impl DemoStep {
    pub fn new(id: impl Into<String>, action: impl Into<StepAction>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            data: None,
            completed: false,
            target_id: None,
            title: None,
            description: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }
}

impl DemoStep {
    /// Headline shown to the viewer while the step is pending.
    pub fn headline(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.action.tag())
    }
}

/// An editor module handed to the host's module-list callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Snippet,
    Section,
    #[default]
    Document,
}

impl ContentKind {
    pub fn delay(self, delays: &ContentDelays) -> Duration {
        match self {
            ContentKind::Snippet => delays.snippet,
            ContentKind::Section => delays.section,
            ContentKind::Document => delays.document,
        }
    }
}

/// Payload of a `populate_content` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPayload {
    pub content: String,
    #[serde(default)]
    pub kind: ContentKind,
}

impl ContentPayload {
    /// The `content` string of a step's data, if it carries one.
    pub fn content_of(data: &serde_json::Value) -> Option<&str> {
        data.get("content").and_then(serde_json::Value::as_str)
    }

    /// Read a step's data. Only `content` is required; a missing, null or
    /// unknown `kind` falls back to the default kind.
    pub fn from_data(data: &serde_json::Value) -> Result<Self, String> {
        let content = match data.get("content") {
            Some(serde_json::Value::String(c)) => c.clone(),
            Some(_) => return Err("content is not a string".into()),
            None => return Err("missing content".into()),
        };
        let kind = match data.get("kind") {
            None | Some(serde_json::Value::Null) => ContentKind::default(),
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
                tracing::warn!(kind = %raw, error = %e, "unknown content kind, using default");
                ContentKind::default()
            }),
        };
        Ok(Self { content, kind })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TourEvent {
    DemoModeChanged {
        active: bool,
    },
    StepStarted {
        index: usize,
        step_id: String,
        action: StepAction,
    },
    StepCompleted {
        index: usize,
        step_id: String,
    },
    StepAdvanced {
        index: usize,
    },
    /// A scheduled continuation found the store moved on and did nothing.
    StepSkipped {
        index: usize,
        step_id: String,
    },
    TourFinished {
        steps: usize,
    },
    Navigated {
        path: String,
    },
    RecordAdded {
        collection: String,
        total: usize,
    },
    RecordUpdated {
        collection: String,
        record_id: String,
        found: bool,
    },
    ContentStaged {
        step_id: String,
        chars: usize,
    },
    ContentInjected {
        step_id: String,
    },
    ModulesInjected {
        step_id: String,
        count: usize,
    },
    Info(InfoEvent),
}

/// Structured info events emitted by the engine and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    // UI/CLI messages generated outside the engine.
    Message(String),
    InvalidPayload { step_id: String, reason: String },
    UnrecognizedAction { step_id: String, action: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::InvalidPayload { step_id, reason } => {
                format!("Step {step_id}: payload ignored ({reason})")
            }
            InfoEvent::UnrecognizedAction { step_id, action } => {
                format!("Step {step_id}: unrecognized action '{action}', skipping")
            }
        }
    }
}

impl TourEvent {
    /// One-line rendering used by text mode and the TUI status line.
    pub fn to_message(&self) -> String {
        match self {
            TourEvent::DemoModeChanged { active: true } => "Demo mode on".into(),
            TourEvent::DemoModeChanged { active: false } => "Demo mode off".into(),
            TourEvent::StepStarted {
                index,
                step_id,
                action,
            } => format!("Step {} ({step_id}): {action}", index + 1),
            TourEvent::StepCompleted { index, step_id } => {
                format!("Step {} ({step_id}) completed", index + 1)
            }
            TourEvent::StepAdvanced { index } => format!("Advanced to step {}", index + 1),
            TourEvent::StepSkipped { index, step_id } => {
                format!("Step {} ({step_id}) dropped: tour state changed", index + 1)
            }
            TourEvent::TourFinished { steps } => format!("Tour finished ({steps} steps)"),
            TourEvent::Navigated { path } => format!("Navigate: {path}"),
            TourEvent::RecordAdded { collection, total } => {
                format!("{collection}: {total} record(s)")
            }
            TourEvent::RecordUpdated {
                collection,
                record_id,
                found: true,
            } => format!("{collection}: updated {record_id}"),
            TourEvent::RecordUpdated {
                collection,
                record_id,
                found: false,
            } => format!("{collection}: {record_id} not found, nothing to update"),
            TourEvent::ContentStaged { step_id, chars } => {
                format!("Step {step_id}: staged {chars} chars of content")
            }
            TourEvent::ContentInjected { step_id } => format!("Step {step_id}: content injected"),
            TourEvent::ModulesInjected { step_id, count } => {
                format!("Step {step_id}: {count} module(s) injected")
            }
            TourEvent::Info(info) => info.to_message(),
        }
    }
}
