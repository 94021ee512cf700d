use crate::model::{Module, Route, TourEvent};
use std::collections::VecDeque;
use std::path::PathBuf;

/// Most recent event lines kept for the Events tab.
const EVENT_LOG_CAP: usize = 200;

/// Requests the tour makes of the dashboard, delivered from tour tasks to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    Navigate(String),
    Content(String),
    Modules(Vec<Module>),
}

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub route: Route,
    pub demo_mode: bool,
    pub finished: bool,

    // What the editor surface in the studio panel currently shows.
    pub editor_content: Option<String>,
    pub editor_modules: Vec<Module>,

    pub events: VecDeque<String>,
    pub last_exported_path: Option<PathBuf>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            info: String::new(),
            route: Route::Dashboard,
            demo_mode: false,
            finished: false,
            editor_content: None,
            editor_modules: Vec::new(),
            events: VecDeque::new(),
            last_exported_path: None,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: TourEvent) {
        let line = ev.to_message();
        match ev {
            TourEvent::DemoModeChanged { active } => {
                self.demo_mode = active;
                self.finished = false;
                if active {
                    self.route = Route::Dashboard;
                }
            }
            TourEvent::StepStarted { .. } => self.finished = false,
            TourEvent::TourFinished { .. } => self.finished = true,
            // Detail-only events: keep them in the log, leave the status line alone.
            TourEvent::StepAdvanced { .. } | TourEvent::RecordAdded { .. } => {
                self.push_event(line);
                return;
            }
            _ => {}
        }
        self.info = line.clone();
        self.push_event(line);
    }

    pub fn apply_signal(&mut self, sig: HostSignal) {
        match sig {
            HostSignal::Navigate(path) => match Route::from_path(&path) {
                Some(route) => self.route = route,
                None => {
                    tracing::warn!(%path, "navigation to unknown route ignored");
                    self.info = format!("Unknown route {path}");
                }
            },
            HostSignal::Content(content) => self.editor_content = Some(content),
            HostSignal::Modules(modules) => self.editor_modules = modules,
        }
    }

    /// Clear the editor surface. The store's preview data is reset separately.
    pub fn reset_editor(&mut self) {
        self.editor_content = None;
        self.editor_modules.clear();
    }

    fn push_event(&mut self, line: String) {
        if self.events.len() == EVENT_LOG_CAP {
            self.events.pop_front();
        }
        self.events.push_back(line);
    }
}
