//! Interfaces to the host application.
//!
//! The walkthrough never renders or routes by itself. It asks the host to
//! navigate, to look up and scroll elements, and hands content and module
//! payloads to host-supplied callbacks.

use crate::model::Module;
use crate::overlay::Bounds;
use std::sync::{Arc, Mutex};

/// Fire-and-forget router.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// A resolved on-screen element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: String,
    pub bounds: Bounds,
}

pub trait ElementLookup {
    fn find_element_by_id(&self, logical_id: &str) -> Option<ElementHandle>;
}

/// Overlays only ever ask for the target to be centered vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAlignment {
    #[default]
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAxis {
    #[default]
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOptions {
    pub alignment: ScrollAlignment,
    pub axis: ScrollAxis,
}

pub trait Scroller {
    fn scroll_into_view(&self, handle: &ElementHandle, options: ScrollOptions);
}

pub type ContentCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type ModuleCallback = Arc<dyn Fn(&[Module]) + Send + Sync>;

/// Everything the executor and injector need from the host page.
#[derive(Clone)]
pub struct HostBindings {
    pub navigator: Arc<dyn Navigator>,
    pub on_content_update: Option<ContentCallback>,
    pub on_module_update: Option<ModuleCallback>,
}

impl HostBindings {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            on_content_update: None,
            on_module_update: None,
        }
    }

    pub fn with_content_callback(mut self, cb: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_content_update = Some(Arc::new(cb));
        self
    }

    pub fn with_module_callback(mut self, cb: impl Fn(&[Module]) + Send + Sync + 'static) -> Self {
        self.on_module_update = Some(Arc::new(cb));
        self
    }
}

/// Headless host used by text/JSON modes: remembers what it was asked to do
/// and logs it.
#[derive(Debug, Default)]
pub struct LoggingHost {
    paths: Mutex<Vec<String>>,
    content: Mutex<Vec<String>>,
    modules: Mutex<Vec<Vec<Module>>>,
}

impl LoggingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bindings that route every callback back into this host.
    pub fn bindings(self: &Arc<Self>) -> HostBindings {
        let content = Arc::clone(self);
        let modules = Arc::clone(self);
        HostBindings::new(self.clone())
            .with_content_callback(move |c| content.record_content(c))
            .with_module_callback(move |m| modules.record_modules(m))
    }

    pub fn navigations(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn content_updates(&self) -> Vec<String> {
        self.content.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn module_updates(&self) -> Vec<Vec<Module>> {
        self.modules.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn record_content(&self, content: &str) {
        tracing::info!(chars = content.len(), "content update");
        if let Ok(mut c) = self.content.lock() {
            c.push(content.to_string());
        }
    }

    fn record_modules(&self, modules: &[Module]) {
        tracing::info!(count = modules.len(), "module update");
        if let Ok(mut m) = self.modules.lock() {
            m.push(modules.to_vec());
        }
    }
}

impl Navigator for LoggingHost {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "navigate");
        if let Ok(mut p) = self.paths.lock() {
            p.push(path.to_string());
        }
    }
}
