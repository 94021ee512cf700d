//! Element targeting and highlight overlay.
//!
//! An overlay is bound to one step and one logical target. It renders only
//! while demo mode is on and the cursor sits on its step. Geometry is resolved
//! once per activation; a failed lookup leaves the overlay dark until the
//! step is activated again.

use crate::host::{ElementLookup, ScrollOptions, Scroller};
use crate::model::DemoStep;
use crate::store::DemoState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: i32) -> Bounds {
        Bounds {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverlayGeometry {
    pub highlight: Bounds,
    pub pointer: (i32, i32),
}

impl OverlayGeometry {
    /// Highlight box around `element` plus a pointer to its right, vertically centered.
    pub fn around(element: Bounds, margin: i32, pointer_offset: i32) -> Self {
        Self {
            highlight: element.expand(margin),
            pointer: (
                element.right() + margin + pointer_offset,
                element.y + element.height / 2,
            ),
        }
    }
}

/// Geometry knobs shared by all overlays of a tour.
#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub margin: i32,
    pub pointer_offset: i32,
    pub scroll: ScrollOptions,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            margin: 8,
            pointer_offset: 16,
            scroll: ScrollOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighlightOverlay {
    target_id: String,
    step: usize,
    style: OverlayStyle,
    /// Epoch of the activation the geometry below belongs to.
    activation: Option<u64>,
    geometry: Option<OverlayGeometry>,
}

impl HighlightOverlay {
    pub fn new(target_id: impl Into<String>, step: usize, style: OverlayStyle) -> Self {
        Self {
            target_id: target_id.into(),
            step,
            style,
            activation: None,
            geometry: None,
        }
    }

    pub fn is_bound_step_active(&self, state: &DemoState) -> bool {
        state.is_demo_mode && state.current_step_index == self.step
    }

    /// Re-evaluate against the latest store state and return what to draw.
    pub fn evaluate(
        &mut self,
        state: &DemoState,
        lookup: &dyn ElementLookup,
        scroller: &dyn Scroller,
    ) -> Option<&OverlayGeometry> {
        if !self.is_bound_step_active(state) {
            self.activation = None;
            self.geometry = None;
            return None;
        }

        if self.activation != Some(state.epoch) {
            self.activation = Some(state.epoch);
            self.geometry = self.resolve(lookup, scroller);
        }
        self.geometry.as_ref()
    }

    fn resolve(
        &self,
        lookup: &dyn ElementLookup,
        scroller: &dyn Scroller,
    ) -> Option<OverlayGeometry> {
        let Some(handle) = lookup.find_element_by_id(&self.target_id) else {
            tracing::debug!(target = %self.target_id, step = self.step, "highlight target not found");
            return None;
        };
        scroller.scroll_into_view(&handle, self.style.scroll);
        Some(OverlayGeometry::around(
            handle.bounds,
            self.style.margin,
            self.style.pointer_offset,
        ))
    }
}

/// One overlay per targeted step of a catalog.
#[derive(Debug, Clone, Default)]
pub struct OverlaySet {
    overlays: Vec<HighlightOverlay>,
}

impl OverlaySet {
    pub fn from_steps(steps: &[DemoStep], style: OverlayStyle) -> Self {
        let overlays = steps
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.target_id
                    .as_ref()
                    .map(|t| HighlightOverlay::new(t.clone(), i, style))
            })
            .collect();
        Self { overlays }
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    /// Evaluate every overlay and return the one that should render, if any.
    pub fn evaluate(
        &mut self,
        state: &DemoState,
        lookup: &dyn ElementLookup,
        scroller: &dyn Scroller,
    ) -> Option<(String, OverlayGeometry)> {
        let mut active = None;
        for overlay in &mut self.overlays {
            if let Some(g) = overlay.evaluate(state, lookup, scroller).copied() {
                active = Some((overlay.target_id.clone(), g));
            }
        }
        active
    }
}
