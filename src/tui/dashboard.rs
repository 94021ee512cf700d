//! Tour dashboard: one panel per logical target id, plus the highlight overlay.
//!
//! Every panel is laid out on every frame regardless of the current route, so
//! a highlight target can always be resolved. The route only decides which
//! panel is drawn as focused.

use super::state::UiState;
use crate::host::{ElementHandle, ElementLookup, ScrollOptions, Scroller};
use crate::model::{Route, MODULES, REQUESTS, SOURCES, WORKING_DOCS};
use crate::overlay::{Bounds, OverlayGeometry, OverlaySet};
use crate::store::DemoState;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

pub const HUB: &str = "hub";
pub const REQUESTS_PANEL: &str = "requests";
pub const STUDIO: &str = "studio";
pub const MODULES_PANEL: &str = "modules";
pub const SOURCES_PANEL: &str = "sources";
pub const STATUS: &str = "status";

/// Overlay margins are configured in pixels; a terminal cell is about 8 wide.
const PX_PER_CELL: i32 = 8;

pub fn px_to_cells(px: i32) -> i32 {
    if px <= 0 {
        0
    } else {
        (px / PX_PER_CELL).max(1)
    }
}

fn focused_panel(route: Route) -> &'static str {
    match route {
        Route::Dashboard => HUB,
        Route::Requests => REQUESTS_PANEL,
        Route::WorkingStudio | Route::Documents => STUDIO,
        Route::Sources => SOURCES_PANEL,
        Route::Modules => MODULES_PANEL,
    }
}

/// Where each panel landed on this frame.
pub struct PanelLayout {
    card: Rect,
    panels: Vec<(&'static str, Rect)>,
}

impl PanelLayout {
    pub fn compute(area: Rect) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)].as_ref())
            .split(area);
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(
                [
                    Constraint::Percentage(25),
                    Constraint::Percentage(45),
                    Constraint::Percentage(30),
                ]
                .as_ref(),
            )
            .split(rows[1]);
        let split = |area: Rect, top: u16| {
            Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(top), Constraint::Percentage(100 - top)].as_ref())
                .split(area)
        };
        let left = split(cols[0], 60);
        let mid = split(cols[1], 40);
        let right = split(cols[2], 50);

        Self {
            card: rows[0],
            panels: vec![
                (HUB, left[0]),
                (STATUS, left[1]),
                (REQUESTS_PANEL, mid[0]),
                (STUDIO, mid[1]),
                (MODULES_PANEL, right[0]),
                (SOURCES_PANEL, right[1]),
            ],
        }
    }

    pub fn rect(&self, id: &str) -> Option<Rect> {
        self.panels
            .iter()
            .find(|(panel, _)| *panel == id)
            .map(|(_, r)| *r)
            .filter(|r| r.width > 0 && r.height > 0)
    }
}

impl ElementLookup for PanelLayout {
    fn find_element_by_id(&self, logical_id: &str) -> Option<ElementHandle> {
        self.rect(logical_id).map(|r| ElementHandle {
            id: logical_id.to_string(),
            bounds: Bounds::new(r.x as i32, r.y as i32, r.width as i32, r.height as i32),
        })
    }
}

impl Scroller for PanelLayout {
    fn scroll_into_view(&self, handle: &ElementHandle, _options: ScrollOptions) {
        // All panels are always on screen.
        tracing::trace!(target = %handle.id, "scroll into view");
    }
}

/// Clip signed overlay bounds to the drawable area.
pub fn clip(bounds: Bounds, area: Rect) -> Option<Rect> {
    let x0 = bounds.x.max(area.x as i32);
    let y0 = bounds.y.max(area.y as i32);
    let x1 = bounds.right().min(area.right() as i32);
    let y1 = (bounds.y + bounds.height).min(area.bottom() as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(
        x0 as u16,
        y0 as u16,
        (x1 - x0) as u16,
        (y1 - y0) as u16,
    ))
}

/// First string field found among `keys`, falling back to the record id.
fn record_label(record: &Value, keys: &[&str]) -> String {
    keys.iter()
        .chain(std::iter::once(&"id"))
        .find_map(|k| record.get(*k).and_then(Value::as_str))
        .unwrap_or("-")
        .to_string()
}

fn panel_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

pub fn draw_dashboard(
    area: Rect,
    f: &mut Frame,
    state: &UiState,
    demo: &DemoState,
    overlays: &mut OverlaySet,
) {
    let layout = PanelLayout::compute(area);
    let focus = focused_panel(state.route);

    draw_step_card(layout.card, f, state, demo);
    for (id, rect) in &layout.panels {
        let focused = *id == focus;
        match *id {
            HUB => draw_hub(*rect, f, state, demo, focused),
            STATUS => draw_status(*rect, f, state, focused),
            REQUESTS_PANEL => draw_requests(*rect, f, demo, focused),
            STUDIO => draw_studio(*rect, f, state, demo, focused),
            MODULES_PANEL => draw_records(*rect, f, demo, MODULES, "Modules", &["name", "title"], focused),
            SOURCES_PANEL => draw_records(*rect, f, demo, SOURCES, "Sources", &["label", "title"], focused),
            _ => {}
        }
    }

    if let Some((_, geometry)) = overlays.evaluate(demo, &layout, &layout) {
        let headline = demo
            .current_step()
            .map(|s| s.headline())
            .unwrap_or_default();
        draw_overlay(area, f, &geometry, &headline);
    }
}

fn draw_step_card(area: Rect, f: &mut Frame, state: &UiState, demo: &DemoState) {
    let lines = match demo.current_step().filter(|_| demo.is_demo_mode) {
        Some(step) => {
            let mut lines = vec![Line::from(vec![
                Span::styled(
                    format!("Step {}/{} ", demo.current_step_index + 1, demo.steps.len()),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(step.headline(), Style::default().add_modifier(Modifier::BOLD)),
                if step.completed {
                    Span::styled("  done", Style::default().fg(Color::Green))
                } else {
                    Span::raw("")
                },
            ])];
            if let Some(desc) = step.description.as_deref() {
                lines.push(Line::from(desc.to_string()));
            }
            if state.finished {
                lines.push(Line::from(Span::styled(
                    "Tour complete. Press r to replay.",
                    Style::default().fg(Color::Green),
                )));
            }
            lines
        }
        None => vec![Line::from("Demo mode off. Press d to start the tour.")],
    };
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Walkthrough"));
    f.render_widget(p, area);
}

fn draw_hub(area: Rect, f: &mut Frame, state: &UiState, demo: &DemoState, focused: bool) {
    let mode = if demo.is_demo_mode {
        Span::styled("on", Style::default().fg(Color::Green))
    } else {
        Span::styled("off", Style::default().fg(Color::Gray))
    };
    let mut lines = vec![
        Line::from(vec![Span::raw("Demo mode: "), mode]),
        Line::from(format!("Screen: {}", state.route.path())),
        Line::from(format!(
            "Progress: {}/{} steps",
            demo.completed_count(),
            demo.steps.len()
        )),
        Line::from(""),
    ];
    for (name, label) in [
        (REQUESTS, "Requests"),
        (WORKING_DOCS, "Working docs"),
        (SOURCES, "Sources"),
        (MODULES, "Modules"),
    ] {
        lines.push(Line::from(format!(
            "{label:<13}{}",
            demo.collection(name).len()
        )));
    }
    f.render_widget(Paragraph::new(lines).block(panel_block("Hub", focused)), area);
}

fn draw_status(area: Rect, f: &mut Frame, state: &UiState, focused: bool) {
    let mut lines = vec![Line::from(state.info.clone())];
    if let Some(path) = state.last_exported_path.as_ref() {
        lines.push(Line::from(Span::styled(
            format!("Last export: {}", path.display()),
            Style::default().fg(Color::Gray),
        )));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(panel_block("Status", focused));
    f.render_widget(p, area);
}

fn draw_requests(area: Rect, f: &mut Frame, demo: &DemoState, focused: bool) {
    let lines: Vec<Line> = demo
        .collection(REQUESTS)
        .iter()
        .map(|r| {
            let status = r.get("status").and_then(Value::as_str).unwrap_or("-");
            let color = match status {
                "in_progress" => Color::Yellow,
                "completed" | "done" => Color::Green,
                _ => Color::Gray,
            };
            Line::from(vec![
                Span::raw(format!("{}  ", record_label(r, &["title"]))),
                Span::styled(format!("[{status}]"), Style::default().fg(color)),
            ])
        })
        .collect();
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(panel_block("Requests", focused));
    f.render_widget(p, area);
}

fn draw_studio(area: Rect, f: &mut Frame, state: &UiState, demo: &DemoState, focused: bool) {
    let mut lines: Vec<Line> = demo
        .collection(WORKING_DOCS)
        .iter()
        .map(|d| {
            Line::from(Span::styled(
                record_label(d, &["title"]),
                Style::default().add_modifier(Modifier::BOLD),
            ))
        })
        .collect();
    if !state.editor_modules.is_empty() {
        let names: Vec<&str> = state.editor_modules.iter().map(|m| m.name.as_str()).collect();
        lines.push(Line::from(Span::styled(
            format!("Modules: {}", names.join(" | ")),
            Style::default().fg(Color::Magenta),
        )));
    }
    if let Some(content) = state.editor_content.as_deref() {
        lines.push(Line::from(""));
        lines.push(Line::from(content.to_string()));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(panel_block("Working studio", focused));
    f.render_widget(p, area);
}

fn draw_records(
    area: Rect,
    f: &mut Frame,
    demo: &DemoState,
    collection: &str,
    title: &str,
    keys: &[&str],
    focused: bool,
) {
    let lines: Vec<Line> = demo
        .collection(collection)
        .iter()
        .map(|r| Line::from(format!("- {}", record_label(r, keys))))
        .collect();
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(panel_block(title, focused));
    f.render_widget(p, area);
}

fn draw_overlay(area: Rect, f: &mut Frame, geometry: &OverlayGeometry, headline: &str) {
    if let Some(r) = clip(geometry.highlight, area) {
        let highlight = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(Color::Yellow));
        f.render_widget(highlight, r);
    }

    let (px, py) = geometry.pointer;
    let label = format!("◀ {headline}");
    let pointer = Bounds::new(px, py, label.chars().count() as i32, 1);
    if let Some(r) = clip(pointer, area).filter(|r| r.x as i32 == px) {
        f.render_widget(Clear, r);
        let p = Paragraph::new(Line::from(Span::styled(
            label,
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )));
        f.render_widget(p, r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DemoStep;
    use crate::overlay::OverlayStyle;
    use crate::store::DemoStore;
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    #[test]
    fn every_panel_resolves_on_a_normal_terminal() {
        let layout = PanelLayout::compute(Rect::new(0, 0, 120, 40));
        for id in [HUB, REQUESTS_PANEL, STUDIO, MODULES_PANEL, SOURCES_PANEL, STATUS] {
            let handle = layout.find_element_by_id(id).expect(id);
            assert!(handle.bounds.width > 0 && handle.bounds.height > 0);
        }
        assert!(layout.find_element_by_id("nope").is_none());

        let studio = layout.rect(STUDIO).unwrap();
        let handle = layout.find_element_by_id(STUDIO).unwrap();
        assert_eq!(handle.bounds.x, studio.x as i32);
        assert_eq!(handle.bounds.height, studio.height as i32);
    }

    #[test]
    fn clip_keeps_overlays_inside_the_frame() {
        let area = Rect::new(0, 0, 20, 10);
        assert_eq!(
            clip(Bounds::new(-1, -1, 6, 4), area),
            Some(Rect::new(0, 0, 5, 3))
        );
        assert_eq!(
            clip(Bounds::new(15, 8, 10, 10), area),
            Some(Rect::new(15, 8, 5, 2))
        );
        assert_eq!(clip(Bounds::new(25, 0, 3, 3), area), None);
    }

    #[test]
    fn pixel_margins_become_cells() {
        assert_eq!(px_to_cells(8), 1);
        assert_eq!(px_to_cells(3), 1);
        assert_eq!(px_to_cells(16), 2);
        assert_eq!(px_to_cells(0), 0);
    }

    #[test]
    fn record_label_prefers_named_fields() {
        let r = json!({"id": "m1", "name": "Summary"});
        assert_eq!(record_label(&r, &["name", "title"]), "Summary");
        assert_eq!(record_label(&json!({"id": "x"}), &["title"]), "x");
        assert_eq!(record_label(&json!({}), &["title"]), "-");
    }

    #[test]
    fn highlight_and_pointer_render_for_the_current_step() {
        let steps = vec![DemoStep::new("s0", "highlight_hub").with_target(REQUESTS_PANEL)];
        let store = DemoStore::new(steps.clone());
        store.enter_demo_mode();
        let style = OverlayStyle {
            margin: 1,
            pointer_offset: 1,
            ..Default::default()
        };
        let mut overlays = OverlaySet::from_steps(&steps, style);
        let state = UiState::default();
        let demo = store.snapshot();

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal
            .draw(|f| draw_dashboard(f.area(), f, &state, &demo, &mut overlays))
            .unwrap();

        let buffer = terminal.backend().buffer();
        assert!(buffer.content().iter().any(|c| c.symbol() == "◀"));
        assert!(buffer.content().iter().any(|c| c.symbol() == "┏"));
    }

    #[test]
    fn no_overlay_outside_demo_mode() {
        let steps = vec![DemoStep::new("s0", "highlight_hub").with_target(HUB)];
        let store = DemoStore::new(steps.clone());
        let mut overlays = OverlaySet::from_steps(&steps, OverlayStyle::default());
        let state = UiState::default();
        let demo = store.snapshot();

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal
            .draw(|f| draw_dashboard(f.area(), f, &state, &demo, &mut overlays))
            .unwrap();

        let buffer = terminal.backend().buffer();
        assert!(!buffer.content().iter().any(|c| c.symbol() == "◀"));
    }
}
