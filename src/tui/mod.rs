mod dashboard;
mod export;
mod help;
mod state;

use crate::cli::{self, Cli};
use crate::host::{HostBindings, Navigator};
use crate::model::{TourConfig, TourEvent};
use crate::orchestrator::{self, UiCommand};
use crate::overlay::{OverlaySet, OverlayStyle};
use crate::store::{DemoState, DemoStore};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use state::{HostSignal, UiState};
use std::{io, path::PathBuf, sync::Arc, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Host side of the dashboard: forwards tour requests to the UI thread.
struct DashboardHost {
    tx: UnboundedSender<HostSignal>,
}

impl Navigator for DashboardHost {
    fn navigate(&self, path: &str) {
        let _ = self.tx.send(HostSignal::Navigate(path.to_string()));
    }
}

fn dashboard_bindings(tx: UnboundedSender<HostSignal>) -> HostBindings {
    let content_tx = tx.clone();
    let module_tx = tx.clone();
    HostBindings::new(Arc::new(DashboardHost { tx }))
        .with_content_callback(move |c| {
            let _ = content_tx.send(HostSignal::Content(c.to_string()));
        })
        .with_module_callback(move |m| {
            let _ = module_tx.send(HostSignal::Modules(m.to_vec()));
        })
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = cli::build_config(&args);
    let store = DemoStore::new(cli::load_steps(&args)?);

    // Unbounded channels keep tour tasks from ever waiting on the render loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TourEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let (sig_tx, sig_rx) = mpsc::unbounded_channel::<HostSignal>();
    let host = dashboard_bindings(sig_tx);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_cfg = cfg.clone();
    let ui_store = store.clone();
    let catalog = args.catalog.clone();
    let ui_handle = std::thread::spawn(move || {
        run_threaded(ui_cfg, catalog, ui_store, event_rx, sig_rx, cmd_tx)
    });

    let res = orchestrator::run_controller(
        &cfg,
        args.start_on_launch,
        store.clone(),
        host,
        event_tx,
        cmd_rx,
    )
    .await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    let processed = orchestrator::process_tour_completion(&args, &store);
    for msg in processed.export_messages {
        eprintln!("{msg}");
    }
    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    cfg: TourConfig,
    catalog: Option<PathBuf>,
    store: DemoStore,
    mut event_rx: UnboundedReceiver<TourEvent>,
    mut sig_rx: UnboundedReceiver<HostSignal>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let style = OverlayStyle {
        margin: dashboard::px_to_cells(cfg.highlight_margin),
        pointer_offset: dashboard::px_to_cells(cfg.pointer_offset),
        ..Default::default()
    };
    let mut overlays = OverlaySet::from_steps(&store.steps(), style);
    tracing::debug!(overlays = overlays.len(), "dashboard ready");

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::default();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }
        while let Ok(sig) = sig_rx.try_recv() {
            state.apply_signal(sig);
        }

        if last_tick.elapsed() >= tick_rate {
            let demo = store.snapshot();
            terminal
                .draw(|f| draw(f.area(), f, &state, &demo, &mut overlays))
                .ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('d')) => {
                        let cmd = if store.is_demo_mode() {
                            UiCommand::ExitDemo
                        } else {
                            UiCommand::EnterDemo
                        };
                        let _ = cmd_tx.send(cmd);
                    }
                    (_, KeyCode::Char('r')) => {
                        state.info = "Restart requested…".into();
                        state.reset_editor();
                        let _ = cmd_tx.send(UiCommand::Restart);
                    }
                    (_, KeyCode::Char('x')) => {
                        state.reset_editor();
                        let _ = cmd_tx.send(UiCommand::ResetPreview);
                    }
                    (_, KeyCode::Char('l')) => match cli::read_catalog(catalog.as_deref()) {
                        Ok(steps) => {
                            overlays = OverlaySet::from_steps(&steps, style);
                            state.reset_editor();
                            state.info = format!("Reloading catalog ({} steps)…", steps.len());
                            let _ = cmd_tx.send(UiCommand::LoadCatalog(steps));
                        }
                        Err(e) => {
                            state.info = format!("Catalog reload failed: {e:#}");
                        }
                    },
                    (_, KeyCode::Char('e')) => match export::export_to_cwd(&store.snapshot()) {
                        Ok(p) => {
                            state.info = format!("Exported JSON: {}", p.display());
                            state.last_exported_path = Some(p);
                        }
                        Err(e) => {
                            state.info = format!("JSON export failed: {e:#}");
                        }
                    },
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 3;
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 2;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    demo: &DemoState,
    overlays: &mut OverlaySet,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Tour"), Line::from("Events"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("demo-tour"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => dashboard::draw_dashboard(chunks[1], f, state, demo, overlays),
        1 => draw_events(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_events(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    // Newest at the bottom; show as many as fit inside the border.
    let visible = area.height.saturating_sub(2) as usize;
    let skip = state.events.len().saturating_sub(visible);
    let lines: Vec<Line> = state
        .events
        .iter()
        .skip(skip)
        .map(|l| Line::from(l.as_str()))
        .collect();
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Events"));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Module;

    #[test]
    fn dashboard_host_forwards_requests() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bindings = dashboard_bindings(tx);

        bindings.navigator.navigate("/sources");
        if let Some(cb) = bindings.on_content_update.as_ref() {
            cb("Draft");
        }
        let modules = vec![Module {
            id: "m1".into(),
            name: "Summary".into(),
            description: None,
        }];
        if let Some(cb) = bindings.on_module_update.as_ref() {
            cb(&modules[..]);
        }

        assert_eq!(rx.try_recv().unwrap(), HostSignal::Navigate("/sources".into()));
        assert_eq!(rx.try_recv().unwrap(), HostSignal::Content("Draft".into()));
        assert!(matches!(rx.try_recv().unwrap(), HostSignal::Modules(m) if m.len() == 1));
    }
}
