use crate::catalog;
use crate::host::LoggingHost;
use crate::model::{DemoStep, TourConfig, TourEvent};
use crate::orchestrator::{self, UiCommand};
use crate::store::DemoStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "demo-tour",
    version,
    about = "Guided product walkthrough with an optional TUI dashboard"
)]
pub struct Cli {
    /// JSON step catalog to play instead of the built-in product tour
    #[arg(long)]
    pub catalog: Option<std::path::PathBuf>,

    /// Play the tour headless and print the final store snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Play the tour headless and print a text summary
    #[arg(long)]
    pub text: bool,

    /// How long a step is shown before its effect runs
    #[arg(long, default_value = "2s")]
    pub presentation_delay: humantime::Duration,

    /// Pause between completing a step and moving to the next one
    #[arg(long, default_value = "1500ms")]
    pub advance_delay: humantime::Duration,

    /// Extra wait before a request status change lands
    #[arg(long, default_value = "500ms")]
    pub status_update_delay: humantime::Duration,

    /// Wait before completed content is handed to the editor
    #[arg(long, default_value = "1500ms")]
    pub content_inject_delay: humantime::Duration,

    /// Wait before completed modules are handed to the editor
    #[arg(long, default_value = "1s")]
    pub module_inject_delay: humantime::Duration,

    /// Margin around highlighted elements, in pixels
    #[arg(long, default_value_t = 8)]
    pub highlight_margin: i32,

    /// Request targeted by status updates that do not name one
    #[arg(long, default_value = "demo-request-1")]
    pub demo_record_id: String,

    /// Use --start-on-launch true or --start-on-launch false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub start_on_launch: bool,

    /// Export the final store snapshot as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Write logs to this file (the TUI never logs to the terminal)
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
}

impl Cli {
    /// True when the terminal dashboard will own the screen.
    pub fn is_tui(&self) -> bool {
        cfg!(feature = "tui") && !self.json && !self.text
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!(
            "--json and --text are mutually exclusive. Pick one output mode."
        ));
    }
    if !args.start_on_launch && !args.is_tui() {
        // Headless modes have nobody to start the tour later.
        return Err(anyhow::anyhow!(
            "--start-on-launch false needs the dashboard; drop --json/--text."
        ));
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args, true).await;
        }
    }

    let text = args.text;
    run_headless(args, text).await
}

/// Build a `TourConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> TourConfig {
    TourConfig {
        presentation_delay: Duration::from(args.presentation_delay),
        advance_delay: Duration::from(args.advance_delay),
        status_update_delay: Duration::from(args.status_update_delay),
        content_inject_delay: Duration::from(args.content_inject_delay),
        module_inject_delay: Duration::from(args.module_inject_delay),
        highlight_margin: args.highlight_margin,
        demo_record_id: args.demo_record_id.clone(),
        ..TourConfig::default()
    }
}

/// Load the steps to play: the `--catalog` file, or the built-in tour.
pub fn load_steps(args: &Cli) -> Result<Vec<DemoStep>> {
    read_catalog(args.catalog.as_deref())
}

pub fn read_catalog(path: Option<&std::path::Path>) -> Result<Vec<DemoStep>> {
    match path {
        Some(path) => catalog::load_catalog(path)
            .with_context(|| format!("failed to load catalog {}", path.display())),
        None => catalog::builtin_catalog().context("built-in catalog is invalid"),
    }
}

/// Play the tour without a UI. `text` selects the summary over JSON output.
async fn run_headless(args: Cli, text: bool) -> Result<()> {
    let cfg = build_config(&args);
    let store = DemoStore::new(load_steps(&args)?);
    let host = LoggingHost::new();
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<TourEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // Give the injector time to flush the last step's payload before quitting.
    let grace = cfg.content_inject_delay.max(cfg.module_inject_delay) + Duration::from_millis(100);

    let ctl_cfg = cfg.clone();
    let ctl_store = store.clone();
    let bindings = host.bindings();
    let start_on_launch = args.start_on_launch;
    let mut ctl = tokio::spawn(async move {
        orchestrator::run_controller(
            &ctl_cfg,
            start_on_launch,
            ctl_store,
            bindings,
            evt_tx,
            cmd_rx,
        )
        .await
    });

    let joined = loop {
        tokio::select! {
            res = &mut ctl => break res,
            Some(ev) = evt_rx.recv() => {
                if text {
                    let _ = out_tx.send(OutputLine::Stderr(ev.to_message()));
                }
                if let TourEvent::TourFinished { .. } = ev {
                    let tx = cmd_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(grace).await;
                        let _ = tx.send(UiCommand::Quit);
                    });
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = out_tx.send(OutputLine::Stderr("Interrupted".into()));
                let _ = cmd_tx.send(UiCommand::Quit);
            }
        }
    };
    joined
        .context("tour controller task failed")?
        .context("tour failed")?;

    let processed = orchestrator::process_tour_completion(&args, &store);
    for msg in &processed.export_messages {
        let _ = out_tx.send(OutputLine::Stderr(msg.clone()));
    }

    if text {
        let summary = crate::text_summary::build_text_summary(&processed.snapshot, &host);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    } else {
        let out = serde_json::to_string_pretty(&processed.snapshot)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
