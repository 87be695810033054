// Native binary for headwatch - terminal UI and headless modes

use anyhow::{anyhow, Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use headwatch::{
    config::{load, Config},
    runtime::{execute as run_command, RpcRuntime},
    session::{Command, Session},
    sources::SourceSet,
    source_events, source_ws,
    types::AppEvent,
    ui,
    util_text::format_number,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    let cfg = load().context("Failed to load configuration")?;
    init_logging(&cfg)?;
    if cfg.headless {
        cfg.print_summary();
    }

    let mut session = Session::new(cfg.session_config()?);
    let runtime = Arc::new(RpcRuntime {
        url: cfg.node_rpc_url.clone(),
        aux_data_method: cfg.aux_data_method.clone(),
        era_points_method: cfg.era_points_method.clone(),
        timeout_ms: cfg.rpc_timeout_ms,
    });

    // session + channels
    let (tx, rx) = unbounded_channel::<AppEvent>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // source tasks
    let mut sources = SourceSet::default();
    {
        let cfg = cfg.clone();
        let tx = tx.clone();
        let shutdown = shutdown_rx.clone();
        sources.spawn(async move {
            if let Err(e) = source_ws::run_heads(&cfg, tx, shutdown).await {
                log::error!("header source stopped: {e:#}");
            }
        });
    }
    if let Some(url) = cfg.events_ws_url.clone() {
        let runtime = runtime.clone();
        let tx = tx.clone();
        let shutdown = shutdown_rx.clone();
        sources.spawn(async move {
            if let Err(e) = source_events::run_events(&url, runtime.as_ref(), tx, shutdown).await {
                log::error!("event source stopped: {e:#}");
            }
        });
    }

    // main loop
    let result = if cfg.headless {
        run_headless(&mut session, rx, &tx, &runtime, &sources).await
    } else {
        run_tui(&mut session, &cfg, rx, &tx, &runtime, &sources).await
    };

    // cleanup: let the sources unsubscribe, then abort whatever is left
    let _ = shutdown_tx.send(true);
    sources.shutdown(Duration::from_secs(2)).await;
    result
}

fn init_logging(cfg: &Config) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    if cfg.headless {
        env_logger::Builder::from_env(env).init();
    } else if let Some(path) = &cfg.log_file {
        // Terminal output belongs to the UI
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        env_logger::Builder::from_env(env)
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
    Ok(())
}

/// Run session commands in the background and feed their results back in
fn dispatch(cmds: Vec<Command>, runtime: &Arc<RpcRuntime>, tx: &UnboundedSender<AppEvent>) {
    for cmd in cmds {
        let runtime = runtime.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let ev = run_command(runtime.as_ref(), cmd).await;
            let _ = tx.send(ev);
        });
    }
}

async fn run_headless(
    session: &mut Session,
    mut rx: UnboundedReceiver<AppEvent>,
    tx: &UnboundedSender<AppEvent>,
    runtime: &Arc<RpcRuntime>,
    sources: &SourceSet,
) -> Result<()> {
    loop {
        let ev = tokio::select! {
            ev = rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
            _ = sources.stopped() => {
                log::error!("all sources stopped; exiting");
                return Err(anyhow!("all sources stopped"));
            }
            _ = tokio::signal::ctrl_c() => break,
        };
        let is_head = matches!(ev, AppEvent::NewHead(_));
        let is_era = matches!(ev, AppEvent::EraPoints(_));
        let batch_block = match &ev {
            AppEvent::Events(batch) => Some(batch.block_number),
            _ => None,
        };

        let cmds = session.apply(ev);
        dispatch(cmds, runtime, tx);

        if is_head {
            if let Some(row) = session.heads().last_header() {
                log::info!(
                    "#{} {} slot {} author {}",
                    format_number(row.header.number),
                    row.header.hash.short(),
                    row.slot.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                    row.author.map(|a| a.short()).unwrap_or_else(|| "unknown".into()),
                );
            }
        }
        if is_era {
            log::debug!("era points for {} authorities", session.heads().era_points().len());
        }
        if let Some(n) = batch_block {
            let names: Vec<String> = session
                .events()
                .iter()
                .filter(|e| e.block_number == n)
                .map(|e| format!("{}.{}x{}", e.section(), e.method(), e.indexes.len()))
                .collect();
            log::info!(
                "#{} {} events, shown: {}",
                format_number(n),
                session.event_count(),
                if names.is_empty() { "-".to_string() } else { names.join(" ") }
            );
        }
        if session.quit_flag() {
            break;
        }
    }
    Ok(())
}

async fn run_tui(
    session: &mut Session,
    cfg: &Config,
    rx: UnboundedReceiver<AppEvent>,
    tx: &UnboundedSender<AppEvent>,
    runtime: &Arc<RpcRuntime>,
    sources: &SourceSet,
) -> Result<()> {
    // terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_loop(session, cfg.render_fps, &mut terminal, rx, tx, runtime, sources);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn run_loop(
    session: &mut Session,
    fps: u32,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut rx: UnboundedReceiver<AppEvent>,
    tx: &UnboundedSender<AppEvent>,
    runtime: &Arc<RpcRuntime>,
    sources: &SourceSet,
) -> Result<()> {
    let mut last_frame = Instant::now();
    // frame budget (coalesced renders)
    let frame_ms = 1000u32.saturating_div(fps.max(1)) as u64;
    let budget = Duration::from_millis(frame_ms.max(1));

    loop {
        let wait = budget.saturating_sub(last_frame.elapsed());

        // input or source events
        if event::poll(wait)? {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                    handle_key(session, k);
                }
            }
        }
        while let Ok(ev) = rx.try_recv() {
            let cmds = session.apply(ev);
            dispatch(cmds, runtime, tx);
        }

        if last_frame.elapsed() >= budget {
            terminal.draw(|f| ui::draw(f, session))?;
            last_frame = Instant::now();
        }
        if session.quit_flag() {
            break;
        }
        if sources.all_stopped() {
            return Err(anyhow!("all sources stopped"));
        }
    }
    Ok(())
}

fn handle_key(session: &mut Session, k: KeyEvent) {
    match (k.code, k.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            session.apply(AppEvent::Quit);
        }
        (KeyCode::Char('p'), _) => session.pause(),
        (KeyCode::Char('r'), _) | (KeyCode::Char(' '), _) => session.resume(),
        (KeyCode::Char('o'), _) => session.toggle_order(),
        _ => {}
    }
}
