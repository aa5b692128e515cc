mod app;
mod event;
mod theme;
mod ui;

use std::io::{IsTerminal, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use crossterm::cursor::SetCursorStyle;
use crossterm::event::{Event as TermEvent, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use tally_core::{ChannelSink, Evaluator, QalcOracle, Session, TallyConfig, spawn_rate_refresher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use app::{Action, App};
use event::{AppCompletionSink, AppEvent};

/// Reactive calculation sheet: every line is evaluated as you type, and later
/// lines can refer to earlier results as ans / ansN.
#[derive(Parser)]
#[command(name = "tally", version)]
struct Args {
    /// Disable mouse support (re-enables terminal text selection)
    #[arg(long)]
    no_mouse: bool,

    /// Per-line evaluation timeout in milliseconds (default from ~/.tally/config.json)
    #[arg(long, env = "TALLY_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Run headlessly: evaluate lines piped on stdin, print `expr = result`, exit
    #[arg(short = 'p', long = "print")]
    print: bool,

    /// Skip the background exchange-rate refresh
    #[arg(long)]
    no_rates: bool,
}

fn cleanup_terminal() {
    // Pop kitty keyboard protocol and restore cursor style
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PopKeyboardEnhancementFlags
    );
    let _ = crossterm::execute!(std::io::stdout(), SetCursorStyle::DefaultUserShape);
    ratatui::restore();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up file-based tracing (logs go to ~/.tally/tally.log)
    {
        let log_dir = TallyConfig::dir();
        std::fs::create_dir_all(&log_dir).ok();
        let log_file = std::fs::File::create(log_dir.join("tally.log"))?;

        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    let args = Args::parse();

    let mut config = TallyConfig::load_or_create().unwrap_or_else(|e| {
        tracing::warn!("ignoring unreadable config: {e}");
        TallyConfig::default()
    });
    if let Some(ms) = args.timeout_ms {
        config.eval_timeout_ms = ms;
    }
    if args.no_rates {
        config.rates_enabled = false;
    }

    let oracle = match &config.qalc_path {
        Some(path) => QalcOracle::with_program(path),
        None => QalcOracle::new(),
    }
    .with_max_rate_age(config.rates_max_age());
    let evaluator = Arc::new(Evaluator::start(Arc::new(oracle), config.eval_timeout())?);

    // Piped input becomes the initial lines
    let mut piped = String::new();
    if !std::io::stdin().is_terminal() {
        std::io::stdin().read_to_string(&mut piped)?;
    }

    if args.print {
        return run_headless(evaluator, &config, &piped).await;
    }

    let rates_cancel = CancellationToken::new();
    if config.rates_enabled {
        spawn_rate_refresher(
            Arc::clone(&evaluator),
            config.rates_interval(),
            rates_cancel.clone(),
        );
    }

    // Install panic hook that restores the terminal
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        default_hook(info);
    }));

    let terminal = ratatui::init();

    // Bar cursor for a text-editing feel
    crossterm::execute!(std::io::stdout(), SetCursorStyle::SteadyBar)?;

    // Enable kitty keyboard protocol so Ctrl+H is distinguishable from Backspace
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
        )
    );

    if !args.no_mouse {
        crossterm::execute!(std::io::stdout(), crossterm::event::EnableMouseCapture)?;
    }
    crossterm::execute!(std::io::stdout(), crossterm::event::EnableBracketedPaste)?;

    let result = run_app(terminal, evaluator, &config, &piped).await;

    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableBracketedPaste);
    if !args.no_mouse {
        let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableMouseCapture);
    }

    rates_cancel.cancel();
    cleanup_terminal();

    result
}

/// Evaluate `input` without the TUI and print one `expr = result` line per
/// sheet line. Lines with no value are printed bare.
async fn run_headless(
    evaluator: Arc<Evaluator>,
    config: &TallyConfig,
    input: &str,
) -> anyhow::Result<()> {
    let (sink, mut completions) = ChannelSink::new();
    let mut session = Session::new(evaluator, Arc::new(sink), config.history_capacity).await;
    if !session.append_text(input) {
        return Ok(());
    }
    session.settle(&mut completions).await;

    for line in session.sheet().lines() {
        if line.result.is_empty() {
            println!("{}", line.expression);
        } else {
            println!("{} = {}", line.expression, line.result);
        }
    }
    Ok(())
}

async fn run_app(
    mut terminal: DefaultTerminal,
    evaluator: Arc<Evaluator>,
    config: &TallyConfig,
    piped: &str,
) -> anyhow::Result<()> {
    // Unified event channel
    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();

    let sink = Arc::new(AppCompletionSink::new(app_tx.clone()));
    let mut session = Session::new(evaluator, sink, config.history_capacity).await;
    session.append_text(piped);
    let mut app = App::new();

    // Stop flag for the event reader thread
    let stop = Arc::new(AtomicBool::new(false));

    // Spawn terminal event reader using poll() with timeout so it can stop
    let term_tx = app_tx.clone();
    let stop_reader = Arc::clone(&stop);
    tokio::task::spawn_blocking(move || {
        while !stop_reader.load(Ordering::Relaxed) {
            // Poll with 50ms timeout so we can check the stop flag
            if crossterm::event::poll(Duration::from_millis(50)).unwrap_or(false) {
                match crossterm::event::read() {
                    Ok(ev) => {
                        if term_tx.send(AppEvent::Terminal(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    });

    // Tick timer for spinner animation
    let tick_tx = app_tx.clone();
    let stop_tick = Arc::clone(&stop);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            if stop_tick.load(Ordering::Relaxed) {
                break;
            }
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    // SIGTERM handler for graceful shutdown
    let sigterm_tx = app_tx.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sig) = signal(SignalKind::terminate()) {
            sig.recv().await;
            let _ = sigterm_tx.send(AppEvent::Quit);
        }
    });

    loop {
        // Draw only when dirty
        if app.dirty {
            let size = terminal.size()?;
            let area = Rect::new(0, 0, size.width, size.height);
            app.viewport_rows = ui::sheet_rows(area);
            app.ensure_visible(session.sheet().focus(), session.sheet().len());

            terminal.draw(|frame| ui::draw(frame, &app, &session))?;
            app.dirty = false;
        }

        // Wait for next event
        let event = match app_rx.recv().await {
            Some(e) => e,
            None => break,
        };

        match event {
            AppEvent::Terminal(TermEvent::Key(key)) => {
                // With kitty keyboard protocol, ignore Release/Repeat events
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.dirty = true;
                match app.handle_key(&mut session, key) {
                    Action::Continue => {}
                    Action::Quit => break,
                    Action::CopyResult => copy_focused_result(&mut app, &session),
                }
            }
            AppEvent::Terminal(TermEvent::Mouse(mouse)) => {
                let len = session.sheet().len();
                match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(3),
                    MouseEventKind::ScrollDown => app.scroll_down(3, len),
                    MouseEventKind::Down(MouseButton::Left) => {
                        let size = terminal.size()?;
                        let layout = ui::sheet_layout(Rect::new(0, 0, size.width, size.height));
                        if let Some(hit) =
                            ui::hit_test(&layout, app.scroll_offset, len, mouse.column, mouse.row)
                        {
                            app.handle_click(&mut session, hit);
                        }
                    }
                    _ => continue,
                }
                app.dirty = true;
            }
            AppEvent::Terminal(TermEvent::Paste(text)) => {
                app.overlay = app::Overlay::None;
                session.paste(&text);
                app.dirty = true;
            }
            AppEvent::Terminal(_) => {
                // Resize events, etc.
                app.dirty = true;
            }
            AppEvent::Calc(completion) => {
                if session.handle_completion(completion) {
                    app.dirty = true;
                }
            }
            AppEvent::Tick => {
                if session.in_flight() > 0 {
                    app.tick += 1;
                    app.dirty = true;
                }
            }
            AppEvent::Quit => break,
        }
    }

    // Signal reader thread and tick timer to stop
    stop.store(true, Ordering::Relaxed);

    Ok(())
}

fn copy_focused_result(app: &mut App, session: &Session) {
    let result = &session.sheet().focused().result;
    if result.is_empty() {
        app.set_status("Nothing to copy");
        return;
    }
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(result.clone())) {
        Ok(()) => app.set_status(format!("Copied {result}")),
        Err(e) => {
            tracing::warn!("clipboard unavailable: {e}");
            app.set_status("Clipboard unavailable");
        }
    }
}
