use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use parley_config::{ConfigManager, CONFIG_PATH_ENV};
use parley_core::{select_capture, Feedback};
use parley_llm::GeminiProvider;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod app;
mod logging;
mod markdown;
mod ui;

use app::{App, InputMode};

const TICK_RATE: Duration = Duration::from_millis(150);
const PAGE: u16 = 10;

/// Streaming Gemini chat in the terminal
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Configuration file (default: ~/.parley/config.json)
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `parley_llm=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Start with search grounding on
    #[arg(long)]
    search: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read or change configuration values
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print one value, e.g. `llm.fast_model`
    Get { key: String },
    /// Change one value and save the file
    Set { key: String, value: String },
    /// Print the whole configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = match cli.config.as_deref() {
        Some(path) => ConfigManager::load(path).await,
        None => ConfigManager::load_default().await,
    }
    .context("failed to load configuration")?;

    if let Some(Commands::Config(args)) = cli.command {
        println!("{}", run_config_command(&manager, args.command).await?);
        return Ok(());
    }

    let config = manager.snapshot().await;

    let log_guard = logging::init(&config.logging, cli.log_level.as_deref())?;
    info!(config = %manager.path().display(), "Starting Parley");

    let provider = GeminiProvider::new(config.llm.to_provider_config()).context("failed to build Gemini client")?;
    if !provider.has_credentials() {
        warn!(env = %config.llm.api_key_env, "No API key found, replies will report it");
    }

    let (dictation_tx, dictation_rx) = mpsc::unbounded_channel();
    let capture = select_capture(&config.dictation, dictation_tx);
    let mut app = App::new(Arc::new(provider), capture, dictation_rx).with_search(cli.search);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!("Terminal loop failed: {:?}", err);
        eprintln!("Error: {:?}\nLogs: {}", err, log_guard.log_dir.display());
    }
    info!("Parley exited");
    res
}

async fn run_config_command(manager: &ConfigManager, command: ConfigCommands) -> anyhow::Result<String> {
    match command {
        ConfigCommands::Get { key } => {
            let config = manager.get().read().await.clone();
            config
                .get_value(&key)
                .map(|value| format!("{} = {}", key, value))
                .ok_or_else(|| anyhow::anyhow!("No value for key: {}", key))
        }
        ConfigCommands::Set { key, value } => {
            manager
                .update(|config| config.set_value(&key, &value))
                .await
                .with_context(|| format!("failed to set {}", key))?;
            Ok(format!("Set {} = {}", key, value))
        }
        ConfigCommands::Show => Ok(serde_json::to_string_pretty(&manager.snapshot().await)?),
    }
}

async fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK_RATE);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(app, key) {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            incoming = app.next_incoming() => app.handle_incoming(incoming),
            _ = tick.tick() => app.on_tick(),
        }
        app.process_events();
    }
}

/// Returns true when the app should quit
fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return true;
    }
    app.clear_notice();

    match app.input_mode() {
        InputMode::AttachPath => match key.code {
            KeyCode::Enter => app.confirm_attach(),
            KeyCode::Esc => app.cancel_attach(),
            KeyCode::Backspace => app.pop_input(),
            KeyCode::Char(c) if !ctrl => app.push_input(c),
            _ => {}
        },
        InputMode::Normal => match key.code {
            KeyCode::Char('n') if ctrl => app.new_chat(),
            KeyCode::Char('w') if ctrl => app.delete_current_chat(),
            KeyCode::Char('g') if ctrl => app.toggle_search(),
            KeyCode::Char('t') if ctrl => app.toggle_dictation(),
            KeyCode::Char('o') if ctrl => app.begin_attach(),
            KeyCode::Char('x') if ctrl => app.remove_last_attachment(),
            KeyCode::Char('y') if ctrl => app.copy_last_reply(),
            KeyCode::Char('r') if ctrl => {
                app.regenerate();
            }
            KeyCode::Char('u') if ctrl => {
                app.give_feedback(Feedback::Positive);
            }
            KeyCode::Char('d') if ctrl => {
                app.give_feedback(Feedback::Negative);
            }
            KeyCode::Char(_) if ctrl => {}
            KeyCode::Char(c) => app.push_input(c),
            KeyCode::Backspace => app.pop_input(),
            KeyCode::Enter => {
                app.send_message();
            }
            KeyCode::F(n @ 1..=4) => {
                app.send_suggestion(usize::from(n - 1));
            }
            KeyCode::Tab => app.next_chat(),
            KeyCode::BackTab => app.previous_chat(),
            KeyCode::Up => app.scroll_up(1),
            KeyCode::Down => app.scroll_down(1),
            KeyCode::PageUp => app.scroll_up(PAGE),
            KeyCode::PageDown => app.scroll_down(PAGE),
            _ => {}
        },
    }
    false
}
