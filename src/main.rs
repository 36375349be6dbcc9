use anyhow::Context;
use chrono::Utc;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    time::Duration,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use typedash::{
    app::{App, TerminalBell},
    app_dirs::AppDirs,
    client::{HttpSessionClient, OfflineSessionClient, SessionClient, StaticToken},
    config::{Config, ConfigStore, FileConfigStore},
    history::History,
    metrics::format_elapsed,
    orchestrator::{GameSettings, Orchestrator},
    runtime::{spawn_terminal_reader, ChannelEventSource, EffectDispatcher, FixedTicker, Runner},
    words::WordBank,
};

const TICK_RATE_MS: u64 = 100;
const LOG_ENV: &str = "TYPEDASH_LOG";
const DEFAULT_LOG_FILTER: &str = "typedash=info";

/// countdown-gated typing practice with per-keystroke scoring
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// number of words per session
    #[clap(short = 'w', long)]
    words_per_session: Option<u32>,

    /// word category to start with
    #[clap(short = 'c', long)]
    category: Option<String>,

    /// JSON word list to use instead of the built-in one
    #[clap(long)]
    words_file: Option<PathBuf>,

    /// base url of the session/score service
    #[clap(long)]
    api_url: Option<String>,

    /// bearer token for the score service; without one every session is a guest session
    #[clap(long, env = "TYPEDASH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// play without contacting the score service
    #[clap(long)]
    offline: bool,

    /// disable the bell on mistakes
    #[clap(long)]
    mute: bool,

    /// do not record finished sessions in the local history
    #[clap(long)]
    no_history: bool,

    /// print the last N recorded sessions and exit
    #[clap(long, value_name = "N")]
    history: Option<usize>,

    /// write logs here instead of the default state directory
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// persist the given options as the new defaults
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Command line values take precedence over the stored config
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(n) = self.words_per_session {
            cfg.words_per_session = n;
        }
        if let Some(category) = &self.category {
            cfg.category = Some(category.clone());
        }
        if let Some(path) = &self.words_file {
            cfg.words_file = Some(path.clone());
        }
        if let Some(url) = &self.api_url {
            cfg.api_base_url = url.clone();
        }
        if self.mute {
            cfg.sound = false;
        }
        if self.no_history {
            cfg.record_history = false;
        }
        cfg
    }
}

fn init_logging(path: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();
    Ok(())
}

fn print_history(n: usize) -> anyhow::Result<()> {
    let Some(history) = History::default_location() else {
        println!("no history location available");
        return Ok(());
    };
    let entries = history
        .recent(n)
        .with_context(|| format!("reading {}", history.path().display()))?;
    if entries.is_empty() {
        println!("no sessions recorded yet");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<12} {:>3} words  {:>6}  {:>5} wpm  {:>5}% acc{}",
            entry.date.format("%Y-%m-%d %H:%M"),
            entry.category,
            entry.words_completed,
            format_elapsed(entry.elapsed()),
            entry.wpm,
            entry.accuracy,
            if entry.confirmed { "" } else { "  (estimated)" },
        );
    }
    Ok(())
}

fn session_client(cli: &Cli, cfg: &Config) -> anyhow::Result<Arc<dyn SessionClient>> {
    if cli.offline {
        info!("offline mode, all sessions are guest sessions");
        return Ok(Arc::new(OfflineSessionClient));
    }
    let tokens = StaticToken::new(cli.token.clone());
    let client = HttpSessionClient::new(cfg.api_base_url.clone(), tokens)
        .context("building http client")?;
    Ok(Arc::new(client))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().or_else(AppDirs::log_path);
    init_logging(log_path.as_deref())?;

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if cli.save_config {
        store
            .save(&config)
            .with_context(|| format!("saving config to {}", store.path().display()))?;
    }

    if let Some(n) = cli.history {
        return print_history(n);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let words = WordBank::load(config.words_file.as_deref());
    let settings = GameSettings::from(&config);
    let orchestrator = Orchestrator::new(words, config.category.as_deref(), settings);
    let mut app = App::new(orchestrator).with_cue(Box::new(TerminalBell), config.sound);
    if config.record_history {
        if let Some(history) = History::default_location() {
            app = app.with_history(history);
        }
    }
    let client = session_client(&cli, &config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!(category = %app.orchestrator.category(), "starting typedash");
    let result = start_tui(&mut terminal, &mut app, client);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: Arc<dyn SessionClient>,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    spawn_terminal_reader(tx.clone());
    let dispatcher = EffectDispatcher::new(client, tx);
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        let event = runner.step();
        for effect in app.on_event(event, Utc::now()) {
            dispatcher.dispatch(&effect);
        }

        if app.should_quit() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["typedash"]);

        assert_eq!(cli.words_per_session, None);
        assert_eq!(cli.category, None);
        assert!(!cli.offline);
        assert!(!cli.mute);
        assert_eq!(cli.history, None);
    }

    #[test]
    fn test_cli_words_per_session() {
        let cli = Cli::parse_from(["typedash", "-w", "25"]);
        assert_eq!(cli.words_per_session, Some(25));

        let cli = Cli::parse_from(["typedash", "--words-per-session", "5"]);
        assert_eq!(cli.words_per_session, Some(5));
    }

    #[test]
    fn test_cli_token_flag() {
        let cli = Cli::parse_from(["typedash", "--token", "abc"]);
        assert_eq!(cli.token, Some("abc".to_string()));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "typedash",
            "-c",
            "programming",
            "-w",
            "3",
            "--api-url",
            "http://localhost:9000",
            "--mute",
            "--no-history",
        ]);

        let cfg = cli.apply(Config::default());

        assert_eq!(cfg.category.as_deref(), Some("programming"));
        assert_eq!(cfg.words_per_session, 3);
        assert_eq!(cfg.api_base_url, "http://localhost:9000");
        assert!(!cfg.sound);
        assert!(!cfg.record_history);
    }

    #[test]
    fn test_cli_keeps_config_when_unset() {
        let stored = Config {
            category: Some("phrases".into()),
            words_per_session: 7,
            ..Config::default()
        };

        let cfg = Cli::parse_from(["typedash"]).apply(stored.clone());

        assert_eq!(cfg, stored);
    }

    #[test]
    fn test_cli_rejects_bad_numbers() {
        assert!(Cli::try_parse_from(["typedash", "-w", "many"]).is_err());
        assert!(Cli::try_parse_from(["typedash", "--history", "-1"]).is_err());
    }
}
