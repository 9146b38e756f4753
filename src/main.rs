use anyhow::Result;
use clap::Parser;
use colored::*;
use pdfqa_core::{ApiClient, ApiError, Config};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use cli::{Cli, Commands};

const DEFAULT_LOG_FILTER: &str = "pdfqa=info,pdfqa_core=info";
const LOG_FILE_PREFIX: &str = "pdfqa.log";
const TICK_RATE: Duration = Duration::from_millis(250);

fn log_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Rolls over to `pdfqa.log.YYYY-MM-DD` at midnight
fn log_appender(dir: &Path) -> Result<RollingFileAppender> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)?;
    Ok(appender)
}

/// The TUI owns the terminal, so logs go to a file instead.
/// Buffered lines are flushed when the returned guard drops.
fn init_file_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let Some(dir) = config.log_dir() else {
        return Ok(None);
    };
    let (writer, guard) = tracing_appender::non_blocking(log_appender(&dir)?);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(DEFAULT_LOG_FILTER))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter("warn"))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    // Runs before the client is built so a bad saved URL can be fixed
    if let Commands::Config { set_api_url } = command {
        init_stderr_logging();
        return cli::config(set_api_url);
    }

    let config = Config::load()?;
    let base_url = cli.api_url.unwrap_or_else(|| config.api_base_url());
    let client = ApiClient::new(&base_url, config.request_timeout())?;

    let log_guard = if matches!(command, Commands::Tui) {
        init_file_logging(&config)?
    } else {
        init_stderr_logging();
        None
    };

    if let Err(e) = run_command(&client, command).await {
        eprintln!("{} {}", "Error:".bold().red(), e);
        let unreachable_service = e
            .downcast_ref::<ApiError>()
            .is_some_and(|api| matches!(api, ApiError::Transport(_)));
        if unreachable_service {
            eprintln!("Is the document service running at {}?", base_url.bold());
        }
        // exit skips destructors
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(client: &ApiClient, command: Commands) -> Result<()> {
    match command {
        Commands::Tui => run_tui(client.clone()).await,
        Commands::List => cli::list_documents(client).await,
        Commands::Show { id } => cli::show_document(client, id).await,
        Commands::Upload { path } => cli::upload_document(client, &path).await,
        Commands::Ask { question, document } => {
            cli::ask_question(client, &question, document).await
        }
        Commands::History { id } => cli::show_history(client, id).await,
        Commands::Delete { id } => cli::delete_document(client, id).await,
        Commands::Config { set_api_url } => cli::config(set_api_url),
    }
}

async fn run_tui(client: ApiClient) -> Result<()> {
    info!(api_base_url = %client.base_url(), "starting terminal UI");
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(client);
    app.start_refresh();

    let mut events = tui::EventHandler::new(TICK_RATE);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("terminal UI closed");
    result
}
