mod config;
mod routes;
mod terminal;

use std::{io, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpScoringClient, QuizController, ScoringService, StaticCredentialProvider};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::routes::Route;

const TOKEN_ENV: &str = "QUIZ_BEARER_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "quiz", about = "Vocabulary quiz client")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Overrides `api_url` from the settings file and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Session token; falls back to QUIZ_BEARER_TOKEN.
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run one quiz session.
    Play,
    /// Show today's progress toward the daily goal.
    Progress,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,client_core=info,quiz=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = config::load_settings(&cli.config);
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    settings.api_url = config::normalize_api_url(&settings.api_url)
        .with_context(|| format!("invalid api_url {:?}", settings.api_url))?;

    let credentials = match cli.token {
        Some(token) => StaticCredentialProvider::new(Some(token)),
        None => StaticCredentialProvider::from_env(TOKEN_ENV),
    };
    if routes::initial_route(&settings, credentials.has_token()) == Route::SignIn {
        eprintln!("{}", routes::SIGN_IN_HELP);
        return Ok(ExitCode::from(2));
    }
    if !credentials.has_token() {
        warn!("auth bypass enabled, requests go out without a bearer token");
    }

    let service = Arc::new(HttpScoringClient::with_timeout(
        settings.api_url.clone(),
        Arc::new(credentials),
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("failed to build scoring client")?);
    info!(api_url = %service.base_url(), "quiz client ready");

    let mut out = io::stdout();
    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            let controller = QuizController::with_policy(service.clone(), settings.scoring_policy());
            let mut input = BufReader::new(tokio::io::stdin());
            if terminal::run_quiz(&controller, &mut input, &mut out)
                .await?
                .is_some()
            {
                match service.fetch_daily_progress().await {
                    Ok(progress) => terminal::render_progress(&mut out, &progress)?,
                    Err(e) => warn!(error = %e, "daily progress unavailable"),
                }
            }
        }
        Command::Progress => {
            let progress = service
                .fetch_daily_progress()
                .await
                .context("failed to fetch daily progress")?;
            terminal::render_progress(&mut out, &progress)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
