#![deny(warnings)]

//! Headless terminal client for a milk tea shop battle game.
//!
//! Resumes the game named in the saved session, keeps it in sync with the
//! server and prints settlements as rounds close. Commands are read from stdin.

mod commands;
mod presenter;

use anyhow::{Context, Result};
use clap::Parser;
use persistence::SessionStore;
use presenter::TerminalPresenter;
use round_sync::{ExitReason, SyncEngine, SyncError, UiCommand};
use std::path::PathBuf;
use tea_client::ApiClient;
use tea_core::{ClientConfig, GameId, PlayerId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "milktea", version, about = "Milk tea shop battle terminal client")]
struct Args {
    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server API base URL, e.g. http://127.0.0.1:8000/api/v1
    #[arg(long)]
    api_base_url: Option<String>,

    /// Session token to store before starting
    #[arg(long)]
    token: Option<String>,

    #[arg(long)]
    nickname: Option<String>,

    /// Game to resume
    #[arg(long)]
    game: Option<GameId>,

    /// This client's player id in that game
    #[arg(long)]
    player: Option<PlayerId>,

    /// Poll once, print the state and exit
    #[arg(long)]
    once: bool,
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => {
            let mut cfg = ClientConfig::default();
            cfg.apply_env();
            cfg
        }
    };
    if let Some(url) = &args.api_base_url {
        config.api_base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Write any session details given on the command line.
fn seed_session(session: &mut SessionStore, args: &Args) -> Result<()> {
    let saved = session.hydrate().clone();
    if args.token.is_some() || args.nickname.is_some() {
        let token = args.token.clone().or(saved.session_token).unwrap_or_default();
        let nickname = args.nickname.clone().unwrap_or(saved.nickname);
        session.set_session(&token, &nickname)?;
        if let Some((game_id, player_id)) = saved.game_id.zip(saved.player_id) {
            session.set_player_context(player_id, game_id)?;
        }
    }
    let state = session.state().clone();
    match (args.game.or(state.game_id), args.player.or(state.player_id)) {
        (Some(game_id), Some(player_id)) if args.game.is_some() || args.player.is_some() => {
            session.set_player_context(player_id, game_id)?;
        }
        _ => {}
    }
    Ok(())
}

async fn read_commands(tx: mpsc::Sender<UiCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        match commands::parse_command(&line) {
            Ok(Some(command)) => {
                let quit = command == UiCommand::Shutdown;
                if tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{e:#}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    info!(git_sha = env!("GIT_SHA"), build_date = env!("BUILD_DATE"), "starting milktea client");

    let config = load_config(&args)?;
    let mut session = SessionStore::open(&config.session_file);
    seed_session(&mut session, &args).context("writing session file")?;

    let mut api = ApiClient::new(&config.api_base_url, config.request_timeout())?;
    if let Some(token) = session.state().session_token.clone() {
        api = api.with_session_token(token);
    }
    info!(api = %api.base_url(), session = %session.path().display(), "client ready");

    let mut engine = match SyncEngine::new(api, &config, session) {
        Ok(engine) => engine,
        Err(SyncError::NoSession) => {
            println!("No game in the session. Join one in the lobby, or pass --game and --player.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let mut presenter = TerminalPresenter;

    if args.once {
        if let Some(exit) = engine.refresh(&mut presenter, true).await {
            report_exit(exit);
            return Ok(());
        }
        let store = engine.store();
        println!(
            "round {}/{} | phase {} | players {}",
            store.current_round(),
            store.total_rounds(),
            store.phase(),
            store.players().len()
        );
        return Ok(());
    }

    println!("{}", commands::HELP);
    let (tx, rx) = mpsc::channel(16);
    let input = tokio::spawn(read_commands(tx));
    let exit = engine.run(rx, &mut presenter).await;
    input.abort();
    report_exit(exit);
    Ok(())
}

fn report_exit(exit: ExitReason) {
    match exit {
        ExitReason::Shutdown | ExitReason::CommandsClosed => println!("bye"),
        ExitReason::SessionExpired => println!("Session expired. Log in again from the lobby."),
        ExitReason::GameGone => println!("The game no longer exists. Back to the lobby."),
    }
}
