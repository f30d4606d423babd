mod commands;
mod settings;
mod terminal_map;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{
    ClientEvent, MapView, NominatimGeocoder, RealtimeClient, SearchOutcome, SUBMIT_KEY,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use commands::{parse_command, Command, HELP};
use terminal_map::TerminalMap;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; defaults to ./client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    geocoder_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = settings::load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(geocoder_url) = args.geocoder_url {
        settings.geocoder_url = geocoder_url;
    }
    let username = args
        .username
        .or(settings.username.take())
        .ok_or_else(|| anyhow!("a username is required (--username or client.toml)"))?;

    let client = RealtimeClient::new(settings.server_url.clone());
    let user_id = client.login(&username).await?;
    println!("logged in as {username} (user_id={})", user_id.0);

    let mut events = client.subscribe_events();
    client.connect().await?;
    let snapshot = client.fetch_snapshot().await?;

    let geocoder = NominatimGeocoder::new(&settings.geocoder_url)?;
    let mut view = MapView::new(
        TerminalMap::default(),
        settings.map.clone(),
        client.clone(),
        Arc::new(geocoder),
    );
    view.mount();
    view.load(snapshot);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(err) = run_command(&mut view, command).await {
                            println!("error: {err:#}");
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
            event = events.recv() => match event {
                Ok(ClientEvent::Server(event)) => view.apply(&event),
                Ok(ClientEvent::Error(message)) => warn!(%message, "realtime error"),
                Ok(ClientEvent::Disconnected) | Err(RecvError::Closed) => {
                    println!("disconnected from {}", settings.server_url);
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed events, reloading points");
                    view.load(client.fetch_snapshot().await?);
                }
            },
        }
    }

    Ok(())
}

async fn run_command(view: &mut MapView<TerminalMap>, command: Command) -> Result<()> {
    match command {
        Command::Start => view.start_adding().await?,
        Command::Clear => view.clear_points().await?,
        Command::Click(point) => {
            if !view.on_map_click(point).await? {
                println!("not collecting points; use `start` first");
            }
        }
        Command::Search(query) => match view.on_search_submit(SUBMIT_KEY, &query).await? {
            SearchOutcome::NotSubmitted => {}
            SearchOutcome::NotFound => println!("no match for '{query}'"),
            SearchOutcome::Centered { point } => println!("centered on {point}"),
            SearchOutcome::PointRequested { point } => println!("adding {point}"),
        },
        Command::Show => {
            let state = if view.adding_points() {
                "collecting"
            } else {
                "idle"
            };
            println!("{state}, {} point(s)", view.points().len());
            for line in view.map().describe() {
                println!("  {line}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}
