mod core;
mod hd44780;
mod log_display;
mod netinfo;
mod signals;
mod spotify;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lcdspot_model::config::{Config, DisplayDriver};
use lcdspot_model::display::CharacterDisplay;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "lcdspot", version, about = "Shows the current Spotify track on an I2C character LCD")]
struct Cli {
    /// Config file (default: ~/.config/lcdspot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
    /// Poll Spotify and drive the display (default)
    #[default]
    Run,
    /// Grant access to a Spotify account and cache the token
    Authorize,
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stderr for the journal, plus a persistent file in the data dir
    let data_dir = lcdspot_model::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,lcdspot=debug,reqwest=warn,hyper=warn")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load(cli.config.as_deref())?;
    info!(
        "Config loaded from: {:?}",
        cli.config.clone().unwrap_or_else(Config::config_path)
    );

    match cli.command.unwrap_or_default() {
        Command::Run => run(config).await,
        Command::Authorize => authorize(config).await,
        Command::ShowConfig => show_config(config),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let credentials = config.spotify.credentials()?;
    let client = spotify::SpotifyClient::new(&config.spotify, credentials)?;
    if !client.token_cache().exists() {
        warn!(
            "No token cache at {:?}; run `lcdspot authorize` first",
            client.token_cache()
        );
    }

    let display: Box<dyn CharacterDisplay> = match config.display.driver {
        DisplayDriver::Hd44780 => hd44780::open(&config.display).with_context(|| {
            format!(
                "Failed to open display at {:#04x} on I2C bus {}",
                config.display.address, config.display.i2c_bus
            )
        })?,
        DisplayDriver::Log => Box::new(log_display::LogDisplay::new(
            config.display.width,
            config.display.rows,
        )),
    };

    // Signals are the only producers; the loop is the only consumer
    let (event_tx, event_rx) = mpsc::channel::<core::ControlEvent>(16);
    let shutdown = CancellationToken::new();
    signals::spawn_handlers(event_tx, shutdown.clone())?;

    let settings = core::LoopSettings::from_config(&config);
    core::DisplayLoop::new(client, display, settings, netinfo::host_info)
        .run(event_rx, shutdown)
        .await;

    info!("Display released, exiting");
    Ok(())
}

async fn authorize(config: Config) -> anyhow::Result<()> {
    let credentials = config.spotify.credentials()?;
    let mut client = spotify::SpotifyClient::new(&config.spotify, credentials)?;

    println!("Open this URL in a browser and grant access:\n");
    println!("    {}\n", client.authorize_url()?);
    println!("Then paste the URL you were redirected to (or just the code):");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let input = lines
        .next_line()
        .await?
        .context("stdin closed before an authorization code was entered")?;
    let code = spotify::parse_authorization_response(&input)
        .context("No authorization code found in the pasted text")?;

    client.exchange_code(&code).await?;
    println!("Token cached at {}", client.token_cache().display());
    Ok(())
}

fn show_config(mut config: Config) -> anyhow::Result<()> {
    if config.spotify.client_secret.is_some() {
        config.spotify.client_secret = Some("********".to_string());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
