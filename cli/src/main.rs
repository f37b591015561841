mod config;
mod error;

use clap::{Parser, Subcommand};
use log::info;
use tracker::{
    HttpPositionSource, MapStyle, MapView, PollerHandle, Position, PositionPoller, PositionSource,
    poller::PollPhase,
};

use crate::{config::Config, error::CliError};

/// Bus GPS tracker
#[derive(Parser, Debug)]
#[command(version, about = "Bus GPS tracker", long_about = None)]
struct Args {
    /// Configuration file, with or without its extension
    #[arg(short, long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the API and print the map view on every update, until Ctrl-C
    Watch {
        /// Print each view as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Fetch the latest position once
    Latest,

    /// Fetch every recorded position once
    History,
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();

    if let Err(err) = run(args).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = Config::load(&args.config)?;
    let source = HttpPositionSource::new(&config.api.base_url, config.api.timeout())?;

    match args.command {
        Commands::Watch { json } => watch(source, &config, json).await,
        Commands::Latest => {
            let position = source.latest().await?;
            print_position(&position);
            Ok(())
        }
        Commands::History => {
            let positions = source.all().await?;
            println!("{} recorded positions", positions.len());
            for position in &positions {
                print_position(position);
            }
            Ok(())
        }
    }
}

async fn watch(source: HttpPositionSource, config: &Config, json: bool) -> Result<(), CliError> {
    info!("Tracking bus from {}", source.latest_url());

    let handle = PositionPoller::new(source, config.poller_config()).start();

    follow(handle, &config.map, json, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Could not listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received, stopping");
    })
    .await
}

/// Prints every view published by `handle` until `shutdown` completes, then
/// stops the poller.
async fn follow(
    handle: PollerHandle,
    style: &MapStyle,
    json: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<(), CliError> {
    let mut states = handle.subscribe();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }

                let state = states.borrow_and_update().clone();
                let view = MapView::from_state(&state, style);

                if json {
                    println!("{}", serde_json::to_string(&view)?);
                } else if state.phase == PollPhase::Idle {
                    print_view(&view, style);
                }
            }
        }
    }

    handle.stop().await;

    Ok(())
}

fn print_position(position: &Position) {
    println!(
        "{}  lat={:.6}  lon={:.6}",
        position.timestamp.to_rfc3339(),
        position.latitude,
        position.longitude
    );
}

fn print_view(view: &MapView, style: &MapStyle) {
    let status = if view.connected { "online" } else { "offline" };
    let history = view.markers.len().saturating_sub(1);

    println!(
        "[{status}] center={:.6},{:.6} zoom={} history={history} opacity={}",
        view.center.latitude, view.center.longitude, view.zoom, style.history_opacity
    );

    if let Some(banner) = &view.banner {
        println!("  {}", banner.message());
    }

    if let Some(popup) = view.markers.first().and_then(|marker| marker.popup.as_ref()) {
        println!("  last update: {}", popup.last_update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracker::{PollerConfig, mock::MockSource};

    #[tokio::test(start_paused = true)]
    async fn shutdown_outlives_view_updates() {
        let source = MockSource::new();
        let handle = PositionPoller::new(source.clone(), PollerConfig::default()).start();

        // Views arrive every 5 s, so a shutdown future rebuilt on each update
        // would never reach 12 s.
        let shutdown = tokio::time::sleep(Duration::from_secs(12));
        follow(handle, &MapStyle::default(), true, shutdown)
            .await
            .unwrap();

        assert_eq!(source.latest_calls(), 3);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.latest_calls(), 3);
    }
}
