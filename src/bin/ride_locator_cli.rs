use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use ride_locator::{
    config::{self, EngineConfig},
    models::{AddressField, Coordinate, SearchRequest},
    providers::{ConfiguredProviders, GeocodingProvider, ScriptedProvider},
    surfaces::{InMemoryForm, InMemoryMap},
    BookingSession, FallbackResolver, SlotResolution,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load engine config")?;
    config::init_tracing(config.log_level(), config.log_json);
    debug!(environment = %config.environment, "configuration loaded");

    match cli.command {
        Commands::Reverse(args) => handle_reverse(&config, args, cli.json).await?,
        Commands::Search(args) => handle_search(&config, args, cli.json).await?,
        Commands::Simulate(args) => handle_simulate(&config, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "ride-locator", about = "Resolve pickup and dropoff locations", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a coordinate to an address through the provider fallback chain
    Reverse(ReverseArgs),
    /// Forward search within the configured service area
    Search(SearchArgs),
    /// Replay a pickup click and a dropoff click against in-memory surfaces
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct ReverseArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
}

#[derive(Args)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 5)]
    limit: usize,
}

#[derive(Args)]
struct SimulateArgs {
    /// Use scripted providers instead of the network
    #[arg(long, action = ArgAction::SetTrue)]
    offline: bool,
    /// Pickup click as `lat,lng`
    #[arg(long, default_value = "55.6050,13.0038")]
    pickup: String,
    /// Dropoff click as `lat,lng`
    #[arg(long, default_value = "55.5900,13.0200")]
    dropoff: String,
}

async fn handle_reverse(config: &EngineConfig, args: ReverseArgs, json: bool) -> Result<()> {
    let coordinate = Coordinate::new(args.lat, args.lng).context("invalid coordinate")?;
    let resolver = FallbackResolver::from_config(config).context("failed to build providers")?;

    let address = resolver.resolve(coordinate).await;

    if json {
        print_json(&address)?;
    } else {
        println!("{} ({})", address.text, address.source);
    }
    Ok(())
}

async fn handle_search(config: &EngineConfig, args: SearchArgs, json: bool) -> Result<()> {
    let providers =
        ConfiguredProviders::from_config(&config.geocoding).context("failed to build providers")?;
    let provider = providers.for_role(config.autocomplete.provider);
    let area = config
        .service_area
        .to_service_area()
        .context("invalid service area")?;
    let request = SearchRequest::new(&args.query)
        .context("invalid query")?
        .within(area)
        .limit(args.limit);

    let suggestions = provider
        .forward_search(request)
        .await
        .with_context(|| format!("{} search failed", provider.name()))?;

    if json {
        print_json(&suggestions)?;
    } else if suggestions.is_empty() {
        println!("No matches for {:?}", args.query);
    } else {
        for suggestion in &suggestions {
            println!(
                "- {} • {} ({})",
                suggestion.short_label, suggestion.display_text, suggestion.coordinate
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SimulationReport {
    steps: Vec<SlotResolution>,
    fields: Vec<(AddressField, String)>,
    markers: Vec<ride_locator::Marker>,
}

async fn handle_simulate(config: &EngineConfig, args: SimulateArgs, json: bool) -> Result<()> {
    let pickup = parse_coordinate(&args.pickup)?;
    let dropoff = parse_coordinate(&args.dropoff)?;

    let form = Arc::new(InMemoryForm::new());
    let map = Arc::new(InMemoryMap::new());
    let session = if args.offline {
        BookingSession::with_providers(config, offline_providers(), form.clone(), map.clone())
    } else {
        BookingSession::from_config(config, form.clone(), map.clone())
    }
    .context("failed to build booking session")?;

    let mut steps = Vec::with_capacity(2);
    for coordinate in [pickup, dropoff] {
        steps.push(session.on_click(coordinate).await);
    }

    let report = SimulationReport {
        steps,
        fields: form.snapshot(),
        markers: map.markers(),
    };

    if json {
        print_json(&report)?;
    } else {
        for step in &report.steps {
            println!("- {} ← {} [{}]", step.slot, step.address.text, step.address.source);
        }
        println!("Next click fills {}", session.armed_slot());
    }
    Ok(())
}

/// Primary always fails and the backup answers once, so the dropoff click
/// shows the coordinate fallback.
fn offline_providers() -> ConfiguredProviders {
    let primary = ScriptedProvider::new("offline-primary")
        .failing(ride_locator::ProviderErrorKind::Unreachable)
        .with_reverse_latency(Duration::from_millis(50));
    let backup = ScriptedProvider::new("offline-backup")
        .then_address("Stortorget 1, Malmö", Duration::from_millis(20));
    ConfiguredProviders {
        primary: Arc::new(primary),
        backup: Some(Arc::new(backup)),
    }
}

fn parse_coordinate(raw: &str) -> Result<Coordinate> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected `lat,lng`, got {raw:?}"))?;
    let lat: f64 = lat.trim().parse().with_context(|| format!("invalid latitude {lat:?}"))?;
    let lng: f64 = lng.trim().parse().with_context(|| format!("invalid longitude {lng:?}"))?;
    Ok(Coordinate::new(lat, lng)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
