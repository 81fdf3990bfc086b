use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use weatherdash_core::{
    Config, Coordinates, LocationQuery, Orchestrator, Preferences, Units, geolocator_from_config,
    provider_from_config,
};

use crate::{interactive, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Terminal weather dashboard")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key, unit system and default city.
    Configure,

    /// Show current conditions and the 5-day forecast.
    Show {
        /// Place name; when absent the configured default or your position is used.
        city: Option<String>,

        /// Unit system: metric or imperial.
        #[arg(long)]
        units: Option<Units>,

        /// Latitude to look up instead of a place name.
        #[arg(long, requires = "lon", conflicts_with = "city", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude to look up instead of a place name.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Suggest place names matching partial text.
    Places {
        /// Beginning of a place name.
        text: String,
    },

    /// Live session: type cities, toggle units and theme.
    Interactive {
        /// Unit system to start in.
        #[arg(long)]
        units: Option<Units>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show {
                city,
                units,
                lat,
                lon,
            } => {
                let coords = lat.zip(lon).map(|(lat, lon)| Coordinates::new(lat, lon));
                show(city, coords, units).await
            }
            Command::Places { text } => places(&text).await,
            Command::Interactive { units } => {
                let config = Config::load()?;
                let orchestrator = build_orchestrator(&config, units, None)?;
                interactive::run(orchestrator).await
            }
        }
    }
}

/// Wire up provider, position source and preferences from `config`.
///
/// An explicit `query` wins over the configured default city; with neither,
/// startup asks for the current position.
pub fn build_orchestrator(
    config: &Config,
    units: Option<Units>,
    query: Option<LocationQuery>,
) -> anyhow::Result<Orchestrator> {
    let provider = provider_from_config(config)?;
    let geolocator = geolocator_from_config(config);
    let preferences = Preferences::load()?;

    let orchestrator = Orchestrator::new(provider, geolocator, preferences)
        .with_units(units.unwrap_or(config.units))
        .with_quiet_period(config.debounce());

    let query = query.or_else(|| {
        config
            .default_city
            .as_deref()
            .and_then(LocationQuery::city)
    });

    tracing::debug!(
        ?query,
        ip_geolocation = config.ip_geolocation,
        "session configured"
    );

    Ok(match query {
        Some(query) => orchestrator.with_query(query),
        None => orchestrator,
    })
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave blank to keep the current key")
        .prompt()
        .context("API key prompt aborted")?;
    if !key.trim().is_empty() {
        config.set_api_key(key);
    }
    if config.api_key().is_none() {
        bail!("An API key is required. Get one at https://openweathermap.org/api");
    }

    let choices = vec![Units::Metric, Units::Imperial];
    let start = choices.iter().position(|u| *u == config.units).unwrap_or(0);
    config.units = Select::new("Units:", choices)
        .with_starting_cursor(start)
        .prompt()
        .context("Units prompt aborted")?;

    let city = Text::new("Default city (blank to use your position):")
        .with_default(config.default_city.as_deref().unwrap_or(""))
        .prompt()
        .context("City prompt aborted")?;
    config.default_city = LocationQuery::city(&city).map(|q| q.to_string());

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn show(
    city: Option<String>,
    coords: Option<Coordinates>,
    units: Option<Units>,
) -> anyhow::Result<()> {
    let config = Config::load()?;

    let query = match (city.as_deref(), coords) {
        (Some(text), _) => Some(
            LocationQuery::city(text)
                .ok_or_else(|| anyhow::anyhow!("City name must not be empty"))?,
        ),
        (None, Some(c)) => Some(LocationQuery::Coordinates(c)),
        (None, None) => None,
    };

    let mut orchestrator = build_orchestrator(&config, units, query)?;
    orchestrator.startup();
    orchestrator.run_until_idle().await;

    let session = orchestrator.session();
    if let Some(error) = &session.error {
        bail!("{error}");
    }

    print!(
        "{}",
        render::dashboard(session, orchestrator.preferences().dark_mode())
    );
    Ok(())
}

async fn places(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let found = provider
        .suggest_places(text)
        .await
        .context("Failed to look up place names")?;

    print!("{}", render::suggestions(&found));
    Ok(())
}
