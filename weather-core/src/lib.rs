//! Core library for the `weatherdash` dashboard.
//!
//! This crate defines:
//! - Configuration and persisted preferences
//! - Abstractions over the weather provider and the position source
//! - Shared domain models (conditions, forecast samples, daily summaries)
//! - Forecast aggregation into local calendar days
//! - The request orchestrator that sequences and debounces provider calls
//!
//! It is used by `weatherdash`, but can also be reused by other front ends.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod geolocate;
pub mod model;
pub mod orchestrator;
pub mod preferences;
pub mod provider;

pub use aggregate::daily_summaries;
pub use config::Config;
pub use error::{GeolocationError, WeatherError};
pub use geolocate::{Geolocator, geolocator_from_config};
pub use model::{
    AirQuality, AqiLevel, Coordinates, CurrentConditions, DailySummary, Forecast, ForecastSample,
    LocationQuery, PlaceSuggestion, Pollutants, Units,
};
pub use orchestrator::{Orchestrator, Session};
pub use preferences::Preferences;
pub use provider::{WeatherProvider, provider_from_config};
