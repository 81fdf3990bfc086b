//! Decides when the provider is queried and folds the answers into the session.
//!
//! Every fetch cycle and position lookup runs as its own task and reports back
//! over a channel. Each is tagged with a sequence number when issued; only
//! events carrying the latest number are applied, so a slow, superseded cycle
//! can never overwrite newer data.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    aggregate::daily_summaries,
    config::DEFAULT_DEBOUNCE_MS,
    error::{GeolocationError, WeatherError},
    geolocate::Geolocator,
    model::{
        AirQuality, Coordinates, CurrentConditions, DailySummary, Forecast, LocationQuery, Units,
    },
    preferences::Preferences,
    provider::WeatherProvider,
};

pub const MSG_WEATHER_FAILED: &str = "Failed to fetch weather. Please try again.";
pub const MSG_LOCATION_WEATHER_FAILED: &str = "Failed to fetch weather data for your location.";
pub const MSG_GEOLOCATION_DENIED: &str = "Geolocation permission denied or unavailable.";
pub const MSG_GEOLOCATION_UNSUPPORTED: &str = "Geolocation not available on this system.";

/// Everything the dashboard shows. Rebuilt by each successful cycle.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Location driving fetch cycles.
    pub query: Option<LocationQuery>,
    /// Text currently in the city field.
    pub input: String,
    pub units: Units,
    pub in_flight: bool,
    pub error: Option<String>,
    pub current: Option<CurrentConditions>,
    pub daily: Vec<DailySummary>,
    pub air_quality: Option<AirQuality>,
}

impl Session {
    fn clear_weather(&mut self) {
        self.current = None;
        self.daily.clear();
        self.air_quality = None;
    }
}

/// Progress report from a running fetch cycle.
#[derive(Debug)]
enum CycleUpdate {
    Current(Result<CurrentConditions, WeatherError>),
    Forecast(Result<Forecast, WeatherError>),
    AirQuality(Result<AirQuality, WeatherError>),
    Finished,
}

#[derive(Debug)]
enum Event {
    Located {
        seq: u64,
        result: Result<Coordinates, GeolocationError>,
    },
    Quiet {
        generation: u64,
        text: String,
    },
    Cycle {
        seq: u64,
        update: CycleUpdate,
    },
}

/// Single-slot timer: arming replaces whatever was pending.
#[derive(Debug, Default)]
struct Debouncer {
    slot: Option<JoinHandle<()>>,
    generation: u64,
}

impl Debouncer {
    fn arm(&mut self, delay: Duration, tx: UnboundedSender<Event>, text: String) {
        self.cancel();
        let generation = self.generation;
        self.slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Event::Quiet { generation, text });
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.slot.take() {
            handle.abort();
        }
        // A firing already queued from the old timer must not count.
        self.generation += 1;
    }

    /// Accept a firing if it belongs to the live timer, clearing the slot.
    fn fire(&mut self, generation: u64) -> bool {
        if self.slot.is_some() && generation == self.generation {
            self.slot = None;
            true
        } else {
            false
        }
    }

    fn is_armed(&self) -> bool {
        self.slot.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.take() {
            handle.abort();
        }
    }
}

pub struct Orchestrator {
    provider: Arc<dyn WeatherProvider>,
    geolocator: Arc<dyn Geolocator>,
    preferences: Preferences,
    session: Session,
    quiet_period: Duration,
    debouncer: Debouncer,
    latest_seq: u64,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        geolocator: Arc<dyn Geolocator>,
        preferences: Preferences,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider,
            geolocator,
            preferences,
            session: Session::default(),
            quiet_period: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            debouncer: Debouncer::default(),
            latest_seq: 0,
            tx,
            rx,
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.session.units = units;
        self
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Start with a known query, so [`startup`](Self::startup) skips the position lookup.
    pub fn with_query(mut self, query: LocationQuery) -> Self {
        if let LocationQuery::City(name) = &query {
            self.session.input = name.clone();
        }
        self.session.query = Some(query);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn provider(&self) -> &Arc<dyn WeatherProvider> {
        &self.provider
    }

    /// True while a cycle or lookup is outstanding or an edit is waiting out its quiet period.
    pub fn is_busy(&self) -> bool {
        self.session.in_flight || self.debouncer.is_armed()
    }

    /// First trigger of a session: fetch for the known query, or ask for a position.
    pub fn startup(&mut self) {
        if self.session.query.is_some() {
            self.start_cycle();
            return;
        }

        let seq = self.next_seq();
        self.session.in_flight = true;
        self.session.error = None;
        tracing::debug!(seq, "requesting position");

        let geolocator = Arc::clone(&self.geolocator);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = geolocator.locate().await;
            let _ = tx.send(Event::Located { seq, result });
        });
    }

    /// Explicit city submission. Blank text is ignored.
    pub fn submit_city(&mut self, text: &str) {
        let Some(query) = LocationQuery::city(text) else {
            return;
        };

        self.debouncer.cancel();
        self.session.input = text.trim().to_string();
        self.session.query = Some(query);
        self.start_cycle();
    }

    /// An edit to the city field. The lookup happens once edits stop for the quiet period.
    pub fn edit_city(&mut self, text: &str) {
        self.session.input = text.to_string();

        if LocationQuery::city(text).is_none() {
            self.debouncer.cancel();
            return;
        }

        self.debouncer
            .arm(self.quiet_period, self.tx.clone(), text.to_string());
    }

    /// Flip the unit system and refetch right away. Data in the old unit is dropped.
    pub fn toggle_units(&mut self) -> Units {
        self.session.units = self.session.units.toggled();
        self.session.clear_weather();
        tracing::info!(units = %self.session.units, "unit system changed");

        if self.session.query.is_some() {
            self.start_cycle();
        }
        self.session.units
    }

    pub fn toggle_dark_mode(&mut self) -> anyhow::Result<bool> {
        self.preferences.toggle_dark_mode()
    }

    /// Wait for the next event and apply it. Returns whether the session changed.
    pub async fn next_event(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    /// Process events until nothing is outstanding.
    pub async fn run_until_idle(&mut self) {
        while self.is_busy() {
            self.next_event().await;
        }
    }

    /// Apply whatever has already arrived without waiting.
    pub fn drain_pending(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            changed |= self.apply(event);
        }
        changed
    }

    fn next_seq(&mut self) -> u64 {
        self.latest_seq += 1;
        self.latest_seq
    }

    fn start_cycle(&mut self) {
        let Some(query) = self.session.query.clone() else {
            return;
        };

        let seq = self.next_seq();
        let units = self.session.units;
        self.session.in_flight = true;
        self.session.error = None;
        tracing::info!(seq, %query, %units, "starting fetch cycle");

        tokio::spawn(run_cycle(
            seq,
            Arc::clone(&self.provider),
            query,
            units,
            self.tx.clone(),
        ));
    }

    fn apply(&mut self, event: Event) -> bool {
        match event {
            Event::Quiet { generation, text } => {
                if !self.debouncer.fire(generation) {
                    return false;
                }
                match LocationQuery::city(&text) {
                    Some(query) => {
                        self.session.query = Some(query);
                        self.start_cycle();
                        true
                    }
                    None => false,
                }
            }
            Event::Located { seq, result } => {
                if seq != self.latest_seq {
                    tracing::debug!(
                        seq,
                        latest = self.latest_seq,
                        "discarding superseded position"
                    );
                    return false;
                }
                match result {
                    Ok(coords) => {
                        tracing::info!(%coords, "position found");
                        self.session.query = Some(LocationQuery::Coordinates(coords));
                        self.start_cycle();
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "position lookup failed");
                        self.session.error = Some(geolocation_message(&err).to_string());
                        self.session.in_flight = false;
                    }
                }
                true
            }
            Event::Cycle { seq, update } => {
                if seq != self.latest_seq {
                    tracing::debug!(seq, latest = self.latest_seq, "discarding stale cycle update");
                    return false;
                }
                self.apply_cycle(update);
                true
            }
        }
    }

    fn apply_cycle(&mut self, update: CycleUpdate) {
        match update {
            CycleUpdate::Current(Ok(current)) => {
                if self.session.query.as_ref().is_some_and(LocationQuery::is_coordinates) {
                    self.session.input = current.location_name.clone();
                }
                self.session.error = None;
                self.session.current = Some(current);
            }
            CycleUpdate::Current(Err(err)) => {
                let by_location = self
                    .session
                    .query
                    .as_ref()
                    .is_some_and(LocationQuery::is_coordinates);
                tracing::warn!(error = %err, "current conditions request failed");
                self.session.error = Some(conditions_message(&err, by_location));
                self.session.clear_weather();
                self.session.in_flight = false;
            }
            CycleUpdate::Forecast(Ok(forecast)) => {
                let offset = forecast
                    .utc_offset
                    .or_else(|| self.session.current.as_ref().map(|c| c.utc_offset))
                    .unwrap_or(0);
                self.session.daily = daily_summaries(&forecast.samples, offset);
            }
            CycleUpdate::Forecast(Err(err)) => {
                tracing::warn!(error = %err, "forecast request failed");
                self.session.daily.clear();
            }
            CycleUpdate::AirQuality(Ok(air)) => {
                self.session.air_quality = Some(air);
            }
            CycleUpdate::AirQuality(Err(err)) => {
                tracing::warn!(error = %err, "air quality request failed");
                self.session.air_quality = None;
            }
            CycleUpdate::Finished => {
                self.session.in_flight = false;
            }
        }
    }
}

/// Current conditions first; forecast and air quality then run side by side
/// on the returned coordinates.
async fn run_cycle(
    seq: u64,
    provider: Arc<dyn WeatherProvider>,
    query: LocationQuery,
    units: Units,
    tx: UnboundedSender<Event>,
) {
    let send = |update: CycleUpdate| {
        let _ = tx.send(Event::Cycle { seq, update });
    };

    let current = match provider.current(&query, units).await {
        Ok(current) => current,
        Err(err) => {
            send(CycleUpdate::Current(Err(err)));
            return;
        }
    };
    let coords = current.coordinates;
    send(CycleUpdate::Current(Ok(current)));

    let forecast = async {
        let result = provider.forecast(coords, units).await;
        send(CycleUpdate::Forecast(result));
    };
    let air = async {
        let result = provider.air_quality(coords).await;
        send(CycleUpdate::AirQuality(result));
    };
    tokio::join!(forecast, air);

    send(CycleUpdate::Finished);
}

fn conditions_message(err: &WeatherError, by_location: bool) -> String {
    match err {
        WeatherError::Rejected { message, .. } => message.clone(),
        _ if by_location => MSG_LOCATION_WEATHER_FAILED.to_string(),
        _ => MSG_WEATHER_FAILED.to_string(),
    }
}

fn geolocation_message(err: &GeolocationError) -> &'static str {
    match err {
        GeolocationError::PermissionDenied | GeolocationError::Unavailable(_) => {
            MSG_GEOLOCATION_DENIED
        }
        GeolocationError::Unsupported => MSG_GEOLOCATION_UNSUPPORTED,
    }
}
