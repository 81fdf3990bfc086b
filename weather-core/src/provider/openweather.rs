use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::WeatherError,
    model::{
        AirQuality, AqiLevel, Coordinates, CurrentConditions, Forecast, ForecastSample,
        LocationQuery, PlaceSuggestion, Pollutants, Units,
    },
};

use super::{SUGGESTION_LIMIT, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
/// Upper bound for one request, so a stalled connection ends as a transport failure.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another host, e.g. a proxy or a mock server.
    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if let Some(rejection) = rejection(status, &body) {
            tracing::debug!(%url, %status, "provider rejected request");
            return Err(rejection);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(
        &self,
        query: &LocationQuery,
        units: Units,
    ) -> Result<CurrentConditions, WeatherError> {
        let mut params = location_params(query);
        params.push(("units", units.as_str().to_string()));

        let parsed: OwCurrentResponse = self.get_json("/data/2.5/weather", &params).await?;
        let (description, icon) = first_condition(&parsed.weather);

        Ok(CurrentConditions {
            location_name: parsed.name,
            coordinates: Coordinates::new(parsed.coord.lat, parsed.coord.lon),
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
            description,
            icon,
            sunrise: parsed.sys.sunrise.and_then(unix_to_utc),
            sunset: parsed.sys.sunset.and_then(unix_to_utc),
            observed_at: unix_to_utc(parsed.dt)
                .ok_or(WeatherError::MissingData("observation time"))?,
            utc_offset: parsed.timezone,
        })
    }

    async fn forecast(&self, coords: Coordinates, units: Units) -> Result<Forecast, WeatherError> {
        let mut params = location_params(&LocationQuery::Coordinates(coords));
        params.push(("units", units.as_str().to_string()));

        let parsed: OwForecastResponse = self.get_json("/data/2.5/forecast", &params).await?;

        let samples = parsed
            .list
            .into_iter()
            .map(|entry| {
                let (description, icon) = first_condition(&entry.weather);
                ForecastSample {
                    dt: entry.dt,
                    temp_min: entry.main.temp_min,
                    temp_max: entry.main.temp_max,
                    description,
                    icon,
                }
            })
            .collect();

        Ok(Forecast {
            samples,
            utc_offset: parsed.city.and_then(|c| c.timezone),
        })
    }

    async fn air_quality(&self, coords: Coordinates) -> Result<AirQuality, WeatherError> {
        let params = location_params(&LocationQuery::Coordinates(coords));
        let parsed: OwAirResponse = self.get_json("/data/2.5/air_pollution", &params).await?;

        let entry = parsed
            .list
            .into_iter()
            .next()
            .ok_or(WeatherError::MissingData("air quality entries"))?;
        let level = AqiLevel::from_index(entry.main.aqi)
            .ok_or(WeatherError::MissingData("air quality index"))?;

        Ok(AirQuality {
            level,
            components: entry.components,
        })
    }

    async fn suggest_places(&self, text: &str) -> Result<Vec<PlaceSuggestion>, WeatherError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let params = [
            ("q", text.to_string()),
            ("limit", SUGGESTION_LIMIT.to_string()),
        ];
        let parsed: Vec<OwPlace> = self.get_json("/geo/1.0/direct", &params).await?;

        Ok(parsed
            .into_iter()
            .take(SUGGESTION_LIMIT)
            .map(|p| PlaceSuggestion {
                name: p.name,
                state: p.state,
                country: p.country,
                coordinates: Coordinates::new(p.lat, p.lon),
            })
            .collect())
    }
}

fn location_params(query: &LocationQuery) -> Vec<(&'static str, String)> {
    match query {
        LocationQuery::City(name) => vec![("q", name.clone())],
        LocationQuery::Coordinates(c) => {
            vec![("lat", c.lat.to_string()), ("lon", c.lon.to_string())]
        }
    }
}

/// Inspect a response for a refusal. The provider signals failure either with
/// an HTTP status or with a `cod` field in an otherwise successful response.
fn rejection(status: StatusCode, body: &str) -> Option<WeatherError> {
    let envelope: Option<OwStatus> = serde_json::from_str(body).ok();
    let cod = envelope.as_ref().and_then(|e| e.cod.as_ref()).and_then(OwCod::as_code);

    let failed_code = match cod {
        Some(code) if !(200..300).contains(&code) => Some(code),
        _ if !status.is_success() => Some(status.as_u16()),
        _ => None,
    }?;

    let message = envelope
        .and_then(|e| e.message)
        .and_then(|m| m.as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "provider returned status {failed_code}: {}",
                truncate_body(body)
            )
        });

    Some(WeatherError::Rejected {
        status: failed_code,
        message,
    })
}

fn first_condition(weather: &[OwWeather]) -> (String, String) {
    weather
        .first()
        .map(|w| (w.description.clone(), w.icon.clone()))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()))
}

#[derive(Debug, Deserialize)]
struct OwStatus {
    cod: Option<OwCod>,
    /// A string on errors; the forecast endpoint sends a number on success.
    message: Option<serde_json::Value>,
}

/// `cod` arrives as a number on success and as a string on most errors.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwCod {
    Num(u16),
    Text(String),
}

impl OwCod {
    fn as_code(&self) -> Option<u16> {
        match self {
            OwCod::Num(n) => Some(*n),
            OwCod::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    coord: OwCoord,
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
    city: Option<OwCity>,
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    main: OwAirMain,
    components: Pollutants,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    #[serde(default)]
    list: Vec<OwAirEntry>,
}

#[derive(Debug, Deserialize)]
struct OwPlace {
    name: String,
    lat: f64,
    lon: f64,
    country: String,
    state: Option<String>,
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
