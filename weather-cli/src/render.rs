//! Text rendering of a session snapshot.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Utc};
use weatherdash_core::{
    AirQuality, CurrentConditions, DailySummary, PlaceSuggestion, Session, Units,
};

/// ANSI colours for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub error: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn for_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Palette {
                accent: "\x1b[95m",
                muted: "\x1b[37m",
                error: "\x1b[91m",
                reset: "\x1b[0m",
            }
        } else {
            Palette {
                accent: "\x1b[35m",
                muted: "\x1b[90m",
                error: "\x1b[31m",
                reset: "\x1b[0m",
            }
        }
    }
}

/// Symbol for a condition description, matched by keyword in priority order.
pub fn condition_glyph(description: &str) -> &'static str {
    let desc = description.to_lowercase();
    if desc.contains("rain") {
        "🌧"
    } else if desc.contains("snow") {
        "🌨"
    } else if desc.contains("cloud") && desc.contains("sun") {
        "⛅"
    } else if desc.contains("cloud") {
        "☁"
    } else if desc.contains("storm") {
        "⚡"
    } else {
        "☀"
    }
}

pub fn dashboard(session: &Session, dark_mode: bool) -> String {
    let p = Palette::for_mode(dark_mode);
    let mut out = String::new();

    if let Some(error) = &session.error {
        let _ = writeln!(out, "{}{}{}", p.error, error, p.reset);
    }

    if let Some(current) = &session.current {
        current_card(&mut out, current, session.units, &p);
        if let Some(air) = &session.air_quality {
            air_line(&mut out, air, &p);
        }
    }

    if !session.daily.is_empty() {
        forecast_table(&mut out, &session.daily, session.units, &p);
    }

    out
}

fn current_card(out: &mut String, c: &CurrentConditions, units: Units, p: &Palette) {
    let t = units.temperature_symbol();
    let _ = writeln!(out, "{}{}{}", p.accent, c.location_name, p.reset);
    let _ = writeln!(
        out,
        "  {} {:.1}{t}  {}",
        condition_glyph(&c.description),
        c.temperature,
        c.description
    );
    let _ = writeln!(out, "  Feels like: {:.1}{t}", c.feels_like);
    let _ = writeln!(out, "  Humidity:   {}%", c.humidity_pct);
    let _ = writeln!(out, "  Wind:       {} {}", c.wind_speed, units.speed_symbol());
    if let (Some(sunrise), Some(sunset)) = (c.sunrise, c.sunset) {
        let _ = writeln!(
            out,
            "  Sun:        {} - {}",
            local(sunrise, c.utc_offset, "%H:%M"),
            local(sunset, c.utc_offset, "%H:%M")
        );
    }
    let _ = writeln!(
        out,
        "{}  Last updated: {}{}",
        p.muted,
        local(c.observed_at, c.utc_offset, "%Y-%m-%d %H:%M"),
        p.reset
    );
}

fn air_line(out: &mut String, air: &AirQuality, p: &Palette) {
    let _ = writeln!(
        out,
        "  Air quality: {} ({}/5){}  PM2.5 {:.1}  PM10 {:.1}  O3 {:.1}{}",
        air.level.label(),
        air.level.index(),
        p.muted,
        air.components.pm2_5,
        air.components.pm10,
        air.components.o3,
        p.reset
    );
}

fn forecast_table(out: &mut String, days: &[DailySummary], units: Units, p: &Palette) {
    let _ = writeln!(out, "\n{}{}-Day Forecast{}", p.accent, days.len(), p.reset);
    for day in days {
        let when = DateTime::from_timestamp(day.dt, 0)
            .map(|dt| local(dt, day.utc_offset, "%H:%M"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<3} {:<6} {} {:>4.0}° / {:>4.0}{}  {}{} ({}){}",
            day.date.format("%a").to_string(),
            day.date.format("%b %-d").to_string(),
            condition_glyph(&day.description),
            day.temp_max,
            day.temp_min,
            units.temperature_symbol(),
            day.description,
            p.muted,
            when,
            p.reset
        );
    }
}

pub fn suggestions(places: &[PlaceSuggestion]) -> String {
    if places.is_empty() {
        return "No matching places.\n".to_string();
    }

    places
        .iter()
        .enumerate()
        .map(|(i, place)| format!("{}. {} ({})\n", i + 1, place, place.coordinates))
        .collect()
}

fn local(instant: DateTime<Utc>, offset: i32, fmt: &str) -> String {
    match FixedOffset::east_opt(offset) {
        Some(tz) => instant.with_timezone(&tz).format(fmt).to_string(),
        None => instant.format(fmt).to_string(),
    }
}
