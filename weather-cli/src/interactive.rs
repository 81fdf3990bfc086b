//! Line-driven dashboard session.
//!
//! A plain line submits a city. Lines starting with `:` are commands.

use std::sync::Arc;

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use weatherdash_core::{Orchestrator, WeatherProvider};

use crate::render;

const HELP: &str = "\
Type a city and press enter to look it up.
  :type TEXT     edit the city field (looked up once you stop typing)
  :suggest TEXT  list matching place names
  :units         switch between metric and imperial
  :dark          toggle dark mode
  :help          show this help
  :quit          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Submit(String),
    Type(String),
    Suggest(String),
    Units,
    Dark,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let Some(command) = line.trim_start().strip_prefix(':') else {
            return Input::Submit(line.to_string());
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim_start()))
            .unwrap_or((command.trim_end(), ""));

        match name {
            "t" | "type" => Input::Type(rest.to_string()),
            "s" | "suggest" => Input::Suggest(rest.to_string()),
            "u" | "units" => Input::Units,
            "d" | "dark" => Input::Dark,
            "h" | "help" => Input::Help,
            "q" | "quit" => Input::Quit,
            other => Input::Unknown(other.to_string()),
        }
    }
}

pub async fn run(mut orchestrator: Orchestrator) -> anyhow::Result<()> {
    println!("{HELP}\n");
    orchestrator.startup();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };

                match Input::parse(&line) {
                    Input::Submit(text) => orchestrator.submit_city(&text),
                    Input::Type(text) => orchestrator.edit_city(&text),
                    Input::Suggest(text) => {
                        spawn_suggestions(Arc::clone(orchestrator.provider()), text);
                    }
                    Input::Units => {
                        let units = orchestrator.toggle_units();
                        println!("Units: {units}");
                    }
                    Input::Dark => {
                        if toggle_dark(&mut orchestrator) {
                            redraw(&orchestrator);
                        }
                    }
                    Input::Help => println!("{HELP}"),
                    Input::Quit => break,
                    Input::Unknown(name) => eprintln!("Unknown command ':{name}'. Try :help"),
                }
            }
            changed = orchestrator.next_event() => {
                if changed && !orchestrator.session().in_flight {
                    redraw(&orchestrator);
                }
            }
        }
    }

    Ok(())
}

/// Look up place names off the input loop, so weather updates keep flowing
/// while the request is outstanding.
fn spawn_suggestions(provider: Arc<dyn WeatherProvider>, text: String) -> JoinHandle<String> {
    tokio::spawn(async move {
        match provider.suggest_places(&text).await {
            Ok(found) => {
                let shown = render::suggestions(&found);
                print!("{shown}");
                shown
            }
            Err(err) => {
                let shown = format!("Suggestions unavailable: {err}\n");
                eprint!("{shown}");
                shown
            }
        }
    })
}

/// Flip the theme. A failed save is reported and the session carries on
/// with the previous theme.
fn toggle_dark(orchestrator: &mut Orchestrator) -> bool {
    match orchestrator.toggle_dark_mode() {
        Ok(dark) => {
            println!("Dark mode {}", if dark { "on" } else { "off" });
            true
        }
        Err(err) => {
            eprintln!("Could not save dark mode preference: {err:#}");
            false
        }
    }
}

fn redraw(orchestrator: &Orchestrator) {
    print!(
        "{}",
        render::dashboard(orchestrator.session(), orchestrator.preferences().dark_mode())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use weatherdash_core::{
        AirQuality, Coordinates, CurrentConditions, Forecast, LocationQuery, PlaceSuggestion,
        Preferences, Units, WeatherError, geolocate::FixedLocation,
    };

    /// Answers place lookups after `delay`; every other call fails.
    #[derive(Debug)]
    struct SlowPlaces {
        delay: Duration,
    }

    #[async_trait]
    impl WeatherProvider for SlowPlaces {
        async fn current(
            &self,
            _query: &LocationQuery,
            _units: Units,
        ) -> Result<CurrentConditions, WeatherError> {
            Err(WeatherError::MissingData("conditions"))
        }

        async fn forecast(
            &self,
            _coords: Coordinates,
            _units: Units,
        ) -> Result<Forecast, WeatherError> {
            Err(WeatherError::MissingData("forecast"))
        }

        async fn air_quality(&self, _coords: Coordinates) -> Result<AirQuality, WeatherError> {
            Err(WeatherError::MissingData("air quality"))
        }

        async fn suggest_places(&self, text: &str) -> Result<Vec<PlaceSuggestion>, WeatherError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![PlaceSuggestion {
                name: text.to_string(),
                state: None,
                country: "PT".into(),
                coordinates: Coordinates::new(41.15, -8.61),
            }])
        }
    }

    fn orchestrator_with_preferences(path: std::path::PathBuf) -> Orchestrator {
        Orchestrator::new(
            Arc::new(SlowPlaces {
                delay: Duration::ZERO,
            }),
            Arc::new(FixedLocation(None)),
            Preferences::load_from(path).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn suggestions_do_not_hold_up_the_loop() {
        let provider = Arc::new(SlowPlaces {
            delay: Duration::from_secs(60),
        });

        let handle = spawn_suggestions(provider, "Porto".into());
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        let shown = handle.await.unwrap();
        assert_eq!(shown, "1. Porto, PT (41.1500, -8.6100)\n");
    }

    #[test]
    fn failed_dark_mode_save_keeps_the_session_going() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        let mut orchestrator = orchestrator_with_preferences(path.clone());

        // A directory where the file should be makes every write fail.
        std::fs::create_dir(&path).unwrap();

        assert!(!toggle_dark(&mut orchestrator));
        assert!(!orchestrator.preferences().dark_mode());
    }

    #[test]
    fn dark_mode_toggle_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        let mut orchestrator = orchestrator_with_preferences(path.clone());

        assert!(toggle_dark(&mut orchestrator));
        assert!(orchestrator.preferences().dark_mode());
        assert!(Preferences::load_from(path).unwrap().dark_mode());
    }

    #[test]
    fn plain_line_is_a_submission() {
        assert_eq!(Input::parse("New York"), Input::Submit("New York".into()));
        assert_eq!(Input::parse(""), Input::Submit(String::new()));
    }

    #[test]
    fn commands_take_short_and_long_names() {
        assert_eq!(Input::parse(":u"), Input::Units);
        assert_eq!(Input::parse(":units"), Input::Units);
        assert_eq!(Input::parse(" :dark "), Input::Dark);
        assert_eq!(Input::parse(":q"), Input::Quit);
        assert_eq!(Input::parse(":help"), Input::Help);
    }

    #[test]
    fn commands_keep_their_argument() {
        assert_eq!(Input::parse(":type San Fr"), Input::Type("San Fr".into()));
        assert_eq!(Input::parse(":s   Porto"), Input::Suggest("Porto".into()));
        assert_eq!(Input::parse(":type"), Input::Type(String::new()));
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(Input::parse(":frobnicate x"), Input::Unknown("frobnicate".into()));
    }
}
