//! # Weather Data Fetching
//!
//! Pulls current conditions and a short-term precipitation outlook from
//! the Open-Meteo DWD-ICON endpoint in a single request and formats them
//! into the weather panel's text block. Network and parse failures map to
//! [`FetchError`] and are absorbed by the owning
//! [`crate::source::DataSource`].
//!
//! The rain headline ("Rain in 25 min") scans the next eight 15-minute
//! precipitation steps for the first one at or above 0.1 mm, mirroring
//! how short-range radar nowcasts are usually summarized.

use crate::config::WeatherConfig;
use crate::source::{FetchError, PanelFetcher};
use crate::PanelKind;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::time::Duration;

const API_URL: &str = "https://api.open-meteo.com/v1/dwd-icon";

/// Precipitation at or above this counts as rain
const RAIN_THRESHOLD_MM: f64 = 0.1;
/// Number of 15-minute forecast steps scanned for the rain headline
const RAIN_WINDOW_STEPS: u32 = 8;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    current: Option<CurrentConditions>,
    minutely_15: Option<RainSeries>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    precipitation: Option<f64>,
    weather_code: Option<u16>,
    wind_speed_10m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RainSeries {
    time: Vec<String>,
    precipitation: Vec<Option<f64>>,
}

/// WMO weather interpretation codes, as served by Open-Meteo.
fn wmo_condition(code: u16) -> &'static str {
    match code {
        0 => "Clear",
        1 => "Mostly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Rime fog",
        51 => "Light drizzle",
        53 => "Drizzle",
        55 => "Heavy drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        66 => "Freezing rain",
        67 => "Heavy freezing rain",
        71 => "Light snow",
        73 => "Snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Light showers",
        81 => "Showers",
        82 => "Heavy showers",
        85 => "Light snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm, light hail",
        99 => "Thunderstorm, hail",
        _ => "Unknown conditions",
    }
}

/// Minutes until the first forecast step with rain, if any step in the
/// window carries it. 0 means a step in the past or right now.
fn rain_eta_minutes(series: &RainSeries, now: NaiveDateTime) -> Option<i64> {
    for (stamp, amount) in series.time.iter().zip(series.precipitation.iter()) {
        let Some(amount) = amount else { continue };
        if *amount < RAIN_THRESHOLD_MM {
            continue;
        }
        let Ok(eta) = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M") else {
            continue;
        };
        return Some((eta - now).num_minutes().max(0));
    }
    None
}

fn rain_headline(eta: Option<i64>) -> String {
    match eta {
        None => "No rain expected in the next 2 h".to_string(),
        Some(0) => "Rain now".to_string(),
        Some(minutes) => format!("Rain in {minutes} min"),
    }
}

/// Format the panel's text block from the parsed response.
fn compose_lines(current: &CurrentConditions, rain_eta: Option<i64>) -> Vec<String> {
    let mut lines = vec![rain_headline(rain_eta)];

    if let Some(code) = current.weather_code {
        lines.push(wmo_condition(code).to_string());
    }

    if let Some(temp) = current.temperature_2m {
        let mut line = format!("{}°C", temp.round() as i64);
        if let Some(feels) = current.apparent_temperature {
            line.push_str(&format!(" (feels like {}°)", feels.round() as i64));
        }
        lines.push(line);
    }

    let mut extras = Vec::new();
    if let Some(wind) = current.wind_speed_10m {
        extras.push(format!("Wind {} km/h", wind.round() as i64));
    }
    if let Some(precip) = current.precipitation {
        extras.push(format!("Precipitation {precip:.1} mm"));
    }
    if !extras.is_empty() {
        lines.push(extras.join(" · "));
    }

    lines
}

/// HTTP fetcher for the weather panel.
pub struct WeatherFetcher {
    client: reqwest::blocking::Client,
    latitude: f64,
    longitude: f64,
    timezone: String,
}

impl WeatherFetcher {
    pub fn new(config: &WeatherConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            latitude: config.latitude,
            longitude: config.longitude,
            timezone: config.timezone.clone(),
        })
    }
}

impl PanelFetcher for WeatherFetcher {
    fn panel(&self) -> PanelKind {
        PanelKind::Weather
    }

    fn fetch(&mut self) -> Result<Vec<String>, FetchError> {
        let response: ApiResponse = self
            .client
            .get(API_URL)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("timezone", self.timezone.clone()),
                (
                    "current",
                    "temperature_2m,apparent_temperature,precipitation,\
                     weather_code,wind_speed_10m"
                        .to_string(),
                ),
                ("minutely_15", "precipitation".to_string()),
                ("forecast_minutely_15", RAIN_WINDOW_STEPS.to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        let current = response.current.ok_or(FetchError::Scrape)?;
        let eta = response
            .minutely_15
            .as_ref()
            .and_then(|series| rain_eta_minutes(series, chrono::Local::now().naive_local()));

        Ok(compose_lines(&current, eta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(json: &str) -> ApiResponse {
        serde_json::from_str(json).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_combined_api_response() {
        let response = parse(
            r#"{
                "current": {
                    "time": "2026-03-14T09:15",
                    "temperature_2m": 11.6,
                    "apparent_temperature": 9.3,
                    "precipitation": 0.0,
                    "weather_code": 3,
                    "wind_speed_10m": 14.2
                },
                "minutely_15": {
                    "time": ["2026-03-14T09:15", "2026-03-14T09:30"],
                    "precipitation": [0.0, 0.4]
                }
            }"#,
        );
        let current = response.current.unwrap();
        assert_eq!(current.weather_code, Some(3));
        assert_eq!(response.minutely_15.unwrap().time.len(), 2);
    }

    #[test]
    fn parses_response_with_missing_fields() {
        let response = parse(r#"{"current": {"temperature_2m": 5.0}}"#);
        let current = response.current.unwrap();
        assert_eq!(current.temperature_2m, Some(5.0));
        assert!(current.weather_code.is_none());
        assert!(response.minutely_15.is_none());
    }

    #[test]
    fn rain_eta_finds_first_wet_step() {
        let series = RainSeries {
            time: vec![
                "2026-03-14T09:15".into(),
                "2026-03-14T09:30".into(),
                "2026-03-14T09:45".into(),
            ],
            precipitation: vec![Some(0.0), Some(0.05), Some(0.4)],
        };
        // 0.05 mm is under the threshold; the 09:45 step is the hit
        assert_eq!(rain_eta_minutes(&series, t(9, 15)), Some(30));
    }

    #[test]
    fn rain_eta_clamps_past_steps_to_now() {
        let series = RainSeries {
            time: vec!["2026-03-14T09:00".into()],
            precipitation: vec![Some(1.2)],
        };
        assert_eq!(rain_eta_minutes(&series, t(9, 20)), Some(0));
    }

    #[test]
    fn rain_eta_skips_gaps_and_dry_windows() {
        let series = RainSeries {
            time: vec!["2026-03-14T09:15".into(), "2026-03-14T09:30".into()],
            precipitation: vec![None, Some(0.0)],
        };
        assert_eq!(rain_eta_minutes(&series, t(9, 0)), None);
    }

    #[test]
    fn composes_full_text_block() {
        let current = CurrentConditions {
            temperature_2m: Some(11.6),
            apparent_temperature: Some(9.3),
            precipitation: Some(0.3),
            weather_code: Some(61),
            wind_speed_10m: Some(14.2),
        };
        let lines = compose_lines(&current, Some(25));
        assert_eq!(
            lines,
            vec![
                "Rain in 25 min",
                "Light rain",
                "12°C (feels like 9°)",
                "Wind 14 km/h · Precipitation 0.3 mm",
            ]
        );
    }

    #[test]
    fn composes_sparse_text_block() {
        let current = CurrentConditions {
            temperature_2m: None,
            apparent_temperature: None,
            precipitation: None,
            weather_code: None,
            wind_speed_10m: None,
        };
        let lines = compose_lines(&current, None);
        assert_eq!(lines, vec!["No rain expected in the next 2 h"]);
    }

    #[test]
    fn headline_variants() {
        assert_eq!(rain_headline(Some(0)), "Rain now");
        assert_eq!(rain_headline(Some(7)), "Rain in 7 min");
        assert_eq!(rain_headline(None), "No rain expected in the next 2 h");
    }

    #[test]
    fn wmo_codes_cover_the_common_cases() {
        assert_eq!(wmo_condition(0), "Clear");
        assert_eq!(wmo_condition(3), "Overcast");
        assert_eq!(wmo_condition(95), "Thunderstorm");
        assert_eq!(wmo_condition(42), "Unknown conditions");
    }
}
