//! weather.rs — Open-Meteo current-conditions client
//!
//! The wind farm's base reading comes from the external weather oracle.
//! When the call fails (offshore sites lose backhaul routinely) the caller
//! falls back to uniformly random conditions in the documented ranges.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::Deserialize;

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// One base reading for the whole farm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSample {
    /// °C
    pub temperature: f64,
    /// Pa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastReply {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    surface_pressure: f64,
    wind_speed_10m: f64,
}

/// Fetch current conditions at the farm's position.
pub async fn fetch_current(
    client: &reqwest::Client,
    lat: f64,
    long: f64,
) -> Result<WeatherSample, reqwest::Error> {
    let reply: ForecastReply = client
        .get(OPEN_METEO_URL)
        .query(&[
            ("latitude", lat.to_string()),
            ("longitude", long.to_string()),
            ("current", "temperature_2m,surface_pressure,wind_speed_10m".to_string()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(WeatherSample {
        temperature: reply.current.temperature_2m,
        pressure: reply.current.surface_pressure,
        wind_speed: reply.current.wind_speed_10m,
    })
}

/// Uniformly random conditions in the documented fallback ranges.
pub fn random_fallback<R: Rng>(rng: &mut R) -> WeatherSample {
    WeatherSample {
        temperature: Uniform::new(-10.0, 40.0).sample(rng),
        pressure: Uniform::new(900.0, 1100.0).sample(rng),
        wind_speed: Uniform::new(0.0, 25.0).sample(rng),
    }
}
