//! Weather lookup ability that returns mock weather data.
//!
//! Results are derived from a hash of the city name, so the same city always
//! reports the same weather. Lets the agent loop be exercised end-to-end
//! without network access.

use serde::Serialize;
use toolstream_core::ability::{Ability, AbilityArgs, AbilityArgument, ArgumentType};
use toolstream_core::error::AbilityError;

pub const NAME: &str = "weather_lookup";

pub fn ability() -> Result<Ability, AbilityError> {
    Ability::builder(
        NAME,
        "Look up current weather conditions for a city. Returns temperature, conditions, humidity and wind speed.",
    )
    .argument(AbilityArgument::required(
        "city",
        ArgumentType::String,
        "The city to look up weather for",
    ))
    .argument(
        AbilityArgument::new("units", ArgumentType::String, "Temperature units (default: metric)")
            .with_values(["metric", "imperial"]),
    )
    .handler_fn(lookup)
    .build()
}

fn lookup(args: AbilityArgs) -> Result<String, AbilityError> {
    let city = args.str("city")?.trim();
    if city.is_empty() {
        return Err(AbilityError::InvalidArguments("'city' must not be empty".into()));
    }

    let units = match args.opt_str("units").unwrap_or("metric") {
        "metric" => Units::Metric,
        "imperial" => Units::Imperial,
        other => {
            return Err(AbilityError::InvalidArguments(format!(
                "unknown units '{other}', expected metric or imperial"
            )));
        }
    };

    let report = mock_report(city, units);
    tracing::debug!(city, conditions = report.conditions, "Weather lookup");
    serde_json::to_string(&report).map_err(|e| AbilityError::failed(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    Metric,
    Imperial,
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    city: String,
    temperature: f64,
    units: &'static str,
    conditions: &'static str,
    humidity: u32,
    wind_speed: u32,
}

const CONDITIONS: [&str; 8] = [
    "Clear skies",
    "Partly cloudy",
    "Overcast",
    "Light rain",
    "Heavy rain",
    "Thunderstorms",
    "Snow",
    "Foggy",
];

fn mock_report(city: &str, units: Units) -> WeatherReport {
    let hash = city
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));

    // -5 to 34 °C
    let celsius = f64::from(hash % 40) - 5.0;
    let (temperature, label) = match units {
        Units::Metric => (celsius, "°C"),
        Units::Imperial => (celsius * 9.0 / 5.0 + 32.0, "°F"),
    };

    WeatherReport {
        city: city.to_string(),
        temperature: (temperature * 10.0).round() / 10.0,
        units: label,
        conditions: CONDITIONS[(hash as usize / 7) % CONDITIONS.len()],
        humidity: 30 + hash % 60,
        wind_speed: 5 + hash % 30,
    }
}
