//! `get_weather(location)`: current conditions from Open-Meteo (no API key).
//!
//! Two requests: geocode the location name, then fetch the current forecast
//! for the first match.

use async_trait::async_trait;
use ltm_core::error::ToolError;
use ltm_core::tool::AsyncTool;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::string_arg;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub struct OpenMeteoWeather {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoWeather {
    pub fn new() -> Self {
        Self::with_endpoints(GEOCODING_URL, FORECAST_URL)
    }

    pub fn with_endpoints(geocoding_url: impl Into<String>, forecast_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "get_weather".into(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("{url} returned {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| failed(format!("unexpected response from {url}: {e}")))
    }
}

impl Default for OpenMeteoWeather {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: i64,
}

fn first_coordinates(geo: GeocodingResponse, location: &str) -> Result<(f64, f64), ToolError> {
    geo.results
        .first()
        .map(|r| (r.latitude, r.longitude))
        .ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: "get_weather".into(),
            reason: format!("location not found: {location}"),
        })
}

fn report(location: &str, forecast: ForecastResponse) -> serde_json::Value {
    serde_json::json!({
        "location": location,
        "temperature": forecast.current.temperature_2m,
        "humidity": forecast.current.relative_humidity_2m,
        "weather_code": forecast.current.weather_code,
    })
}

#[async_trait]
impl AsyncTool for OpenMeteoWeather {
    fn description(&self) -> &str {
        "Get current weather (temperature in °C, humidity, WMO weather code) for a location."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City or place name"
                }
            },
            "required": ["location"]
        })
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let location = string_arg(&arguments, "location")?.to_string();

        let geo: GeocodingResponse = self
            .get_json(
                &self.geocoding_url,
                &[("name", location.clone()), ("count", "1".into())],
            )
            .await?;
        let (latitude, longitude) = first_coordinates(geo, &location)?;
        debug!(location = %location, latitude, longitude, "Geocoded location");

        let forecast: ForecastResponse = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    (
                        "current",
                        "temperature_2m,relative_humidity_2m,weather_code".into(),
                    ),
                ],
            )
            .await?;
        Ok(report(&location, forecast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_geocoding_match() {
        let geo: GeocodingResponse = serde_json::from_value(serde_json::json!({
            "results": [
                { "latitude": 48.85, "longitude": 2.35, "name": "Paris" },
                { "latitude": 33.66, "longitude": -95.55, "name": "Paris" }
            ]
        }))
        .unwrap();
        assert_eq!(first_coordinates(geo, "Paris").unwrap(), (48.85, 2.35));
    }

    #[test]
    fn no_results_is_location_not_found() {
        let geo: GeocodingResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        let err = first_coordinates(geo, "Atlantis").unwrap_err();
        assert!(err.to_string().contains("location not found"));
    }

    #[test]
    fn report_shape() {
        let forecast: ForecastResponse = serde_json::from_value(serde_json::json!({
            "current": { "temperature_2m": 21.5, "relative_humidity_2m": 40, "weather_code": 3 }
        }))
        .unwrap();
        let value = report("Paris", forecast);
        assert_eq!(value["location"], "Paris");
        assert_eq!(value["temperature"], 21.5);
        assert_eq!(value["weather_code"], 3);
    }

    #[tokio::test]
    async fn missing_location_is_invalid() {
        let tool = OpenMeteoWeather::new();
        let err = tool.call(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
