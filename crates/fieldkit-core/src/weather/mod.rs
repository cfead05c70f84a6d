//! Weather lookup.
//!
//! The provider speaks the `?format=j1` JSON schema, where every value,
//! numeric or not, is a string. Types here mirror that schema field for field;
//! accessors parse the few numbers callers care about.
//!
//! - [`client`] - HTTP client that degrades every failure to an empty bundle
//! - [`service`] - zipcode lookups tied to the zipcode history

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FieldkitError, Result};

pub mod client;
pub mod service;
#[cfg(test)]
pub(crate) mod test_provider;

pub use client::WeatherClient;
pub use service::{HistoryTemperature, WeatherService, ZipcodeLookup, UNAVAILABLE_TEMPERATURE};

static ZIPCODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}$").expect("zipcode pattern is valid"));

/// A 5-digit US postal code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Zipcode(String);

impl Zipcode {
    /// Parse a zipcode, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`FieldkitError::InvalidZipcode`] unless the input is exactly five digits.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if ZIPCODE_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(FieldkitError::InvalidZipcode(input.to_string()))
        }
    }

    /// The zipcode digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Zipcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A last-known geographic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Validate and build a coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`FieldkitError::InvalidCoordinates`] for out-of-range or non-finite values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FieldkitError::InvalidCoordinates(format!(
                "latitude {latitude} is outside -90..=90"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(FieldkitError::InvalidCoordinates(format!(
                "longitude {longitude} is outside -180..=180"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Raw provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherResponse {
    /// Current observation (normally exactly one).
    pub current_condition: Vec<CurrentCondition>,
    /// Resolved area (normally exactly one).
    pub nearest_area: Vec<NearestArea>,
    /// Echo of the query.
    pub request: Vec<RequestInfo>,
    /// Daily forecasts.
    pub weather: Vec<WeatherForecast>,
}

/// A `{ "value": ... }` wrapper used throughout the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherText {
    /// The wrapped text.
    pub value: String,
}

/// Current observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct CurrentCondition {
    #[serde(rename = "FeelsLikeC")]
    pub feels_like_c: String,
    #[serde(rename = "FeelsLikeF")]
    pub feels_like_f: String,
    pub cloudcover: String,
    pub humidity: String,
    #[serde(rename = "localObsDateTime")]
    pub local_obs_date_time: String,
    pub observation_time: String,
    #[serde(rename = "precipInches")]
    pub precip_inches: String,
    #[serde(rename = "precipMM")]
    pub precip_mm: String,
    pub pressure: String,
    #[serde(rename = "pressureInches")]
    pub pressure_inches: String,
    #[serde(rename = "temp_C")]
    pub temp_c: String,
    #[serde(rename = "temp_F")]
    pub temp_f: String,
    #[serde(rename = "uvIndex")]
    pub uv_index: String,
    pub visibility: String,
    #[serde(rename = "visibilityMiles")]
    pub visibility_miles: String,
    #[serde(rename = "weatherCode")]
    pub weather_code: String,
    #[serde(rename = "weatherDesc")]
    pub weather_desc: Vec<WeatherText>,
    #[serde(rename = "weatherIconUrl")]
    pub weather_icon_url: Vec<WeatherText>,
    #[serde(rename = "winddir16Point")]
    pub winddir_16_point: String,
    #[serde(rename = "winddirDegree")]
    pub winddir_degree: String,
    #[serde(rename = "windspeedKmph")]
    pub windspeed_kmph: String,
    #[serde(rename = "windspeedMiles")]
    pub windspeed_miles: String,
}

impl CurrentCondition {
    /// First description, e.g. "Partly cloudy".
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        first_value(&self.weather_desc)
    }

    /// First icon URL.
    #[must_use]
    pub fn icon_url(&self) -> Option<&str> {
        first_value(&self.weather_icon_url)
    }
}

/// Resolved area for the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct NearestArea {
    #[serde(rename = "areaName")]
    pub area_name: Vec<WeatherText>,
    pub country: Vec<WeatherText>,
    pub latitude: String,
    pub longitude: String,
    pub population: String,
    pub region: Vec<WeatherText>,
    #[serde(rename = "weatherUrl")]
    pub weather_url: Vec<WeatherText>,
}

/// Echo of the provider query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestInfo {
    /// Query as the provider understood it.
    pub query: String,
    /// Query kind, e.g. "Zipcode" or "LatLon".
    #[serde(rename = "type")]
    pub kind: String,
}

/// One forecast day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct WeatherForecast {
    pub astronomy: Vec<Astronomy>,
    #[serde(rename = "avgtempC")]
    pub avg_temp_c: String,
    #[serde(rename = "avgtempF")]
    pub avg_temp_f: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub hourly: Vec<HourlyForecast>,
    #[serde(rename = "maxtempC")]
    pub max_temp_c: String,
    #[serde(rename = "maxtempF")]
    pub max_temp_f: String,
    #[serde(rename = "mintempC")]
    pub min_temp_c: String,
    #[serde(rename = "mintempF")]
    pub min_temp_f: String,
    #[serde(rename = "sunHour")]
    pub sun_hour: String,
    #[serde(rename = "totalSnow_cm")]
    pub total_snow_cm: String,
    #[serde(rename = "uvIndex")]
    pub uv_index: String,
}

/// Sun and moon times for a forecast day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Astronomy {
    pub moon_illumination: String,
    pub moon_phase: String,
    pub moonrise: String,
    pub moonset: String,
    pub sunrise: String,
    pub sunset: String,
}

/// Three-hourly forecast slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct HourlyForecast {
    pub time: String,
    #[serde(rename = "tempC")]
    pub temp_c: String,
    #[serde(rename = "tempF")]
    pub temp_f: String,
    #[serde(rename = "windspeedKmph")]
    pub windspeed_kmph: String,
    #[serde(rename = "windspeedMiles")]
    pub windspeed_miles: String,
    #[serde(rename = "winddirDegree")]
    pub winddir_degree: String,
    #[serde(rename = "winddir16Point")]
    pub winddir_16_point: String,
    #[serde(rename = "weatherCode")]
    pub weather_code: String,
    #[serde(rename = "weatherDesc")]
    pub weather_desc: Vec<WeatherText>,
    #[serde(rename = "weatherIconUrl")]
    pub weather_icon_url: Vec<WeatherText>,
    #[serde(rename = "precipMM")]
    pub precip_mm: String,
    #[serde(rename = "precipInches")]
    pub precip_inches: String,
    pub humidity: String,
    pub visibility: String,
    #[serde(rename = "visibilityMiles")]
    pub visibility_miles: String,
    pub pressure: String,
    #[serde(rename = "pressureInches")]
    pub pressure_inches: String,
    pub cloudcover: String,
    #[serde(rename = "HeatIndexC")]
    pub heat_index_c: String,
    #[serde(rename = "HeatIndexF")]
    pub heat_index_f: String,
    #[serde(rename = "DewPointC")]
    pub dew_point_c: String,
    #[serde(rename = "DewPointF")]
    pub dew_point_f: String,
    #[serde(rename = "WindChillC")]
    pub wind_chill_c: String,
    #[serde(rename = "WindChillF")]
    pub wind_chill_f: String,
    #[serde(rename = "WindGustKmph")]
    pub wind_gust_kmph: String,
    #[serde(rename = "WindGustMiles")]
    pub wind_gust_miles: String,
    #[serde(rename = "FeelsLikeC")]
    pub feels_like_c: String,
    #[serde(rename = "FeelsLikeF")]
    pub feels_like_f: String,
    #[serde(rename = "uvIndex")]
    pub uv_index: String,
}

/// Result of one weather query.
///
/// An empty `weather` list means the provider had nothing for the location,
/// or the request failed; the two are indistinguishable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastBundle {
    /// Resolved area name, empty when unknown.
    pub area_name: String,
    /// Current observation.
    pub current_condition: Option<CurrentCondition>,
    /// Daily forecasts in chronological order.
    pub weather: Vec<WeatherForecast>,
}

impl ForecastBundle {
    /// The "no data" bundle.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when there are no forecast days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weather.is_empty()
    }

    /// Build a bundle from a provider response.
    #[must_use]
    pub fn from_response(response: WeatherResponse) -> Self {
        let area_name = response
            .nearest_area
            .first()
            .and_then(|area| first_value(&area.area_name))
            .unwrap_or_default()
            .to_string();
        let mut weather = response.weather;
        // ISO dates sort chronologically as strings.
        weather.sort_by(|a, b| a.date.cmp(&b.date));

        Self {
            area_name,
            current_condition: response.current_condition.into_iter().next(),
            weather,
        }
    }
}

/// Parse a numeric string field, e.g. `temp_F`.
#[must_use]
pub fn parse_number(value: &str) -> Option<i32> {
    value.trim().parse().ok()
}

fn first_value(texts: &[WeatherText]) -> Option<&str> {
    texts.first().map(|text| text.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "current_condition": [{
            "FeelsLikeF": "70", "temp_F": "72", "temp_C": "22", "humidity": "40",
            "weatherDesc": [{"value": "Sunny"}]
        }],
        "nearest_area": [{"areaName": [{"value": "New York"}], "country": [{"value": "USA"}]}],
        "request": [{"query": "10001", "type": "Zipcode"}],
        "weather": [
            {"date": "2024-03-11", "maxtempF": "60", "mintempF": "45"},
            {"date": "2024-03-09", "maxtempF": "58", "mintempF": "41"},
            {"date": "2024-03-10", "maxtempF": "55", "mintempF": "40",
             "astronomy": [{"sunrise": "06:12 AM", "sunset": "05:58 PM"}]}
        ]
    }"#;

    #[test]
    fn test_zipcode_validation() {
        assert_eq!(Zipcode::parse(" 10001 ").unwrap().as_str(), "10001");
        for bad in ["1000", "100011", "1000a", "", "10 01"] {
            assert!(matches!(Zipcode::parse(bad), Err(FieldkitError::InvalidZipcode(_))));
        }
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinates::new(40.75, -73.99).is_ok());
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_bundle_from_response() {
        let response: WeatherResponse = serde_json::from_str(SAMPLE).unwrap();
        let bundle = ForecastBundle::from_response(response);

        assert_eq!(bundle.area_name, "New York");
        let current = bundle.current_condition.as_ref().unwrap();
        assert_eq!(current.temp_f, "72");
        assert_eq!(current.description(), Some("Sunny"));

        let dates: Vec<&str> = bundle.weather.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-09", "2024-03-10", "2024-03-11"]);
        assert_eq!(bundle.weather[1].astronomy[0].sunrise, "06:12 AM");
    }

    #[test]
    fn test_empty_response_gives_empty_bundle() {
        let response: WeatherResponse = serde_json::from_str(r#"{"weather": []}"#).unwrap();
        let bundle = ForecastBundle::from_response(response);
        assert!(bundle.is_empty());
        assert_eq!(bundle, ForecastBundle::empty());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("72"), Some(72));
        assert_eq!(parse_number("-4"), Some(-4));
        assert_eq!(parse_number(""), None);
    }
}
