//! Weather API endpoints.
//!
//! Zipcode lookups feed the search history; location lookups never do.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use chrono_tz::Tz;
use fieldkit_core::weather::parse_number;
use fieldkit_core::{dates, Coordinates, Feature, ForecastBundle, HistoryTemperature};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the weather router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_weather))
        .route("/current", get(get_current_weather))
        .route("/history", get(get_weather_history))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for a zipcode lookup.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct WeatherQuery {
    /// Five-digit US zipcode.
    #[param(example = "10001")]
    pub zipcode: String,
}

/// Query parameters for a location lookup.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CoordinatesQuery {
    /// Latitude in degrees.
    #[param(example = 40.7506)]
    pub lat: f64,

    /// Longitude in degrees.
    #[param(example = -73.9972)]
    pub lng: f64,
}

/// Current observation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentConditionDto {
    /// Temperature in °F.
    #[schema(example = 72)]
    pub temperature_f: Option<i32>,

    /// Conditions, e.g. "Partly cloudy".
    #[schema(example = "Partly cloudy")]
    pub description: Option<String>,

    /// Provider icon for the conditions.
    pub icon_url: Option<String>,

    /// Relative humidity in percent.
    #[schema(example = 60)]
    pub humidity: Option<i32>,
}

/// One forecast day.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "date": "2025-01-15",
    "label": "Today",
    "max_temp_f": 75,
    "min_temp_f": 61,
    "sunrise": "06:12 AM",
    "sunset": "07:48 PM"
}))]
pub struct DailyForecastDto {
    /// Provider date, `YYYY-MM-DD`.
    pub date: String,

    /// "Today", "Tomorrow", or e.g. "Jan 17".
    pub label: String,

    /// High in °F.
    pub max_temp_f: Option<i32>,

    /// Low in °F.
    pub min_temp_f: Option<i32>,

    /// Local sunrise.
    pub sunrise: Option<String>,

    /// Local sunset.
    pub sunset: Option<String>,
}

/// Forecast response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeatherResponse {
    /// The zipcode that was looked up, absent for location lookups.
    #[schema(example = "10001")]
    pub zipcode: Option<String>,

    /// Resolved area name.
    #[schema(example = "New York")]
    pub area_name: String,

    /// Current observation.
    pub current: Option<CurrentConditionDto>,

    /// Daily forecasts, earliest first. Empty when nothing is known.
    pub days: Vec<DailyForecastDto>,
}

impl WeatherResponse {
    fn from_bundle(zipcode: Option<String>, bundle: ForecastBundle, tz: Tz) -> Self {
        let now = Utc::now();
        let current = bundle.current_condition.map(|condition| CurrentConditionDto {
            temperature_f: parse_number(&condition.temp_f),
            description: condition.description().map(str::to_string),
            icon_url: condition.icon_url().map(str::to_string),
            humidity: parse_number(&condition.humidity),
        });
        let days = bundle
            .weather
            .into_iter()
            .map(|day| {
                let astronomy = day.astronomy.into_iter().next();
                DailyForecastDto {
                    label: dates::forecast_label(&day.date, tz, now),
                    max_temp_f: parse_number(&day.max_temp_f),
                    min_temp_f: parse_number(&day.min_temp_f),
                    sunrise: astronomy.as_ref().map(|a| a.sunrise.clone()),
                    sunset: astronomy.map(|a| a.sunset),
                    date: day.date,
                }
            })
            .collect();

        Self {
            zipcode,
            area_name: bundle.area_name,
            current,
            days,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Forecast for a zipcode.
///
/// A zipcode the provider has no forecast for is rejected the same way as a
/// malformed one.
#[utoipa::path(
    get,
    path = "/api/weather",
    tag = "weather",
    operation_id = "getWeather",
    summary = "Get the forecast for a zipcode",
    description = "Looks up the current conditions and daily forecast for a \
        five-digit US zipcode. Successful lookups are added to the search \
        history (at most five, most recent first, no duplicates).",
    params(WeatherQuery),
    responses(
        (status = 200, description = "Forecast found", body = WeatherResponse),
        (status = 400, description = "Invalid zipcode", body = ErrorResponse)
    )
)]
pub async fn get_weather(
    State(state): State<SharedState>,
    Query(query): Query<WeatherQuery>,
) -> ApiResult<Json<WeatherResponse>> {
    let (zipcode, forecast) = state
        .weather
        .lookup_zipcode(&query.zipcode)
        .await
        .into_result()?;

    Ok(Json(WeatherResponse::from_bundle(
        Some(zipcode.as_str().to_string()),
        forecast,
        state.config.timezone(),
    )))
}

/// Forecast for the device's position.
#[utoipa::path(
    get,
    path = "/api/weather/current",
    tag = "weather",
    operation_id = "getCurrentWeather",
    summary = "Get the forecast for a position",
    description = "Looks up the forecast for a latitude/longitude pair. Requires \
        the location permission. The search history is not changed. An empty \
        `days` list means the provider returned nothing.",
    params(CoordinatesQuery),
    responses(
        (status = 200, description = "Lookup completed", body = WeatherResponse),
        (status = 400, description = "Coordinates out of range", body = ErrorResponse),
        (status = 403, description = "Location permission not granted", body = ErrorResponse)
    )
)]
pub async fn get_current_weather(
    State(state): State<SharedState>,
    Query(query): Query<CoordinatesQuery>,
) -> ApiResult<Json<WeatherResponse>> {
    state
        .config
        .permissions
        .require(Feature::CurrentLocationWeather)?;
    let coordinates = Coordinates::new(query.lat, query.lng)?;
    let forecast = state.weather.current_location(coordinates).await;

    Ok(Json(WeatherResponse::from_bundle(
        None,
        forecast,
        state.config.timezone(),
    )))
}

/// Searched zipcodes with their current temperatures.
#[utoipa::path(
    get,
    path = "/api/weather/history",
    tag = "weather",
    operation_id = "getWeatherHistory",
    summary = "List searched zipcodes",
    description = "Returns the remembered zipcodes, most recent first, each \
        with its current temperature in °F. A temperature that cannot be \
        fetched is reported as \"Unavailable\".",
    responses(
        (status = 200, description = "History retrieved", body = Vec<HistoryTemperature>)
    )
)]
pub async fn get_weather_history(
    State(state): State<SharedState>,
) -> Json<Vec<HistoryTemperature>> {
    Json(state.weather.history_with_temperatures().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldkit_core::weather::{Astronomy, CurrentCondition, WeatherForecast, WeatherText};

    #[test]
    fn test_bundle_conversion() {
        let bundle = ForecastBundle {
            area_name: "New York".to_string(),
            current_condition: Some(CurrentCondition {
                temp_f: "72".to_string(),
                humidity: "n/a".to_string(),
                weather_desc: vec![WeatherText {
                    value: "Sunny".to_string(),
                }],
                ..CurrentCondition::default()
            }),
            weather: vec![WeatherForecast {
                date: "not-a-date".to_string(),
                max_temp_f: "75".to_string(),
                astronomy: vec![Astronomy {
                    sunrise: "06:12 AM".to_string(),
                    ..Astronomy::default()
                }],
                ..WeatherForecast::default()
            }],
        };

        let response = WeatherResponse::from_bundle(Some("10001".into()), bundle, chrono_tz::UTC);
        let current = response.current.unwrap();
        assert_eq!(current.temperature_f, Some(72));
        assert_eq!(current.humidity, None);
        assert_eq!(current.description.as_deref(), Some("Sunny"));
        assert_eq!(response.days[0].label, "not-a-date");
        assert_eq!(response.days[0].max_temp_f, Some(75));
        assert_eq!(response.days[0].min_temp_f, None);
        assert_eq!(response.days[0].sunrise.as_deref(), Some("06:12 AM"));
    }
}
