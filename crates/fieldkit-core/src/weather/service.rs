//! Zipcode and location lookups.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{Coordinates, ForecastBundle, WeatherClient, Zipcode};
use crate::error::{FieldkitError, Result};
use crate::history::BoundedHistory;

/// Shown in place of a temperature that could not be fetched.
pub const UNAVAILABLE_TEMPERATURE: &str = "Unavailable";

/// A searched zipcode with its current temperature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"zipcode": "10001", "current_temperature": "72"}))]
pub struct HistoryTemperature {
    /// The searched zipcode.
    pub zipcode: String,
    /// Current temperature in °F, or "Unavailable".
    pub current_temperature: String,
}

/// Outcome of a zipcode lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipcodeLookup {
    /// The provider returned at least one forecast day.
    Found {
        /// The normalized zipcode.
        zipcode: Zipcode,
        /// The forecast.
        forecast: ForecastBundle,
    },
    /// The input was malformed or the provider had no forecast for it.
    InvalidZipcode(String),
}

impl ZipcodeLookup {
    /// Convert into a `Result`, mapping an invalid lookup to [`FieldkitError::InvalidZipcode`].
    ///
    /// # Errors
    ///
    /// Returns an error for [`ZipcodeLookup::InvalidZipcode`].
    pub fn into_result(self) -> Result<(Zipcode, ForecastBundle)> {
        match self {
            Self::Found { zipcode, forecast } => Ok((zipcode, forecast)),
            Self::InvalidZipcode(input) => Err(FieldkitError::InvalidZipcode(input)),
        }
    }
}

/// Weather lookups backed by the zipcode history.
#[derive(Debug)]
pub struct WeatherService {
    client: WeatherClient,
    history: BoundedHistory<String>,
}

impl WeatherService {
    /// Create a service.
    #[must_use]
    pub const fn new(client: WeatherClient, history: BoundedHistory<String>) -> Self {
        Self { client, history }
    }

    /// Look up a zipcode and, if the provider knows it, remember it.
    ///
    /// Malformed input is rejected without contacting the provider. An empty
    /// forecast counts as an invalid zipcode and leaves the history untouched.
    pub async fn lookup_zipcode(&self, input: &str) -> ZipcodeLookup {
        let Ok(zipcode) = Zipcode::parse(input) else {
            debug!(input, "Rejecting malformed zipcode");
            return ZipcodeLookup::InvalidZipcode(input.to_string());
        };

        let forecast = self.client.fetch_by_zipcode(&zipcode).await;
        if forecast.is_empty() {
            info!(%zipcode, "No forecast for zipcode");
            return ZipcodeLookup::InvalidZipcode(input.to_string());
        }

        if self.history.push_unique(zipcode.as_str().to_string()) {
            debug!(%zipcode, "Added zipcode to history");
        }
        ZipcodeLookup::Found { zipcode, forecast }
    }

    /// Forecast for the last known position. Never touches the history.
    pub async fn current_location(&self, coordinates: Coordinates) -> ForecastBundle {
        self.client.fetch_by_coordinates(coordinates).await
    }

    /// Searched zipcodes, most recent first.
    #[must_use]
    pub fn searched_zipcodes(&self) -> Vec<String> {
        self.history.entries()
    }

    /// Every searched zipcode with its current temperature, fetched concurrently.
    pub async fn history_with_temperatures(&self) -> Vec<HistoryTemperature> {
        let zipcodes = self.history.entries();
        let lookups = zipcodes.iter().map(|zipcode| async move {
            let temperature = match Zipcode::parse(zipcode) {
                Ok(parsed) => self.client.fetch_current_temperature(&parsed).await,
                Err(_) => String::new(),
            };
            HistoryTemperature {
                zipcode: zipcode.clone(),
                current_temperature: if temperature.is_empty() {
                    UNAVAILABLE_TEMPERATURE.to_string()
                } else {
                    temperature
                },
            }
        });
        join_all(lookups).await
    }
}
