//! Barcode symbologies and scan records.
//!
//! Decoding happens on the scanning client; this module only describes what
//! was decoded and when, so the scan can be kept in history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{FieldkitError, Result};

/// Symbologies accepted from the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    /// Aztec 2D code.
    Aztec,
    /// EAN-13.
    Ean13,
    /// EAN-8.
    Ean8,
    /// QR code.
    Qr,
    /// PDF417.
    Pdf417,
    /// UPC-E.
    UpcE,
    /// Data Matrix.
    Datamatrix,
    /// Code 39.
    Code39,
    /// Code 93.
    Code93,
    /// ITF-14.
    Itf14,
    /// Codabar.
    Codabar,
    /// Code 128.
    Code128,
    /// UPC-A.
    UpcA,
}

impl Symbology {
    /// Every supported symbology, in scanner settings order.
    pub const ALL: [Self; 13] = [
        Self::Aztec,
        Self::Ean13,
        Self::Ean8,
        Self::Qr,
        Self::Pdf417,
        Self::UpcE,
        Self::Datamatrix,
        Self::Code39,
        Self::Code93,
        Self::Itf14,
        Self::Codabar,
        Self::Code128,
        Self::UpcA,
    ];

    /// Wire name of the symbology.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aztec => "aztec",
            Self::Ean13 => "ean13",
            Self::Ean8 => "ean8",
            Self::Qr => "qr",
            Self::Pdf417 => "pdf417",
            Self::UpcE => "upc_e",
            Self::Datamatrix => "datamatrix",
            Self::Code39 => "code39",
            Self::Code93 => "code93",
            Self::Itf14 => "itf14",
            Self::Codabar => "codabar",
            Self::Code128 => "code128",
            Self::UpcA => "upc_a",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown symbology name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown barcode symbology: '{0}'")]
pub struct UnknownSymbology(pub String);

impl FromStr for Symbology {
    type Err = UnknownSymbology;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|symbology| symbology.as_str() == wanted)
            .ok_or_else(|| UnknownSymbology(s.to_string()))
    }
}

/// One decoded barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "symbology": "ean13",
    "data": "4006381333931",
    "time_scanned": "2025-01-15T03:30:00Z"
}))]
pub struct BarcodeRecord {
    /// Symbology the payload was encoded with.
    pub symbology: Symbology,

    /// Decoded payload.
    #[schema(example = "4006381333931")]
    pub data: String,

    /// When the scan happened (UTC).
    pub time_scanned: DateTime<Utc>,
}

impl BarcodeRecord {
    /// Record a scan that happened just now.
    ///
    /// # Errors
    ///
    /// Returns [`FieldkitError::EmptyBarcode`] if `data` is blank.
    pub fn new(symbology: Symbology, data: impl Into<String>) -> Result<Self> {
        Self::scanned_at(symbology, data, Utc::now())
    }

    /// Record a scan that happened at `time_scanned`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldkitError::EmptyBarcode`] if `data` is blank.
    pub fn scanned_at(
        symbology: Symbology,
        data: impl Into<String>,
        time_scanned: DateTime<Utc>,
    ) -> Result<Self> {
        let data = data.into();
        if data.trim().is_empty() {
            return Err(FieldkitError::EmptyBarcode);
        }
        Ok(Self {
            symbology,
            data,
            time_scanned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for symbology in Symbology::ALL {
            let json = serde_json::to_string(&symbology).unwrap();
            assert_eq!(json, format!("\"{}\"", symbology.as_str()));
            assert_eq!(symbology.as_str().parse::<Symbology>().unwrap(), symbology);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("QR".parse::<Symbology>().unwrap(), Symbology::Qr);
        assert_eq!(" upc_a ".parse::<Symbology>().unwrap(), Symbology::UpcA);
        assert!("maxicode".parse::<Symbology>().is_err());
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            BarcodeRecord::new(Symbology::Qr, "   "),
            Err(FieldkitError::EmptyBarcode)
        ));
    }

    #[test]
    fn test_record_serialization() {
        let record = BarcodeRecord::new(Symbology::Code128, "ABC-123").unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"symbology\":\"code128\""));
        assert!(json.contains("\"data\":\"ABC-123\""));
    }
}
