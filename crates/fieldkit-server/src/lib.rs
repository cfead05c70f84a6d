//! # fieldkit-server
//!
//! HTTP API for the fieldkit device tools: weather lookup, BLE discovery,
//! Wi-Fi scanning and barcode history.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
