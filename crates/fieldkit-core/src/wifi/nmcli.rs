//! NetworkManager backend driven through `nmcli` terse output.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;

use super::{WifiBackend, WifiError, WifiNetwork};

const SCAN_FIELDS: &str = "ACTIVE,SSID,BSSID,SIGNAL,FREQ,SECURITY";
const ACTIVE_FIELDS: &str = "ACTIVE,BSSID";

/// Runs `nmcli` for scans and connection queries.
#[derive(Debug, Clone)]
pub struct NmcliBackend {
    program: PathBuf,
}

impl Default for NmcliBackend {
    fn default() -> Self {
        Self::new("nmcli")
    }
}

impl NmcliBackend {
    /// Use `program` as the `nmcli` executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, WifiError> {
        debug!(program = %self.program.display(), ?args, "Running nmcli");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    WifiError::BackendUnavailable {
                        message: format!("{}: {e}", self.program.display()),
                    }
                }
                _ => WifiError::ScanFailed {
                    message: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(WifiError::ScanFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl WifiBackend for NmcliBackend {
    async fn connected_bssid(&self) -> Result<Option<String>, WifiError> {
        let stdout = self
            .run(&["-t", "-f", ACTIVE_FIELDS, "device", "wifi", "list", "--rescan", "no"])
            .await
            .map_err(|e| match e {
                WifiError::ScanFailed { message } => WifiError::ConnectionQueryFailed { message },
                other => other,
            })?;
        Ok(parse_active_bssid(&stdout))
    }

    async fn scan(&self) -> Result<Vec<WifiNetwork>, WifiError> {
        let stdout = self
            .run(&["-t", "-f", SCAN_FIELDS, "device", "wifi", "list", "--rescan", "yes"])
            .await?;
        Ok(parse_scan(&stdout, Utc::now()))
    }
}

/// Split one terse line on unescaped `:`, unescaping `\:` and `\\`.
#[must_use]
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Convert NetworkManager's 0-100 signal quality to dBm.
///
/// Two qualities map to each dBm step, so [`parse_scan`] orders access
/// points by raw quality before the conversion loses it.
#[must_use]
pub fn signal_to_dbm(quality: i32) -> i32 {
    quality.clamp(0, 100) / 2 - 100
}

/// Parse `ACTIVE,SSID,BSSID,SIGNAL,FREQ,SECURITY` terse output.
///
/// Malformed lines are skipped. SSIDs keep their first-seen order; access
/// points sharing an SSID are listed strongest first by raw quality.
#[must_use]
pub fn parse_scan(output: &str, observed_at: DateTime<Utc>) -> Vec<WifiNetwork> {
    let mut parsed: Vec<(WifiNetwork, i32)> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            let [active, ssid, bssid, signal, freq, security] = fields.as_slice() else {
                debug!(line, "Skipping malformed nmcli line");
                return None;
            };
            let frequency = freq
                .split_whitespace()
                .next()
                .and_then(|mhz| mhz.parse().ok())
                .unwrap_or_default();
            let capabilities = if security == "--" {
                String::new()
            } else {
                security.clone()
            };
            let quality: i32 = signal.trim().parse().unwrap_or_default();
            Some((
                WifiNetwork {
                    ssid: ssid.clone(),
                    bssid: bssid.clone(),
                    level: signal_to_dbm(quality),
                    frequency,
                    capabilities,
                    timestamp: observed_at,
                    connected: active == "yes",
                },
                quality,
            ))
        })
        .collect();

    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for (network, _) in &parsed {
        let next = first_seen.len();
        first_seen.entry(network.ssid.clone()).or_insert(next);
    }
    parsed.sort_by_key(|(network, quality)| (first_seen[&network.ssid], Reverse(*quality)));
    parsed.into_iter().map(|(network, _)| network).collect()
}

/// BSSID of the line marked active in `ACTIVE,BSSID` terse output.
#[must_use]
pub fn parse_active_bssid(output: &str) -> Option<String> {
    output.lines().find_map(|line| match split_terse(line).as_slice() {
        [active, bssid] if active == "yes" && !bssid.is_empty() => Some(bssid.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::reconcile_scan;

    #[test]
    fn test_split_terse_unescapes() {
        assert_eq!(
            split_terse(r"yes:My\:Net:AA\:BB\:CC\:DD\:EE\:FF:70"),
            vec!["yes", "My:Net", "AA:BB:CC:DD:EE:FF", "70"]
        );
        assert_eq!(split_terse(r"a\\:b"), vec![r"a\", "b"]);
        assert_eq!(split_terse("::"), vec!["", "", ""]);
    }

    #[test]
    fn test_signal_conversion() {
        assert_eq!(signal_to_dbm(100), -50);
        assert_eq!(signal_to_dbm(70), -65);
        assert_eq!(signal_to_dbm(0), -100);
        assert_eq!(signal_to_dbm(140), -50);
    }

    #[test]
    fn test_parse_scan() {
        let output = concat!(
            "yes:HomeNetwork:A4\\:2B\\:B0\\:C1\\:7E\\:10:80:5180 MHz:WPA2\n",
            "no:CoffeeShop:10\\:5A\\:F7\\:02\\:9B\\:44:40:2412 MHz:--\n",
            "garbage\n",
            "\n",
        );
        let now = Utc::now();
        let networks = parse_scan(output, now);

        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].bssid, "A4:2B:B0:C1:7E:10");
        assert_eq!(networks[0].level, -60);
        assert_eq!(networks[0].frequency, 5180);
        assert!(networks[0].connected);
        assert_eq!(networks[1].capabilities, "");
        assert_eq!(networks[1].timestamp, now);
    }

    #[test]
    fn test_adjacent_qualities_keep_stronger_access_point() {
        let output = concat!(
            "no:Lab:00\\:11\\:22\\:33\\:44\\:01:60:2412 MHz:WPA2
",
            "no:Cafe:00\\:11\\:22\\:33\\:44\\:09:30:2437 MHz:--
",
            "no:Lab:00\\:11\\:22\\:33\\:44\\:02:61:5180 MHz:WPA2
",
        );
        let networks = parse_scan(output, Utc::now());
        assert_eq!(networks[0].level, networks[1].level);

        let order: Vec<&str> = networks.iter().map(|n| n.bssid.as_str()).collect();
        assert_eq!(
            order,
            vec!["00:11:22:33:44:02", "00:11:22:33:44:01", "00:11:22:33:44:09"]
        );

        let snapshot = reconcile_scan(networks, None, Utc::now());
        assert_eq!(snapshot.available[0].bssid, "00:11:22:33:44:02");
        assert_eq!(snapshot.available[1].ssid, "Cafe");
    }

    #[test]
    fn test_parse_active_bssid() {
        let output = "no:10\\:5A\\:F7\\:02\\:9B\\:44\nyes:A4\\:2B\\:B0\\:C1\\:7E\\:10\n";
        assert_eq!(parse_active_bssid(output).as_deref(), Some("A4:2B:B0:C1:7E:10"));
        assert_eq!(parse_active_bssid("no:10\\:5A\\:F7\\:02\\:9B\\:44\n"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let backend = NmcliBackend::new("/nonexistent/nmcli");
        assert!(matches!(
            backend.scan().await,
            Err(WifiError::BackendUnavailable { .. })
        ));
        assert!(matches!(
            backend.connected_bssid().await,
            Err(WifiError::BackendUnavailable { .. })
        ));
    }
}
