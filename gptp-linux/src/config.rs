//! Configuration: a small hand-rolled INI parser for the `[ptp]`/`[port]`/
//! `[eth]` sections, merged with CLI overrides per
//! `daemon_cl.cpp`'s precedence (CLI parsed after `-F` config load, so CLI
//! wins).

use std::{collections::BTreeMap, path::Path};

use gptp_core::port::{PeerDelayConfig, PhyDelay};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed line {line}: {text:?}")]
    Malformed { line: usize, text: String },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Everything the `[ptp]`/`[port]`/`[eth]` sections of the INI file (and
/// their CLI overrides) can set, matching `gptp_cfg.hpp`/`common_port.hpp`
/// field-for-field.
#[derive(Debug, Clone, PartialEq)]
pub struct FileConfig {
    pub priority1: Option<u8>,

    pub announce_receipt_timeout: Option<u8>,
    pub sync_receipt_timeout: Option<u8>,
    pub sync_receipt_thresh: Option<u32>,
    pub neighbor_prop_delay_thresh: Option<i64>,
    pub seq_id_as_capable_thresh: Option<u32>,
    pub lost_pdelay_resp_thresh: Option<u16>,
    pub allow_negative_corr_field: Option<bool>,

    pub ifname: Option<String>,
    pub phy_delay: Option<PhyDelay>,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            priority1: None,
            announce_receipt_timeout: None,
            sync_receipt_timeout: None,
            sync_receipt_thresh: None,
            neighbor_prop_delay_thresh: None,
            seq_id_as_capable_thresh: None,
            lost_pdelay_resp_thresh: None,
            allow_negative_corr_field: None,
            ifname: None,
            phy_delay: None,
        }
    }
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let sections = parse_ini(contents)?;
        let mut config = FileConfig::default();

        if let Some(section) = sections.get("ptp") {
            if let Some(v) = section.get("priority1") {
                config.priority1 = Some(parse_value("priority1", v)?);
            }
        }

        if let Some(section) = sections.get("port") {
            if let Some(v) = section.get("announceReceiptTimeout") {
                config.announce_receipt_timeout = Some(parse_value("announceReceiptTimeout", v)?);
            }
            if let Some(v) = section.get("syncReceiptTimeout") {
                config.sync_receipt_timeout = Some(parse_value("syncReceiptTimeout", v)?);
            }
            if let Some(v) = section.get("syncReceiptThresh") {
                config.sync_receipt_thresh = Some(parse_value("syncReceiptThresh", v)?);
            }
            if let Some(v) = section.get("neighborPropDelayThresh") {
                config.neighbor_prop_delay_thresh =
                    Some(parse_value("neighborPropDelayThresh", v)?);
            }
            if let Some(v) = section.get("seqIdAsCapableThresh") {
                config.seq_id_as_capable_thresh = Some(parse_value("seqIdAsCapableThresh", v)?);
            }
            if let Some(v) = section.get("lostPdelayRespThresh") {
                config.lost_pdelay_resp_thresh = Some(parse_value("lostPdelayRespThresh", v)?);
            }
            if let Some(v) = section.get("allowNegativeCorrField") {
                config.allow_negative_corr_field = Some(parse_bool("allowNegativeCorrField", v)?);
            }
        }

        if let Some(section) = sections.get("eth") {
            if let Some(v) = section.get("ifname") {
                config.ifname = Some(v.clone());
            }
            if let Some(v) = section.get("phy_delay") {
                config.phy_delay = Some(parse_phy_delay(v)?);
            }
        }

        Ok(config)
    }

    pub fn peer_delay_config(&self, defaults: PeerDelayConfig) -> PeerDelayConfig {
        PeerDelayConfig {
            seq_id_as_capable_thresh: self
                .seq_id_as_capable_thresh
                .unwrap_or(defaults.seq_id_as_capable_thresh),
            lost_pdelay_resp_thresh: self
                .lost_pdelay_resp_thresh
                .map(u32::from)
                .unwrap_or(defaults.lost_pdelay_resp_thresh),
            allow_negative_correction: self
                .allow_negative_corr_field
                .unwrap_or(defaults.allow_negative_correction),
            ..defaults
        }
    }
}

fn parse_ini(contents: &str) -> Result<BTreeMap<String, BTreeMap<String, String>>, ConfigError> {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current = String::from("");

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current = name.trim().to_string();
            sections.entry(current.clone()).or_default();
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Malformed {
                line: idx + 1,
                text: raw_line.to_string(),
            });
        };

        if current.is_empty() {
            return Err(ConfigError::Malformed {
                line: idx + 1,
                text: raw_line.to_string(),
            });
        }

        sections
            .entry(current.clone())
            .or_default()
            .insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(sections)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parses the `-D gbTx,gbRx,mbTx,mbRx` comma list, mirroring the CLI flag's
/// ordering, onto the two link speeds gPTP cares about: this
/// implementation only disciplines the link it is configured for, so the
/// matching tx/rx pair of whichever speed is active is what `phy_delay.tx`/
/// `phy_delay.rx` end up holding.
/// Public so the `-D` CLI flag can be parsed with the same rules
/// as the `[eth] phy_delay` config key.
pub fn parse_phy_delay(value: &str) -> Result<PhyDelay, ConfigError> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(ConfigError::InvalidValue {
            key: "phy_delay".to_string(),
            value: value.to_string(),
        });
    }
    let nums: Result<Vec<i64>, ConfigError> = parts
        .iter()
        .map(|p| parse_value::<i64>("phy_delay", p))
        .collect();
    let nums = nums?;
    Ok(PhyDelay {
        tx: gptp_core::time::Duration::from_nanos(nums[0] as i128),
        rx: gptp_core::time::Duration::from_nanos(nums[1] as i128),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        const MINIMAL: &str = r#"
[eth]
ifname = eth0
"#;
        let config = FileConfig::from_str(MINIMAL).unwrap();
        assert_eq!(config.ifname.as_deref(), Some("eth0"));
        assert_eq!(config.priority1, None);
    }

    #[test]
    fn full_config_sections() {
        const FULL: &str = r#"
[ptp]
priority1 = 128

[port]
announceReceiptTimeout = 3
syncReceiptTimeout = 3
syncReceiptThresh = 5
neighborPropDelayThresh = 800
seqIdAsCapableThresh = 2
lostPdelayRespThresh = 3
allowNegativeCorrField = false

[eth]
ifname = eth0
phy_delay = 0,0,0,0
"#;
        let config = FileConfig::from_str(FULL).unwrap();
        assert_eq!(config.priority1, Some(128));
        assert_eq!(config.announce_receipt_timeout, Some(3));
        assert_eq!(config.sync_receipt_thresh, Some(5));
        assert_eq!(config.neighbor_prop_delay_thresh, Some(800));
        assert_eq!(config.seq_id_as_capable_thresh, Some(2));
        assert_eq!(config.lost_pdelay_resp_thresh, Some(3));
        assert_eq!(config.allow_negative_corr_field, Some(false));
        assert_eq!(config.ifname.as_deref(), Some("eth0"));
    }

    #[test]
    fn rejects_key_outside_section() {
        assert!(FileConfig::from_str("priority1 = 1").is_err());
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(FileConfig::from_str("[ptp]\nnotakeyvalue\n").is_err());
    }
}
