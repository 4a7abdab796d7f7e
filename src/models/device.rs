//! Client device and location metadata attached to log entries

use serde::{Deserialize, Serialize};

pub const UNKNOWN_BROWSER: &str = "Unknown Browser";
pub const UNKNOWN_OS: &str = "Unknown OS";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const PRIVATE_NETWORK: &str = "Private Network";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
    Bot,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "Desktop",
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
            DeviceType::Bot => "Bot",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Desktop" => Ok(DeviceType::Desktop),
            "Mobile" => Ok(DeviceType::Mobile),
            "Tablet" => Ok(DeviceType::Tablet),
            "Bot" => Ok(DeviceType::Bot),
            _ => Err(format!("Invalid device type: {}", s)),
        }
    }
}

/// Browser, operating system and form factor derived from a user-agent string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub browser: String,
    pub os: String,
    pub device_type: DeviceType,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            browser: UNKNOWN_BROWSER.to_string(),
            os: UNKNOWN_OS.to_string(),
            device_type: DeviceType::Desktop,
        }
    }
}

/// Approximate location of a client IP
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeoLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    /// Human-readable summary, e.g. "Lisbon, Portugal"
    pub label: String,
}

impl GeoLocation {
    /// Placeholder for lookups that were skipped or failed
    pub fn unknown() -> Self {
        Self {
            city: None,
            region: None,
            country: None,
            country_code: None,
            label: UNKNOWN_LOCATION.to_string(),
        }
    }

    /// Placeholder for loopback and private-range addresses
    pub fn private_network() -> Self {
        Self {
            city: Some("Local".to_string()),
            region: None,
            country: Some(PRIVATE_NETWORK.to_string()),
            country_code: None,
            label: PRIVATE_NETWORK.to_string(),
        }
    }

    pub fn resolved(
        city: Option<String>,
        region: Option<String>,
        country: Option<String>,
        country_code: Option<String>,
    ) -> Self {
        let label = match (city.as_deref(), country.as_deref()) {
            (Some(city), Some(country)) if !city.is_empty() => format!("{}, {}", city, country),
            (_, Some(country)) => country.to_string(),
            (Some(city), None) => city.to_string(),
            (None, None) => UNKNOWN_LOCATION.to_string(),
        };
        Self {
            city,
            region,
            country,
            country_code,
            label,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LOCATION
    }
}

impl Default for GeoLocation {
    fn default() -> Self {
        Self::unknown()
    }
}
