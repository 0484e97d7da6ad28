use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How hard a knock must be to count as a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl TapSensitivity {
    /// Linear acceleration (m/s², gravity removed) a sample must exceed.
    pub fn threshold(self) -> f32 {
        match self {
            TapSensitivity::Low => 4.0,
            TapSensitivity::Medium => 2.5,
            TapSensitivity::High => 1.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TapSensitivity::Low => "low",
            TapSensitivity::Medium => "medium",
            TapSensitivity::High => "high",
        }
    }
}

impl fmt::Display for TapSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TapSensitivity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TapSensitivity::Low),
            "medium" => Ok(TapSensitivity::Medium),
            "high" => Ok(TapSensitivity::High),
            other => Err(ValidationError::InvalidValue {
                field: "sensitivity".into(),
                message: format!("unknown sensitivity '{other}' (expected low, medium or high)"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_sensitivity_means_lower_threshold() {
        assert!(TapSensitivity::High.threshold() < TapSensitivity::Medium.threshold());
        assert!(TapSensitivity::Medium.threshold() < TapSensitivity::Low.threshold());
        assert_eq!(TapSensitivity::Medium.threshold(), 2.5);
    }

    #[test]
    fn parses_names() {
        assert_eq!("HIGH".parse::<TapSensitivity>().unwrap(), TapSensitivity::High);
        assert!("extreme".parse::<TapSensitivity>().is_err());
    }
}
