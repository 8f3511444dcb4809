//! Cabinet compression levels.

use std::{fmt, str::FromStr};

/// Compression level for cabinets.
///
/// # Configuration
///
/// ```toml
/// [bind]
/// default_compression_level = "high"
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Store only.
    None,
    Low,
    Medium,
    High,
    /// The installer's classic default.
    #[default]
    Mszip,
}

impl CompressionLevel {
    /// Maps the level onto a deflate level.
    pub fn to_flate2(self) -> flate2::Compression {
        match self {
            Self::None => flate2::Compression::none(),
            Self::Low => flate2::Compression::fast(),
            Self::Medium => flate2::Compression::new(5),
            Self::High => flate2::Compression::best(),
            Self::Mszip => flate2::Compression::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Mszip => "mszip",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "mszip" => Ok(Self::Mszip),
            other => Err(format!("unknown compression level: {other}")),
        }
    }
}
