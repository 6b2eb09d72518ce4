//! Supported e-commerce platforms and their marketplace regions.

pub mod regions;
pub mod selectors;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use regions::Region;

/// A storefront the engine knows how to read prices from.
///
/// The set is closed: supporting a new site means a new variant here plus a
/// rule in [`crate::extract::ExtractorRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amazon,
    Ebay,
}

impl Platform {
    /// Returns every supported platform.
    pub fn all() -> &'static [Platform] {
        &[Platform::Amazon, Platform::Ebay]
    }

    /// Returns the storefront domain for a region, e.g. `ebay.co.uk`.
    pub fn domain(&self, region: Region) -> String {
        let label = match self {
            Platform::Amazon => "amazon",
            Platform::Ebay => "ebay",
        };
        format!("{}.{}", label, region.suffix())
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Amazon => "Amazon",
            Platform::Ebay => "eBay",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Amazon => write!(f, "amazon"),
            Platform::Ebay => write!(f, "ebay"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amazon" => Ok(Platform::Amazon),
            "ebay" => Ok(Platform::Ebay),
            _ => Err(format!("Unsupported platform: {}. Use: amazon, ebay", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("amazon".parse::<Platform>().unwrap(), Platform::Amazon);
        assert_eq!("eBay".parse::<Platform>().unwrap(), Platform::Ebay);
        assert_eq!("EBAY".parse::<Platform>().unwrap(), Platform::Ebay);

        let err = "walmart".parse::<Platform>().unwrap_err();
        assert!(err.contains("Unsupported platform"));
    }

    #[test]
    fn test_platform_domain() {
        assert_eq!(Platform::Amazon.domain(Region::Us), "amazon.com");
        assert_eq!(Platform::Ebay.domain(Region::Uk), "ebay.co.uk");
        assert_eq!(Platform::Amazon.domain(Region::Jp), "amazon.co.jp");
    }

    #[test]
    fn test_platform_serde() {
        let json = serde_json::to_string(&Platform::Ebay).unwrap();
        assert_eq!(json, "\"ebay\"");
        let parsed: Platform = serde_json::from_str("\"amazon\"").unwrap();
        assert_eq!(parsed, Platform::Amazon);
    }
}
