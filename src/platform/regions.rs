//! Marketplace regions, resolved from a listing's host.
//!
//! Both Amazon and eBay run one storefront per country under a country
//! top-level domain, so the host suffix alone fixes the currency and the
//! decimal separator a listing is priced in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported marketplace regions with their domain suffixes and currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Uk,
    De,
    Fr,
    Es,
    It,
    Ca,
    Au,
    Jp,
    In,
    Br,
    Mx,
    Nl,
    Se,
    Pl,
}

impl Region {
    /// Returns the domain suffix shared by storefronts in this region.
    pub fn suffix(&self) -> &'static str {
        match self {
            Region::Us => "com",
            Region::Uk => "co.uk",
            Region::De => "de",
            Region::Fr => "fr",
            Region::Es => "es",
            Region::It => "it",
            Region::Ca => "ca",
            Region::Au => "com.au",
            Region::Jp => "co.jp",
            Region::In => "in",
            Region::Br => "com.br",
            Region::Mx => "com.mx",
            Region::Nl => "nl",
            Region::Se => "se",
            Region::Pl => "pl",
        }
    }

    /// Returns the ISO 4217 currency code listings in this region are priced in.
    pub fn currency(&self) -> &'static str {
        match self {
            Region::Us => "USD",
            Region::Uk => "GBP",
            Region::De | Region::Fr | Region::Es | Region::It | Region::Nl => "EUR",
            Region::Ca => "CAD",
            Region::Au => "AUD",
            Region::Jp => "JPY",
            Region::In => "INR",
            Region::Br => "BRL",
            Region::Mx => "MXN",
            Region::Se => "SEK",
            Region::Pl => "PLN",
        }
    }

    /// Returns the Accept-Language header value for this region.
    pub fn accept_language(&self) -> &'static str {
        match self {
            Region::Us | Region::Ca | Region::Au => "en-US,en;q=0.9",
            Region::Uk => "en-GB,en;q=0.9",
            Region::De => "de-DE,de;q=0.9,en;q=0.8",
            Region::Fr => "fr-FR,fr;q=0.9,en;q=0.8",
            Region::Es | Region::Mx => "es-ES,es;q=0.9,en;q=0.8",
            Region::It => "it-IT,it;q=0.9,en;q=0.8",
            Region::Jp => "ja-JP,ja;q=0.9,en;q=0.8",
            Region::In => "en-IN,en;q=0.9,hi;q=0.8",
            Region::Br => "pt-BR,pt;q=0.9,en;q=0.8",
            Region::Nl => "nl-NL,nl;q=0.9,en;q=0.8",
            Region::Se => "sv-SE,sv;q=0.9,en;q=0.8",
            Region::Pl => "pl-PL,pl;q=0.9,en;q=0.8",
        }
    }

    /// Returns whether prices in this region use a comma as decimal separator.
    pub fn uses_comma_decimal(&self) -> bool {
        matches!(
            self,
            Region::De
                | Region::Fr
                | Region::Es
                | Region::It
                | Region::Nl
                | Region::Se
                | Region::Pl
                | Region::Br
        )
    }

    /// Resolves the region of a storefront host such as `www.ebay.co.uk`.
    ///
    /// Hosts that match no known suffix (localhost, bare IPs, mirrors) fall
    /// back to the default region.
    pub fn from_host(host: &str) -> Self {
        let host = host.trim_end_matches('.').to_ascii_lowercase();

        // Longest suffix first so "com.au" wins over "com".
        let mut candidates: Vec<Region> = Self::all().to_vec();
        candidates.sort_by_key(|r| std::cmp::Reverse(r.suffix().len()));

        candidates
            .into_iter()
            .find(|region| {
                let suffix = region.suffix();
                host.strip_suffix(suffix).is_some_and(|rest| rest.ends_with('.'))
            })
            .unwrap_or_default()
    }

    /// Returns all supported regions.
    pub fn all() -> &'static [Region] {
        &[
            Region::Us,
            Region::Uk,
            Region::De,
            Region::Fr,
            Region::Es,
            Region::It,
            Region::Ca,
            Region::Au,
            Region::Jp,
            Region::In,
            Region::Br,
            Region::Mx,
            Region::Nl,
            Region::Se,
            Region::Pl,
        ]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Region::Us => "us",
            Region::Uk => "uk",
            Region::De => "de",
            Region::Fr => "fr",
            Region::Es => "es",
            Region::It => "it",
            Region::Ca => "ca",
            Region::Au => "au",
            Region::Jp => "jp",
            Region::In => "in",
            Region::Br => "br",
            Region::Mx => "mx",
            Region::Nl => "nl",
            Region::Se => "se",
            Region::Pl => "pl",
        };
        write!(f, "{}", code)
    }
}
