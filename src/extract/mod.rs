//! Per-platform extraction of prices from fetched pages.
//!
//! The [`ExtractorRegistry`] holds one [`ExtractionRule`] per [`Platform`].
//! It is built once, wrapped in an `Arc` and read concurrently by every
//! worker in a cycle; nothing mutates it afterwards.
//!
//! Layout drift is expected, so extraction never panics on odd markup. Every
//! failure comes back as a classified [`ExtractionError`].

pub mod jsonld;
pub mod price;

use crate::platform::selectors::{amazon, common, ebay};
use crate::platform::{Platform, Region};
use regex_lite::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;
use tracing::trace;

pub use price::parse_price;

/// A value extraction looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Price,
    Availability,
    Currency,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Price => write!(f, "price"),
            Field::Availability => write!(f, "availability"),
            Field::Currency => write!(f, "currency"),
        }
    }
}

/// Why a page could not be turned into a price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExtractionError {
    /// A required marker is absent, usually because the layout changed.
    #[error("required field '{0}' not found on page")]
    MissingField(Field),

    /// A marker was found but its content is not usable.
    #[error("could not parse {field} from {value:?}")]
    MalformedValue { field: Field, value: String },

    /// The storefront served a CAPTCHA or error page instead of the listing.
    #[error("page is a bot challenge (CAPTCHA or error page)")]
    Blocked,
}

/// Fallback strategies tried when no price selector matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// schema.org JSON-LD product data.
    JsonLd,
    /// Free-text scan for a currency-prefixed amount.
    TextScan,
}

/// Parsing rules for one platform.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    /// Price selectors in priority order.
    pub price: Vec<Selector>,
    pub title: Vec<Selector>,
    pub availability: Vec<Selector>,
    /// Lowercase phrases in the availability text that mean "not buyable".
    pub out_of_stock_markers: Vec<String>,
    /// Whether a missing availability marker fails extraction. The price is
    /// always required.
    pub require_availability: bool,
    pub fallbacks: Vec<Fallback>,
}

impl ExtractionRule {
    /// Rule for Amazon product detail pages.
    pub fn amazon() -> Self {
        Self {
            price: amazon::PRICE.clone(),
            title: amazon::TITLE.clone(),
            availability: amazon::AVAILABILITY.clone(),
            out_of_stock_markers: markers(&[
                "currently unavailable",
                "out of stock",
                "derzeit nicht verfügbar",
                "actuellement indisponible",
            ]),
            require_availability: false,
            fallbacks: vec![Fallback::JsonLd],
        }
    }

    /// Rule for eBay item pages.
    pub fn ebay() -> Self {
        Self {
            price: ebay::PRICE.clone(),
            title: ebay::TITLE.clone(),
            availability: ebay::AVAILABILITY.clone(),
            out_of_stock_markers: markers(&["out of stock", "sold out", "no longer available"]),
            require_availability: false,
            fallbacks: vec![Fallback::JsonLd, Fallback::TextScan],
        }
    }
}

fn markers(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Values read from one page, before they are tied to a product and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub price: Decimal,
    pub currency: String,
    pub available: bool,
    pub title: Option<String>,
    /// SHA-256 over price, currency and availability.
    pub checksum: String,
}

impl Extracted {
    /// Builds an extraction result and its checksum.
    pub fn new(
        price: Decimal,
        currency: impl Into<String>,
        available: bool,
        title: Option<String>,
    ) -> Self {
        let currency = currency.into();
        let checksum = checksum(price, &currency, available);
        Self { price, currency, available, title, checksum }
    }
}

/// Content checksum of the values that make up a price observation.
pub fn checksum(price: Decimal, currency: &str, available: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", price.normalize(), currency, available).as_bytes());
    format!("{:x}", hasher.finalize())
}

static TEXT_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:US\s?)?[$£€]\s?(\d[\d.,]*)").unwrap());

/// Registry of extraction rules, one per platform.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    amazon: ExtractionRule,
    ebay: ExtractionRule,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorRegistry {
    /// Creates a registry with the built-in rules.
    pub fn new() -> Self {
        Self { amazon: ExtractionRule::amazon(), ebay: ExtractionRule::ebay() }
    }

    /// Returns the rule used for a platform.
    pub fn rule(&self, platform: Platform) -> &ExtractionRule {
        match platform {
            Platform::Amazon => &self.amazon,
            Platform::Ebay => &self.ebay,
        }
    }

    /// Extracts price, currency and availability from a fetched body.
    ///
    /// The currency is the marketplace currency of `region`; an explicit
    /// currency on the page that disagrees with it is reported as malformed.
    pub fn extract(
        &self,
        platform: Platform,
        region: Region,
        body: &str,
    ) -> Result<Extracted, ExtractionError> {
        let rule = self.rule(platform);
        let trimmed = body.trim_start();

        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            trace!("Treating {} response as JSON", platform);
            return extract_json(trimmed, region);
        }

        let document = Html::parse_document(body);

        let selected = select_price(&document, &rule.price, region);

        // A priced listing is never a bot wall, whatever its images say.
        if !matches!(selected, Ok(Some(_))) && is_bot_wall(&document) {
            return Err(ExtractionError::Blocked);
        }

        let title = first_text(&document, &rule.title);
        let mut offer = None;

        let price = match selected? {
            Some(price) => price,
            None => {
                let mut found = None;
                for fallback in &rule.fallbacks {
                    found = match fallback {
                        Fallback::JsonLd => {
                            let scripts: Vec<String> = document
                                .select(&common::JSON_LD)
                                .map(|s| s.text().collect::<String>())
                                .collect();
                            offer = jsonld::find_offer(scripts.iter().map(String::as_str));
                            offer
                                .as_ref()
                                .filter(|o| o.price.is_some())
                                .map(|o| offer_price(o, region))
                                .transpose()?
                        }
                        Fallback::TextScan => scan_text_price(&document, region),
                    };
                    if found.is_some() {
                        trace!("Price found via {:?} fallback", fallback);
                        break;
                    }
                }
                found.ok_or(ExtractionError::MissingField(Field::Price))?
            }
        };

        let available = match first_text(&document, &rule.availability) {
            Some(text) => {
                let lower = text.to_lowercase();
                !rule.out_of_stock_markers.iter().any(|m| lower.contains(m.as_str()))
            }
            None => match offer.as_ref().and_then(|o| o.available) {
                Some(available) => available,
                None if rule.require_availability => {
                    return Err(ExtractionError::MissingField(Field::Availability))
                }
                None => true,
            },
        };

        let title = title.or_else(|| offer.and_then(|o| o.name));
        Ok(Extracted::new(price, region.currency(), available, title))
    }
}

fn is_bot_wall(document: &Html) -> bool {
    document.select(&common::CAPTCHA).next().is_some()
        || document.select(&common::DOG_PAGE).next().is_some()
}

/// Tries each selector in order. A selector that matches but yields no
/// parseable price does not stop the search; if nothing parses, the first
/// matched text is reported as malformed.
fn select_price(
    document: &Html,
    selectors: &[Selector],
    region: Region,
) -> Result<Option<Decimal>, ExtractionError> {
    let mut first_raw: Option<String> = None;

    for selector in selectors {
        for element in document.select(selector) {
            let raw = element
                .value()
                .attr("content")
                .map(String::from)
                .unwrap_or_else(|| element.text().collect::<String>());
            let raw = raw.trim().to_string();
            if raw.is_empty() {
                continue;
            }
            if let Some(price) = parse_price(&raw, region) {
                return Ok(Some(price));
            }
            first_raw.get_or_insert(raw);
        }
    }

    match first_raw {
        Some(value) => Err(ExtractionError::MalformedValue { field: Field::Price, value }),
        None => Ok(None),
    }
}

fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .map(|e| e.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|text| !text.is_empty())
    })
}

fn offer_price(offer: &jsonld::Offer, region: Region) -> Result<Decimal, ExtractionError> {
    if let Some(currency) = &offer.currency {
        if !currency.eq_ignore_ascii_case(region.currency()) {
            return Err(ExtractionError::MalformedValue {
                field: Field::Currency,
                value: currency.clone(),
            });
        }
    }

    let raw = offer.price.clone().ok_or(ExtractionError::MissingField(Field::Price))?;
    // JSON-LD prices are machine formatted: always a dot decimal.
    parse_price(&raw, Region::Us)
        .ok_or(ExtractionError::MalformedValue { field: Field::Price, value: raw })
}

fn scan_text_price(document: &Html, region: Region) -> Option<Decimal> {
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    TEXT_PRICE
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_price(m.as_str(), region))
}

fn extract_json(body: &str, region: Region) -> Result<Extracted, ExtractionError> {
    let offer = jsonld::find_offer([body]).ok_or(ExtractionError::MissingField(Field::Price))?;
    let price = offer_price(&offer, region)?;
    Ok(Extracted::new(price, region.currency(), offer.available.unwrap_or(true), offer.name))
}
